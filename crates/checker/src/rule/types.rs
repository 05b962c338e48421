//! 점검 규칙 데이터 타입
//!
//! TOML 규칙 코퍼스에서 역직렬화되는 구조체들을 정의합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use foresight_core::types::CheckCategory;
use serde::{Deserialize, Serialize};

use super::version::VersionRange;
use crate::error::CheckerError;

/// PD 노드 설정 이름 구조
pub const PD_CONFIG: &str = "PdConfig";
/// TiDB 노드 설정 이름 구조
pub const TIDB_CONFIG: &str = "TidbConfig";
/// TiKV 노드 설정 이름 구조
pub const TIKV_CONFIG: &str = "TikvConfig";
/// TiFlash 노드 설정 이름 구조
pub const TIFLASH_CONFIG: &str = "TiflashConfig";
/// 성능 대시보드 이름 구조
pub const PERFORMANCE_DASHBOARD: &str = "performance.dashboard";

/// 노드 설정 이름 구조 목록
pub const CONFIG_NAME_STRUCTS: [&str; 4] = [PD_CONFIG, TIDB_CONFIG, TIKV_CONFIG, TIFLASH_CONFIG];

/// 점검 규칙
///
/// # TOML 스키마
/// ```toml
/// [[rule]]
/// id = 101
/// name = "tidb-log-level"
/// description = "log level should not be debug"
/// execute_rule = '''
/// rule "tidb-log-level" begin
///   return ToString(config.GetValueByTagPath("log.level")) != "debug"
/// end
/// '''
/// name_struct = "TidbConfig"
/// check_type = "config"
/// warn_level = "warning"
/// variation = "TidbConfig.log.level"
/// version = ">=v4.0.0"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// 규칙 ID
    pub id: i64,
    /// 규칙 이름 (전역 유일)
    pub name: String,
    /// 설명
    #[serde(default)]
    pub description: String,
    /// 규칙 표현식 소스
    pub execute_rule: String,
    /// 바인딩할 데이터 이름 구조 (`TidbConfig`, `performance.dashboard` 등)
    pub name_struct: String,
    /// 점검 종류 (`config`, `performance`, `default_config`)
    pub check_type: String,
    /// 기대 결과 (사용하지 않음)
    #[serde(default)]
    pub expect_res: String,
    /// 실패 시 보고할 심각도 (`info`, `warning`, `error`)
    #[serde(default = "default_warn_level")]
    pub warn_level: String,
    /// 보고할 값 경로 목록 (`TidbConfig.log.level,TikvConfig.log-level`)
    #[serde(default)]
    pub variation: String,
    /// 관련 알림 규칙
    #[serde(default)]
    pub alerting_rule: String,
    /// 조치 제안
    #[serde(default)]
    pub suggestion: String,
    /// 적용 버전 제약
    #[serde(default)]
    pub version: VersionRange,
}

fn default_warn_level() -> String {
    "warning".to_owned()
}

impl Rule {
    /// 점검 카테고리
    pub fn category(&self) -> Option<CheckCategory> {
        CheckCategory::from_name(&self.check_type)
    }

    /// 쉼표로 구분된 이름 구조 각각
    pub fn name_struct_parts(&self) -> impl Iterator<Item = &str> {
        self.name_struct.split(',').map(str::trim)
    }

    /// 노드 설정에만 바인딩되는 규칙인지 여부
    pub fn binds_node_config(&self) -> bool {
        self.name_struct_parts().all(|part| part.ends_with("Config"))
    }

    /// 규칙의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CheckerError> {
        let invalid = |reason: &str| CheckerError::RuleValidation {
            rule: if self.name.is_empty() {
                "(empty)".to_owned()
            } else {
                self.name.clone()
            },
            reason: reason.to_owned(),
        };

        if self.name.is_empty() {
            return Err(invalid("rule name must not be empty"));
        }
        if self.execute_rule.trim().is_empty() {
            return Err(invalid("execute_rule must not be empty"));
        }
        if self.name_struct.is_empty() {
            return Err(invalid("name_struct must not be empty"));
        }
        if self.category().is_none() {
            return Err(invalid(&format!("unknown check_type '{}'", self.check_type)));
        }
        if !self.version.is_empty() {
            self.version.parse()?;
        }
        Ok(())
    }
}

/// 버전/카테고리 필터를 통과한 규칙 집합
///
/// 규칙은 코퍼스의 선언 순서를 유지합니다.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<Rule>>,
}

impl RuleSet {
    /// 규칙 목록으로 생성합니다.
    pub fn new(rules: Vec<Arc<Rule>>) -> Self {
        Self { rules }
    }

    /// 이름으로 규칙을 찾습니다.
    pub fn get(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// 규칙 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 선언 순서로 규칙을 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter()
    }

    /// 이름 구조별로 묶은 규칙
    pub fn grouped(&self) -> BTreeMap<&str, Vec<&Arc<Rule>>> {
        let mut groups: BTreeMap<&str, Vec<&Arc<Rule>>> = BTreeMap::new();
        for rule in &self.rules {
            groups.entry(rule.name_struct.as_str()).or_default().push(rule);
        }
        groups
    }

    /// 사용 중인 이름 구조 목록 (복합 이름 구조는 나눠서 셉니다)
    pub fn name_structs(&self) -> Vec<&str> {
        let parts: BTreeSet<&str> = self.rules.iter().flat_map(|r| r.name_struct_parts()).collect();
        parts.into_iter().collect()
    }
}

#[cfg(test)]
pub(crate) fn sample_rule(name: &str, name_struct: &str, source: &str) -> Rule {
    Rule {
        id: 1,
        name: name.to_owned(),
        description: String::new(),
        execute_rule: source.to_owned(),
        name_struct: name_struct.to_owned(),
        check_type: "config".to_owned(),
        expect_res: String::new(),
        warn_level: "warning".to_owned(),
        variation: String::new(),
        alerting_rule: String::new(),
        suggestion: String::new(),
        version: VersionRange::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_check_type() {
        let mut rule = sample_rule("r", TIDB_CONFIG, "rule \"r\" begin return true end");
        assert_eq!(rule.category(), Some(CheckCategory::Config));
        rule.check_type = "default_config".to_owned();
        assert_eq!(rule.category(), Some(CheckCategory::DefaultConfig));
        rule.check_type = "nope".to_owned();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn validate_requires_name_and_source() {
        let rule = sample_rule("", TIDB_CONFIG, "x");
        assert!(rule.validate().is_err());
        let rule = sample_rule("r", TIDB_CONFIG, "  ");
        assert!(rule.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_version() {
        let mut rule = sample_rule("r", TIDB_CONFIG, "rule \"r\" begin return true end");
        rule.version = VersionRange::new(">=vfoo");
        assert!(matches!(rule.validate(), Err(CheckerError::Version { .. })));
    }

    #[test]
    fn rule_set_groups_by_name_struct() {
        let set = RuleSet::new(vec![
            Arc::new(sample_rule("a", TIDB_CONFIG, "x")),
            Arc::new(sample_rule("b", TIKV_CONFIG, "x")),
            Arc::new(sample_rule("c", TIDB_CONFIG, "x")),
        ]);
        let groups = set.grouped();
        assert_eq!(groups[TIDB_CONFIG].len(), 2);
        assert_eq!(set.name_structs(), vec![TIDB_CONFIG, TIKV_CONFIG]);
        assert_eq!(set.get("b").unwrap().name_struct, TIKV_CONFIG);
        assert!(set.get("zz").is_none());
    }

    #[test]
    fn node_config_binding() {
        assert!(sample_rule("a", PD_CONFIG, "x").binds_node_config());
        assert!(!sample_rule("a", PERFORMANCE_DASHBOARD, "x").binds_node_config());
        assert!(sample_rule("a", "TidbConfig, PdConfig", "x").binds_node_config());
    }
}
