//! 규칙 코퍼스 로더 -- TOML `[[rule]]` 문서를 파싱하고 필터링합니다.
//!
//! 로딩은 한 번만 수행되며, 이후 클러스터 버전과 점검 카테고리로
//! 필터링하여 [`RuleSet`]을 만듭니다.
//! 버전 제약 파싱 실패는 로딩 전체를 실패시킵니다.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use foresight_core::types::CheckCategory;
use serde::{Deserialize, Serialize};

use crate::error::CheckerError;

use super::types::{CONFIG_NAME_STRUCTS, PERFORMANCE_DASHBOARD, Rule, RuleSet};

/// 규칙 파일 크기 상한
const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RULES_COUNT: usize = 10_000;

/// 내장 기본 규칙 코퍼스
const BUNDLED_RULES: &str = include_str!("../../rules/default.toml");

/// 내장 코퍼스의 출처 이름
pub const BUNDLED_SOURCE: &str = "<bundled>";

/// 파싱된 규칙 코퍼스
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSpec {
    /// 선언 순서의 규칙 목록
    #[serde(default)]
    pub rule: Vec<Rule>,
}

impl RuleSpec {
    /// TOML 문자열을 파싱하고 검증합니다.
    ///
    /// # Errors
    /// - TOML 구문 오류
    /// - 규칙 유효성 검증 실패 (버전 제약 포함)
    /// - 중복된 규칙 이름
    pub fn parse_toml(toml_str: &str, source: &str) -> Result<Self, CheckerError> {
        let spec: RuleSpec = toml::from_str(toml_str).map_err(|e| CheckerError::RuleLoad {
            source_name: source.to_owned(),
            reason: format!("TOML parse error: {e}"),
        })?;

        if spec.rule.len() > MAX_RULES_COUNT {
            return Err(CheckerError::RuleLoad {
                source_name: source.to_owned(),
                reason: format!("too many rules: max {MAX_RULES_COUNT}"),
            });
        }

        let mut seen = HashSet::new();
        for rule in &spec.rule {
            rule.validate()?;
            if !seen.insert(rule.name.as_str()) {
                return Err(CheckerError::RuleLoad {
                    source_name: source.to_owned(),
                    reason: format!("duplicate rule name '{}'", rule.name),
                });
            }
        }

        Ok(spec)
    }

    /// 내장 기본 코퍼스를 로드합니다.
    pub fn bundled() -> Result<Self, CheckerError> {
        Self::parse_toml(BUNDLED_RULES, BUNDLED_SOURCE)
    }

    /// 규칙 파일을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, CheckerError> {
        let path = path.as_ref();
        let load_error = |reason: String| CheckerError::RuleLoad {
            source_name: path.display().to_string(),
            reason,
        };

        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| load_error(format!("failed to read file metadata: {e}")))?;
        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(load_error(format!(
                "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_error(format!("failed to read file: {e}")))?;

        let spec = Self::parse_toml(&content, &path.display().to_string())?;
        tracing::info!(
            path = %path.display(),
            count = spec.rule.len(),
            "loaded check rules"
        );
        Ok(spec)
    }

    /// 파일 경로가 있으면 파일에서, 없으면 내장 코퍼스를 로드합니다.
    pub async fn load(path: Option<&Path>) -> Result<Self, CheckerError> {
        match path {
            Some(path) => Self::load_file(path).await,
            None => Self::bundled(),
        }
    }

    /// 규칙 수
    pub fn len(&self) -> usize {
        self.rule.len()
    }

    /// 규칙이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.rule.is_empty()
    }

    /// 클러스터 버전을 허용하는 규칙만 남깁니다.
    ///
    /// # Errors
    /// 대상 버전이나 규칙의 버전 제약을 파싱할 수 없으면 실패합니다.
    pub fn filter_on_version(&self, cluster_version: &str) -> Result<RuleSet, CheckerError> {
        let mut kept = Vec::new();
        for rule in &self.rule {
            if rule.version.contains(cluster_version)? {
                kept.push(Arc::new(rule.clone()));
            } else {
                tracing::debug!(
                    rule = %rule.name,
                    constraint = %rule.version,
                    version = cluster_version,
                    "rule excluded by version"
                );
            }
        }
        Ok(RuleSet::new(kept))
    }

    /// 버전과 술어를 모두 만족하는 규칙만 남깁니다.
    pub fn filter_on<F>(&self, cluster_version: &str, pred: F) -> Result<RuleSet, CheckerError>
    where
        F: Fn(&Rule) -> bool,
    {
        let by_version = self.filter_on_version(cluster_version)?;
        Ok(RuleSet::new(
            by_version.iter().filter(|r| pred(r)).cloned().collect(),
        ))
    }
}

/// 카테고리 집합에 해당하는 규칙인지 판정하는 술어를 만듭니다.
///
/// - `config`, `default_config`: 노드 설정 이름 구조 + 같은 `check_type`
/// - `performance`: `performance.dashboard`
pub fn category_filter(categories: &[CheckCategory]) -> impl Fn(&Rule) -> bool + '_ {
    move |rule| {
        categories.iter().any(|category| match category {
            CheckCategory::Config | CheckCategory::DefaultConfig => {
                rule.check_type == category.as_str()
                    && rule
                        .name_struct_parts()
                        .all(|part| CONFIG_NAME_STRUCTS.contains(&part))
            }
            CheckCategory::Performance => rule.name_struct == PERFORMANCE_DASHBOARD,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = r#"
[[rule]]
id = 1
name = "R1"
execute_rule = 'rule "R1" begin return true end'
name_struct = "TidbConfig"
check_type = "config"
version = ">=v5.0.1,<v5.0.2"

[[rule]]
id = 2
name = "R2"
execute_rule = 'rule "R2" begin return true end'
name_struct = "TikvConfig"
check_type = "default_config"
version = "<v4.0.2||>=v5.0"

[[rule]]
id = 3
name = "R3"
execute_rule = 'rule "R3" begin return 0 end'
name_struct = "performance.dashboard"
check_type = "performance"
"#;

    fn names(set: &RuleSet) -> Vec<&str> {
        set.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn parse_corpus_keeps_order() {
        let spec = RuleSpec::parse_toml(CORPUS, "test.toml").unwrap();
        assert_eq!(spec.len(), 3);
        assert_eq!(spec.rule[1].name, "R2");
        assert_eq!(spec.rule[1].warn_level, "warning");
    }

    #[test]
    fn version_filter_scenarios() {
        let spec = RuleSpec::parse_toml(CORPUS, "test.toml").unwrap();
        assert_eq!(names(&spec.filter_on_version("v5.0.1").unwrap()), vec!["R1", "R2", "R3"]);
        assert_eq!(names(&spec.filter_on_version("v4.0.1").unwrap()), vec!["R2", "R3"]);
    }

    #[test]
    fn category_predicate() {
        let spec = RuleSpec::parse_toml(CORPUS, "test.toml").unwrap();
        let set = spec
            .filter_on("v5.0.1", category_filter(&[CheckCategory::Config]))
            .unwrap();
        assert_eq!(names(&set), vec!["R1"]);

        let set = spec
            .filter_on(
                "v5.0.1",
                category_filter(&[CheckCategory::DefaultConfig, CheckCategory::Performance]),
            )
            .unwrap();
        assert_eq!(names(&set), vec!["R2", "R3"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let doubled = format!("{CORPUS}\n{}", &CORPUS[CORPUS.find("[[rule]]").unwrap()..]);
        let err = RuleSpec::parse_toml(&doubled, "dup.toml").unwrap_err();
        assert!(err.to_string().contains("duplicate rule name"));
    }

    #[test]
    fn bad_version_fails_loading() {
        let corpus = CORPUS.replace("<v4.0.2||>=v5.0", ">=vfoo");
        assert!(matches!(
            RuleSpec::parse_toml(&corpus, "bad.toml"),
            Err(CheckerError::Version { .. })
        ));
    }

    #[test]
    fn invalid_toml_is_rule_load_error() {
        assert!(matches!(
            RuleSpec::parse_toml("[[rule]\nid = ", "broken.toml"),
            Err(CheckerError::RuleLoad { .. })
        ));
    }

    #[test]
    fn bundled_corpus_is_valid() {
        let spec = RuleSpec::bundled().unwrap();
        assert!(!spec.is_empty());
        let set = spec.filter_on_version("v5.0.1").unwrap();
        assert!(set.name_structs().contains(&PERFORMANCE_DASHBOARD));
    }

    #[tokio::test]
    async fn load_missing_file_returns_error() {
        let result = RuleSpec::load_file("/nonexistent/rules.toml").await;
        assert!(matches!(result, Err(CheckerError::RuleLoad { .. })));
    }

    #[tokio::test]
    async fn load_without_path_uses_bundled() {
        let spec = RuleSpec::load(None).await.unwrap();
        assert_eq!(spec.len(), RuleSpec::bundled().unwrap().len());
    }
}
