//! 점검 대상 소스 데이터
//!
//! 데이터 루트 디렉토리에서 읽은 클러스터 메타데이터, 노드별 설정,
//! 성능 대시보드 데이터를 [`SourceData`]로 묶습니다.
//! 로딩은 [`fetcher::FileFetcher`]가 담당합니다.

pub mod fetcher;
pub mod meta;

use std::collections::BTreeMap;
use std::sync::Arc;

use foresight_core::types::Component;
use serde::{Deserialize, Serialize};

pub use fetcher::FileFetcher;
pub use meta::{ClusterInfo, NodeSpec, Topology};

use crate::error::CheckerError;
use crate::rule::{PD_CONFIG, TIDB_CONFIG, TIFLASH_CONFIG, TIKV_CONFIG};
use crate::slowlog::ExecutionPlanInfo;
use crate::value::ConfigValue;

/// 컴포넌트의 노드 설정 이름 구조
pub fn config_name_struct(component: Component) -> &'static str {
    match component {
        Component::Pd => PD_CONFIG,
        Component::Tidb => TIDB_CONFIG,
        Component::Tikv => TIKV_CONFIG,
        Component::Tiflash => TIFLASH_CONFIG,
    }
}

/// 노드 설정 이름 구조의 컴포넌트
pub fn name_struct_component(name_struct: &str) -> Option<Component> {
    match name_struct {
        PD_CONFIG => Some(Component::Pd),
        TIDB_CONFIG => Some(Component::Tidb),
        TIKV_CONFIG => Some(Component::Tikv),
        TIFLASH_CONFIG => Some(Component::Tiflash),
        _ => None,
    }
}

/// 노드 하나의 설정 인스턴스
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub component: Component,
    pub host: String,
    pub port: u16,
    /// `conf/config.json` 내용. 파일이 없으면 `None`입니다.
    pub config: Option<Arc<ConfigValue>>,
}

impl NodeConfig {
    /// `<component>_<host>:<port>`
    pub fn uqi_tag(&self) -> String {
        format!("{}_{}:{}", self.component, self.host, self.port)
    }

    /// 설정이 로딩되었는지 여부
    pub fn is_valid(&self) -> bool {
        self.config.is_some()
    }
}

/// `tikv_gc_life_time`과 이전 버전 스캔 쿼리 수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldVersionProcessKey {
    pub count: u64,
    /// GC 보존 기간 (초)
    pub gc_life_time: u64,
}

/// 툼스톤 스캔 쿼리 수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneStatistics {
    pub count: u64,
}

/// 성능 대시보드 데이터
///
/// 규칙에는 `dashboard`로 바인딩되고, 필드는 직렬화 이름으로 읽습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    /// 다이제스트 → `[최소, 최대]` 평균 처리 시간 계획
    pub execution_plan_info_list: BTreeMap<String, [ExecutionPlanInfo; 2]>,
    pub old_version_processkey: OldVersionProcessKey,
    pub tombstone_statistics: TombstoneStatistics,
}

impl DashboardData {
    /// 규칙 평가용 값 트리로 변환합니다.
    pub fn to_tree(&self) -> Result<ConfigValue, CheckerError> {
        let json = serde_json::to_value(self).map_err(|e| CheckerError::SourceData {
            path: "dashboard".to_owned(),
            reason: format!("failed to serialize dashboard data: {e}"),
        })?;
        Ok(ConfigValue::from(json))
    }
}

/// 점검 입력 전체
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    pub cluster_info: ClusterInfo,
    /// 클러스터 버전 (`v5.0.1`)
    pub cluster_version: String,
    /// 이름 구조 → 노드 설정 목록
    pub nodes_data: BTreeMap<String, Vec<NodeConfig>>,
    /// 성능 카테고리가 활성화되었을 때만 채워집니다.
    pub dashboard_data: Option<Arc<ConfigValue>>,
}

impl SourceData {
    /// 이름 구조의 노드 설정 목록
    pub fn nodes(&self, name_struct: &str) -> Option<&[NodeConfig]> {
        self.nodes_data.get(name_struct).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uqi_tag_format() {
        let node = NodeConfig {
            component: Component::Tikv,
            host: "10.0.1.3".to_owned(),
            port: 20160,
            config: None,
        };
        assert_eq!(node.uqi_tag(), "tikv_10.0.1.3:20160");
        assert!(!node.is_valid());
    }

    #[test]
    fn name_struct_mapping_round_trips() {
        for component in [Component::Pd, Component::Tidb, Component::Tikv, Component::Tiflash] {
            assert_eq!(
                name_struct_component(config_name_struct(component)),
                Some(component)
            );
        }
        assert_eq!(name_struct_component("performance.dashboard"), None);
    }

    #[test]
    fn dashboard_tree_uses_serialized_names() {
        let mut data = DashboardData::default();
        data.old_version_processkey.count = 3;
        data.old_version_processkey.gc_life_time = 600;
        data.execution_plan_info_list.insert(
            "d1".to_owned(),
            [ExecutionPlanInfo::default(), ExecutionPlanInfo::default()],
        );
        let tree = data.to_tree().unwrap();
        assert_eq!(
            tree.get_path("old_version_processkey.gc_life_time").as_i64(),
            Some(600)
        );
        assert_eq!(tree.get_path("tombstone_statistics.count").as_i64(), Some(0));
        assert!(matches!(
            tree.get_path("execution_plan_info_list.d1"),
            ConfigValue::Seq(items) if items.len() == 2
        ));
    }
}
