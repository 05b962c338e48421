//! 클러스터 메타데이터 -- `cluster.json`과 `meta.yaml`

use std::collections::BTreeMap;
use std::path::PathBuf;

use foresight_core::types::Component;
use serde::{Deserialize, Serialize};

/// 클러스터 스냅샷 파일 이름
pub const CLUSTER_JSON: &str = "cluster.json";
/// 토폴로지 파일 이름
pub const META_YAML: &str = "meta.yaml";
/// 시스템 변수 덤프 디렉토리
pub const INFO_SCHEMA_DIR: &str = "info_schema";
/// 시스템 변수 덤프 파일
pub const SYS_VARIABLES_CSV: &str = "mysql.tidb.csv";
/// TiDB 슬로우 쿼리 로그 파일 이름
pub const SLOW_QUERY_LOG: &str = "tidb_slow_query.log";

/// `cluster.json`의 클러스터 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInfo {
    pub diag_version: String,
    pub cluster_name: String,
    pub cluster_id: String,
    pub cluster_type: String,
    pub deploy_type: String,
    /// 수집 세션 ID
    pub session: String,
    pub begin_time: String,
    pub end_time: String,
    /// 수집된 데이터 종류
    pub collectors: Vec<String>,
    pub topology: Option<Topology>,
}

/// 노드 속성
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAttributes {
    /// 배포 디렉토리 (`<root>/<host>/` 아래 상대 경로)
    pub deploy_dir: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// 노드 하나의 배치 정보
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub host: String,
    pub port: u16,
    pub status_port: u16,
    pub attributes: NodeAttributes,
}

impl NodeSpec {
    /// 노드 데이터 디렉토리 (`<root>/<host>[/<deploy_dir>]`)
    pub fn node_dir(&self, root: &std::path::Path) -> PathBuf {
        let mut dir = root.join(&self.host);
        if let Some(deploy_dir) = self.attributes.deploy_dir.as_deref() {
            dir.push(deploy_dir.trim_start_matches('/'));
        }
        dir
    }

    /// 노드 설정 파일 경로
    pub fn config_path(&self, root: &std::path::Path) -> PathBuf {
        self.node_dir(root).join("conf").join("config.json")
    }

    /// 슬로우 쿼리 로그 경로
    pub fn slow_log_path(&self, root: &std::path::Path) -> PathBuf {
        self.node_dir(root).join("log").join(SLOW_QUERY_LOG)
    }
}

/// 클러스터 토폴로지
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub version: String,
    pub pd: Vec<NodeSpec>,
    pub tikv: Vec<NodeSpec>,
    pub tidb: Vec<NodeSpec>,
    pub tiflash: Vec<NodeSpec>,
}

impl Topology {
    /// 컴포넌트의 노드 목록
    pub fn nodes(&self, component: Component) -> &[NodeSpec] {
        match component {
            Component::Pd => &self.pd,
            Component::Tikv => &self.tikv,
            Component::Tidb => &self.tidb,
            Component::Tiflash => &self.tiflash,
        }
    }

    /// 노드가 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.pd.is_empty() && self.tikv.is_empty() && self.tidb.is_empty() && self.tiflash.is_empty()
    }

    /// 노드가 있는 컴포넌트 목록
    pub fn components(&self) -> Vec<Component> {
        [Component::Pd, Component::Tidb, Component::Tikv, Component::Tiflash]
            .into_iter()
            .filter(|c| !self.nodes(*c).is_empty())
            .collect()
    }
}
