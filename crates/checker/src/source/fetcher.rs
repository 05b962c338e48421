//! 데이터 루트 디렉토리에서 소스 데이터를 로딩합니다.
//!
//! ```text
//! <root>/cluster.json
//! <root>/meta.yaml
//! <root>/info_schema/mysql.tidb.csv
//! <root>/<host>[/<deploy_dir>]/conf/config.json
//! <root>/<host>[/<deploy_dir>]/log/tidb_slow_query.log
//! ```

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Local};
use foresight_core::types::{CheckCategory, Component};

use super::meta::{CLUSTER_JSON, ClusterInfo, INFO_SCHEMA_DIR, META_YAML, SYS_VARIABLES_CSV, Topology};
use super::{DashboardData, NodeConfig, SourceData, config_name_struct, name_struct_component};
use crate::config::CheckConfig;
use crate::error::CheckerError;
use crate::rule::{RuleSet, RuleSpec, category_filter};
use crate::slowlog::{Columns, SLOW_QUERY_COLUMNS, SlowQueryRetriever, accumulate};
use crate::value::ConfigValue;

/// GC 보존 기간 시스템 변수
const GC_LIFE_TIME_VARIABLE: &str = "tikv_gc_life_time";

/// 파일 기반 소스 데이터 로더
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
    config: CheckConfig,
    time_range: Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)>,
}

impl FileFetcher {
    /// 로더를 생성합니다.
    pub fn new(root: impl Into<PathBuf>, config: CheckConfig) -> Self {
        Self {
            root: root.into(),
            config,
            time_range: None,
        }
    }

    /// 슬로우 쿼리 집계 구간을 지정합니다.
    ///
    /// 지정하지 않으면 `slow_log_days`일 전부터 현재까지입니다.
    pub fn with_time_range(
        mut self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        self.time_range = Some((start, end));
        self
    }

    /// 데이터 루트
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 메타데이터를 읽고 규칙을 필터링한 뒤 필요한 데이터를 로딩합니다.
    pub async fn fetch(&self, spec: &RuleSpec) -> Result<(SourceData, RuleSet), CheckerError> {
        let (cluster_info, topology) = self.load_meta().await?;
        let cluster_version = cluster_version(&cluster_info, &topology);
        let topology = match cluster_info.topology.as_ref() {
            Some(t) if !t.is_empty() => t.clone(),
            _ => topology.unwrap_or_default(),
        };

        let rule_set = spec.filter_on(&cluster_version, category_filter(&self.config.categories))?;
        tracing::info!(
            root = %self.root.display(),
            version = %cluster_version,
            components = ?topology.components(),
            rules = rule_set.len(),
            "cluster metadata loaded"
        );

        let mut source = SourceData {
            cluster_info,
            cluster_version,
            ..SourceData::default()
        };

        for name_struct in rule_set.name_structs() {
            let Some(component) = name_struct_component(name_struct) else {
                continue;
            };
            let nodes = self.load_node_configs(&topology, component).await?;
            source.nodes_data.insert(name_struct.to_owned(), nodes);
        }

        if self.config.is_enabled(CheckCategory::Performance) {
            let dashboard = self.load_dashboard(&topology).await?;
            source.dashboard_data = Some(Arc::new(dashboard.to_tree()?));
        }

        Ok((source, rule_set))
    }

    async fn load_meta(&self) -> Result<(ClusterInfo, Option<Topology>), CheckerError> {
        let json_path = self.root.join(CLUSTER_JSON);
        let yaml_path = self.root.join(META_YAML);

        let cluster_info = match read_optional(&json_path).await? {
            Some(content) => Some(serde_json::from_str::<ClusterInfo>(&content).map_err(|e| {
                source_error(&json_path, format!("invalid cluster json: {e}"))
            })?),
            None => None,
        };
        let topology = match read_optional(&yaml_path).await? {
            Some(content) => Some(serde_yaml::from_str::<Topology>(&content).map_err(|e| {
                source_error(&yaml_path, format!("invalid topology yaml: {e}"))
            })?),
            None => None,
        };

        if cluster_info.is_none() && topology.is_none() {
            return Err(source_error(
                &self.root,
                format!("neither {CLUSTER_JSON} nor {META_YAML} found"),
            ));
        }
        Ok((cluster_info.unwrap_or_default(), topology))
    }

    /// 컴포넌트의 모든 노드 설정을 로딩합니다.
    ///
    /// 파일이 없는 노드는 설정 없이(유효하지 않은 상태로) 포함되고,
    /// 파싱할 수 없는 파일은 에러입니다.
    async fn load_node_configs(
        &self,
        topology: &Topology,
        component: Component,
    ) -> Result<Vec<NodeConfig>, CheckerError> {
        let mut nodes = Vec::new();
        for spec in topology.nodes(component) {
            let path = spec.config_path(&self.root);
            let config = match read_optional(&path).await? {
                Some(content) => {
                    let json: serde_json::Value = serde_json::from_str(&content)
                        .map_err(|e| source_error(&path, format!("invalid node config: {e}")))?;
                    Some(Arc::new(ConfigValue::from(json)))
                }
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        name_struct = config_name_struct(component),
                        "node config not found, rules will report no data"
                    );
                    None
                }
            };
            nodes.push(NodeConfig {
                component,
                host: spec.host.clone(),
                port: spec.port,
                config,
            });
        }
        Ok(nodes)
    }

    async fn load_dashboard(&self, topology: &Topology) -> Result<DashboardData, CheckerError> {
        let mut dashboard = DashboardData::default();

        let csv_path = self.root.join(INFO_SCHEMA_DIR).join(SYS_VARIABLES_CSV);
        match read_optional(&csv_path).await? {
            Some(content) => {
                let vars = parse_sys_variables(&content)
                    .map_err(|reason| source_error(&csv_path, reason))?;
                if let Some(value) = vars.get(GC_LIFE_TIME_VARIABLE) {
                    let duration = humantime::parse_duration(value).map_err(|e| {
                        source_error(&csv_path, format!("invalid {GC_LIFE_TIME_VARIABLE} '{value}': {e}"))
                    })?;
                    dashboard.old_version_processkey.gc_life_time = duration.as_secs();
                }
            }
            None => {
                tracing::warn!(path = %csv_path.display(), "system variables not found");
            }
        }

        let offset = *Local::now().offset();
        let (start, end) = self.time_range.unwrap_or_else(|| {
            let now = Local::now().fixed_offset();
            (now - Duration::days(i64::from(self.config.slow_log_days)), now)
        });
        let columns = Columns::new(&SLOW_QUERY_COLUMNS);

        let mut rows = Vec::new();
        for spec in topology.nodes(Component::Tidb) {
            let path = spec.slow_log_path(&self.root);
            let retriever = SlowQueryRetriever::new(
                &path,
                columns.clone(),
                offset,
                self.config.slow_log_concurrency,
            )
            .with_time_range(start, end);
            match retriever.retrieve().await {
                Ok(data) => {
                    tracing::debug!(path = %path.display(), rows = data.len(), "slow log retrieved");
                    rows.extend(data);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "retrieve slow log failed");
                }
            }
        }

        let stats = tokio::task::spawn_blocking(move || {
            accumulate(&rows, &columns, offset, Some(start))
        })
        .await
        .map_err(|e| CheckerError::Task(format!("spawn_blocking failed: {e}")))??;

        dashboard.execution_plan_info_list = stats.execution_plans;
        dashboard.old_version_processkey.count = stats.old_version_count;
        dashboard.tombstone_statistics.count = stats.tombstone_count;
        Ok(dashboard)
    }
}

/// JSON 토폴로지 버전을 우선하고, 비어 있으면 YAML 버전을 씁니다.
fn cluster_version(info: &ClusterInfo, topology: &Option<Topology>) -> String {
    info.topology
        .as_ref()
        .map(|t| t.version.clone())
        .filter(|v| !v.is_empty())
        .or_else(|| topology.as_ref().map(|t| t.version.clone()))
        .unwrap_or_default()
}

async fn read_optional(path: &Path) -> Result<Option<String>, CheckerError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(source_error(path, format!("failed to read: {e}"))),
    }
}

fn source_error(path: &Path, reason: String) -> CheckerError {
    CheckerError::SourceData {
        path: path.display().to_string(),
        reason,
    }
}

/// `VARIABLE_NAME,VARIABLE_VALUE` 두 컬럼 CSV를 읽습니다. 첫 줄은 헤더입니다.
fn parse_sys_variables(content: &str) -> Result<HashMap<String, String>, String> {
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());
    let columns = reader
        .headers()
        .map_err(|e| format!("invalid csv header: {e}"))?
        .len();
    if columns != 2 {
        return Err(format!("invalid csv content: expected 2 columns, got {columns}"));
    }
    reader
        .deserialize::<(String, String)>()
        .map(|record| record.map_err(|e| format!("invalid csv record: {e}")))
        .collect()
}
