//! 데이터 번들 디렉토리를 만들어 점검 엔진 전체를 실행하는 통합 테스트

use std::path::Path;

use chrono::{Duration, Local};
use foresight_checker::render::{RECORD_FILE, REPORT_FILE};
use foresight_checker::{CheckConfig, CheckEngine, CheckerError, RuleResult, write_report};
use foresight_core::types::CheckCategory;
use serde_json::json;

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn slow_block(minutes_ago: i64, digest: &str, plan: &str, ptime: f64, pkeys: u64, skipped: u64, total: u64) -> String {
    let time = (Local::now().fixed_offset() - Duration::minutes(minutes_ago)).to_rfc3339();
    format!(
        "# Time: {time}\n\
         # Txn_start_ts: 425\n\
         # User@Host: root[root] @ 127.0.0.1 [127.0.0.1]\n\
         # Process_time: {ptime} Wait_time: 0.001\n\
         # Process_keys: {pkeys} Total_keys: {total} Rocksdb_delete_skipped_count: {skipped}\n\
         # Digest: {digest}\n\
         # Plan_digest: {plan}\n\
         use test;\n\
         select * from t where c = 1;\n"
    )
}

/// v5.0.1 클러스터 (PD 1, TiDB 1, TiKV 1). TiKV 설정 파일은 없습니다.
fn data_bundle(root: &Path, version: &str) {
    let cluster = json!({
        "cluster_name": "test-cluster",
        "cluster_id": "7001",
        "session": "sample-1",
        "begin_time": "2021-06-01T10:00:00+08:00",
        "collectors": ["config", "log", "info_schema"],
        "topology": {
            "version": version,
            "pd": [{"host": "10.0.1.1", "port": 2379, "status_port": 2379}],
            "tidb": [{
                "host": "10.0.1.2", "port": 4000, "status_port": 10080,
                "attributes": {"deploy_dir": "tidb-deploy/tidb-4000"}
            }],
            "tikv": [{"host": "10.0.1.3", "port": 20160, "status_port": 20180}]
        }
    });
    write(&root.join("cluster.json"), &cluster.to_string());

    write(
        &root.join("10.0.1.1/conf/config.json"),
        &json!({
            "replication": {"max-replicas": 3},
            "schedule": {"max-merge-region-size": 20}
        })
        .to_string(),
    );
    let tidb_dir = root.join("10.0.1.2/tidb-deploy/tidb-4000");
    write(
        &tidb_dir.join("conf/config.json"),
        &json!({
            "log": {"level": "debug", "file": {"max-days": 0}},
            "oom-action": "cancel",
            "mem-quota-query": 1073741824u64
        })
        .to_string(),
    );

    write(
        &root.join("info_schema/mysql.tidb.csv"),
        "VARIABLE_NAME,VARIABLE_VALUE\ntikv_gc_life_time,24h\ntikv_gc_run_interval,10m0s\n",
    );

    let mut slow = String::new();
    // 이전 버전 스캔
    slow.push_str(&slow_block(50, "d1", "p1", 0.5, 20_000, 0, 50_000));
    // 툼스톤 스캔
    slow.push_str(&slow_block(40, "d2", "p1", 0.5, 20_000, 20_100, 20_000));
    // 계획이 둘인 다이제스트
    slow.push_str(&slow_block(30, "d3", "fast", 1.0, 2_000_000, 0, 2_000_000));
    slow.push_str(&slow_block(20, "d3", "slow", 9.0, 2_000_000, 0, 2_000_000));
    write(&tidb_dir.join("log/tidb_slow_query.log"), &slow);
}

fn find<'a>(results: &'a [RuleResult], name: &str) -> &'a RuleResult {
    results
        .iter()
        .find(|r| r.rule_name == name)
        .unwrap_or_else(|| panic!("missing result for {name}"))
}

fn res(result: &RuleResult) -> Vec<&str> {
    result.deploy_results.iter().map(|r| r.res.as_str()).collect()
}

// =============================================================================
// Bundled corpus end-to-end
// =============================================================================

#[tokio::test]
async fn bundled_rules_against_data_bundle() {
    let dir = tempfile::tempdir().unwrap();
    data_bundle(dir.path(), "v5.0.1");

    let config = CheckConfig::default().with_categories(CheckCategory::ALL.to_vec());
    let report = CheckEngine::new(config).unwrap().run(dir.path()).await.unwrap();

    assert_eq!(report.cluster_version, "v5.0.1");
    assert!(report.failures.is_empty());
    // v5.0 미만 전용 규칙은 제외
    assert!(report.results.iter().all(|r| r.rule_name != "tikv-sync-log"));

    let log_level = find(&report.results, "tidb-log-level");
    assert_eq!(res(log_level), vec!["warning"]);
    assert_eq!(log_level.deploy_results[0].id, "tidb_10.0.1.2:4000");
    assert_eq!(log_level.deploy_results[0].value, "TidbConfig.log.level:debug");
    assert!(log_level.abnormal);

    assert_eq!(res(find(&report.results, "tidb-oom-action")), vec!["OK"]);
    assert_eq!(res(find(&report.results, "tikv-grpc-concurrency")), vec!["NoData"]);
    assert_eq!(res(find(&report.results, "pd-max-replicas")), vec!["OK"]);
    assert_eq!(res(find(&report.results, "pd-store-limit")), vec!["OK"]);
    assert_eq!(res(find(&report.results, "pd-default-max-merge-region-size")), vec!["OK"]);

    let digests = |name: &str| find(&report.results, name).deploy_results[0].value.clone();
    assert_eq!(digests("poor_execution_plan"), "1 Digest trigger cordon");
    assert_eq!(digests("old_version_count"), "1 Digest trigger cordon");
    assert_eq!(digests("scan_key_skip"), "1 Digest trigger cordon");
}

#[tokio::test]
async fn config_category_skips_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    data_bundle(dir.path(), "v5.0.1");

    let report = CheckEngine::new(CheckConfig::default())
        .unwrap()
        .run(dir.path())
        .await
        .unwrap();
    assert!(report.results.iter().all(|r| r.check_type == "config"));
    assert!(report.results.iter().any(|r| r.rule_name == "tidb-log-level"));
}

#[tokio::test]
async fn report_files_are_written() {
    let dir = tempfile::tempdir().unwrap();
    data_bundle(dir.path(), "v5.0.1");
    let out = dir.path().join("report");

    let report = CheckEngine::new(CheckConfig::default())
        .unwrap()
        .run(dir.path())
        .await
        .unwrap();
    write_report(&report, &out).await.unwrap();

    let summary = std::fs::read_to_string(out.join(REPORT_FILE)).unwrap();
    assert!(summary.contains("test-cluster 2021-06-01T10:00:00+08:00"));
    assert!(summary.contains("- Sample ID: sample-1"));
    assert!(summary.contains("#### Rule Name: tidb-log-level"));
    assert!(!summary.contains("#### Rule Name: tidb-oom-action"));

    let detail = std::fs::read_to_string(out.join(RECORD_FILE)).unwrap();
    assert!(detail.contains("#### Rule Name: tidb-oom-action"));
}

// =============================================================================
// Custom rule files
// =============================================================================

const LOG_LEVEL_RULE: &str = r#"
[[rule]]
id = 1
name = "log-level"
execute_rule = '''
rule "log-level" begin
    if ToString(config.GetValueByTagPath("log.level")) == "debug" { return false } else { return true }
end
'''
name_struct = "TidbConfig"
check_type = "config"
warn_level = "warning"
variation = "TidbConfig.log.level"
"#;

#[tokio::test]
async fn log_level_rule_maps_to_warn_level() {
    let dir = tempfile::tempdir().unwrap();
    data_bundle(dir.path(), "v5.0.1");
    let rules = dir.path().join("rules.toml");
    write(&rules, LOG_LEVEL_RULE);

    let engine = CheckEngine::new(CheckConfig::default().with_rule_file(&rules)).unwrap();
    let report = engine.run(dir.path()).await.unwrap();
    assert_eq!(res(find(&report.results, "log-level")), vec!["warning"]);

    // info 로 바꾸면 OK
    write(
        &dir.path().join("10.0.1.2/tidb-deploy/tidb-4000/conf/config.json"),
        &json!({"log": {"level": "info"}}).to_string(),
    );
    let report = engine.run(dir.path()).await.unwrap();
    assert_eq!(res(find(&report.results, "log-level")), vec!["OK"]);
}

const VERSIONED_RULES: &str = r#"
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
name_struct = "TidbConfig"
check_type = "config"
version = "<v4.0.2||>=v5.0"
"#;

#[tokio::test]
async fn version_filter_follows_cluster_version() {
    for (version, expected) in [("v5.0.1", vec!["R1", "R2"]), ("v4.0.1", vec!["R2"])] {
        let dir = tempfile::tempdir().unwrap();
        data_bundle(dir.path(), version);
        let rules = dir.path().join("rules.toml");
        write(&rules, VERSIONED_RULES);

        let engine = CheckEngine::new(CheckConfig::default().with_rule_file(&rules)).unwrap();
        let report = engine.run(dir.path()).await.unwrap();
        let names: Vec<&str> = report.results.iter().map(|r| r.rule_name.as_str()).collect();
        assert_eq!(names, expected, "cluster version {version}");
    }
}

#[tokio::test]
async fn malformed_node_config_fails_loading() {
    let dir = tempfile::tempdir().unwrap();
    data_bundle(dir.path(), "v5.0.1");
    write(&dir.path().join("10.0.1.1/conf/config.json"), "{not json");

    let result = CheckEngine::new(CheckConfig::default())
        .unwrap()
        .run(dir.path())
        .await;
    assert!(matches!(result, Err(CheckerError::SourceData { .. })));
}

#[tokio::test]
async fn meta_yaml_alone_is_enough() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join("meta.yaml"),
        "version: v5.0.1\ntidb:\n  - host: 10.0.9.9\n    port: 4000\n",
    );
    let report = CheckEngine::new(CheckConfig::default())
        .unwrap()
        .run(dir.path())
        .await
        .unwrap();
    let log_level = find(&report.results, "tidb-log-level");
    assert_eq!(res(log_level), vec!["NoData"]);
    assert_eq!(log_level.deploy_results[0].id, "tidb_10.0.9.9:4000");
}
