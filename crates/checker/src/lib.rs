//! Foresight 설정 점검 엔진
//!
//! 수집된 클러스터 데이터(노드 설정, 토폴로지, 슬로우 쿼리 로그)에
//! 버전별 점검 규칙을 적용하고 결과 리포트를 만듭니다.
//!
//! # 모듈 구성
//!
//! - [`rule`]: TOML 규칙 코퍼스, 버전 제약, 카테고리 필터
//! - [`source`]: 데이터 루트에서 메타데이터/노드 설정/대시보드 데이터 로딩
//! - [`slowlog`]: 회전된 슬로우 쿼리 로그 추출과 다이제스트 통계
//! - [`value`]: 설정 값 트리와 태그 경로 탐색
//! - [`expr`]: 규칙 표현식 언어 (lexer, parser, interpreter, helpers)
//! - [`binder`]: 이름 구조 → 평가 단위 데이터 바인딩
//! - [`compute`]: 평가 단위 실행
//! - [`aggregate`]: 규칙별 결과 프린터와 집계
//! - [`engine`]: 전체 점검 오케스트레이션
//! - [`render`]: `check-report.txt`, `detailed-check-record.txt` 작성
//! - [`config`]: 점검 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! RuleSpec --filter(version, category)--> RuleSet
//!                                            |
//! FileFetcher -> SourceData -> Binder -> ComputeUnit (per uqi_tag) -> Aggregator -> render
//!                    |                        |
//!            config.json / slow log     compile once, run on spawn_blocking
//! ```

pub mod aggregate;
pub mod binder;
pub mod compute;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod render;
pub mod rule;
pub mod slowlog;
pub mod source;
pub mod value;

// --- 주요 타입 re-export ---

// 엔진
pub use engine::{CheckEngine, CheckReport, UnitFailure};

// 설정
pub use config::CheckConfig;

// 에러
pub use error::CheckerError;

// 규칙
pub use rule::{Rule, RuleSet, RuleSpec, VersionRange};

// 소스 데이터
pub use source::{DashboardData, FileFetcher, NodeConfig, SourceData};

// 평가
pub use binder::{Binder, Datum, HandleData};
pub use compute::ComputeUnit;
pub use expr::{Context, Program, Value};
pub use value::ConfigValue;

// 집계/리포트
pub use aggregate::{Aggregator, DeployResult, Printer, RuleResult};
pub use render::write_report;
