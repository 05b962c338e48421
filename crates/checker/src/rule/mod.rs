//! 점검 규칙 -- 코퍼스 로딩, 버전 제약, 필터링
//!
//! TOML 규칙 코퍼스를 [`RuleSpec`]으로 읽고, 클러스터 버전과 점검
//! 카테고리로 필터링한 [`RuleSet`]을 만듭니다.

pub mod loader;
pub mod types;
pub mod version;

pub use loader::{BUNDLED_SOURCE, RuleSpec, category_filter};
pub use types::{
    CONFIG_NAME_STRUCTS, PD_CONFIG, PERFORMANCE_DASHBOARD, Rule, RuleSet, TIDB_CONFIG,
    TIFLASH_CONFIG, TIKV_CONFIG,
};
pub use version::{Constraint, VersionRange, parse_version};
