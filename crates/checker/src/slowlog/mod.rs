//! 슬로우 쿼리 수집 -- 성능 점검용 대시보드 데이터의 원천
//!
//! [`retriever`]가 회전된 로그 파일에서 행을 뽑고,
//! [`accumulator`]가 행을 다이제스트 단위 통계로 집계합니다.

pub mod accumulator;
pub mod retriever;

pub use accumulator::{
    Accumulator, AvgProcessTime, ExecutionPlanInfo, OldVersionScan, SLOW_QUERY_COLUMNS,
    SlowQueryStats, TombstoneSkip, accumulate,
};
pub use retriever::{Columns, SlowQueryRetriever, parse_time};
