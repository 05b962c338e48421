//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 익스포터는 포함하지 않으며, 임베딩하는
//! 애플리케이션이 원하는 recorder를 설치합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `foresight_`
//! - 모듈명: `search_`, `check_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(foresight_core::metrics::SEARCH_ITEMS_EMITTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 컴포넌트 레이블 키 (tidb, tikv, pd)
pub const LABEL_COMPONENT: &str = "component";

/// 헤더 형식 레이블 키 (unified, former, pd_legacy, unified_json)
pub const LABEL_FORMAT: &str = "format";

/// 결과 레이블 키 (ok, warn, no_data)
pub const LABEL_RESULT: &str = "result";

// ─── Log Search 메트릭 ──────────────────────────────────────────────

/// Search: 읽은 논리 라인 수 (counter)
pub const SEARCH_LINES_SCANNED_TOTAL: &str = "foresight_search_lines_scanned_total";

/// Search: 형식 불일치로 건너뛴 라인 수 (counter)
pub const SEARCH_LINES_SKIPPED_TOTAL: &str = "foresight_search_lines_skipped_total";

/// Search: 헤더 형식을 새로 감지한 횟수 (counter, label: format)
pub const SEARCH_FORMAT_DETECTED_TOTAL: &str = "foresight_search_format_detected_total";

/// Search: 방출된 로그 아이템 수 (counter, label: component)
pub const SEARCH_ITEMS_EMITTED_TOTAL: &str = "foresight_search_items_emitted_total";

/// Search: 생성된 세션 수 (counter)
pub const SEARCH_SESSIONS_OPENED_TOTAL: &str = "foresight_search_sessions_opened_total";

/// Search: 유휴 만료로 회수된 세션 수 (counter)
pub const SEARCH_SESSIONS_EVICTED_TOTAL: &str = "foresight_search_sessions_evicted_total";

/// Search: 현재 활성 세션 수 (gauge)
pub const SEARCH_SESSIONS_ACTIVE: &str = "foresight_search_sessions_active";

// ─── Check Engine 메트릭 ────────────────────────────────────────────

/// Check: 평가된 (규칙, 대상) 쌍 수 (counter, label: result)
pub const CHECK_RULES_EVALUATED_TOTAL: &str = "foresight_check_rules_evaluated_total";

/// Check: 컴파일에 실패한 compute unit 수 (counter)
pub const CHECK_UNIT_FAILURES_TOTAL: &str = "foresight_check_unit_failures_total";

/// Check: 버전 필터 후 남은 규칙 수 (gauge)
pub const CHECK_RULES_LOADED: &str = "foresight_check_rules_loaded";

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다. recorder가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(SEARCH_LINES_SCANNED_TOTAL, "Logical log lines read");
    describe_counter!(
        SEARCH_LINES_SKIPPED_TOTAL,
        "Log lines skipped because no header format matched"
    );
    describe_counter!(
        SEARCH_FORMAT_DETECTED_TOTAL,
        "Header format detections, labelled by format"
    );
    describe_counter!(SEARCH_ITEMS_EMITTED_TOTAL, "Log items emitted to callers");
    describe_counter!(SEARCH_SESSIONS_OPENED_TOTAL, "Search sessions created");
    describe_counter!(
        SEARCH_SESSIONS_EVICTED_TOTAL,
        "Search sessions reclaimed after idling past the TTL"
    );
    describe_gauge!(SEARCH_SESSIONS_ACTIVE, "Search sessions currently registered");

    describe_counter!(
        CHECK_RULES_EVALUATED_TOTAL,
        "Rule verdicts produced, labelled by result"
    );
    describe_counter!(
        CHECK_UNIT_FAILURES_TOTAL,
        "Compute units whose rule source failed to compile"
    );
    describe_gauge!(CHECK_RULES_LOADED, "Rules that survived version filtering");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        for name in [
            SEARCH_LINES_SCANNED_TOTAL,
            SEARCH_LINES_SKIPPED_TOTAL,
            SEARCH_FORMAT_DETECTED_TOTAL,
            SEARCH_ITEMS_EMITTED_TOTAL,
            SEARCH_SESSIONS_OPENED_TOTAL,
            SEARCH_SESSIONS_EVICTED_TOTAL,
            SEARCH_SESSIONS_ACTIVE,
            CHECK_RULES_EVALUATED_TOTAL,
            CHECK_UNIT_FAILURES_TOTAL,
            CHECK_RULES_LOADED,
        ] {
            assert!(name.starts_with("foresight_"), "{name}");
        }
    }

    #[test]
    fn describe_without_recorder_is_noop() {
        describe_all();
    }
}
