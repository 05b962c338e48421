//! Foresight 로그 검색 코어
//!
//! 클러스터 노드에서 수집한 로그 디렉토리(`<root>/<host>/<component>-<port>/<file>`)를
//! 스캔하여 모든 파일의 로그 아이템을 타임스탬프 순으로 병합 스트리밍합니다.
//!
//! # 모듈 구성
//!
//! - [`format`]: 헤더 형식(unified, former, PD legacy, JSON)과 자동 감지 라우터
//! - [`item`]: 로그 아이템과 아이템 타입
//! - [`iterator`]: 파일/슬로우 쿼리 이터레이터, 시간 범위, 필터
//! - [`resolver`]: 디렉토리 트리 해석
//! - [`sequence`]: k-way 병합 시퀀스
//! - [`search`]: 토큰 기반 검색 세션과 유휴 회수
//! - [`config`]: 검색 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! resolve_dir -> open_iterator (per file) -> Sequence (merge) -> SearchSession
//!                   |                                             |
//!          FileIterator / SlowQueryIterator              token + idle watcher
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod item;
pub mod iterator;
pub mod resolver;
pub mod search;
pub mod sequence;

// --- 주요 타입 re-export ---

// 설정
pub use config::SearchConfig;

// 에러
pub use error::LogSearchError;

// 형식
pub use format::{FormatRouter, HeaderFormat, ParsedHeader};

// 아이템
pub use item::{ItemType, LogItem};

// 이터레이터
pub use iterator::{ItemFilter, LogIterator, TimeRange};

// 해석
pub use resolver::{FileDescriptor, Resolved, resolve_dir};

// 세션
pub use search::{SearchManager, SearchQuery, SearchSession};

// 병합
pub use sequence::Sequence;
