//! 검색 세션 관리 -- 토큰으로 식별되는 스트리밍 검색
//!
//! [`SearchManager`]는 토큰 → 세션 레지스트리를 소유합니다.
//! 빈 토큰으로 [`SearchManager::search`]를 호출하면 디렉토리를 스캔하여 새
//! [`Sequence`]를 만들고, 새 토큰을 발급하고, 유휴 회수 감시자를 시작합니다.
//! 비어 있지 않은 토큰은 기존 세션을 조회합니다.
//!
//! 각 세션의 감시자는 `last_access + TTL`까지 잠들었다가 깨어나서,
//! 세션 락을 잡은 상태로 접근 시각을 다시 확인한 뒤에만 세션을 닫습니다.
//!
//! # 사용 예시
//! ```ignore
//! let manager = SearchManager::new(SearchConfig::default())?;
//! let session = manager
//!     .search("/data/logs", SearchQuery::new("error"), "")
//!     .await?
//!     .expect("new session");
//! while let Some(item) = session.next().await? {
//!     println!("{}", String::from_utf8_lossy(&item.line));
//! }
//! session.close().await;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use foresight_core::metrics as m;
use foresight_core::types::LogLevel;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::error::LogSearchError;
use crate::format::FormatRouter;
use crate::item::LogItem;
use crate::iterator::{ItemFilter, LogIterator, TimeRange};
use crate::sequence::Sequence;

/// 검색 조건
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// 본문 부분 문자열 (빈 문자열은 전체)
    pub text: String,
    /// 시간 범위
    pub range: TimeRange,
    /// 최소 레벨
    pub min_level: Option<LogLevel>,
}

impl SearchQuery {
    /// 텍스트 조건으로 새 질의를 생성합니다.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// 시작 시각(포함)을 설정합니다.
    pub fn with_begin(mut self, begin: DateTime<FixedOffset>) -> Self {
        self.range.begin = Some(begin);
        self
    }

    /// 끝 시각(제외)을 설정합니다.
    pub fn with_end(mut self, end: DateTime<FixedOffset>) -> Self {
        self.range.end = Some(end);
        self
    }

    /// 최소 레벨을 설정합니다.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    fn filter(&self) -> ItemFilter {
        ItemFilter::new(self.text.clone(), self.min_level)
    }
}

struct SessionState {
    /// `None`이면 닫힌 세션
    sequence: Mutex<Option<Sequence>>,
    access: Mutex<Instant>,
    cancel: CancellationToken,
}

/// 검색 세션 핸들
///
/// 복제해도 같은 세션을 가리킵니다. `next`는 내부 락으로 직렬화됩니다.
#[derive(Clone)]
pub struct SearchSession {
    token: Arc<str>,
    state: Arc<SessionState>,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl SearchSession {
    /// 세션 토큰
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 다음 아이템을 읽습니다.
    ///
    /// 스트림의 끝이면 `Ok(None)`, 닫힌 세션이면 [`LogSearchError::Closed`]입니다.
    /// 성공할 때마다 마지막 접근 시각이 완료 시점으로 갱신됩니다.
    pub async fn next(&self) -> Result<Option<LogItem>, LogSearchError> {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut guard = state.sequence.blocking_lock();
            let sequence = guard
                .as_mut()
                .ok_or_else(|| LogSearchError::Closed("log file closed".to_owned()))?;
            let item = sequence.next()?;
            *state.access.blocking_lock() = Instant::now();
            Ok(item)
        })
        .await
        .map_err(|e| LogSearchError::Task(format!("spawn_blocking failed: {e}")))?
    }

    /// 마지막 접근 시각
    pub async fn last_access(&self) -> Instant {
        *self.state.access.lock().await
    }

    /// 세션이 닫혔는지 여부
    pub async fn is_closed(&self) -> bool {
        self.state.sequence.lock().await.is_none()
    }

    /// 세션을 닫습니다. 여러 번 호출해도 안전합니다.
    ///
    /// 감시자가 멈추고 레지스트리에서 제거됩니다.
    pub async fn close(&self) {
        close_sequence(&self.state).await;
        self.state.cancel.cancel();
    }
}

async fn close_sequence(state: &SessionState) -> bool {
    let mut guard = state.sequence.lock().await;
    match guard.take() {
        Some(mut sequence) => {
            sequence.close();
            true
        }
        None => false,
    }
}

struct ManagerInner {
    config: SearchConfig,
    router: Arc<FormatRouter>,
    sessions: Mutex<HashMap<String, SearchSession>>,
    shutdown: CancellationToken,
}

/// 검색 세션 매니저
#[derive(Clone)]
pub struct SearchManager {
    inner: Arc<ManagerInner>,
}

impl SearchManager {
    /// 기본 헤더 형식으로 매니저를 생성합니다.
    pub fn new(config: SearchConfig) -> Result<Self, LogSearchError> {
        Self::with_router(config, FormatRouter::with_defaults()?)
    }

    /// 지정한 형식 라우터로 매니저를 생성합니다.
    pub fn with_router(config: SearchConfig, router: FormatRouter) -> Result<Self, LogSearchError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                router: Arc::new(router),
                sessions: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// 검색 설정
    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    /// 검색을 시작하거나 기존 세션을 조회합니다.
    ///
    /// - `token`이 비어 있으면 `dir`를 스캔하여 새 세션을 만듭니다.
    ///   디렉토리 해석에 실패하면 세션을 만들지 않고 에러를 반환합니다.
    /// - `token`이 있으면 등록된 세션을 반환하고, 없으면 `Ok(None)`입니다.
    pub async fn search(
        &self,
        dir: impl AsRef<Path>,
        query: SearchQuery,
        token: &str,
    ) -> Result<Option<SearchSession>, LogSearchError> {
        if !token.is_empty() {
            return Ok(self.get(token).await);
        }

        let dir: PathBuf = dir.as_ref().to_path_buf();
        let config = self.inner.config.clone();
        let router = Arc::clone(&self.inner.router);
        let sequence = tokio::task::spawn_blocking(move || {
            Sequence::open_dir(&dir, &config, &router, query.range, &query.filter())
        })
        .await
        .map_err(|e| LogSearchError::Task(format!("spawn_blocking failed: {e}")))??;

        let token: Arc<str> = Arc::from(uuid::Uuid::new_v4().to_string());
        let files = sequence.len();
        let session = SearchSession {
            token: Arc::clone(&token),
            state: Arc::new(SessionState {
                sequence: Mutex::new(Some(sequence)),
                access: Mutex::new(Instant::now()),
                cancel: self.inner.shutdown.child_token(),
            }),
        };

        let active = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.insert(token.to_string(), session.clone());
            sessions.len()
        };
        metrics::counter!(m::SEARCH_SESSIONS_OPENED_TOTAL).increment(1);
        metrics::gauge!(m::SEARCH_SESSIONS_ACTIVE).set(active as f64);
        info!(token = %token, files, "search session opened");

        tokio::spawn(watch(self.clone(), session.clone()));
        Ok(Some(session))
    }

    /// 토큰으로 세션을 조회합니다.
    pub async fn get(&self, token: &str) -> Option<SearchSession> {
        self.inner.sessions.lock().await.get(token).cloned()
    }

    /// 토큰의 세션을 닫고 제거합니다. 없는 토큰이면 `false`입니다.
    pub async fn close(&self, token: &str) -> bool {
        match self.unregister(token).await {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    /// 등록된 세션 수
    pub async fn sessions(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// 모든 감시자를 멈추고 모든 세션을 닫습니다.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let drained: Vec<SearchSession> = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.drain().map(|(_, s)| s).collect()
        };
        for session in &drained {
            close_sequence(&session.state).await;
        }
        metrics::gauge!(m::SEARCH_SESSIONS_ACTIVE).set(0.0);
        info!(closed = drained.len(), "search manager shut down");
    }

    async fn unregister(&self, token: &str) -> Option<SearchSession> {
        let mut sessions = self.inner.sessions.lock().await;
        let removed = sessions.remove(token);
        metrics::gauge!(m::SEARCH_SESSIONS_ACTIVE).set(sessions.len() as f64);
        removed
    }
}

/// 유휴 회수 감시자
///
/// `last_access + TTL`까지 잠들고, 깨어나면 세션 락을 잡은 채로 접근 시각을
/// 다시 읽어 만료된 경우에만 닫습니다. 취소되면 세션을 정리하고 끝납니다.
async fn watch(manager: SearchManager, session: SearchSession) {
    let ttl = manager.inner.config.session_ttl;
    let state = Arc::clone(&session.state);
    loop {
        let deadline = *state.access.lock().await + ttl;
        tokio::select! {
            _ = state.cancel.cancelled() => {
                manager.unregister(&session.token).await;
                close_sequence(&state).await;
                debug!(token = %session.token, "search session watcher stopped");
                return;
            }
            _ = tokio::time::sleep_until(deadline) => {}
        }

        let mut guard = state.sequence.lock().await;
        if guard.is_none() {
            drop(guard);
            manager.unregister(&session.token).await;
            return;
        }
        let access = *state.access.lock().await;
        if Instant::now().saturating_duration_since(access) >= ttl {
            if let Some(mut sequence) = guard.take() {
                sequence.close();
            }
            drop(guard);
            manager.unregister(&session.token).await;
            metrics::counter!(m::SEARCH_SESSIONS_EVICTED_TOTAL).increment(1);
            info!(token = %session.token, "search session evicted after idle timeout");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder_sets_fields() {
        let begin = DateTime::parse_from_rfc3339("2019-07-19T15:00:00+08:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2019-07-19T16:00:00+08:00").unwrap();
        let query = SearchQuery::new("foo")
            .with_begin(begin)
            .with_end(end)
            .with_min_level(LogLevel::Warn);
        assert_eq!(query.text, "foo");
        assert_eq!(query.range, TimeRange::new(begin, end));
        assert_eq!(query.min_level, Some(LogLevel::Warn));
    }

    #[test]
    fn manager_rejects_invalid_config() {
        let config = SearchConfig::default().with_reader_capacity(16);
        assert!(SearchManager::new(config).is_err());
    }

    #[tokio::test]
    async fn unknown_token_returns_none() {
        let manager = SearchManager::new(SearchConfig::default()).unwrap();
        let found = manager
            .search("/does/not/matter", SearchQuery::default(), "missing-token")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn missing_directory_creates_no_session() {
        let manager = SearchManager::new(SearchConfig::default()).unwrap();
        let result = manager
            .search("/nonexistent/foresight", SearchQuery::default(), "")
            .await;
        assert!(result.is_err());
        assert_eq!(manager.sessions().await, 0);
    }
}
