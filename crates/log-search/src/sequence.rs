//! 병합 시퀀스 -- 여러 이터레이터를 타임스탬프 순으로 합칩니다.
//!
//! 각 슬롯은 이터레이터 하나와 아직 내보내지 않은 선두 아이템을 가집니다.
//! `next`는 비어 있는 선두를 채운 뒤 가장 이른 선두를 내보냅니다.
//! 타임스탬프가 같으면 먼저 추가된 슬롯이 우선합니다.

use std::sync::Arc;

use tracing::warn;

use crate::config::SearchConfig;
use crate::error::LogSearchError;
use crate::format::FormatRouter;
use crate::item::LogItem;
use crate::iterator::{ItemFilter, LogIterator, TimeRange, open_iterator};
use crate::resolver::resolve_dir;

struct Slot {
    iter: Box<dyn LogIterator>,
    head: Option<LogItem>,
}

/// 병합 시퀀스
#[derive(Default)]
pub struct Sequence {
    slots: Vec<Slot>,
}

impl Sequence {
    /// 빈 시퀀스를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 디렉토리를 스캔하여 인식 가능한 모든 로그 파일로 시퀀스를 구성합니다.
    ///
    /// 루트를 읽지 못하면 에러입니다. 개별 파일을 열지 못하면 경고 후 건너뜁니다.
    pub fn open_dir(
        root: impl AsRef<std::path::Path>,
        config: &SearchConfig,
        router: &Arc<FormatRouter>,
        range: TimeRange,
        filter: &ItemFilter,
    ) -> Result<Self, LogSearchError> {
        let resolved = resolve_dir(root)?;
        for e in &resolved.errors {
            warn!(error = %e, "log folder skipped");
        }

        let mut sequence = Self::new();
        for descriptor in &resolved.files {
            match open_iterator(descriptor, config, router, range, filter) {
                Ok(Some(iter)) => sequence.add(iter),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %descriptor.path().display(), error = %e, "create log iterator failed");
                }
            }
        }
        Ok(sequence)
    }

    /// 이터레이터를 추가합니다.
    pub fn add(&mut self, iter: Box<dyn LogIterator>) {
        self.slots.push(Slot { iter, head: None });
    }

    /// 남아 있는 이터레이터 수
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 남아 있는 이터레이터가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn remove(&mut self, idx: usize) {
        let mut slot = self.slots.remove(idx);
        slot.iter.close();
    }
}

impl LogIterator for Sequence {
    /// 전역적으로 가장 이른 아이템을 내보냅니다.
    ///
    /// 이터레이터가 에러를 내면 그 슬롯을 제거한 뒤 에러를 전달합니다.
    fn next(&mut self) -> Result<Option<LogItem>, LogSearchError> {
        let mut idx = 0;
        while idx < self.slots.len() {
            if self.slots[idx].head.is_none() {
                match self.slots[idx].iter.next() {
                    Ok(Some(item)) => self.slots[idx].head = Some(item),
                    Ok(None) => {
                        self.remove(idx);
                        continue;
                    }
                    Err(e) => {
                        self.remove(idx);
                        return Err(e);
                    }
                }
            }
            idx += 1;
        }

        let mut earliest: Option<usize> = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(head) = &slot.head else { continue };
            let better = match earliest.and_then(|e| self.slots[e].head.as_ref()) {
                None => true,
                Some(best) => match (head.time, best.time) {
                    (Some(t), Some(b)) => t < b,
                    (Some(_), None) => true,
                    _ => false,
                },
            };
            if better {
                earliest = Some(idx);
            }
        }

        Ok(earliest.and_then(|idx| self.slots[idx].head.take()))
    }

    /// 모든 이터레이터를 닫습니다. 여러 번 호출해도 안전합니다.
    fn close(&mut self) {
        for mut slot in self.slots.drain(..) {
            slot.iter.close();
        }
    }
}
