//! 로그 아이템 -- 이터레이터가 방출하는 레코드
//!
//! 일반 로그 라인은 [`LogItem`] 하나로 표현되며, 슬로우 쿼리 블록은
//! `item_type == ItemType::TidbSlowQuery`이고 `content`가 채워진 [`LogItem`]입니다.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use foresight_core::types::{Component, LogLevel};
use serde::Serialize;

/// 로그 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ItemType {
    /// TiDB 일반 로그
    #[serde(rename = "TiDB")]
    Tidb,
    /// TiKV 로그
    #[serde(rename = "TiKV")]
    Tikv,
    /// PD 로그
    #[serde(rename = "PD")]
    Pd,
    /// TiDB 슬로우 쿼리 로그
    #[serde(rename = "TiDBSlowQuery")]
    TidbSlowQuery,
}

impl ItemType {
    /// 컴포넌트와 파일 종류로부터 아이템 타입을 결정합니다.
    ///
    /// 검색 대상이 아닌 컴포넌트는 `None`입니다.
    pub fn for_component(component: Component, slow_query: bool) -> Option<Self> {
        match component {
            Component::Tidb if slow_query => Some(Self::TidbSlowQuery),
            Component::Tidb => Some(Self::Tidb),
            Component::Tikv => Some(Self::Tikv),
            Component::Pd => Some(Self::Pd),
            Component::Tiflash => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tidb => "TiDB",
            Self::Tikv => "TiKV",
            Self::Pd => "PD",
            Self::TidbSlowQuery => "TiDBSlowQuery",
        };
        f.write_str(s)
    }
}

/// 이터레이터가 방출하는 로그 레코드
#[derive(Debug, Clone, Serialize)]
pub struct LogItem {
    /// 원본 파일 이름
    pub file: String,
    /// 타임스탬프 (연속 라인만 `None`)
    pub time: Option<DateTime<FixedOffset>>,
    /// 로그 레벨 (슬로우 쿼리 블록은 `None`)
    pub level: Option<LogLevel>,
    /// 호스트 주소
    pub host: String,
    /// 컴포넌트 포트
    pub port: u16,
    /// 컴포넌트
    pub component: Component,
    /// 원본 라인 바이트
    #[serde(serialize_with = "serialize_lossy")]
    pub line: Bytes,
    /// 파일 종류
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// 구조화 필드 (JSON 헤더 형식에서만 채워짐)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<BTreeMap<String, serde_json::Value>>,
    /// 재조립된 다중 라인 블록 (슬로우 쿼리)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl LogItem {
    /// 슬로우 쿼리 블록 아이템인지 여부
    pub fn is_slow_query(&self) -> bool {
        self.item_type == ItemType::TidbSlowQuery
    }

    /// 텍스트 필터가 적용되는 본문을 반환합니다.
    ///
    /// 슬로우 쿼리 블록은 `content`, 그 외에는 `line`입니다.
    pub fn body(&self) -> &[u8] {
        match &self.content {
            Some(content) => content.as_bytes(),
            None => &self.line,
        }
    }

    /// 연속 라인을 `content`에 덧붙입니다.
    ///
    /// 라인 사이에는 `\n`이 들어가며, 전체 크기는 `max_size` 바이트를 넘지 않습니다.
    /// 잘린 경우 `false`를 반환합니다.
    pub fn append_content(&mut self, line: &[u8], max_size: usize) -> bool {
        let content = self.content.get_or_insert_with(String::new);
        let sep = usize::from(!content.is_empty());
        let remaining = max_size.saturating_sub(content.len() + sep);
        if remaining == 0 {
            return false;
        }
        if sep == 1 {
            content.push('\n');
        }
        let text = String::from_utf8_lossy(line);
        if text.len() <= remaining {
            content.push_str(&text);
            return true;
        }
        let mut cut = remaining;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        content.push_str(&text[..cut]);
        false
    }
}

fn serialize_lossy<S: serde::Serializer>(line: &Bytes, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(line))
}

#[cfg(test)]
pub(crate) fn sample(time: Option<DateTime<FixedOffset>>) -> LogItem {
    LogItem {
        file: "tidb.log".to_owned(),
        time,
        level: Some(LogLevel::Info),
        host: "127.0.0.1".to_owned(),
        port: 4000,
        component: Component::Tidb,
        line: Bytes::from_static(b"[2019/07/19 15:15:35.846 +08:00] [INFO] hello"),
        item_type: ItemType::Tidb,
        entries: None,
        content: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_for_component() {
        assert_eq!(
            ItemType::for_component(Component::Tidb, true),
            Some(ItemType::TidbSlowQuery)
        );
        assert_eq!(
            ItemType::for_component(Component::Pd, true),
            Some(ItemType::Pd)
        );
        assert_eq!(ItemType::for_component(Component::Tiflash, false), None);
    }

    #[test]
    fn append_content_joins_with_newline() {
        let mut item = sample(None);
        assert!(item.append_content(b"# Time: x", 1024));
        assert!(item.append_content(b"SELECT 1;", 1024));
        assert_eq!(item.content.as_deref(), Some("# Time: x\nSELECT 1;"));
        assert_eq!(item.body(), b"# Time: x\nSELECT 1;");
    }

    #[test]
    fn append_content_respects_cap() {
        let mut item = sample(None);
        assert!(item.append_content(b"abcd", 6));
        assert!(!item.append_content(b"efgh", 6));
        assert_eq!(item.content.as_deref(), Some("abcd\ne"));
        assert!(!item.append_content(b"more", 6));
        assert_eq!(item.content.as_deref(), Some("abcd\ne"));
    }

    #[test]
    fn body_defaults_to_line() {
        let item = sample(None);
        assert!(item.body().starts_with(b"[2019/07/19"));
    }

    #[test]
    fn serializes_line_as_text() {
        let item = sample(None);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "TiDB");
        assert_eq!(json["component"], "tidb");
        assert!(json["line"].as_str().unwrap().ends_with("hello"));
        assert!(json.get("content").is_none());
    }
}
