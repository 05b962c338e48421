//! 설정 값 트리와 태그 경로 탐색
//!
//! 노드 설정(`conf/config.json`)과 대시보드 데이터는 한 번 [`ConfigValue`]
//! 트리로 변환되고, 규칙은 언어 수준 필드 이름이 아니라 직렬화에 사용된
//! 키 이름(`log.file.max-days`)으로 값을 읽습니다.

use std::collections::BTreeMap;
use std::fmt;

/// 경로가 없을 때 반환되는 값
static NULL: ConfigValue = ConfigValue::Null;

/// 설정 값 트리
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigValue {
    /// 값 없음
    #[default]
    Null,
    /// 불리언
    Bool(bool),
    /// 정수
    Int(i64),
    /// 실수
    Float(f64),
    /// 문자열
    Str(String),
    /// 시퀀스
    Seq(Vec<ConfigValue>),
    /// 키 정렬 매핑
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// 점으로 구분된 태그 경로를 따라 값을 찾습니다.
    ///
    /// 매핑은 세그먼트를 키로, 시퀀스는 세그먼트를 인덱스로 사용합니다.
    /// 숫자 세그먼트도 매핑에서는 키 문자열로 찾습니다.
    /// 빈 경로는 자기 자신이며, 찾지 못하면 [`ConfigValue::Null`]입니다.
    pub fn get_path(&self, path: &str) -> &ConfigValue {
        if path.is_empty() {
            return self;
        }
        let mut node = self;
        for segment in path.split('.') {
            node = match node {
                ConfigValue::Map(map) => match map.get(segment) {
                    Some(v) => v,
                    None => return &NULL,
                },
                ConfigValue::Seq(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                    Some(v) => v,
                    None => return &NULL,
                },
                _ => return &NULL,
            };
        }
        node
    }

    /// 매핑의 키 하나를 찾습니다.
    pub fn get(&self, key: &str) -> &ConfigValue {
        match self {
            ConfigValue::Map(map) => map.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    /// 값이 없는지 여부
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// 불리언 값
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// 정수 값
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// 실수 값 (정수는 변환)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// 문자열 값
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 타입 이름
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "nil",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "int",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "string",
            ConfigValue::Seq(_) => "slice",
            ConfigValue::Map(_) => "map",
        }
    }

    /// JSON 값으로 변환합니다.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::Int(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::Str(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Seq(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Int(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ConfigValue::Str(s),
            serde_json::Value::Array(items) => {
                ConfigValue::Seq(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_json::Value::Object(map) => ConfigValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ConfigValue {
    /// 문자열은 따옴표 없이, 복합 값은 JSON으로 출력합니다.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => f.write_str("<nil>"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Str(s) => f.write_str(s),
            ConfigValue::Seq(_) | ConfigValue::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}
