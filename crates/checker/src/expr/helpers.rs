//! 규칙에서 호출하는 기본 헬퍼 함수
//!
//! | 이름 | 동작 |
//! |---|---|
//! | `ToInt(v)` | 정수면 그대로, 아니면 0 |
//! | `ToFloat(v)` | 실수면 그대로, 정수는 변환, 아니면 0.0 |
//! | `ToBool(v)` | 불리언이면 그대로, 아니면 false |
//! | `ToString(v)` | 문자열이면 그대로, 아니면 "" |
//! | `FlatMap(map, path)` | 매핑의 각 값에서 `path`를 따라간 결과 시퀀스 |
//! | `ElemInRange(seq, lo, hi)` | 시퀀스의 모든 수가 `[lo, hi]` 안에 있는지 |
//! | `Len(v)` | 시퀀스/매핑/문자열 길이, 그 외 0 |

use std::collections::HashMap;
use std::sync::Arc;

use super::eval::Value;
use crate::value::ConfigValue;

/// 헬퍼 함수 시그니처
pub type HelperFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// 기본 헬퍼 목록
pub fn builtin() -> HashMap<String, HelperFn> {
    let mut helpers: HashMap<String, HelperFn> = HashMap::new();
    helpers.insert("ToInt".to_owned(), Arc::new(to_int));
    helpers.insert("ToFloat".to_owned(), Arc::new(to_float));
    helpers.insert("ToBool".to_owned(), Arc::new(to_bool));
    helpers.insert("ToString".to_owned(), Arc::new(to_string));
    helpers.insert("FlatMap".to_owned(), Arc::new(flat_map));
    helpers.insert("ElemInRange".to_owned(), Arc::new(elem_in_range));
    helpers.insert("Len".to_owned(), Arc::new(len));
    helpers
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "{name} expects {expected} argument(s), got {}",
            args.len()
        ))
    }
}

fn to_int(args: &[Value]) -> Result<Value, String> {
    arity("ToInt", args, 1)?;
    Ok(Value::Int(match &args[0] {
        Value::Int(i) => *i,
        _ => 0,
    }))
}

fn to_float(args: &[Value]) -> Result<Value, String> {
    arity("ToFloat", args, 1)?;
    Ok(Value::Float(match &args[0] {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        _ => 0.0,
    }))
}

fn to_bool(args: &[Value]) -> Result<Value, String> {
    arity("ToBool", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Bool(true))))
}

fn to_string(args: &[Value]) -> Result<Value, String> {
    arity("ToString", args, 1)?;
    Ok(Value::Str(match &args[0] {
        Value::Str(s) => s.clone(),
        _ => String::new(),
    }))
}

fn flat_map(args: &[Value]) -> Result<Value, String> {
    arity("FlatMap", args, 2)?;
    let path = match &args[1] {
        Value::Str(path) => path.as_str(),
        other => return Err(format!("FlatMap path must be a string, got {}", other.type_name())),
    };
    let Value::Tree(tree) = &args[0] else {
        return Ok(Value::Nil);
    };
    let ConfigValue::Map(map) = tree.as_ref() else {
        return Ok(Value::Nil);
    };
    if map.is_empty() {
        return Ok(Value::Nil);
    }
    let items = map.values().map(|v| v.get_path(path).clone()).collect();
    Ok(Value::Tree(Arc::new(ConfigValue::Seq(items))))
}

fn elem_in_range(args: &[Value]) -> Result<Value, String> {
    arity("ElemInRange", args, 3)?;
    let bound = |v: &Value| match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(format!("ElemInRange bound must be a number, got {}", other.type_name())),
    };
    let (lo, hi) = (bound(&args[1])?, bound(&args[2])?);
    let Value::Tree(tree) = &args[0] else {
        return Ok(Value::Bool(false));
    };
    let ConfigValue::Seq(items) = tree.as_ref() else {
        return Ok(Value::Bool(false));
    };
    let in_range = items.iter().all(|item| {
        item.as_f64()
            .is_some_and(|n| (lo..=hi).contains(&n))
    });
    Ok(Value::Bool(in_range))
}

fn len(args: &[Value]) -> Result<Value, String> {
    arity("Len", args, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Tree(tree) => match tree.as_ref() {
            ConfigValue::Seq(items) => items.len(),
            ConfigValue::Map(map) => map.len(),
            _ => 0,
        },
        _ => 0,
    };
    Ok(Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
}
