//! 규칙 표현식 언어
//!
//! 규칙 본문은 다음 형태의 작은 언어로 작성됩니다.
//!
//! ```text
//! rule "tidb-log-level" "log level should not be debug" salience 10 begin
//!     level = ToString(config.GetValueByTagPath("log.level"))
//!     if level == "debug" { return false } else { return true }
//! end
//! ```
//!
//! - [`lexer`]: 토큰화
//! - [`parser`]: 재귀 하강 파서 ([`ast`] 생성)
//! - [`eval`]: 트리 순회 인터프리터
//! - [`helpers`]: `ToInt`, `FlatMap` 등 기본 헬퍼

pub mod ast;
pub mod eval;
pub mod helpers;
pub mod lexer;
pub mod parser;

pub use eval::{Context, Program, RuleResults, Value};
pub use helpers::HelperFn;
pub use parser::parse_program;
