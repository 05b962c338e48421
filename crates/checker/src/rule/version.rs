//! 규칙 버전 제약
//!
//! 문법:
//! - `||`로 구분된 대안 중 하나라도 만족하면 통과
//! - 대안 안의 비교자는 `,` 또는 공백으로 구분되며 모두 만족해야 함
//! - 비교 연산자: `=`, `!=`, `>`, `>=`, `<`, `<=`, `~`, `^` (없으면 `=`)
//! - 버전 앞의 `v` 접두어 허용, 생략된 부분은 0으로 채움 (`v5.0` = `5.0.0`)
//! - minor/patch 자리의 `x`/`X`/`*`는 와일드카드
//!
//! 비교는 `semver` 크레이트의 [`Comparator`]로 수행합니다.

use std::fmt;

use semver::{Comparator, Op, Prerelease, Version};
use serde::{Deserialize, Serialize};

use crate::error::CheckerError;

/// 버전 제약 문자열
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionRange(String);

impl VersionRange {
    /// 제약 문자열로 생성합니다.
    pub fn new(constraint: impl Into<String>) -> Self {
        Self(constraint.into())
    }

    /// 원본 문자열
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 제약이 비어 있는지 여부 (모든 버전 허용)
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// 제약 문자열을 파싱합니다.
    pub fn parse(&self) -> Result<Constraint, CheckerError> {
        Constraint::parse(&self.0)
    }

    /// 대상 버전이 제약을 만족하는지 판정합니다. 빈 제약은 항상 참입니다.
    pub fn contains(&self, target: &str) -> Result<bool, CheckerError> {
        if self.is_empty() {
            return Ok(true);
        }
        let constraint = self.parse()?;
        let version = parse_version(target)?;
        Ok(constraint.matches(&version))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 단일 비교자
#[derive(Debug, Clone, PartialEq)]
enum Term {
    Match(Comparator),
    NotEqual(Comparator),
}

impl Term {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Term::Match(c) => c.matches(version),
            Term::NotEqual(c) => !c.matches(version),
        }
    }
}

/// 파싱된 버전 제약
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    alternatives: Vec<Vec<Term>>,
}

impl Constraint {
    /// 제약 문자열을 파싱합니다.
    pub fn parse(input: &str) -> Result<Self, CheckerError> {
        let error = |reason: String| CheckerError::Version {
            constraint: input.to_owned(),
            reason,
        };

        let mut alternatives = Vec::new();
        for alternative in input.split("||") {
            let pieces: Vec<&str> = alternative
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if pieces.is_empty() {
                return Err(error("empty alternative".to_owned()));
            }

            let mut terms = Vec::new();
            let mut pending_op: Option<&str> = None;
            for piece in pieces {
                // 연산자만 있는 조각은 다음 조각과 합침 (`>= v5.0`)
                if piece.chars().all(|c| "<>=!~^".contains(c)) {
                    if let Some(op) = pending_op.replace(piece) {
                        return Err(error(format!("operator '{op}' without version")));
                    }
                    continue;
                }
                let text = match pending_op.take() {
                    Some(op) => format!("{op}{piece}"),
                    None => piece.to_owned(),
                };
                terms.push(parse_term(&text).map_err(error)?);
            }
            if let Some(op) = pending_op {
                return Err(error(format!("operator '{op}' without version")));
            }
            alternatives.push(terms);
        }
        Ok(Self { alternatives })
    }

    /// 버전이 제약을 만족하는지 판정합니다.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|terms| terms.iter().all(|t| t.matches(version)))
    }
}

fn parse_term(text: &str) -> Result<Term, String> {
    let (op, rest) = split_op(text);
    let rest = rest.trim_start_matches(['v', 'V']);
    let (core, pre) = match rest.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (rest, None),
    };
    let core = core.split('+').next().unwrap_or(core);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts[0].is_empty() {
        return Err(format!("malformed version '{rest}'"));
    }
    let mut numbers: [Option<u64>; 3] = [None, None, None];
    let mut wildcard = false;
    for (idx, part) in parts.iter().enumerate() {
        if matches!(*part, "x" | "X" | "*") {
            if idx == 0 {
                return Err("wildcard in major version".to_owned());
            }
            wildcard = true;
            continue;
        }
        if wildcard {
            return Err(format!("number after wildcard in '{rest}'"));
        }
        numbers[idx] = Some(
            part.parse::<u64>()
                .map_err(|_| format!("invalid version number '{part}'"))?,
        );
    }
    let pre = match pre {
        Some(p) => Prerelease::new(p).map_err(|e| e.to_string())?,
        None => Prerelease::EMPTY,
    };
    let major = numbers[0].ok_or_else(|| format!("missing major version in '{rest}'"))?;

    // 와일드카드는 일치 비교에서만 부분 일치, 나머지는 0으로 채움
    let (minor, patch) = match op {
        "~" | "^" => (numbers[1], numbers[2]),
        "" | "=" | "!=" if wildcard => (numbers[1], numbers[2]),
        _ => (Some(numbers[1].unwrap_or(0)), Some(numbers[2].unwrap_or(0))),
    };
    let comparator = |op: Op| Comparator {
        op,
        major,
        minor,
        patch,
        pre: pre.clone(),
    };

    Ok(match op {
        "" | "=" => Term::Match(comparator(Op::Exact)),
        "!=" => Term::NotEqual(comparator(Op::Exact)),
        ">" => Term::Match(comparator(Op::Greater)),
        ">=" => Term::Match(comparator(Op::GreaterEq)),
        "<" => Term::Match(comparator(Op::Less)),
        "<=" => Term::Match(comparator(Op::LessEq)),
        "~" => Term::Match(comparator(Op::Tilde)),
        "^" => Term::Match(comparator(Op::Caret)),
        other => return Err(format!("unknown operator '{other}'")),
    })
}

fn split_op(text: &str) -> (&str, &str) {
    for op in [">=", "<=", "!=", ">", "<", "=", "~", "^"] {
        if let Some(rest) = text.strip_prefix(op) {
            return (op, rest.trim_start());
        }
    }
    ("", text)
}

/// 클러스터 버전 문자열을 파싱합니다. `v` 접두어와 생략된 부분을 허용합니다.
pub fn parse_version(target: &str) -> Result<Version, CheckerError> {
    let trimmed = target.trim().trim_start_matches(['v', 'V']);
    let core_end = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(core_end);
    let mut padded = core.to_owned();
    for _ in core.matches('.').count()..2 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).map_err(|e| CheckerError::Version {
        constraint: target.to_owned(),
        reason: e.to_string(),
    })
}
