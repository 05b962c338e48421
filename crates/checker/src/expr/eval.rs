//! 트리 순회 인터프리터
//!
//! [`Program`]은 한 번 컴파일되어 여러 [`Context`]에서 실행될 수 있습니다.
//! 규칙은 salience 내림차순(같으면 선언 순서)으로 실행되며, 각 규칙은
//! 자신만의 지역 변수 영역을 가집니다. 실행 중 에러가 난 규칙의 결과는
//! `None`이고 다른 규칙에는 영향을 주지 않습니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ast::{BinaryOp, Expr, Literal, RuleDecl, Stmt, UnaryOp};
use super::helpers::{self, HelperFn};
use super::parser::parse_program;
use crate::error::CheckerError;
use crate::value::ConfigValue;

/// 런타임 값
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// 시퀀스/매핑 설정 트리
    Tree(Arc<ConfigValue>),
}

impl Value {
    /// 설정 트리 노드를 런타임 값으로 변환합니다. 스칼라는 풀어서 반환합니다.
    pub fn from_config(value: &ConfigValue) -> Self {
        match value {
            ConfigValue::Null => Value::Nil,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Int(i) => Value::Int(*i),
            ConfigValue::Float(f) => Value::Float(*f),
            ConfigValue::Str(s) => Value::Str(s.clone()),
            ConfigValue::Seq(_) | ConfigValue::Map(_) => Value::Tree(Arc::new(value.clone())),
        }
    }

    /// 타입 이름
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Tree(tree) => tree.type_name(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Tree(tree) => write!(f, "{tree}"),
        }
    }
}

/// 실행 컨텍스트 -- 바인딩된 이름과 헬퍼 함수
#[derive(Clone)]
pub struct Context {
    bindings: HashMap<String, Value>,
    helpers: HashMap<String, HelperFn>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut helpers: Vec<&String> = self.helpers.keys().collect();
        helpers.sort();
        f.debug_struct("Context")
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("helpers", &helpers)
            .finish()
    }
}

impl Context {
    /// 기본 헬퍼가 등록된 컨텍스트를 생성합니다.
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            helpers: helpers::builtin(),
        }
    }

    /// 이름에 값을 바인딩합니다.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// 헬퍼 함수를 등록합니다. 같은 이름의 헬퍼는 교체됩니다.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Arc::new(helper));
    }
}

/// 컴파일된 규칙 프로그램
#[derive(Debug, Clone)]
pub struct Program {
    rules: Vec<RuleDecl>,
}

/// 규칙 실행 결과 (`name → 결과`)
pub type RuleResults = HashMap<String, Option<Value>>;

impl Program {
    /// 소스를 컴파일합니다.
    pub fn compile(source: &str) -> Result<Self, CheckerError> {
        let mut rules = parse_program(source)?;
        // stable sort: 같은 salience는 선언 순서 유지
        rules.sort_by(|a, b| b.salience.cmp(&a.salience));
        Ok(Self { rules })
    }

    /// 실행 순서의 규칙 이름
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// 모든 규칙을 실행합니다.
    ///
    /// `return`에 도달하지 못했거나 실행 에러가 난 규칙은 `None`입니다.
    pub fn execute(&self, ctx: &Context) -> RuleResults {
        let mut results = HashMap::with_capacity(self.rules.len());
        for rule in &self.rules {
            let outcome = match execute_rule(rule, ctx) {
                Ok(value) => value,
                Err(reason) => {
                    let err = CheckerError::Runtime {
                        rule: rule.name.clone(),
                        reason,
                    };
                    tracing::warn!(error = %err, "rule execution failed");
                    None
                }
            };
            results.insert(rule.name.clone(), outcome);
        }
        results
    }
}

/// 문장 실행 흐름
enum Flow {
    Next,
    Return(Value),
}

struct Frame<'a> {
    ctx: &'a Context,
    locals: HashMap<String, Value>,
}

fn execute_rule(rule: &RuleDecl, ctx: &Context) -> Result<Option<Value>, String> {
    let mut frame = Frame {
        ctx,
        locals: HashMap::new(),
    };
    match frame.block(&rule.body)? {
        Flow::Return(value) => Ok(Some(value)),
        Flow::Next => Ok(None),
    }
}

impl Frame<'_> {
    fn block(&mut self, stmts: &[Stmt]) -> Result<Flow, String> {
        for stmt in stmts {
            if let Flow::Return(value) = self.stmt(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Flow, String> {
        match stmt {
            Stmt::If {
                cond,
                then,
                otherwise,
            } => match self.eval(cond)? {
                Value::Bool(true) => self.block(then),
                Value::Bool(false) => match otherwise {
                    Some(stmts) => self.block(stmts),
                    None => Ok(Flow::Next),
                },
                other => Err(format!("if condition must be bool, got {}", other.type_name())),
            },
            Stmt::Return(expr) => Ok(Flow::Return(match expr {
                Some(expr) => self.eval(expr)?,
                None => Value::Nil,
            })),
            Stmt::Assign { name, value } => {
                let value = self.eval(value)?;
                self.locals.insert(name.clone(), value);
                Ok(Flow::Next)
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Next)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, String> {
        self.locals
            .get(name)
            .or_else(|| self.ctx.bindings.get(name))
            .cloned()
            .ok_or_else(|| format!("undefined variable '{name}'"))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, String> {
        match expr {
            Expr::Lit(lit) => Ok(match lit {
                Literal::Nil => Value::Nil,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Ident(name) => self.lookup(name),
            Expr::Member { target, field } => match self.eval(target)? {
                Value::Tree(tree) => Ok(Value::from_config(tree.get(field))),
                Value::Nil => Ok(Value::Nil),
                other => Err(format!("cannot read field '{field}' of {}", other.type_name())),
            },
            Expr::Method { target, name, args } => {
                let target = self.eval(target)?;
                let args = self.eval_args(args)?;
                call_method(&target, name, &args)
            }
            Expr::Call { name, args } => {
                let args = self.eval_args(args)?;
                let helper = self
                    .ctx
                    .helpers
                    .get(name)
                    .ok_or_else(|| format!("undefined function '{name}'"))?;
                helper(args.as_slice())
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| "integer overflow".to_owned()),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Not, other) => Err(format!("cannot apply '!' to {}", other.type_name())),
                    (UnaryOp::Neg, other) => Err(format!("cannot negate {}", other.type_name())),
                }
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And | BinaryOp::Or => {
                    let left = self.eval_bool(lhs, *op)?;
                    // 단락 평가
                    if (*op == BinaryOp::And) != left {
                        return Ok(Value::Bool(left));
                    }
                    Ok(Value::Bool(self.eval_bool(rhs, *op)?))
                }
                _ => {
                    let left = self.eval(lhs)?;
                    let right = self.eval(rhs)?;
                    binary(*op, &left, &right)
                }
            },
        }
    }

    fn eval_bool(&mut self, expr: &Expr, op: BinaryOp) -> Result<bool, String> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(format!(
                "operand of '{}' must be bool, got {}",
                op.symbol(),
                other.type_name()
            )),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, String> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }
}

fn call_method(target: &Value, name: &str, args: &[Value]) -> Result<Value, String> {
    match name {
        "GetValueByTagPath" => {
            let [Value::Str(path)] = args else {
                return Err("GetValueByTagPath expects one string argument".to_owned());
            };
            match target {
                Value::Tree(tree) => Ok(Value::from_config(tree.get_path(path))),
                Value::Nil => Ok(Value::Nil),
                other if path.is_empty() => Ok(other.clone()),
                _ => Ok(Value::Nil),
            }
        }
        other => Err(format!(
            "undefined method '{other}' on {}",
            target.type_name()
        )),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    use Value::{Bool, Int, Str};

    let mismatch = || {
        format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )
    };

    match op {
        BinaryOp::Eq => Ok(Bool(equals(left, right))),
        BinaryOp::Ne => Ok(Bool(!equals(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Str(a), Str(b)) => a.partial_cmp(b),
                _ => match (left.as_number(), right.as_number()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(mismatch()),
                },
            };
            let Some(ordering) = ordering else {
                return Ok(Bool(false));
            };
            Ok(Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add => match (left, right) {
            (Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
            (Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(overflow),
            _ => float_op(left, right, |a, b| a + b).ok_or_else(mismatch),
        },
        BinaryOp::Sub => match (left, right) {
            (Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or_else(overflow),
            _ => float_op(left, right, |a, b| a - b).ok_or_else(mismatch),
        },
        BinaryOp::Mul => match (left, right) {
            (Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or_else(overflow),
            _ => float_op(left, right, |a, b| a * b).ok_or_else(mismatch),
        },
        BinaryOp::Div => match (left, right) {
            (Int(_), Int(0)) => Err("division by zero".to_owned()),
            (Int(a), Int(b)) => a.checked_div(*b).map(Int).ok_or_else(overflow),
            _ => float_op(left, right, |a, b| a / b).ok_or_else(mismatch),
        },
        BinaryOp::Rem => match (left, right) {
            (Int(_), Int(0)) => Err("division by zero".to_owned()),
            (Int(a), Int(b)) => a.checked_rem(*b).map(Int).ok_or_else(overflow),
            _ => Err(mismatch()),
        },
        // 단락 평가로 처리됨
        BinaryOp::And | BinaryOp::Or => Err(mismatch()),
    }
}

fn overflow() -> String {
    "integer overflow".to_owned()
}

fn float_op(left: &Value, right: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    Some(Value::Float(f(left.as_number()?, right.as_number()?)))
}

/// 타입이 다르면 거짓, 정수/실수는 수치로 비교
fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        _ => left == right,
    }
}
