//! 규칙 표현식 재귀 하강 파서
//!
//! 우선순위 (낮음 → 높음):
//! `||` → `&&` → `== !=` → `< <= > >=` → `+ -` → `* / %` → 단항 `! -` → 후위 `.` `()`

use std::collections::HashSet;

use super::ast::{BinaryOp, Expr, Literal, RuleDecl, Stmt, UnaryOp};
use super::lexer::{Token, TokenKind, tokenize};
use crate::error::CheckerError;

/// 식/블록 중첩 깊이 상한
const MAX_NESTING_DEPTH: usize = 64;

/// 소스 전체를 규칙 선언 목록으로 파싱합니다.
///
/// 같은 이름의 규칙이 두 번 선언되면 컴파일 에러입니다.
pub fn parse_program(source: &str) -> Result<Vec<RuleDecl>, CheckerError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    let mut rules = Vec::new();
    let mut names = HashSet::new();
    while !parser.at(&TokenKind::Eof) {
        let rule = parser.rule_decl()?;
        if !names.insert(rule.name.clone()) {
            return Err(CheckerError::Compile {
                line: rule.line,
                reason: format!("duplicate rule name '{}'", rule.name),
            });
        }
        rules.push(rule);
    }
    Ok(rules)
}

/// 이항 연산자 우선순위 단계 수
const BINARY_LEVELS: usize = 6;

fn binary_op(level: usize, kind: &TokenKind) -> Option<BinaryOp> {
    Some(match (level, kind) {
        (0, TokenKind::OrOr) => BinaryOp::Or,
        (1, TokenKind::AndAnd) => BinaryOp::And,
        (2, TokenKind::EqEq) => BinaryOp::Eq,
        (2, TokenKind::Ne) => BinaryOp::Ne,
        (3, TokenKind::Lt) => BinaryOp::Lt,
        (3, TokenKind::Le) => BinaryOp::Le,
        (3, TokenKind::Gt) => BinaryOp::Gt,
        (3, TokenKind::Ge) => BinaryOp::Ge,
        (4, TokenKind::Plus) => BinaryOp::Add,
        (4, TokenKind::Minus) => BinaryOp::Sub,
        (5, TokenKind::Star) => BinaryOp::Mul,
        (5, TokenKind::Slash) => BinaryOp::Div,
        (5, TokenKind::Percent) => BinaryOp::Rem,
        _ => return None,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize는 항상 Eof로 끝남
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, reason: String) -> CheckerError {
        CheckerError::Compile {
            line: self.peek().line,
            reason,
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CheckerError> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                kind.describe(),
                self.peek().kind.describe()
            )))
        }
    }

    fn enter(&mut self) -> Result<(), CheckerError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING_DEPTH}")));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn rule_decl(&mut self) -> Result<RuleDecl, CheckerError> {
        let line = self.expect(TokenKind::Rule)?.line;
        let name = match self.advance().kind {
            TokenKind::Str(name) if !name.is_empty() => name,
            other => {
                return Err(CheckerError::Compile {
                    line,
                    reason: format!("expected rule name string, found {}", other.describe()),
                });
            }
        };

        let description = match &self.peek().kind {
            TokenKind::Str(desc) => {
                let desc = desc.clone();
                self.advance();
                Some(desc)
            }
            _ => None,
        };

        let mut salience = 0;
        if self.eat(&TokenKind::Salience) {
            let negative = self.eat(&TokenKind::Minus);
            salience = match self.advance().kind {
                TokenKind::Int(value) if negative => -value,
                TokenKind::Int(value) => value,
                other => {
                    return Err(self.error(format!(
                        "expected salience integer, found {}",
                        other.describe()
                    )));
                }
            };
        }

        self.expect(TokenKind::Begin)?;
        let body = self.statements(&TokenKind::End)?;
        self.expect(TokenKind::End)?;

        Ok(RuleDecl {
            name,
            description,
            salience,
            body,
            line,
        })
    }

    /// `terminator` 전까지 문장을 읽습니다. 종결 토큰은 소비하지 않습니다.
    fn statements(&mut self, terminator: &TokenKind) -> Result<Vec<Stmt>, CheckerError> {
        let mut stmts = Vec::new();
        loop {
            while self.eat(&TokenKind::Semi) {}
            if self.at(terminator) {
                return Ok(stmts);
            }
            if self.at(&TokenKind::Eof) {
                return Err(self.error(format!("expected {}, found end of input", terminator.describe())));
            }
            stmts.push(self.statement()?);
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, CheckerError> {
        self.enter()?;
        self.expect(TokenKind::LBrace)?;
        let stmts = self.statements(&TokenKind::RBrace)?;
        self.expect(TokenKind::RBrace)?;
        self.leave();
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, CheckerError> {
        match &self.peek().kind {
            TokenKind::If => self.if_stmt(),
            TokenKind::Return => {
                self.advance();
                if matches!(
                    self.peek().kind,
                    TokenKind::Semi | TokenKind::End | TokenKind::RBrace
                ) {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.expr()?)))
                }
            }
            TokenKind::Ident(name) if self.peek_at(1) == &TokenKind::Assign => {
                let name = name.clone();
                self.advance();
                self.advance();
                Ok(Stmt::Assign {
                    name,
                    value: self.expr()?,
                })
            }
            _ => Ok(Stmt::Expr(self.expr()?)),
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, CheckerError> {
        self.expect(TokenKind::If)?;
        let cond = self.expr()?;
        let then = self.block()?;
        let otherwise = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                self.enter()?;
                let nested = self.if_stmt()?;
                self.leave();
                Some(vec![nested])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn expr(&mut self) -> Result<Expr, CheckerError> {
        self.enter()?;
        let expr = self.binary(0);
        self.leave();
        expr
    }

    /// 우선순위 단계별 이항 연산
    fn binary(&mut self, level: usize) -> Result<Expr, CheckerError> {
        if level >= BINARY_LEVELS {
            return self.unary();
        }

        let mut lhs = self.binary(level + 1)?;
        while let Some(op) = binary_op(level, &self.peek().kind) {
            self.advance();
            let rhs = self.binary(level + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, CheckerError> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.advance();
        self.enter()?;
        let expr = self.unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn postfix(&mut self) -> Result<Expr, CheckerError> {
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::Dot) {
            let field = match self.advance().kind {
                TokenKind::Ident(field) => field,
                other => {
                    return Err(self.error(format!(
                        "expected member name after '.', found {}",
                        other.describe()
                    )));
                }
            };
            expr = if self.at(&TokenKind::LParen) {
                Expr::Method {
                    target: Box::new(expr),
                    name: field,
                    args: self.arguments()?,
                }
            } else {
                Expr::Member {
                    target: Box::new(expr),
                    field,
                }
            };
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, CheckerError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(TokenKind::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr, CheckerError> {
        let token = self.advance();
        Ok(match token.kind {
            TokenKind::Int(i) => Expr::Lit(Literal::Int(i)),
            TokenKind::Float(f) => Expr::Lit(Literal::Float(f)),
            TokenKind::Str(s) => Expr::Lit(Literal::Str(s)),
            TokenKind::True => Expr::Lit(Literal::Bool(true)),
            TokenKind::False => Expr::Lit(Literal::Bool(false)),
            TokenKind::Nil => Expr::Lit(Literal::Nil),
            TokenKind::Ident(name) => {
                if self.at(&TokenKind::LParen) {
                    Expr::Call {
                        name,
                        args: self.arguments()?,
                    }
                } else {
                    Expr::Ident(name)
                }
            }
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                inner
            }
            other => {
                return Err(CheckerError::Compile {
                    line: token.line,
                    reason: format!("unexpected {}", other.describe()),
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> RuleDecl {
        let mut rules = parse_program(source).unwrap();
        assert_eq!(rules.len(), 1);
        rules.remove(0)
    }

    #[test]
    fn parses_if_else_rule() {
        let rule = single(
            r#"rule "log-level" begin
                if ToString(config.GetValueByTagPath("log.level")) == "debug" {
                    return false
                } else {
                    return true
                }
            end"#,
        );
        assert_eq!(rule.name, "log-level");
        assert_eq!(rule.salience, 0);
        let Stmt::If { cond, otherwise, .. } = &rule.body[0] else {
            panic!("expected if statement");
        };
        assert!(matches!(cond, Expr::Binary { op: BinaryOp::Eq, .. }));
        assert!(otherwise.is_some());
    }

    #[test]
    fn description_and_salience() {
        let rule = single(r#"rule "r" "check something" salience -5 begin return true end"#);
        assert_eq!(rule.description.as_deref(), Some("check something"));
        assert_eq!(rule.salience, -5);
    }

    #[test]
    fn precedence() {
        let rule = single(r#"rule "p" begin return 1 + 2 * 3 == 7 && !false end"#);
        let Stmt::Return(Some(Expr::Binary { op, lhs, .. })) = &rule.body[0] else {
            panic!("expected return");
        };
        assert_eq!(*op, BinaryOp::And);
        let Expr::Binary { op, lhs, .. } = lhs.as_ref() else {
            panic!("expected equality");
        };
        assert_eq!(*op, BinaryOp::Eq);
        assert!(matches!(lhs.as_ref(), Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn else_if_chain_and_assignment() {
        let rule = single(
            r#"rule "c" begin
                x = 3;
                if x > 5 { return 1 } else if x > 1 { return 2 } else { return 3 }
            end"#,
        );
        assert!(matches!(&rule.body[0], Stmt::Assign { name, .. } if name == "x"));
        let Stmt::If { otherwise: Some(rest), .. } = &rule.body[1] else {
            panic!("expected if");
        };
        assert!(matches!(&rest[0], Stmt::If { .. }));
    }

    #[test]
    fn member_and_method_chain() {
        let rule = single(r#"rule "m" begin return dashboard.tombstone_statistics.count end"#);
        let Stmt::Return(Some(Expr::Member { target, field })) = &rule.body[0] else {
            panic!("expected member");
        };
        assert_eq!(field, "count");
        assert!(matches!(target.as_ref(), Expr::Member { .. }));
    }

    #[test]
    fn multiple_rules() {
        let rules = parse_program(
            r#"rule "a" begin return true end
               rule "b" salience 3 begin return false end"#,
        )
        .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].salience, 3);
    }

    #[test]
    fn duplicate_rule_name_is_compile_error() {
        let err = parse_program(
            "rule \"a\" begin return true end\nrule \"a\" begin return false end",
        )
        .unwrap_err();
        assert!(matches!(err, CheckerError::Compile { line: 2, .. }));
    }

    #[test]
    fn syntax_errors_report_line() {
        let err = parse_program("rule \"a\" begin\n  return (1 +\nend").unwrap_err();
        assert!(matches!(err, CheckerError::Compile { line: 3, .. }));
        assert!(parse_program("rule \"a\" begin return true").is_err());
        assert!(parse_program("rule a begin end").is_err());
        assert!(parse_program("begin end").is_err());
    }

    #[test]
    fn nesting_limit() {
        let deep = format!(
            "rule \"d\" begin return {}1{} end",
            "(".repeat(200),
            ")".repeat(200)
        );
        let err = parse_program(&deep).unwrap_err();
        assert!(err.to_string().contains("nesting"));

        let negations = format!("rule \"n\" begin return {}true end", "!".repeat(200));
        assert!(parse_program(&negations).is_err());
    }

    #[test]
    fn empty_source_has_no_rules() {
        assert!(parse_program("  // nothing\n").unwrap().is_empty());
    }
}
