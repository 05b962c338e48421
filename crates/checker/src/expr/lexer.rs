//! 규칙 표현식 렉서

use crate::error::CheckerError;

/// 토큰 종류
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    // 키워드
    Rule,
    Begin,
    End,
    Salience,
    If,
    Else,
    Return,
    True,
    False,
    Nil,
    // 연산자
    Bang,
    Minus,
    Plus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Assign,
    // 구두점
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Semi,
    Eof,
}

impl TokenKind {
    /// 에러 메시지용 설명
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Int(i) => format!("integer {i}"),
            TokenKind::Float(f) => format!("float {f}"),
            TokenKind::Eof => "end of input".to_owned(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Rule => "rule",
            TokenKind::Begin => "begin",
            TokenKind::End => "end",
            TokenKind::Salience => "salience",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Return => "return",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Nil => "nil",
            TokenKind::Bang => "!",
            TokenKind::Minus => "-",
            TokenKind::Plus => "+",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::EqEq => "==",
            TokenKind::Ne => "!=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Assign => "=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Semi => ";",
            TokenKind::Ident(_)
            | TokenKind::Str(_)
            | TokenKind::Int(_)
            | TokenKind::Float(_)
            | TokenKind::Eof => "",
        }
    }
}

/// 위치 정보가 있는 토큰
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 소스 라인 (1부터)
    pub line: usize,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "rule" => TokenKind::Rule,
        "begin" => TokenKind::Begin,
        "end" => TokenKind::End,
        "salience" => TokenKind::Salience,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nil" => TokenKind::Nil,
        _ => return None,
    })
}

/// 소스를 토큰 목록으로 나눕니다. 마지막 토큰은 항상 [`TokenKind::Eof`]입니다.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CheckerError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    let error = |line: usize, reason: String| CheckerError::Compile { line, reason };

    while pos < chars.len() {
        let c = chars[pos];

        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += 1;
            continue;
        }
        // 라인 주석
        if c == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }

        let start_line = line;
        let kind = if c.is_ascii_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let ident: String = chars[start..pos].iter().collect();
            keyword(&ident).unwrap_or(TokenKind::Ident(ident))
        } else if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let is_float = chars.get(pos) == Some(&'.')
                && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit());
            if is_float {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            if is_float {
                TokenKind::Float(
                    text.parse()
                        .map_err(|_| error(line, format!("invalid float literal '{text}'")))?,
                )
            } else {
                TokenKind::Int(
                    text.parse()
                        .map_err(|_| error(line, format!("integer literal out of range '{text}'")))?,
                )
            }
        } else if c == '"' {
            pos += 1;
            let mut value = String::new();
            loop {
                let Some(&ch) = chars.get(pos) else {
                    return Err(error(start_line, "unterminated string literal".to_owned()));
                };
                pos += 1;
                match ch {
                    '"' => break,
                    '\n' => {
                        return Err(error(start_line, "unterminated string literal".to_owned()));
                    }
                    '\\' => {
                        let escaped = chars.get(pos).copied();
                        pos += 1;
                        value.push(match escaped {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some('r') => '\r',
                            Some('"') => '"',
                            Some('\\') => '\\',
                            Some(other) => {
                                return Err(error(line, format!("unknown escape '\\{other}'")));
                            }
                            None => {
                                return Err(error(start_line, "unterminated string literal".to_owned()));
                            }
                        });
                    }
                    other => value.push(other),
                }
            }
            TokenKind::Str(value)
        } else {
            let next = chars.get(pos + 1).copied();
            let (kind, width) = match (c, next) {
                ('<', Some('=')) => (TokenKind::Le, 2),
                ('>', Some('=')) => (TokenKind::Ge, 2),
                ('=', Some('=')) => (TokenKind::EqEq, 2),
                ('!', Some('=')) => (TokenKind::Ne, 2),
                ('&', Some('&')) => (TokenKind::AndAnd, 2),
                ('|', Some('|')) => (TokenKind::OrOr, 2),
                ('<', _) => (TokenKind::Lt, 1),
                ('>', _) => (TokenKind::Gt, 1),
                ('=', _) => (TokenKind::Assign, 1),
                ('!', _) => (TokenKind::Bang, 1),
                ('-', _) => (TokenKind::Minus, 1),
                ('+', _) => (TokenKind::Plus, 1),
                ('*', _) => (TokenKind::Star, 1),
                ('/', _) => (TokenKind::Slash, 1),
                ('%', _) => (TokenKind::Percent, 1),
                ('(', _) => (TokenKind::LParen, 1),
                (')', _) => (TokenKind::RParen, 1),
                ('{', _) => (TokenKind::LBrace, 1),
                ('}', _) => (TokenKind::RBrace, 1),
                (',', _) => (TokenKind::Comma, 1),
                ('.', _) => (TokenKind::Dot, 1),
                (';', _) => (TokenKind::Semi, 1),
                (other, _) => {
                    return Err(error(line, format!("unexpected character '{other}'")));
                }
            };
            pos += width;
            kind
        };

        tokens.push(Token {
            kind,
            line: start_line,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn rule_header() {
        assert_eq!(
            kinds(r#"rule "log-level" salience 10 begin end"#),
            vec![
                TokenKind::Rule,
                TokenKind::Str("log-level".to_owned()),
                TokenKind::Salience,
                TokenKind::Int(10),
                TokenKind::Begin,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn member_access_is_not_a_float() {
        assert_eq!(
            kinds("config.log 1.5 2.x"),
            vec![
                TokenKind::Ident("config".to_owned()),
                TokenKind::Dot,
                TokenKind::Ident("log".to_owned()),
                TokenKind::Float(1.5),
                TokenKind::Int(2),
                TokenKind::Dot,
                TokenKind::Ident("x".to_owned()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("<= >= == != && || < = !"),
            vec![
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::EqEq,
                TokenKind::Ne,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Lt,
                TokenKind::Assign,
                TokenKind::Bang,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c\n""#),
            vec![TokenKind::Str("a\"b\\c\n".to_owned()), TokenKind::Eof]
        );
    }

    #[test]
    fn comments_and_lines() {
        let tokens = tokenize("// header\nrule\n\n// x\nbegin").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Rule);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 5);
    }

    #[test]
    fn lexical_errors() {
        assert!(matches!(
            tokenize("\"open"),
            Err(CheckerError::Compile { line: 1, .. })
        ));
        assert!(matches!(
            tokenize("\n\n#"),
            Err(CheckerError::Compile { line: 3, .. })
        ));
        assert!(tokenize("99999999999999999999").is_err());
        assert!(tokenize(r#""\q""#).is_err());
    }
}
