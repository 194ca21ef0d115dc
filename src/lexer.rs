use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::ast::{Comparator, LiteralKind, Token};

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$")
        .expect("timestamp pattern")
});
static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?s$").expect("duration pattern"));
static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(\d+\.\d+([eE][+-]?\d+)?|\d+[eE][+-]?\d+)$").expect("float pattern")
});
static UINT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[uU]$").expect("uint pattern"));
static INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").expect("int pattern"));

/// Character offset into the filter string.
pub type Position = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: Position },

    #[error("unterminated string starting at position {0}")]
    UnterminatedString(Position),

    #[error("invalid escape sequence \\{ch} at position {position}")]
    InvalidEscape { ch: char, position: Position },

    #[error("malformed number {text} at position {position}")]
    InvalidNumber { text: String, position: Position },
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    after_comparator: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            after_comparator: false,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            let dotted = ch == '.'
                && self
                    .peek_char(1)
                    .is_some_and(|c| c.is_alphabetic() || c == '_');
            if ch.is_alphanumeric() || ch == '_' || dotted {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Scan a quoted string, keeping quotes and escapes in the token text.
    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut raw = String::new();
        raw.push(quote);
        self.advance();

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    raw.push(c);
                    self.advance();
                    return Ok(raw);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some(c @ ('n' | 't' | 'r' | '"' | '\'' | '\\' | '*')) => {
                            raw.push('\\');
                            raw.push(c);
                            self.advance();
                        }
                        Some(c) => {
                            return Err(LexError::InvalidEscape {
                                ch: c,
                                position: self.position,
                            });
                        }
                        None => return Err(LexError::UnterminatedString(start)),
                    }
                }
                _ => {
                    raw.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString(start))
    }

    /// Scan a word starting with a digit (or a sign) and classify it.
    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let mut text = String::new();
        if self.current_char() == Some('-') {
            text.push('-');
            self.advance();
        }
        while let Some(ch) = self.current_char() {
            let sign_in_word = matches!(ch, '+' | '-')
                && text.ends_with(|c: char| c.is_ascii_alphanumeric());
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | ':') || sign_in_word {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = if TIMESTAMP.is_match(&text) {
            LiteralKind::Timestamp
        } else if DURATION.is_match(&text) {
            LiteralKind::Duration
        } else if FLOAT.is_match(&text) {
            LiteralKind::Float
        } else if UINT.is_match(&text) {
            LiteralKind::UInt
        } else if INT.is_match(&text) {
            LiteralKind::Int
        } else {
            return Err(LexError::InvalidNumber {
                text,
                position: start,
            });
        };
        Ok(Token::literal(kind, text))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn pair(&mut self, token: Token) -> Token {
        self.advance();
        self.advance();
        token
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let after_comparator = std::mem::replace(&mut self.after_comparator, false);

        let token = match self.current_char() {
            None => Token::Eof,
            Some('(') => self.single(Token::LParen),
            Some(')') => self.single(Token::RParen),
            Some(',') => self.single(Token::Comma),
            Some(':') => self.single(Token::Comparator(Comparator::Has)),
            Some('=') => self.single(Token::Comparator(Comparator::Equals)),
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.pair(Token::Comparator(Comparator::NotEquals))
                } else {
                    return Err(LexError::UnexpectedCharacter {
                        ch: '!',
                        position: self.position,
                    });
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.pair(Token::Comparator(Comparator::LessEquals))
                } else {
                    self.single(Token::Comparator(Comparator::LessThan))
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.pair(Token::Comparator(Comparator::GreaterEquals))
                } else {
                    self.single(Token::Comparator(Comparator::GreaterThan))
                }
            }
            Some('-') => {
                // A minus right after a comparator signs the number.
                if after_comparator && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                    self.read_number()?
                } else {
                    self.single(Token::Not)
                }
            }
            Some(q @ ('"' | '\'')) => Token::literal(LiteralKind::String, self.read_string(q)?),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();

                match ident.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "true" => Token::literal(LiteralKind::True, ident),
                    "false" => Token::literal(LiteralKind::False, ident),
                    "null" => Token::literal(LiteralKind::Null, ident),
                    _ => Token::Identifier(ident),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) => {
                return Err(LexError::UnexpectedCharacter {
                    ch,
                    position: self.position,
                });
            }
        };

        self.after_comparator = matches!(token, Token::Comparator(_));
        Ok(token)
    }

    /// Collect every token up to and including `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}
