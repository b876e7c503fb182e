use super::lexer::{Token, TokenKind};
use crate::core::DqlError;

/// Words that can never be used as a field or table name.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "ORDER", "BY", "LIMIT", "AND", "OR", "NOT", "SET",
    "VALUES", "INTO", "LIKE",
];

pub fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Forward-only cursor over a token stream.
pub struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Offset reported for errors at end of input
    end: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [Token], input_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end: input_len,
        }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n)
    }

    pub fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    /// Byte offset of the next token, or of end of input.
    pub fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.position)
    }

    pub fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    /// Consume `keyword` if it is next.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<(), DqlError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    /// Consume a punctuation or operator token of exactly `kind`.
    pub fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), DqlError> {
        match self.peek() {
            Some(t) if &t.kind == kind => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        match self.peek() {
            Some(t) if &t.kind == kind => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// A bare, non-reserved word, lowercased.
    pub fn expect_identifier(&mut self, what: &str) -> Result<String, DqlError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Word(w),
                ..
            }) if !is_reserved(w) => {
                self.pos += 1;
                Ok(w.to_ascii_lowercase())
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// A quoted literal or a bare word, verbatim.
    pub fn expect_literal(&mut self, what: &str) -> Result<String, DqlError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Quoted(s) | TokenKind::Word(s),
                ..
            }) => {
                self.pos += 1;
                Ok(s.clone())
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Error for the next token not being `expected`.
    pub fn unexpected(&self, expected: &str) -> DqlError {
        match self.peek() {
            Some(t) => DqlError::parse(format!("expected {expected}, found '{}'", t.kind), t.position),
            None => DqlError::parse(format!("expected {expected}, found end of input"), self.end),
        }
    }

    /// Fails unless every token has been consumed.
    pub fn expect_end(&self) -> Result<(), DqlError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(DqlError::parse(format!("unexpected trailing token '{}'", t.kind), t.position)),
        }
    }
}
