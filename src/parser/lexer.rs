//! DQL tokenizer.
//!
//! Produces a flat token stream for the whole query. Keywords are not
//! classified here: they are bare words matched case-insensitively by the
//! statement parsers.

use super::statement::CompareOp;
use crate::core::DqlError;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::{map, map_opt, value},
    sequence::delimited,
    IResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Comma,
    Op(CompareOp),
    /// Quoted literal with the quotes stripped
    Quoted(String),
    /// Identifier, keyword, number or `*`
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the tokenized text
    pub position: usize,
}

impl Token {
    /// True if this is the bare word `keyword`, ignoring case.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::Op(op) => f.write_str(op.symbol()),
            Self::Quoted(s) => write!(f, "'{s}'"),
            Self::Word(w) => f.write_str(w),
        }
    }
}

const DELIMITERS: &str = "()=<>!,'\";";

fn punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::Comma, char(',')),
    ))(input)
}

// Two-character operators must be tried before their one-character prefixes
fn operator(input: &str) -> IResult<&str, TokenKind> {
    map_opt(
        alt((tag("<="), tag(">="), tag("!="), tag("="), tag("<"), tag(">"))),
        |symbol: &str| CompareOp::from_symbol(symbol).map(TokenKind::Op),
    )(input)
}

fn quoted(input: &str) -> IResult<&str, TokenKind> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| TokenKind::Quoted(s.to_string()),
    )(input)
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !DELIMITERS.contains(c)),
        |s: &str| TokenKind::Word(s.to_string()),
    )(input)
}

fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((punctuation, operator, quoted, word))(input)
}

/// Split `input` into tokens, failing on the first character that cannot start one.
pub fn tokenize(input: &str) -> Result<Vec<Token>, DqlError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let position = input.len() - rest.len();
        match token(rest) {
            Ok((remaining, kind)) => {
                tokens.push(Token { kind, position });
                rest = remaining;
            }
            Err(_) => {
                let c = rest.chars().next().unwrap_or(' ');
                let message = if c == '\'' || c == '"' {
                    "unterminated quoted literal".to_string()
                } else {
                    format!("unexpected character '{c}'")
                };
                return Err(DqlError::parse(message, position));
            }
        }
    }

    Ok(tokens)
}
