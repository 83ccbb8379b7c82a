//! Tag classification and block matching.

use crate::error::RenderError;
use crate::lexer::{Delimiter, Segment, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Text,
    Variable { name: &'a str },
    ForOpen { var: &'a str, iterable: &'a str },
    ForClose,
    IfOpen { condition: &'a str },
    IfClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    /// Source text, delimiters included for tags.
    pub raw: &'a str,
    /// Byte offset into the template.
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn is_open(&self) -> bool {
        matches!(self.kind, TokenKind::ForOpen { .. } | TokenKind::IfOpen { .. })
    }

    pub fn is_close(&self) -> bool {
        matches!(self.kind, TokenKind::ForClose | TokenKind::IfClose)
    }

    /// Whether `self` and `other` are an open and a close (or two opens) of
    /// the same block type.
    pub fn same_block(&self, other: &Token<'_>) -> bool {
        let is_for = |t: &Token<'_>| {
            matches!(t.kind, TokenKind::ForOpen { .. } | TokenKind::ForClose)
        };
        let is_if =
            |t: &Token<'_>| matches!(t.kind, TokenKind::IfOpen { .. } | TokenKind::IfClose);
        (is_for(self) && is_for(other)) || (is_if(self) && is_if(other))
    }

    pub(crate) fn unmatched(&self) -> RenderError {
        RenderError::UnmatchedTag {
            tag: self.raw.to_string(),
            offset: self.offset,
        }
    }
}

/// Classifies one segment. Tags outside the grammar become `Text`.
pub fn classify(segment: Segment<'_>) -> Token<'_> {
    match segment {
        Segment::Text { text, offset } => Token {
            kind: TokenKind::Text,
            raw: text,
            offset,
        },
        Segment::Tag {
            raw,
            inner,
            delimiter,
            offset,
        } => {
            let kind = match delimiter {
                Delimiter::Variable => classify_variable(inner.trim()),
                Delimiter::Block => classify_block(inner.trim()),
            };
            Token {
                kind: kind.unwrap_or(TokenKind::Text),
                raw,
                offset,
            }
        }
    }
}

fn classify_variable(inner: &str) -> Option<TokenKind<'_>> {
    is_identifier(inner).then_some(TokenKind::Variable { name: inner })
}

fn classify_block(inner: &str) -> Option<TokenKind<'_>> {
    match inner {
        "endfor" => return Some(TokenKind::ForClose),
        "endif" => return Some(TokenKind::IfClose),
        _ => {}
    }

    if let Some(condition) = keyword_rest(inner, "if") {
        return Some(TokenKind::IfOpen { condition });
    }

    let rest = keyword_rest(inner, "for")?;
    let mut words = rest.split_whitespace();
    match (words.next(), words.next(), words.next(), words.next()) {
        (Some(var), Some("in"), Some(iterable), None)
            if is_identifier(var) && is_identifier(iterable) =>
        {
            Some(TokenKind::ForOpen { var, iterable })
        }
        _ => None,
    }
}

/// `"if x"` with keyword `"if"` gives `Some("x")`; the keyword must be
/// followed by whitespace and something else.
fn keyword_rest<'a>(inner: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = inner.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Tokenizes and classifies a whole template.
pub fn tokenize(template: &str) -> Vec<Token<'_>> {
    tokenize_with(Tokenizer::new(template))
}

pub(crate) fn tokenize_with(tokenizer: Tokenizer<'_>) -> Vec<Token<'_>> {
    tokenizer.map(classify).collect()
}

/// Checks that open and close tags pair up without crossing, and that
/// nesting stays within `max_depth` if one is given.
pub fn check_nesting(tokens: &[Token<'_>], max_depth: Option<usize>) -> Result<(), RenderError> {
    let mut stack: Vec<&Token<'_>> = Vec::new();
    for token in tokens {
        if token.is_open() {
            stack.push(token);
            if let Some(limit) = max_depth {
                if stack.len() > limit {
                    return Err(RenderError::NestingTooDeep { limit });
                }
            }
        } else if token.is_close() {
            match stack.pop() {
                Some(open) if open.same_block(token) => {}
                Some(open) => return Err(open.unmatched()),
                None => return Err(token.unmatched()),
            }
        }
    }
    match stack.pop() {
        Some(open) => Err(open.unmatched()),
        None => Ok(()),
    }
}
