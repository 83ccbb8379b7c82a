/// Which pair of delimiters surrounds a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Block,    // {% %}
    Variable, // {{ }}
}

/// A piece of template text as delimited by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text {
        text: &'a str,
        offset: usize,
    },
    Tag {
        raw: &'a str,   // including delimiters
        inner: &'a str, // between delimiters, untrimmed
        delimiter: Delimiter,
        offset: usize,
    },
}

/// Splits template text into literal text and tags. Knows nothing about
/// what a tag means.
#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    trim_blocks: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            trim_blocks: false,
        }
    }

    /// Swallow one newline directly after each `%}`.
    pub fn trim_blocks(mut self, trim: bool) -> Self {
        self.trim_blocks = trim;
        self
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    fn text(&mut self, len: usize) -> Segment<'a> {
        let offset = self.cursor;
        let text = &self.remaining()[..len];
        self.advance(len);
        Segment::Text { text, offset }
    }

    pub fn next_segment(&mut self) -> Option<Segment<'a>> {
        let rest = self.remaining();
        if rest.is_empty() {
            return None;
        }

        match next_opener(rest, 0) {
            Some(0) => {
                let (delimiter, closer) = if rest.starts_with("{%") {
                    (Delimiter::Block, "%}")
                } else {
                    (Delimiter::Variable, "}}")
                };
                match rest[2..].find(closer) {
                    Some(end) => {
                        let offset = self.cursor;
                        let raw = &rest[..end + 4];
                        let inner = &rest[2..end + 2];
                        self.advance(raw.len());

                        if self.trim_blocks && delimiter == Delimiter::Block {
                            let after = self.remaining();
                            if after.starts_with('\n') {
                                self.advance(1);
                            } else if after.starts_with("\r\n") {
                                self.advance(2);
                            }
                        }

                        Some(Segment::Tag {
                            raw,
                            inner,
                            delimiter,
                            offset,
                        })
                    }
                    None => {
                        // Unclosed opener: literal up to the next opener.
                        let len = next_opener(rest, 2).unwrap_or(rest.len());
                        Some(self.text(len))
                    }
                }
            }
            Some(idx) => Some(self.text(idx)),
            None => Some(self.text(rest.len())),
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment()
    }
}

fn next_opener(s: &str, from: usize) -> Option<usize> {
    let rest = &s[from..];
    rest.find("{%")
        .into_iter()
        .chain(rest.find("{{"))
        .min()
        .map(|idx| idx + from)
}

/// Tokens of an `if` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprToken {
    // Keywords
    And,
    Or,
    Not,
    True,
    False,
    None,

    // Symbols
    EqEq,   // ==
    NotEq,  // !=
    Lt,     // <
    LtEq,   // <=
    Gt,     // >
    GtEq,   // >=
    LParen, // (
    RParen, // )

    // Data
    Ident(String),
    StringLit(String),
    Int(i64),
    Float(f64),
}

/// Lexer for condition expressions. Anything outside the token set is an
/// error rather than being skipped.
#[derive(Clone)]
pub struct ExprLexer<'a> {
    input: &'a str,
    cursor: usize,
}

impl<'a> ExprLexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, cursor: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }

    pub fn next_token(&mut self) -> Result<Option<ExprToken>, String> {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.advance(rest.len() - trimmed.len());

        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        const SYMBOLS: [(&str, ExprToken); 8] = [
            ("==", ExprToken::EqEq),
            ("!=", ExprToken::NotEq),
            ("<=", ExprToken::LtEq),
            (">=", ExprToken::GtEq),
            ("<", ExprToken::Lt),
            (">", ExprToken::Gt),
            ("(", ExprToken::LParen),
            (")", ExprToken::RParen),
        ];
        for (symbol, token) in SYMBOLS {
            if rest.starts_with(symbol) {
                self.advance(symbol.len());
                return Ok(Some(token));
            }
        }

        if first == '\'' || first == '"' {
            return self.string(first).map(Some);
        }

        if first.is_ascii_digit() {
            return self.number().map(Some);
        }

        if first.is_ascii_alphabetic() || first == '_' {
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let word = &rest[..len];
            self.advance(len);

            return Ok(Some(match word {
                "and" => ExprToken::And,
                "or" => ExprToken::Or,
                "not" => ExprToken::Not,
                "true" | "True" => ExprToken::True,
                "false" | "False" => ExprToken::False,
                "none" | "None" => ExprToken::None,
                _ => ExprToken::Ident(word.to_string()),
            }));
        }

        Err(format!("unexpected character `{first}` at {}", self.cursor))
    }

    fn string(&mut self, quote: char) -> Result<ExprToken, String> {
        let start = self.cursor;
        let mut s = String::new();
        let mut chars = self.remaining().char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            if c == quote {
                self.advance(idx + 1);
                return Ok(ExprToken::StringLit(s));
            }
            if c == '\\' {
                match chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, esc)) => s.push(esc),
                    None => break,
                }
            } else {
                s.push(c);
            }
        }
        Err(format!("unterminated string starting at {start}"))
    }

    fn number(&mut self) -> Result<ExprToken, String> {
        let rest = self.remaining();
        let int_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let after = &rest[int_len..];
        let frac_len = match after.strip_prefix('.') {
            Some(frac) if frac.starts_with(|c: char| c.is_ascii_digit()) => {
                1 + frac
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(frac.len())
            }
            _ => 0,
        };
        let literal = &rest[..int_len + frac_len];
        self.advance(literal.len());

        if frac_len > 0 {
            literal
                .parse()
                .map(ExprToken::Float)
                .map_err(|e| format!("bad number `{literal}`: {e}"))
        } else {
            literal
                .parse()
                .map(ExprToken::Int)
                .map_err(|e| format!("bad number `{literal}`: {e}"))
        }
    }
}
