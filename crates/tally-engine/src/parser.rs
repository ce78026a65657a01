use thiserror::Error;

use tally_model::{CellRef, Range};

/// Parsed formula expression.
///
/// The grammar covers what the grid emits and what a user can reasonably
/// type into a formula cell: `NAME(arg, ...)` calls, `A2:A17` ranges,
/// single cell references, quoted strings (`""` escapes a quote), and
/// numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Cell(CellRef),
    Range(Range),
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Every cell/range reference in the expression, for dependency tracking.
    pub fn referenced_ranges(&self) -> Vec<Range> {
        let mut out = Vec::new();
        self.collect_ranges(&mut out);
        out
    }

    fn collect_ranges(&self, out: &mut Vec<Range>) {
        match self {
            Expr::Number(_) | Expr::Text(_) => {}
            Expr::Cell(cell) => out.push(Range::new(*cell, *cell)),
            Expr::Range(range) => out.push(*range),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_ranges(out);
                }
            }
        }
    }
}

/// Formula text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { offset: usize, ch: char },
    #[error("invalid reference {text:?}")]
    BadReference { text: String },
    #[error("invalid number {text:?}")]
    BadNumber { text: String },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("trailing characters after expression")]
    TrailingCharacters,
}

/// Parse sigil-free formula text into an expression tree.
pub fn parse_formula(text: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        pos: 0,
    };
    let expr = parser.parse_expr()?;
    parser.skip_whitespace();
    if parser.pos != parser.bytes.len() {
        return Err(ParseError::TrailingCharacters);
    }
    Ok(expr)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ParseError::UnexpectedEnd),
            Some(b'"') => self.parse_string(),
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == b'$' => self.parse_word(),
            Some(c) => Err(ParseError::UnexpectedChar {
                offset: self.pos,
                ch: c as char,
            }),
        }
    }

    /// Identifier-or-reference: `SUMIF(...)`, `G2:G17`, `E7`.
    fn parse_word(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'$' || c == b'_')
        {
            self.pos += 1;
        }
        let word = &self.bytes[start..self.pos];
        let word = std::str::from_utf8(word).expect("ASCII slice is valid UTF-8");

        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let args = self.parse_args()?;
                Ok(Expr::Call {
                    name: word.to_ascii_uppercase(),
                    args,
                })
            }
            Some(b':') => {
                self.pos += 1;
                let end_start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'$')
                {
                    self.pos += 1;
                }
                let end = std::str::from_utf8(&self.bytes[end_start..self.pos])
                    .expect("ASCII slice is valid UTF-8");
                let text = format!("{word}:{end}");
                let start_ref = CellRef::from_a1(word)
                    .map_err(|_| ParseError::BadReference { text: text.clone() })?;
                let end_ref = CellRef::from_a1(end)
                    .map_err(|_| ParseError::BadReference { text: text.clone() })?;
                Ok(Expr::Range(Range::new(start_ref, end_ref)))
            }
            _ => CellRef::from_a1(word)
                .map(Expr::Cell)
                .map_err(|_| ParseError::BadReference {
                    text: word.to_string(),
                }),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b')') => {
                    self.pos += 1;
                    return Ok(args);
                }
                Some(c) => {
                    return Err(ParseError::UnexpectedChar {
                        offset: self.pos,
                        ch: c as char,
                    })
                }
                None => return Err(ParseError::UnexpectedEnd),
            }
        }
    }

    fn parse_string(&mut self) -> Result<Expr, ParseError> {
        // Opening quote already peeked.
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedString),
                Some(b'"') => {
                    // `""` inside a string is an escaped quote.
                    if self.bytes.get(self.pos + 1) == Some(&b'"') {
                        out.push('"');
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(Expr::Text(out));
                    }
                }
                Some(_) => {
                    // Strings may hold arbitrary UTF-8; advance one scalar.
                    let rest = std::str::from_utf8(&self.bytes[self.pos..])
                        .map_err(|_| ParseError::UnterminatedString)?;
                    let ch = rest.chars().next().ok_or(ParseError::UnterminatedString)?;
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<Expr, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == b'.')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .expect("ASCII slice is valid UTF-8");
        text.parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| ParseError::BadNumber {
                text: text.to_string(),
            })
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
}
