// src/bashvar/parser.rs

//! Restricted grammar for assignment-only bash fragments
//!
//! The parser accepts one `name=value` (or `name+=value`) per logical line,
//! with blank lines and `#` comments in between. Values are built from
//! literal runs, single-quoted literals, double-quoted sequences and a small
//! set of parameter expansions. Everything else rejects the whole fragment
//! with [`Unsupported`] so the caller can route it to the shell fallback.

use std::fmt;

/// Characters that may not appear in an unquoted literal run
const UNQUOTED_RESERVED: &str = "~{}()$'\"`\\*?[];&|<>";

/// Characters that may not appear in an expansion pattern or replacement
const PATTERN_RESERVED: &str = "/#%[]{}'\"`\\$~()&\n";

/// The fragment uses a construct outside the supported grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsupported {
    /// 1-based line where parsing stopped
    pub line: usize,
    pub reason: String,
}

impl Unsupported {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// A single `name=value` or `name+=value` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub append: bool,
    pub value: Vec<Segment>,
    pub line: usize,
}

/// One piece of an assignment value, after quote removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Expansion(Expansion),
}

/// `$name` or `${name<op>}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub name: String,
    pub op: Option<ExpansionOp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOp {
    /// `${name:offset}` / `${name:offset:length}`
    Substring { offset: i64, length: Option<i64> },
    /// `${name#pattern}` / `${name##pattern}`
    TrimPrefix { pattern: String, longest: bool },
    /// `${name%pattern}` / `${name%%pattern}`
    TrimSuffix { pattern: String, longest: bool },
    /// `${name/pattern/replacement}` / `${name//pattern/replacement}`
    Replace {
        pattern: String,
        replacement: String,
        all: bool,
    },
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_blanks(&mut self) {
        while self.peek().is_some_and(is_blank) {
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }

    fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&mut pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn unsupported(&self, reason: impl Into<String>) -> Unsupported {
        Unsupported::new(self.line, reason)
    }
}

/// Parse a fragment into its assignments, in source order
pub fn parse(source: &str) -> Result<Vec<Assignment>, Unsupported> {
    let mut cur = Cursor::new(source);
    let mut assignments = Vec::new();

    loop {
        cur.skip_blanks();
        match cur.peek() {
            None => break,
            Some('\n') => {
                cur.bump();
                continue;
            }
            Some('#') => cur.skip_comment(),
            Some(c) if is_name_start(c) => {
                assignments.push(parse_assignment(&mut cur)?);
                cur.skip_blanks();
                if cur.peek() == Some('#') {
                    cur.skip_comment();
                }
            }
            Some(c) => return Err(cur.unsupported(format!("unexpected character '{}'", c))),
        }

        match cur.bump() {
            None | Some('\n') => {}
            Some(c) => {
                return Err(cur.unsupported(format!("unexpected '{}' after assignment", c)));
            }
        }
    }

    Ok(assignments)
}

fn parse_assignment(cur: &mut Cursor) -> Result<Assignment, Unsupported> {
    let line = cur.line;
    let name = cur.take_while(is_name_char).to_string();

    let append = if cur.peek() == Some('+') && cur.peek_second() == Some('=') {
        cur.bump();
        true
    } else {
        false
    };
    if !cur.eat('=') {
        return Err(cur.unsupported(format!("'{}' is not an assignment", name)));
    }

    let value = parse_value(cur)?;
    Ok(Assignment {
        name,
        append,
        value,
        line,
    })
}

/// Collects literal text, merging adjacent literal pieces
#[derive(Default)]
struct SegmentBuffer {
    segments: Vec<Segment>,
    literal: String,
}

impl SegmentBuffer {
    fn push_char(&mut self, c: char) {
        self.literal.push(c);
    }

    fn push_str(&mut self, s: &str) {
        self.literal.push_str(s);
    }

    fn push_expansion(&mut self, expansion: Expansion) {
        self.flush();
        self.segments.push(Segment::Expansion(expansion));
    }

    fn flush(&mut self) {
        if !self.literal.is_empty() {
            self.segments
                .push(Segment::Literal(std::mem::take(&mut self.literal)));
        }
    }

    fn finish(mut self) -> Vec<Segment> {
        self.flush();
        self.segments
    }
}

fn parse_value(cur: &mut Cursor) -> Result<Vec<Segment>, Unsupported> {
    let mut buf = SegmentBuffer::default();

    while let Some(c) = cur.peek() {
        match c {
            '\n' | ' ' | '\t' => break,
            '\'' => {
                cur.bump();
                let text = cur.take_while(|c| c != '\'');
                if !cur.eat('\'') {
                    return Err(cur.unsupported("unterminated single quote"));
                }
                buf.push_str(text);
            }
            '"' => {
                cur.bump();
                parse_double_quoted(cur, &mut buf)?;
            }
            '$' => {
                cur.bump();
                buf.push_expansion(parse_expansion(cur)?);
            }
            c if UNQUOTED_RESERVED.contains(c) => {
                return Err(cur.unsupported(format!("unsupported character '{}'", c)));
            }
            c => {
                cur.bump();
                buf.push_char(c);
            }
        }
    }

    Ok(buf.finish())
}

fn parse_double_quoted(cur: &mut Cursor, buf: &mut SegmentBuffer) -> Result<(), Unsupported> {
    loop {
        match cur.bump() {
            None => return Err(cur.unsupported("unterminated double quote")),
            Some('"') => return Ok(()),
            Some('\\') => match cur.bump() {
                Some(c @ ('$' | '`' | '"' | '\\')) => buf.push_char(c),
                // line continuation
                Some('\n') => {}
                _ => return Err(cur.unsupported("unsupported escape in double quotes")),
            },
            Some('$') => buf.push_expansion(parse_expansion(cur)?),
            Some('`') => return Err(cur.unsupported("command substitution")),
            Some(c) => buf.push_char(c),
        }
    }
}

fn parse_expansion(cur: &mut Cursor) -> Result<Expansion, Unsupported> {
    match cur.peek() {
        Some('{') => {
            cur.bump();
            parse_braced(cur)
        }
        Some(c) if is_name_start(c) => Ok(Expansion {
            name: cur.take_while(is_name_char).to_string(),
            op: None,
        }),
        _ => Err(cur.unsupported("unsupported '$' expansion")),
    }
}

fn parse_braced(cur: &mut Cursor) -> Result<Expansion, Unsupported> {
    if !cur.peek().is_some_and(is_name_start) {
        return Err(cur.unsupported("unsupported parameter name in '${}'"));
    }
    let name = cur.take_while(is_name_char).to_string();

    let op = match cur.bump() {
        Some('}') => return Ok(Expansion { name, op: None }),
        Some(':') => {
            let offset = parse_offset(cur)?;
            let length = if cur.eat(':') {
                Some(parse_integer(cur)?)
            } else {
                None
            };
            ExpansionOp::Substring { offset, length }
        }
        Some('#') => ExpansionOp::TrimPrefix {
            longest: cur.eat('#'),
            pattern: parse_pattern(cur)?,
        },
        Some('%') => ExpansionOp::TrimSuffix {
            longest: cur.eat('%'),
            pattern: parse_pattern(cur)?,
        },
        Some('/') => {
            let all = cur.eat('/');
            let pattern = parse_pattern(cur)?;
            let replacement = if !pattern.is_empty() && cur.eat('/') {
                parse_pattern(cur)?
            } else {
                String::new()
            };
            ExpansionOp::Replace {
                pattern,
                replacement,
                all,
            }
        }
        _ => return Err(cur.unsupported(format!("unsupported operator in '${{{}...}}'", name))),
    };

    if !cur.eat('}') {
        return Err(cur.unsupported(format!("unterminated '${{{}'", name)));
    }
    Ok(Expansion { name, op: Some(op) })
}

/// Substring offset: digits, or blanks followed by a negative number.
///
/// `${x:-word}` is the default-value form, so a negative offset needs the
/// leading blank exactly as in bash.
fn parse_offset(cur: &mut Cursor) -> Result<i64, Unsupported> {
    match cur.peek() {
        Some(c) if c.is_ascii_digit() => parse_digits(cur),
        Some(c) if is_blank(c) => {
            cur.skip_blanks();
            if !cur.eat('-') {
                return Err(cur.unsupported("unsupported substring offset"));
            }
            Ok(-parse_digits(cur)?)
        }
        _ => Err(cur.unsupported("unsupported expansion after ':'")),
    }
}

fn parse_integer(cur: &mut Cursor) -> Result<i64, Unsupported> {
    if cur.eat('-') {
        Ok(-parse_digits(cur)?)
    } else {
        parse_digits(cur)
    }
}

fn parse_digits(cur: &mut Cursor) -> Result<i64, Unsupported> {
    let digits = cur.take_while(|c| c.is_ascii_digit());
    if digits.is_empty() {
        return Err(cur.unsupported("expected a number"));
    }
    // bash arithmetic reads a leading zero as octal
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(cur.unsupported(format!("octal number '{}'", digits)));
    }
    digits
        .parse()
        .map_err(|_| cur.unsupported(format!("number out of range '{}'", digits)))
}

fn parse_pattern(cur: &mut Cursor) -> Result<String, Unsupported> {
    let pattern = cur.take_while(|c| !PATTERN_RESERVED.contains(c)).to_string();
    if cur.peek().is_none() {
        return Err(cur.unsupported("unterminated expansion"));
    }
    Ok(pattern)
}
