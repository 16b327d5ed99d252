// pyliteral.rs
//
// Reader for the Python literal syntax `averecmd --raw` prints.
//
// Handles `None`, `True`, `False`, integers (decimal or `0x`/`0o`/`0b`, with
// a Python 2 `L` suffix; too wide for 64 bits they are kept as text),
// floats, strings (`u`/`b`/`r` prefixes, triple quotes, escapes, adjacent
// concatenation), lists, tuples, dicts and sets. Tuples and sets become
// JSON arrays; dict keys that are not strings are rendered as Python would
// print them.

use serde_json::{Map, Number, Value};
use std::convert::TryFrom;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("{msg} at offset {pos}")]
pub struct LiteralError {
    pub pos: usize,
    pub msg: String,
}

type ParseResult<T> = std::result::Result<T, LiteralError>;

const MAX_DEPTH: usize = 256;

/// Parses exactly one literal spanning the whole of `text` (surrounding whitespace allowed)
pub fn parse(text: &str) -> ParseResult<Value> {
    let mut parser = LiteralParser { chars: text.chars().collect(), pos: 0, depth: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
    /// Open containers around `pos`
    depth: usize,
}

impl LiteralParser {
    fn error(&self, msg: &str) -> LiteralError {
        LiteralError { pos: self.pos, msg: msg.to_string() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().map(char::is_whitespace).unwrap_or(false) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, chr: char) -> ParseResult<()> {
        self.skip_ws();
        if self.peek() == Some(chr) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", chr)))
        }
    }

    fn value(&mut self) -> ParseResult<Value> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(open @ '[') | Some(open @ '(') | Some(open @ '{') => self.container(open),
            Some(c) if c == '\'' || c == '"' || self.at_string_prefix() => self.strings(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.name(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn container(&mut self, open: char) -> ParseResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let ret = match open {
            '[' => self.sequence('[', ']').map(Value::Array),
            '(' => self.tuple(),
            _ => self.dict_or_set(),
        };
        self.depth -= 1;
        ret
    }

    fn at_string_prefix(&self) -> bool {
        let is_prefix = |c: char| matches!(c, 'u' | 'U' | 'b' | 'B' | 'r' | 'R');
        let is_quote = |c: Option<char>| c == Some('\'') || c == Some('"');
        match self.peek() {
            Some(c) if is_prefix(c) => {
                is_quote(self.peek_at(1)) || (self.peek_at(1).map(is_prefix).unwrap_or(false) && is_quote(self.peek_at(2)))
            }
            _ => false,
        }
    }

    fn name(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        while self.peek().map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "None" => Ok(Value::Null),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            _ => {
                self.pos = start;
                Err(self.error(&format!("unknown name '{}'", word)))
            }
        }
    }

    fn number(&mut self) -> ParseResult<Value> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                return self.radix_integer(start, negative, radix);
            }
        }

        let digits_start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => self.pos += 1,
                '.' => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('-') | Some('+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().filter(|c| **c != '_').collect();
        let invalid = |msg: &str| LiteralError { pos: start, msg: format!("{} '{}'", msg, text) };

        if !is_float {
            let digits: String = self.chars[digits_start..self.pos].iter().filter(|c| **c != '_').collect();
            if digits.is_empty() {
                return Err(invalid("invalid number"));
            }
            if digits.len() > 1 && digits.starts_with('0') && digits.chars().any(|c| c != '0') {
                return Err(invalid("leading zeros in decimal integer"));
            }
            // Python 2 long
            if matches!(self.peek(), Some('L') | Some('l')) {
                self.pos += 1;
            }
            let value = digits.parse::<i128>().ok().map(|n| if negative { -n } else { n });
            return Ok(integer_value(value, text.trim_start_matches('+')));
        }

        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("invalid number"))
    }

    /// `0x`/`0o`/`0b` integers; `pos` is just past the prefix
    fn radix_integer(&mut self, start: usize, negative: bool, radix: u32) -> ParseResult<Value> {
        let digits_start = self.pos;
        while self.peek().map(|c| c == '_' || c.is_digit(radix)).unwrap_or(false) {
            self.pos += 1;
        }
        let digits: String = self.chars[digits_start..self.pos].iter().filter(|c| **c != '_').collect();
        let text: String = self.chars[start..self.pos].iter().collect();
        if digits.is_empty() {
            return Err(LiteralError { pos: start, msg: format!("invalid number '{}'", text) });
        }
        if matches!(self.peek(), Some('L') | Some('l')) {
            self.pos += 1;
        }
        let value = i128::from_str_radix(&digits, radix).ok().map(|n| if negative { -n } else { n });
        Ok(integer_value(value, text.trim_start_matches('+')))
    }

    /// One or more adjacent string literals, concatenated
    fn strings(&mut self) -> ParseResult<Value> {
        let mut ret = self.string()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            match self.peek() {
                Some('\'') | Some('"') => ret.push_str(&self.string()?),
                _ if self.at_string_prefix() => ret.push_str(&self.string()?),
                _ => {
                    self.pos = save;
                    break;
                }
            }
        }
        Ok(Value::String(ret))
    }

    fn string(&mut self) -> ParseResult<String> {
        let mut raw = false;
        while let Some(c) = self.peek() {
            match c {
                'r' | 'R' => raw = true,
                'u' | 'U' | 'b' | 'B' => (),
                _ => break,
            }
            self.pos += 1;
        }

        let quote = self.peek().ok_or_else(|| self.error("expected string"))?;
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut ret = String::new();
        loop {
            let c = self.peek().ok_or_else(|| self.error("unterminated string"))?;
            if c == quote {
                if !triple {
                    self.pos += 1;
                    return Ok(ret);
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    return Ok(ret);
                }
                ret.push(c);
                self.pos += 1;
            } else if c == '\\' {
                self.pos += 1;
                let next = self.peek().ok_or_else(|| self.error("unterminated string"))?;
                if raw {
                    ret.push('\\');
                    ret.push(next);
                    self.pos += 1;
                } else {
                    self.escape(&mut ret)?;
                }
            } else if c == '\n' && !triple {
                return Err(self.error("newline in string"));
            } else {
                ret.push(c);
                self.pos += 1;
            }
        }
    }

    /// Called with `pos` on the character after the backslash
    fn escape(&mut self, out: &mut String) -> ParseResult<()> {
        let c = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
        self.pos += 1;
        match c {
            '\n' => (),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                out.push(self.code_point(code)?);
            }
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize) -> ParseResult<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self.peek().and_then(|c| c.to_digit(16)).ok_or_else(|| self.error("truncated hex escape"))?;
            code = code * 16 + d;
            self.pos += 1;
        }
        self.code_point(code)
    }

    fn code_point(&self, code: u32) -> ParseResult<char> {
        std::char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    /// Comma separated values up to `close`, trailing comma allowed.
    /// Returns the items and whether any comma was seen.
    fn items(&mut self, close: char) -> ParseResult<(Vec<Value>, bool)> {
        let mut ret = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((ret, saw_comma));
            }
            ret.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    saw_comma = true;
                    self.pos += 1;
                }
                Some(c) if c == close => (),
                _ => return Err(self.error(&format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> ParseResult<Vec<Value>> {
        self.expect(open)?;
        self.items(close).map(|(items, _)| items)
    }

    fn tuple(&mut self) -> ParseResult<Value> {
        self.expect('(')?;
        let (mut items, saw_comma) = self.items(')')?;
        if items.len() == 1 && !saw_comma {
            // parenthesised expression, not a tuple
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    fn dict_or_set(&mut self) -> ParseResult<Value> {
        self.expect('{')?;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Object(Map::new()));
        }

        let first = self.value()?;
        self.skip_ws();
        if self.peek() != Some(':') {
            // set literal
            let mut items = vec![first];
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => (),
                _ => return Err(self.error("expected ',' or '}'")),
            }
            let (rest, _) = self.items('}')?;
            items.extend(rest);
            return Ok(Value::Array(items));
        }

        let mut map = Map::new();
        let mut key = first;
        loop {
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key_string(key), value);

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.pos += 1;
                        return Ok(Value::Object(map));
                    }
                    key = self.value()?;
                }
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}

/// A JSON number when it fits in 64 bits, otherwise the literal as written
fn integer_value(value: Option<i128>, text: &str) -> Value {
    let number = value.and_then(|n| {
        i64::try_from(n).map(Number::from).ok().or_else(|| u64::try_from(n).map(Number::from).ok())
    });
    match number {
        Some(n) => Value::Number(n),
        None => Value::String(text.to_string()),
    }
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}
