//! Decoder for the literal syntax the live-timing client writes.
//!
//! The producer serialises each event with its language's literal repr, so a
//! line looks like `['TimingData', {'Lines': {'10': {...}}}, '2025-07-05T10:38:19.212Z']`.
//! This is close to JSON but not JSON:
//! - Strings may use single or double quotes, with backslash escapes
//! - Booleans and null are spelled `True`, `False` and `None`
//! - Tuples `( ... )` appear alongside lists
//! - Trailing commas are legal
//!
//! The decoder is a small recursive-descent parser producing [`serde_json::Value`].
//! Dict keys are always stored as strings, with non-string keys rendered the
//! way the producer would print them.

use serde_json::{Map, Number, Value};

use crate::{DrsError, Result};

/// Nesting limit, far above anything the feed produces.
const MAX_DEPTH: usize = 64;

/// Parse one complete literal. Trailing non-whitespace is an error.
pub fn parse_literal(input: &str) -> Result<Value> {
    let mut parser = LiteralParser { input, pos: 0, depth: 0 };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos != input.len() {
        return Err(parser.error("trailing characters after literal"));
    }
    Ok(value)
}

struct LiteralParser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn error(&self, details: impl Into<String>) -> DrsError {
        DrsError::malformed(self.pos, details)
    }

    fn expect(&mut self, wanted: char) -> Result<()> {
        match self.bump() {
            Some(ch) if ch == wanted => Ok(()),
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", wanted, ch))),
            None => Err(self.error(format!("expected '{}', found end of line", wanted))),
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.sequence('[', ']'),
            Some('(') => self.sequence('(', ')'),
            Some('{') => self.mapping(),
            Some('\'') | Some('"') => self.string().map(Value::String),
            Some(ch) if ch == '-' || ch == '+' || ch == '.' || ch.is_ascii_digit() => self.number(),
            Some(ch) if ch.is_ascii_alphabetic() => self.keyword(),
            Some(ch) => Err(self.error(format!("unexpected character '{}'", ch))),
            None => Err(self.error("unexpected end of line")),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        Ok(())
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value> {
        self.enter()?;
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.bump();
                break;
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(ch) if ch == close => break,
                Some(ch) => {
                    return Err(self.error(format!("expected ',' or '{}', found '{}'", close, ch)));
                }
                None => return Err(self.error("unterminated sequence")),
            }
        }
        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn mapping(&mut self) -> Result<Value> {
        self.enter()?;
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.bump();
                break;
            }
            let key = self.key()?;
            self.skip_whitespace();
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(ch) => return Err(self.error(format!("expected ',' or '}}', found '{}'", ch))),
                None => return Err(self.error("unterminated mapping")),
            }
        }
        self.depth -= 1;
        Ok(Value::Object(map))
    }

    fn key(&mut self) -> Result<String> {
        match self.value()? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(true) => Ok("True".to_string()),
            Value::Bool(false) => Ok("False".to_string()),
            Value::Null => Ok("None".to_string()),
            Value::Array(_) | Value::Object(_) => Err(self.error("unhashable mapping key")),
        }
    }

    fn keyword(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !(ch.is_ascii_alphanumeric() || ch == '_') {
                break;
            }
            self.pos += 1;
        }
        match &self.input[start..self.pos] {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            other => Err(DrsError::malformed(start, format!("unknown name '{}'", other))),
        }
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    // Exponent sign
                    if matches!(self.input[self.pos + 1..].chars().next(), Some('-') | Some('+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        let text: String = self.input[start..self.pos].chars().filter(|&c| c != '_').collect();
        let invalid = || DrsError::malformed(start, format!("invalid number '{}'", &text));

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        let float: f64 = text.parse().map_err(|_| invalid())?;
        Number::from_f64(float).map(Value::Number).ok_or_else(invalid)
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(DrsError::malformed(start, "unterminated string")),
                Some(ch) if ch == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(ch) => out.push(ch),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<()> {
        let ch = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
        match ch {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            '\n' => {}
            'x' => out.push(self.hex_char(2)?),
            'u' => out.push(self.hex_char(4)?),
            'U' => out.push(self.hex_char(8)?),
            // Unknown escapes keep their backslash
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize) -> Result<char> {
        let start = self.pos;
        let end = start + digits;
        let hex = self
            .input
            .get(start..end)
            .ok_or_else(|| self.error("truncated hex escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| DrsError::malformed(start, "invalid code point"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_nested_structures() {
        let value = parse_literal(
            "{'Lines': {'10': {'NumberOfLaps': 3, 'Speeds': {'FL': {'Value': '250'}}, \
             'LastLapTime': {'Value': '1:28.552', 'OverallFastest': True}}}}",
        )
        .unwrap();

        assert_eq!(
            value,
            json!({"Lines": {"10": {
                "NumberOfLaps": 3,
                "Speeds": {"FL": {"Value": "250"}},
                "LastLapTime": {"Value": "1:28.552", "OverallFastest": true}
            }}})
        );
    }

    #[test]
    fn decodes_keywords_and_numbers() {
        let value = parse_literal("[True, False, None, -4, 2.5, 1e3, (1, 2,)]").unwrap();
        assert_eq!(value, json!([true, false, null, -4, 2.5, 1000.0, [1, 2]]));
    }

    #[test]
    fn decodes_both_quote_styles_and_escapes() {
        let value = parse_literal(r#"["it's", 'say \'hi\'', 'tab\there', '\x41é']"#).unwrap();
        assert_eq!(value, json!(["it's", "say 'hi'", "tab\there", "Aé"]));
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let value = parse_literal("{1: 'a', True: 'b', None: 'c'}").unwrap();
        assert_eq!(value, json!({"1": "a", "True": "b", "None": "c"}));
    }

    #[test]
    fn rejects_malformed_input() {
        let malformed =
            ["", "[1, 2", "{'a' 1}", "['a'] trailing", "'open", "[undefined]", "{[1]: 2}"];
        for input in malformed {
            let result = parse_literal(input);
            assert!(
                matches!(result, Err(DrsError::MalformedEvent { .. })),
                "{input:?} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn depth_is_bounded() {
        let input = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert!(parse_literal(&input).is_err());
    }
}
