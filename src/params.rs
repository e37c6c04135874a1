//! Module parameter cells.
//!
//! The evaluator writes each module's parameters as a Python literal
//! mapping, e.g. `{'top_k': 3, 'llm': 'openai', 'batch': {'size': 8}}`.
//! This module turns those cells into a nested [`serde_json::Value`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Parameters of one evaluated module configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModuleParams {
    /// Successfully parsed nested structure.
    Parsed(Value),
    /// Cell that could not be parsed; kept verbatim for display.
    Raw(String),
}

impl Default for ModuleParams {
    fn default() -> Self {
        ModuleParams::Parsed(Value::Object(Map::new()))
    }
}

impl ModuleParams {
    /// Parse a `module_params` cell. Empty and `nan` cells become an empty mapping.
    pub fn parse(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Self::default();
        }

        let mut parser = LiteralParser::new(trimmed);
        match parser.parse_value() {
            Some(value) if parser.at_end() => ModuleParams::Parsed(value),
            _ => ModuleParams::Raw(cell.to_string()),
        }
    }

    /// The parsed structure, if the cell was understood.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ModuleParams::Parsed(value) => Some(value),
            ModuleParams::Raw(_) => None,
        }
    }

    /// Look up a top-level parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_value().and_then(|v| v.get(key))
    }

    /// Render as Markdown: nested maps become headings, leaves become bullets.
    pub fn to_markdown(&self, level: usize) -> String {
        match self {
            ModuleParams::Parsed(Value::Object(map)) => map_to_markdown(map, level),
            ModuleParams::Parsed(other) => format!("{}\n", display_value(other)),
            ModuleParams::Raw(raw) => format!("{}\n", raw),
        }
    }
}

fn map_to_markdown(map: &Map<String, Value>, level: usize) -> String {
    let mut result = String::new();
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                result.push_str(&format!("{} {}\n\n", "#".repeat(level), key));
                result.push_str(&map_to_markdown(inner, level + 1));
            }
            other => {
                result.push_str(&format!("- **{}**: {}\n", key, display_value(other)));
            }
        }
    }
    result
}

/// Display a leaf value without JSON quoting for plain strings.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Recursive-descent parser for the Python literal subset the evaluator emits.
struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_whitespace();
        match self.peek()? {
            '{' => self.parse_brace(),
            '[' => {
                self.pos += 1;
                self.parse_sequence(']')
            }
            '(' => {
                self.pos += 1;
                self.parse_sequence(')')
            }
            '\'' | '"' => self.parse_string().map(Value::String),
            _ => self.parse_atom(),
        }
    }

    /// `{...}` is either a dict or a set; the first separator decides.
    fn parse_brace(&mut self) -> Option<Value> {
        self.pos += 1;
        if self.eat('}') {
            return Some(Value::Object(Map::new()));
        }

        let first = self.parse_value()?;
        if self.eat(':') {
            let mut map = Map::new();
            let value = self.parse_value()?;
            map.insert(key_string(&first), value);
            loop {
                if self.eat('}') {
                    return Some(Value::Object(map));
                }
                if !self.eat(',') {
                    return None;
                }
                if self.eat('}') {
                    return Some(Value::Object(map));
                }
                let key = self.parse_value()?;
                if !self.eat(':') {
                    return None;
                }
                let value = self.parse_value()?;
                map.insert(key_string(&key), value);
            }
        }

        let mut items = vec![first];
        self.finish_sequence(&mut items, '}')?;
        Some(Value::Array(items))
    }

    fn parse_sequence(&mut self, close: char) -> Option<Value> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Some(Value::Array(items));
        }
        items.push(self.parse_value()?);
        self.finish_sequence(&mut items, close)?;
        Some(Value::Array(items))
    }

    fn finish_sequence(&mut self, items: &mut Vec<Value>, close: char) -> Option<()> {
        loop {
            if self.eat(close) {
                return Some(());
            }
            if !self.eat(',') {
                return None;
            }
            if self.eat(close) {
                return Some(());
            }
            items.push(self.parse_value()?);
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = self.peek()?;
                    self.pos += 1;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn parse_atom(&mut self) -> Option<Value> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
        {
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();

        match token.as_str() {
            "" => None,
            "True" => Some(Value::Bool(true)),
            "False" => Some(Value::Bool(false)),
            "None" | "nan" | "NaN" => Some(Value::Null),
            _ => {
                if let Ok(int) = token.parse::<i64>() {
                    Some(Value::Number(int.into()))
                } else if let Ok(float) = token.parse::<f64>() {
                    Some(Number::from_f64(float).map_or(Value::Null, Value::Number))
                } else {
                    None
                }
            }
        }
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => display_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_mapping() {
        let params =
            ModuleParams::parse("{'top_k': 3, 'llm': 'openai', 'batch': {'size': 8, 'fast': True}}");
        assert_eq!(
            params.as_value(),
            Some(&json!({"top_k": 3, "llm": "openai", "batch": {"size": 8, "fast": true}}))
        );
        assert_eq!(params.get("top_k"), Some(&json!(3)));
    }

    #[test]
    fn test_parse_sequences_and_none() {
        let params = ModuleParams::parse(r#"{"models": ['a', "b"], "pair": (1, 2.5), "x": None}"#);
        assert_eq!(
            params.as_value(),
            Some(&json!({"models": ["a", "b"], "pair": [1, 2.5], "x": null}))
        );
    }

    #[test]
    fn test_parse_escaped_quote() {
        let params = ModuleParams::parse(r"{'prompt': 'it\'s fine'}");
        assert_eq!(params.get("prompt"), Some(&json!("it's fine")));
    }

    #[test]
    fn test_empty_and_nan_cells() {
        assert_eq!(ModuleParams::parse(""), ModuleParams::default());
        assert_eq!(ModuleParams::parse("nan"), ModuleParams::default());
    }

    #[test]
    fn test_unparsable_cell_kept_raw() {
        let params = ModuleParams::parse("{'broken': ");
        assert_eq!(params, ModuleParams::Raw("{'broken': ".to_string()));
        assert_eq!(params.to_markdown(1), "{'broken': \n");
    }

    #[test]
    fn test_markdown_nests_headings() {
        let params = ModuleParams::parse("{'top_k': 3, 'batch': {'size': 8}}");
        assert_eq!(
            params.to_markdown(4),
            "- **top_k**: 3\n#### batch\n\n- **size**: 8\n"
        );
    }
}
