//! Path queries over JSON response bodies.
//!
//! Two dialects are accepted:
//!
//! - Expressions starting with `$` are standard JSONPath and go to
//!   `jsonpath_lib` as written (`$.labels[*].id`, `$[?(@.id == 'l2')].name`).
//!   No match yields `null`, one match yields the value, several yield an array.
//! - Anything else is the GPath style used by REST test suites: dotted field
//!   names (`prefs.background`), bracketed indices (`labels[0]`, `[-1]` counts
//!   from the end), quoted bracket keys (`['odd key']`) and the `find { ... }` /
//!   `findAll { ... }` closures (`find { it.id == 'l2' }.name`). Each step is
//!   compiled to a JSONPath selector up front; unsupported syntax is rejected
//!   when the path is parsed.
//!
//! A field step applied to an array projects over its elements, so `id` on a
//! list of boards yields the list of board ids. Steps that do not resolve
//! yield `null`: a missing field and an explicit `null` look the same to the
//! caller. An empty path or a bare `$` addresses the whole document.

use crate::error::VerificationUsageError;
use jsonpath_lib::select;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Object member; projects over arrays.
    Field(String),
    Index(i64),
    /// `find` keeps the first match, `findAll` keeps all of them.
    Filter { selector: String, first: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Query {
    JsonPath(String),
    Steps(Vec<Step>),
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    query: Query,
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl JsonPath {
    /// Parse a path expression.
    pub fn parse(raw: &str) -> Result<Self, VerificationUsageError> {
        let invalid = |reason: String| VerificationUsageError::InvalidPath {
            path: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim();
        let query = if trimmed.is_empty() || trimmed == "$" {
            Query::Steps(Vec::new())
        } else if trimmed.starts_with('$') {
            select(&Value::Null, trimmed)
                .map_err(|e| invalid(format!("not a valid JSONPath expression ({:?})", e)))?;
            Query::JsonPath(trimmed.to_string())
        } else {
            Query::Steps(parse_steps(trimmed).map_err(invalid)?)
        };

        Ok(Self {
            raw: raw.to_string(),
            query,
        })
    }

    /// Whether this path addresses the whole document.
    pub fn is_root(&self) -> bool {
        matches!(&self.query, Query::Steps(steps) if steps.is_empty())
    }

    /// Evaluate against `root`, returning `null` for anything that does not resolve.
    pub fn query(&self, root: &Value) -> Value {
        match &self.query {
            Query::JsonPath(expr) => {
                let mut matches = select(root, expr).unwrap_or_default();
                match matches.len() {
                    0 => Value::Null,
                    1 => matches.remove(0).clone(),
                    _ => Value::Array(matches.into_iter().cloned().collect()),
                }
            }
            Query::Steps(steps) => steps
                .iter()
                .fold(root.clone(), |current, step| apply(current, step)),
        }
    }
}

fn parse_steps(body: &str) -> Result<Vec<Step>, String> {
    let chars: Vec<char> = body.chars().collect();
    let mut steps = Vec::new();
    let mut i = 0;
    // True when the next token must be a field name (start, or after a '.').
    let mut expect_field = true;
    let mut after_dot = false;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if expect_field {
                    return Err("empty field name".to_string());
                }
                expect_field = true;
                after_dot = true;
                i += 1;
            }
            '[' => {
                if after_dot {
                    return Err("'[' may not follow '.'".to_string());
                }
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| "unterminated '['".to_string())?;
                let inner: String = chars[i + 1..close].iter().collect();
                steps.push(parse_bracket(&inner)?);
                expect_field = false;
                i = close + 1;
            }
            c @ (']' | '{' | '}') => return Err(format!("unexpected '{}'", c)),
            _ => {
                if !expect_field {
                    return Err("missing '.' between segments".to_string());
                }
                let start = i;
                while i < chars.len() && !matches!(chars[i], '.' | '[' | ']' | '{' | '}') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();

                if i < chars.len() && chars[i] == '{' {
                    let first = match word.trim() {
                        "find" => true,
                        "findAll" => false,
                        other => return Err(format!("unsupported closure '{}'", other)),
                    };
                    let close = matching_brace(&chars, i)?;
                    let condition: String = chars[i + 1..close].iter().collect();
                    steps.push(Step::Filter {
                        selector: filter_selector(&condition)?,
                        first,
                    });
                    i = close + 1;
                } else {
                    if !word.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                        return Err(format!("unsupported syntax '{}'", word));
                    }
                    steps.push(Step::Field(word));
                }
                expect_field = false;
                after_dot = false;
            }
        }
    }

    if after_dot {
        return Err("empty field name".to_string());
    }
    Ok(steps)
}

fn parse_bracket(inner: &str) -> Result<Step, String> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err("empty brackets".to_string());
    }
    for quote in ['\'', '"'] {
        if inner.starts_with(quote) {
            return match inner[1..].strip_suffix(quote) {
                Some(key) if !key.contains('\'') => Ok(Step::Field(key.to_string())),
                Some(_) => Err("quote inside bracket key".to_string()),
                None => Err("unterminated quoted key".to_string()),
            };
        }
    }
    inner
        .parse::<i64>()
        .map(Step::Index)
        .map_err(|_| format!("'{}' is not an index", inner))
}

fn matching_brace(chars: &[char], open: usize) -> Result<usize, String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, c) in chars[open..].iter().enumerate() {
        match (quote, *c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(*c),
            (None, '{') => depth += 1,
            (None, '}') => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + offset);
                }
            }
            _ => {}
        }
    }
    Err("unterminated '{'".to_string())
}

/// Compile a `find`/`findAll` closure body (`it.id == 'l2'`) to a JSONPath filter.
fn filter_selector(condition: &str) -> Result<String, String> {
    let chars: Vec<char> = condition.trim().chars().collect();
    if chars.is_empty() {
        return Err("empty closure".to_string());
    }

    let mut translated = String::new();
    let mut refers_to_it = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            let end = chars[i + 1..]
                .iter()
                .position(|x| *x == c)
                .map(|p| p + i + 1)
                .ok_or_else(|| "unterminated string literal".to_string())?;
            let literal: String = chars[i + 1..end].iter().collect();
            if literal.contains('\'') {
                return Err("quote inside string literal".to_string());
            }
            translated.push('\'');
            translated.push_str(&literal);
            translated.push('\'');
            i = end + 1;
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let is_member = start > 0 && chars[start - 1] == '.';
            match word.as_str() {
                _ if is_member => translated.push_str(&word),
                "it" => {
                    refers_to_it = true;
                    translated.push('@');
                }
                "true" | "false" | "null" => translated.push_str(&word),
                other => return Err(format!("unknown identifier '{}' in closure", other)),
            }
        } else {
            translated.push(c);
            i += 1;
        }
    }
    if !refers_to_it {
        return Err("closure never refers to 'it'".to_string());
    }

    let selector = format!("$[?({})]", translated);
    select(&Value::Array(Vec::new()), &selector)
        .map_err(|_| format!("unsupported closure '{}'", condition.trim()))?;
    Ok(selector)
}

fn first_match(value: &Value, selector: &str) -> Value {
    select(value, selector)
        .ok()
        .and_then(|matches| matches.first().map(|v| (*v).clone()))
        .unwrap_or(Value::Null)
}

fn apply(current: Value, step: &Step) -> Value {
    match (step, current) {
        (Step::Field(_), Value::Array(items)) => {
            Value::Array(items.into_iter().map(|item| apply(item, step)).collect())
        }
        (Step::Field(name), object @ Value::Object(_)) => {
            first_match(&object, &format!("$['{}']", name))
        }
        (Step::Index(index), array @ Value::Array(_)) => {
            let len = array.as_array().map_or(0, Vec::len) as i64;
            let resolved = if *index < 0 { len + index } else { *index };
            if (0..len).contains(&resolved) {
                first_match(&array, &format!("$[{}]", resolved))
            } else {
                Value::Null
            }
        }
        (Step::Filter { selector, first }, array @ Value::Array(_)) => {
            let matches = select(&array, selector).unwrap_or_default();
            if *first {
                matches.first().map(|v| (*v).clone()).unwrap_or(Value::Null)
            } else {
                Value::Array(matches.into_iter().cloned().collect())
            }
        }
        _ => Value::Null,
    }
}

/// Parse `path` and evaluate it against `root`.
pub fn query(root: &Value, path: &str) -> Result<Value, VerificationUsageError> {
    Ok(JsonPath::parse(path)?.query(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn board() -> Value {
        json!({
            "id": "b1",
            "name": "ITI_Project_Board",
            "closed": false,
            "desc": null,
            "prefs": { "background": "blue", "odd key": 1 },
            "labels": [
                { "id": "l1", "name": "urgent", "color": "red" },
                { "id": "l2", "name": "later", "color": "green" }
            ]
        })
    }

    fn lists() -> Value {
        json!([
            { "id": "l1", "name": "Backlog", "idBoard": "b1", "pos": 1 },
            { "id": "l2", "name": "Doing", "idBoard": "b1", "pos": 2 },
            { "id": "l3", "name": "Elsewhere", "idBoard": "b2", "pos": 3 }
        ])
    }

    #[test]
    fn test_root_paths() {
        assert!(JsonPath::parse("").unwrap().is_root());
        assert!(JsonPath::parse("$").unwrap().is_root());
        assert!(!JsonPath::parse("$.name").unwrap().is_root());
        assert_eq!(query(&board(), "$").unwrap(), board());
    }

    #[test]
    fn test_field_and_nested_lookup() {
        let body = board();
        assert_eq!(query(&body, "name").unwrap(), json!("ITI_Project_Board"));
        assert_eq!(query(&body, "prefs.background").unwrap(), json!("blue"));
        assert_eq!(query(&body, "$.prefs.background").unwrap(), json!("blue"));
        assert_eq!(query(&body, "prefs['odd key']").unwrap(), json!(1));
    }

    #[test]
    fn test_indices() {
        let body = board();
        assert_eq!(query(&body, "labels[0].name").unwrap(), json!("urgent"));
        assert_eq!(query(&body, "labels[-1].color").unwrap(), json!("green"));
        assert_eq!(query(&body, "labels[5]").unwrap(), Value::Null);
        assert_eq!(query(&json!([10, 20]), "[1]").unwrap(), json!(20));
    }

    #[test]
    fn test_projection_over_arrays() {
        let body = board();
        assert_eq!(query(&body, "labels.id").unwrap(), json!(["l1", "l2"]));

        let boards = json!([{ "id": "a" }, { "name": "no id" }, { "id": "c" }]);
        assert_eq!(query(&boards, "id").unwrap(), json!(["a", null, "c"]));
    }

    #[test]
    fn test_find_closures() {
        let body = lists();
        assert_eq!(
            query(&body, "find { it.id == 'l2' }.name").unwrap(),
            json!("Doing")
        );
        assert_eq!(
            query(&body, "find { it.id == \"l2\" }.idBoard").unwrap(),
            json!("b1")
        );
        assert_eq!(
            query(&body, "find { it.id == 'missing' }.name").unwrap(),
            Value::Null
        );
        assert_eq!(
            query(&body, "findAll { it.idBoard == 'b1' }.name").unwrap(),
            json!(["Backlog", "Doing"])
        );
        assert_eq!(
            query(&body, "findAll { it.pos > 1 && it.idBoard == 'b1' }.id").unwrap(),
            json!(["l2"])
        );
        assert_eq!(
            query(&board(), "labels.find { it.color == 'red' }.name").unwrap(),
            json!("urgent")
        );
    }

    #[test]
    fn test_standard_jsonpath_expressions() {
        let body = lists();
        assert_eq!(
            query(&body, "$[?(@.id == 'l2')].name").unwrap(),
            json!("Doing")
        );
        assert_eq!(query(&body, "$[*].id").unwrap(), json!(["l1", "l2", "l3"]));
        assert_eq!(query(&body, "$[?(@.id == 'none')]").unwrap(), Value::Null);
    }

    #[test]
    fn test_missing_and_explicit_null_are_indistinguishable() {
        let body = board();
        assert_eq!(query(&body, "desc").unwrap(), Value::Null);
        assert_eq!(query(&body, "nope").unwrap(), Value::Null);
        assert_eq!(query(&body, "name.inner").unwrap(), Value::Null);
    }

    #[test]
    fn test_malformed_paths_are_usage_errors() {
        for bad in [
            "a..b",
            "a.",
            ".a",
            "a[0",
            "a[x]",
            "a]",
            "a[]",
            "a.[0]",
            "a['b]",
            "name with space",
            "find { it.id == 'l2' ",
            "find {}",
            "find { id == 'l2' }",
            "sort { it.id }",
            "find { it.id == 'l2 }",
            "$[?(@.id ==",
        ] {
            let err = JsonPath::parse(bad).expect_err(bad);
            assert!(
                matches!(err, VerificationUsageError::InvalidPath { .. }),
                "{bad}: {err:?}"
            );
        }
    }

    #[test]
    fn test_display_keeps_raw_expression() {
        let path = JsonPath::parse("labels[0].name").unwrap();
        assert_eq!(path.to_string(), "labels[0].name");
    }
}
