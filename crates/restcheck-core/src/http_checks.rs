//! Response-shaped checks: status, timing, headers and path-addressed body fields.

use serde_json::Value;

use crate::engine::VerificationEngine;
use crate::error::{Result, VerificationUsageError};
use crate::matcher::Matcher;
use crate::response::HttpResponse;

fn with_path(message: &str, path: &str) -> String {
    format!("{} [JSON path: {}]", message, path)
}

/// Render a JSON value as text the way a string getter would: strings bare,
/// scalars by display, containers as compact JSON, `null` as absent.
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl VerificationEngine {
    fn query<R: HttpResponse + ?Sized>(
        &self,
        step: &str,
        message: &str,
        response: &R,
        path: &str,
    ) -> Result<Value> {
        response
            .json_path(path)
            .map_err(|err| self.broken(step.to_string(), message, err))
    }

    /// Resolve `path` to an array; `None` when it resolves to `null`.
    fn query_array<R: HttpResponse + ?Sized>(
        &self,
        step: &str,
        message: &str,
        response: &R,
        path: &str,
    ) -> Result<Option<Vec<Value>>> {
        match self.query(step, message, response, path)? {
            Value::Null => Ok(None),
            Value::Array(items) => Ok(Some(items)),
            other => Err(self.broken(
                step.to_string(),
                message,
                VerificationUsageError::IncompatibleValue {
                    path: path.to_string(),
                    expected: "an array".to_string(),
                    found: kind_of(&other).to_string(),
                },
            )),
        }
    }

    pub fn verify_status_code<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        expected: u16,
    ) -> Result<()> {
        let actual = response.status_code();
        self.conclude(
            format!("Verify Status Code is {}", expected),
            message,
            actual == expected,
            || actual.to_string(),
            || expected.to_string(),
        )
    }

    /// Passes when the elapsed time is at most `max_ms`; the bound itself passes.
    pub fn verify_response_time_less_than_or_equal<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        max_ms: u64,
    ) -> Result<()> {
        let actual = response.time_ms();
        self.conclude(
            format!("Verify Response Time is less than {} ms", max_ms),
            message,
            actual <= max_ms,
            || format!("{} ms", actual),
            || format!("a value less than or equal to {} ms", max_ms),
        )
    }

    pub fn verify_header_exists<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        name: &str,
    ) -> Result<()> {
        let present = response.has_header(name);
        self.conclude(
            format!("Verify Header Exists: header [{}]", name),
            message,
            present,
            || present.to_string(),
            || "is true".to_string(),
        )
    }

    pub fn verify_header_equals<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        name: &str,
        expected: &str,
    ) -> Result<()> {
        let actual = response.header(name);
        self.conclude_with(
            format!(
                "Verify Header Equals: expected [{}] for header [{}]",
                expected, name
            ),
            message,
            &format!("{} [Header: {}]", message, name),
            actual == Some(expected),
            || match actual {
                Some(v) => format!("{:?}", v),
                None => "null".to_string(),
            },
            || format!("{:?}", expected),
        )
    }

    /// Passes when the path resolves to a non-null value.
    ///
    /// A path that does not resolve and a path holding an explicit `null`
    /// both fail here.
    pub fn verify_json_field_exists<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
    ) -> Result<()> {
        let step = format!("Verify JSON Field Exists: field at path [{}]", path);
        let actual = self.query(&step, message, response, path)?;
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            !actual.is_null(),
            || actual.to_string(),
            || "not null".to_string(),
        )
    }

    /// Passes when the path resolves to `null`, including when it does not
    /// resolve at all.
    pub fn verify_json_field_not_exists<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
    ) -> Result<()> {
        let step = format!("Verify JSON Field Not Exists: field at path [{}]", path);
        let actual = self.query(&step, message, response, path)?;
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            actual.is_null(),
            || actual.to_string(),
            || "null".to_string(),
        )
    }

    pub fn verify_json_field_matches<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
        matcher: &Matcher<Value>,
    ) -> Result<()> {
        let step = format!("Verify JSON Field Matches Condition at path [{}]", path);
        let actual = self.query(&step, message, response, path)?;
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            matcher.matches(&actual),
            || actual.to_string(),
            || matcher.describe().to_string(),
        )
    }

    pub fn verify_json_field_in<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
        expected_values: &[Value],
    ) -> Result<()> {
        let rendered = Value::Array(expected_values.to_vec()).to_string();
        let step = format!(
            "Verify JSON Field In: expected values [{}] at path [{}]",
            rendered, path
        );
        let actual = self.query(&step, message, response, path)?;
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            expected_values.contains(&actual),
            || actual.to_string(),
            || format!("one of {}", rendered),
        )
    }

    pub fn verify_json_field_equals<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
        expected: impl Into<Value>,
    ) -> Result<()> {
        let expected = expected.into();
        let step = format!(
            "Verify JSON Field Equals: expected [{}] at path [{}]",
            expected, path
        );
        let actual = self.query(&step, message, response, path)?;
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            actual == expected,
            || actual.to_string(),
            || expected.to_string(),
        )
    }

    /// The field is read as text first; a `null` field contains nothing.
    pub fn verify_json_field_contains<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
        substring: &str,
    ) -> Result<()> {
        let step = format!(
            "Verify JSON Field Contains: expected substring [{}] at path [{}]",
            substring, path
        );
        let actual = value_as_text(&self.query(&step, message, response, path)?);
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            actual.as_deref().is_some_and(|s| s.contains(substring)),
            || match &actual {
                Some(s) => format!("{:?}", s),
                None => "null".to_string(),
            },
            || format!("a string containing {:?}", substring),
        )
    }

    /// A `null` result fails; a non-array result is a usage error.
    pub fn verify_json_array_contains<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
        item: impl Into<Value>,
    ) -> Result<()> {
        let item = item.into();
        let step = format!(
            "Verify JSON Array Contains: expected item [{}] at path [{}]",
            item, path
        );
        let list = self.query_array(&step, message, response, path)?;
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            list.as_ref().is_some_and(|items| items.contains(&item)),
            || render_list(&list),
            || format!("a collection containing {}", item),
        )
    }

    pub fn verify_json_array_size<R: HttpResponse + ?Sized>(
        &self,
        message: &str,
        response: &R,
        path: &str,
        expected_size: usize,
    ) -> Result<()> {
        let step = format!(
            "Verify JSON Array Size: expected size [{}] at path [{}]",
            expected_size, path
        );
        let list = self.query_array(&step, message, response, path)?;
        self.conclude_with(
            step,
            message,
            &with_path(message, path),
            list.as_ref().is_some_and(|items| items.len() == expected_size),
            || render_list(&list),
            || format!("a collection with size {}", expected_size),
        )
    }
}

fn render_list(list: &Option<Vec<Value>>) -> String {
    match list {
        Some(items) => Value::Array(items.clone()).to_string(),
        None => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VerificationError;
    use crate::fakes::{MemoryLogSink, MemoryStepRecorder};
    use crate::matcher::json;
    use crate::response::RecordedResponse;
    use crate::sink::StepStatus;
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> (VerificationEngine, Arc<MemoryLogSink>, Arc<MemoryStepRecorder>) {
        let log = Arc::new(MemoryLogSink::new());
        let steps = Arc::new(MemoryStepRecorder::new());
        (
            VerificationEngine::new(log.clone(), steps.clone()),
            log,
            steps,
        )
    }

    fn card() -> RecordedResponse {
        RecordedResponse::new(200)
            .with_time_ms(3000)
            .with_header("Content-Type", "application/json")
            .with_json(json!({
                "id": "c1",
                "name": "Card",
                "desc": null,
                "pos": 16384,
                "idLabels": ["l1", "l2"],
                "badges": { "comments": 0 }
            }))
    }

    #[test]
    fn test_status_code() {
        let (engine, _, _) = engine();
        engine.verify_status_code("200", &card(), 200).unwrap();
        let err = engine.verify_status_code("404", &card(), 404).unwrap_err();
        let f = err.as_failure().unwrap();
        assert_eq!(f.actual, "200");
        assert_eq!(f.expected, "404");
    }

    #[test]
    fn test_response_time_bound_is_inclusive() {
        let (engine, _, _) = engine();
        let resp = card();
        engine
            .verify_response_time_less_than_or_equal("fast", &resp, 3000)
            .unwrap();
        assert!(engine
            .verify_response_time_less_than_or_equal("fast", &resp, 2999)
            .is_err());
        let slow = card().with_time_ms(3001);
        assert!(engine
            .verify_response_time_less_than_or_equal("fast", &slow, 3000)
            .is_err());
    }

    #[test]
    fn test_headers() {
        let (engine, _, _) = engine();
        let resp = card();
        engine.verify_header_exists("ct", &resp, "content-type").unwrap();
        assert!(engine.verify_header_exists("x", &resp, "X-Nope").is_err());
        engine
            .verify_header_equals("ct", &resp, "Content-Type", "application/json")
            .unwrap();
        let err = engine
            .verify_header_equals("ct", &resp, "Content-Type", "text/plain")
            .unwrap_err();
        let f = err.as_failure().unwrap();
        assert_eq!(f.message, "ct [Header: Content-Type]");
        assert_eq!(f.actual, "\"application/json\"");
    }

    #[test]
    fn test_field_exists_cannot_tell_missing_from_null() {
        let (engine, _, _) = engine();
        let resp = card();
        engine.verify_json_field_exists("id", &resp, "id").unwrap();

        // An explicit null and an absent field both count as "not existing".
        let explicit_null = engine.verify_json_field_exists("desc", &resp, "desc");
        let absent = engine.verify_json_field_exists("nope", &resp, "nope");
        assert!(explicit_null.unwrap_err().is_failure());
        assert!(absent.unwrap_err().is_failure());

        engine.verify_json_field_not_exists("desc", &resp, "desc").unwrap();
        engine.verify_json_field_not_exists("nope", &resp, "nope").unwrap();
        assert!(engine.verify_json_field_not_exists("id", &resp, "id").is_err());
    }

    #[test]
    fn test_field_matches_in_and_equals() {
        let (engine, _, _) = engine();
        let resp = card();
        engine
            .verify_json_field_matches("pos", &resp, "pos", &json::is_number())
            .unwrap();
        engine
            .verify_json_field_in("name", &resp, "name", &[json!("Card"), json!("Other")])
            .unwrap();
        assert!(engine
            .verify_json_field_in("name", &resp, "name", &[json!("Other")])
            .is_err());
        engine
            .verify_json_field_equals("comments", &resp, "badges.comments", 0)
            .unwrap();

        let err = engine
            .verify_json_field_equals("name", &resp, "name", "Y")
            .unwrap_err();
        let f = err.as_failure().unwrap();
        assert_eq!(f.message, "name [JSON path: name]");
        assert_eq!(f.actual, "\"Card\"");
        assert_eq!(f.expected, "\"Y\"");
    }

    #[test]
    fn test_field_contains_reads_text() {
        let (engine, _, _) = engine();
        let resp = card();
        engine.verify_json_field_contains("name", &resp, "name", "ar").unwrap();
        engine.verify_json_field_contains("pos", &resp, "pos", "163").unwrap();
        let err = engine
            .verify_json_field_contains("desc", &resp, "desc", "x")
            .unwrap_err();
        assert_eq!(err.as_failure().unwrap().actual, "null");
    }

    #[test]
    fn test_array_checks() {
        let (engine, _, _) = engine();
        let resp = card();
        engine
            .verify_json_array_contains("labels", &resp, "idLabels", "l2")
            .unwrap();
        engine
            .verify_json_array_size("labels", &resp, "idLabels", 2)
            .unwrap();
        assert!(engine
            .verify_json_array_size("labels", &resp, "idLabels", 3)
            .unwrap_err()
            .is_failure());
        assert!(engine
            .verify_json_array_contains("missing", &resp, "nope", "l1")
            .unwrap_err()
            .is_failure());
    }

    #[test]
    fn test_usage_errors_are_logged_as_broken() {
        let (engine, log, steps) = engine();
        let resp = card();

        let err = engine
            .verify_json_array_size("name", &resp, "name", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            VerificationError::Usage(VerificationUsageError::IncompatibleValue { .. })
        ));

        let err = engine
            .verify_json_field_equals("bad", &resp, "a..b", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            VerificationError::Usage(VerificationUsageError::InvalidPath { .. })
        ));

        assert_eq!(log.len(), 2);
        assert!(log.lines()[0].starts_with("Assertion Broken: name"));
        assert!(steps.steps().iter().all(|s| s.status == StepStatus::Broken));
    }

    #[test]
    fn test_one_log_and_step_per_check() {
        let (engine, log, steps) = engine();
        let resp = card();
        let _ = engine.verify_status_code("a", &resp, 200);
        let _ = engine.verify_status_code("b", &resp, 500);
        let _ = engine.verify_json_field_exists("c", &resp, "id");
        let _ = engine.verify_json_field_exists("d", &resp, "nope");
        assert_eq!(log.len(), 4);
        assert_eq!(steps.steps().len(), 4);
        // The path suffix only decorates failures.
        assert_eq!(log.lines()[2], "Assertion Passed: c");
        assert!(log.lines()[3].starts_with("Assertion Failed: d [JSON path: nope]"));
    }
}
