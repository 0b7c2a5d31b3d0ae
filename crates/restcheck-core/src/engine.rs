//! The check catalogue.
//!
//! Every check takes a human-readable message plus the values to compare and
//! writes exactly one log line and one step entry. A passing check logs
//! `Assertion Passed: {message}`; a failing one returns
//! [`VerificationError::Failure`] carrying the message and both renderings.
//! Errors are never swallowed here: callers propagate them with `?` and the
//! host runner marks the test failed.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Result, VerificationError, VerificationFailure, VerificationUsageError};
use crate::matcher::{first_mismatch, Matcher};
use crate::sink::{LogSink, Step, StepRecorder, StepStatus, TracingLogSink, TracingStepRecorder};

/// Stateless verification service bound to a log sink and a step recorder.
///
/// Cloning is cheap; each clone writes to the same sinks. Build one engine per
/// test context when log lines must be attributed to a specific test.
#[derive(Clone)]
pub struct VerificationEngine {
    log: Arc<dyn LogSink>,
    steps: Arc<dyn StepRecorder>,
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogSink), Arc::new(TracingStepRecorder))
    }
}

impl std::fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationEngine").finish_non_exhaustive()
    }
}

impl VerificationEngine {
    pub fn new(log: Arc<dyn LogSink>, steps: Arc<dyn StepRecorder>) -> Self {
        Self { log, steps }
    }

    /// Record the outcome of one check.
    pub(crate) fn conclude(
        &self,
        step: String,
        message: &str,
        passed: bool,
        actual: impl FnOnce() -> String,
        expected: impl FnOnce() -> String,
    ) -> Result<()> {
        self.conclude_with(step, message, message, passed, actual, expected)
    }

    /// Like [`conclude`](Self::conclude), with a more specific message for the
    /// failure (e.g. naming the header or path) than for the pass log line.
    pub(crate) fn conclude_with(
        &self,
        step: String,
        message: &str,
        failure_message: &str,
        passed: bool,
        actual: impl FnOnce() -> String,
        expected: impl FnOnce() -> String,
    ) -> Result<()> {
        if passed {
            self.steps.step(Step::new(step, StepStatus::Passed));
            self.log.info(&format!("Assertion Passed: {}", message));
            return Ok(());
        }

        let failure = VerificationFailure::new(failure_message, actual(), expected());
        self.steps.step(Step::new(step, StepStatus::Failed));
        self.log.info(&format!(
            "Assertion Failed: {} [expected: {}, actual: {}]",
            failure.message, failure.expected, failure.actual
        ));
        Err(failure.into())
    }

    /// Record a check that could not be evaluated.
    pub(crate) fn broken(
        &self,
        step: String,
        message: &str,
        err: VerificationUsageError,
    ) -> VerificationError {
        self.steps.step(Step::new(step, StepStatus::Broken));
        self.log
            .info(&format!("Assertion Broken: {}: {}", message, err));
        err.into()
    }

    // ---------------- Core checks ----------------

    pub fn verify_equals<A, E>(&self, message: &str, actual: A, expected: E) -> Result<()>
    where
        A: PartialEq<E> + Debug,
        E: Debug,
    {
        self.conclude(
            format!(
                "Verify Equals: actual [{:?}] , expected [{:?}]",
                actual, expected
            ),
            message,
            actual == expected,
            || format!("{:?}", actual),
            || format!("{:?}", expected),
        )
    }

    pub fn verify_not_equals<A, E>(&self, message: &str, actual: A, expected: E) -> Result<()>
    where
        A: PartialEq<E> + Debug,
        E: Debug,
    {
        self.conclude(
            format!(
                "Verify Not Equals: actual [{:?}] , expected [{:?}]",
                actual, expected
            ),
            message,
            actual != expected,
            || format!("{:?}", actual),
            || format!("not {:?}", expected),
        )
    }

    pub fn verify_greater_than<T>(&self, message: &str, actual: T, expected: T) -> Result<()>
    where
        T: PartialOrd + Debug,
    {
        self.conclude(
            format!(
                "Verify Greater Than: actual [{:?}] , expected [{:?}]",
                actual, expected
            ),
            message,
            actual > expected,
            || format!("{:?}", actual),
            || format!("a value greater than {:?}", expected),
        )
    }

    pub fn verify_greater_than_or_equal<T>(
        &self,
        message: &str,
        actual: T,
        expected: T,
    ) -> Result<()>
    where
        T: PartialOrd + Debug,
    {
        self.conclude(
            format!(
                "Verify greater than or equal: actual [{:?}] , expected [{:?}]",
                actual, expected
            ),
            message,
            actual >= expected,
            || format!("{:?}", actual),
            || format!("a value equal to or greater than {:?}", expected),
        )
    }

    pub fn verify_less_than<T>(&self, message: &str, actual: T, expected: T) -> Result<()>
    where
        T: PartialOrd + Debug,
    {
        self.conclude(
            format!(
                "Verify Less Than: actual [{:?}] , expected [{:?}]",
                actual, expected
            ),
            message,
            actual < expected,
            || format!("{:?}", actual),
            || format!("a value less than {:?}", expected),
        )
    }

    pub fn verify_less_than_or_equal<T>(&self, message: &str, actual: T, expected: T) -> Result<()>
    where
        T: PartialOrd + Debug,
    {
        self.conclude(
            format!(
                "Verify less than or equal: actual [{:?}] , expected [{:?}]",
                actual, expected
            ),
            message,
            actual <= expected,
            || format!("{:?}", actual),
            || format!("a value less than or equal to {:?}", expected),
        )
    }

    pub fn verify_is_null<T: Debug>(&self, message: &str, actual: Option<T>) -> Result<()> {
        self.conclude(
            format!("Verify Is Null: actual [{}]", render_option(&actual)),
            message,
            actual.is_none(),
            || render_option(&actual),
            || "null".to_string(),
        )
    }

    pub fn verify_is_not_null<T: Debug>(&self, message: &str, actual: Option<T>) -> Result<()> {
        self.conclude(
            format!("Verify Is Not Null: actual [{}]", render_option(&actual)),
            message,
            actual.is_some(),
            || render_option(&actual),
            || "not null".to_string(),
        )
    }

    pub fn verify_true(&self, message: &str, condition: bool) -> Result<()> {
        self.conclude(
            "Verify condition Is True".to_string(),
            message,
            condition,
            || condition.to_string(),
            || "is true".to_string(),
        )
    }

    pub fn verify_false(&self, message: &str, condition: bool) -> Result<()> {
        self.conclude(
            "Verify condition Is False".to_string(),
            message,
            !condition,
            || condition.to_string(),
            || "is false".to_string(),
        )
    }

    pub fn verify_contains(&self, message: &str, actual: &str, substring: &str) -> Result<()> {
        self.conclude(
            format!(
                "Verify String Contains: actual [{}] , expected substring [{}]",
                actual, substring
            ),
            message,
            actual.contains(substring),
            || format!("{:?}", actual),
            || format!("a string containing {:?}", substring),
        )
    }

    pub fn verify_starts_with(&self, message: &str, actual: &str, prefix: &str) -> Result<()> {
        self.conclude(
            format!(
                "Verify String Starts With: actual [{}] , expected prefix [{}]",
                actual, prefix
            ),
            message,
            actual.starts_with(prefix),
            || format!("{:?}", actual),
            || format!("a string starting with {:?}", prefix),
        )
    }

    pub fn verify_ends_with(&self, message: &str, actual: &str, suffix: &str) -> Result<()> {
        self.conclude(
            format!(
                "Verify String Ends With: actual [{}] , expected suffix [{}]",
                actual, suffix
            ),
            message,
            actual.ends_with(suffix),
            || format!("{:?}", actual),
            || format!("a string ending with {:?}", suffix),
        )
    }

    pub fn verify_list_has_item<T>(&self, message: &str, list: &[T], item: &T) -> Result<()>
    where
        T: PartialEq + Debug,
    {
        self.conclude(
            format!("Verify List Has Item: item [{:?}] in list", item),
            message,
            list.contains(item),
            || format!("{:?}", list),
            || format!("a collection containing {:?}", item),
        )
    }

    /// Works with any map whose reference iterates `(&K, &V)` pairs.
    pub fn verify_map_has_key<'a, M, K, V>(&self, message: &str, map: M, key: &K) -> Result<()>
    where
        M: IntoIterator<Item = (&'a K, &'a V)>,
        K: PartialEq + Debug + 'a,
        V: Debug + 'a,
    {
        let entries: Vec<(&K, &V)> = map.into_iter().collect();
        self.conclude(
            format!("Verify Map Has Key: key [{:?}] in map", key),
            message,
            entries.iter().any(|(k, _)| *k == key),
            || render_entries(&entries),
            || format!("map containing [{:?}->ANYTHING]", key),
        )
    }

    pub fn verify_map_has_value<'a, M, K, V>(
        &self,
        message: &str,
        map: M,
        value: &V,
    ) -> Result<()>
    where
        M: IntoIterator<Item = (&'a K, &'a V)>,
        K: Debug + 'a,
        V: PartialEq + Debug + 'a,
    {
        let entries: Vec<(&K, &V)> = map.into_iter().collect();
        self.conclude(
            format!("Verify Map Has Value: value [{:?}] in map", value),
            message,
            entries.iter().any(|(_, v)| *v == value),
            || render_entries(&entries),
            || format!("map containing [ANYTHING->{:?}]", value),
        )
    }

    pub fn verify_map_contains_entry<'a, M, K, V>(
        &self,
        message: &str,
        map: M,
        key: &K,
        value: &V,
    ) -> Result<()>
    where
        M: IntoIterator<Item = (&'a K, &'a V)>,
        K: PartialEq + Debug + 'a,
        V: PartialEq + Debug + 'a,
    {
        let entries: Vec<(&K, &V)> = map.into_iter().collect();
        self.conclude(
            format!("Verify Map Contains Entry: entry [{:?}={:?}] in map", key, value),
            message,
            entries.iter().any(|(k, v)| *k == key && *v == value),
            || render_entries(&entries),
            || format!("map containing [{:?}->{:?}]", key, value),
        )
    }

    /// Check `actual` against a single matcher.
    pub fn verify_that<T>(&self, message: &str, actual: &T, matcher: &Matcher<T>) -> Result<()>
    where
        T: Debug + ?Sized,
    {
        self.conclude(
            format!("Verify That: actual [{:?}] is {}", actual, matcher),
            message,
            matcher.matches(actual),
            || format!("{:?}", actual),
            || matcher.describe().to_string(),
        )
    }

    /// All matchers must hold; evaluation stops at the first that fails,
    /// whose description becomes the expected rendering.
    pub fn verify_all<T>(&self, message: &str, actual: &T, matchers: &[Matcher<T>]) -> Result<()>
    where
        T: Debug + ?Sized,
    {
        let failing = first_mismatch(matchers, actual);
        self.conclude(
            "Verify All Conditions".to_string(),
            message,
            failing.is_none(),
            || format!("{:?}", actual),
            || {
                failing
                    .map(|m| m.describe().to_string())
                    .unwrap_or_default()
            },
        )
    }
}

fn render_option<T: Debug>(value: &Option<T>) -> String {
    match value {
        Some(v) => format!("{:?}", v),
        None => "null".to_string(),
    }
}

fn render_entries<K: Debug, V: Debug>(entries: &[(&K, &V)]) -> String {
    let parts: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{:?}={:?}", k, v))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryLogSink, MemoryStepRecorder};
    use crate::matcher::{equal_to, greater_than, less_than, not, starts_with, Matcher};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> (VerificationEngine, Arc<MemoryLogSink>, Arc<MemoryStepRecorder>) {
        let log = Arc::new(MemoryLogSink::new());
        let steps = Arc::new(MemoryStepRecorder::new());
        let engine = VerificationEngine::new(log.clone(), steps.clone());
        (engine, log, steps)
    }

    fn failure(err: VerificationError) -> VerificationFailure {
        match err {
            VerificationError::Failure(f) => f,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_equals_passes_and_logs_once() {
        let (engine, log, steps) = engine();
        for (i, v) in [0, 1, -7, i32::MAX].into_iter().enumerate() {
            engine.verify_equals("same value", v, v).unwrap();
            assert_eq!(log.len(), i + 1);
        }
        assert!(log.lines().iter().all(|l| l == "Assertion Passed: same value"));
        assert_eq!(steps.steps().len(), 4);
        assert!(steps.steps().iter().all(|s| s.status == StepStatus::Passed));
    }

    #[test]
    fn test_equals_failure_renders_both_values() {
        let (engine, log, steps) = engine();
        for (a, b) in [("X", "Y"), ("abc", "abd")] {
            let f = failure(engine.verify_equals("names", a, b).unwrap_err());
            assert_eq!(f.message, "names");
            assert!(f.actual.contains(a));
            assert!(f.expected.contains(b));
            assert!(f.to_string().contains(a) && f.to_string().contains(b));
        }
        assert_eq!(log.len(), 2);
        assert!(log.lines().iter().all(|l| !l.starts_with("Assertion Passed")));
        assert_eq!(steps.steps()[0].status, StepStatus::Failed);
    }

    #[test]
    fn test_equals_across_owned_and_borrowed_strings() {
        let (engine, _, _) = engine();
        let name = String::from("ITI_Project_Board");
        engine
            .verify_equals("Board name", name, "ITI_Project_Board")
            .unwrap();
    }

    #[test]
    fn test_not_equals() {
        let (engine, _, _) = engine();
        engine.verify_not_equals("differ", 1, 2).unwrap();
        let f = failure(engine.verify_not_equals("differ", 3, 3).unwrap_err());
        assert_eq!(f.expected, "not 3");
    }

    #[test]
    fn test_numeric_ordering() {
        let (engine, _, _) = engine();
        engine.verify_greater_than("gt", 5, 4).unwrap();
        assert!(engine.verify_greater_than("gt", 4, 4).is_err());
        engine.verify_greater_than_or_equal("ge", 4, 4).unwrap();
        assert!(engine.verify_greater_than_or_equal("ge", 3, 4).is_err());
        engine.verify_less_than("lt", 3, 4).unwrap();
        assert!(engine.verify_less_than("lt", 4, 4).is_err());
        engine.verify_less_than_or_equal("le", 4, 4).unwrap();
        let f = failure(engine.verify_less_than_or_equal("le", 5, 4).unwrap_err());
        assert_eq!(f.expected, "a value less than or equal to 4");
        assert_eq!(f.actual, "5");
    }

    #[test]
    fn test_null_and_boolean_checks() {
        let (engine, _, _) = engine();
        engine.verify_is_null::<&str>("null", None).unwrap();
        engine.verify_is_not_null("id", Some("b1")).unwrap();
        let f = failure(engine.verify_is_not_null::<&str>("id", None).unwrap_err());
        assert_eq!(f.actual, "null");
        assert_eq!(f.expected, "not null");

        engine.verify_true("t", true).unwrap();
        engine.verify_false("f", false).unwrap();
        assert!(engine.verify_true("t", false).is_err());
        assert!(engine.verify_false("f", true).is_err());
    }

    #[test]
    fn test_string_checks() {
        let (engine, _, _) = engine();
        engine.verify_contains("c", "invalid app token", "app").unwrap();
        engine.verify_starts_with("s", "invalid app token", "invalid").unwrap();
        engine.verify_ends_with("e", "invalid app token", "token").unwrap();
        let f = failure(engine.verify_contains("c", "abc", "z").unwrap_err());
        assert_eq!(f.expected, "a string containing \"z\"");
    }

    #[test]
    fn test_collection_and_map_checks() {
        let (engine, _, _) = engine();
        engine
            .verify_list_has_item("ids", &["a", "b"], &"b")
            .unwrap();
        assert!(engine.verify_list_has_item("ids", &["a"], &"z").is_err());

        let mut map = HashMap::new();
        map.insert("color", "red");
        engine.verify_map_has_key("key", &map, &"color").unwrap();
        engine.verify_map_has_value("value", &map, &"red").unwrap();
        engine
            .verify_map_contains_entry("entry", &map, &"color", &"red")
            .unwrap();
        assert!(engine
            .verify_map_contains_entry("entry", &map, &"color", &"blue")
            .is_err());

        let ordered: BTreeMap<String, i32> = [("a".to_string(), 1)].into_iter().collect();
        let f = failure(
            engine
                .verify_map_has_key("key", &ordered, &"b".to_string())
                .unwrap_err(),
        );
        assert_eq!(f.actual, "{\"a\"=1}");
    }

    #[test]
    fn test_verify_all_short_circuits() {
        let (engine, _, _) = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            Matcher::new("counted", move |_: &i32| {
                calls.fetch_add(1, Ordering::SeqCst);
                true
            })
        };

        let matchers = vec![greater_than(0), less_than(10), not(equal_to(5)), counted];
        engine.verify_all("range", &7, &matchers).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let f = failure(engine.verify_all("range", &5, &matchers).unwrap_err());
        assert_eq!(f.expected, "not 5");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_verify_that_on_str() {
        let (engine, log, _) = engine();
        engine
            .verify_that("prefix", "ITI_Project_Board", &starts_with("ITI"))
            .unwrap();
        assert_eq!(log.lines(), vec!["Assertion Passed: prefix".to_string()]);
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        let (engine, log, _) = engine();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.verify_equals("parallel", i, i))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(log.len(), 8);
    }
}
