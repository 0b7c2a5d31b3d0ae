//! Composable predicate-with-description values.
//!
//! A [`Matcher`] pairs a test with a human-readable description of the
//! condition it expresses. Matchers are immutable once built and are shared
//! freely across threads.

use std::fmt::{self, Debug};
use std::sync::Arc;

type Test<T> = dyn Fn(&T) -> bool + Send + Sync;

/// A condition a value of type `T` must satisfy.
pub struct Matcher<T: ?Sized> {
    description: String,
    test: Arc<Test<T>>,
}

impl<T: ?Sized> Clone for Matcher<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<T: ?Sized> Debug for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("description", &self.description)
            .finish()
    }
}

impl<T: ?Sized> fmt::Display for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl<T: ?Sized> Matcher<T> {
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            test: Arc::new(test),
        }
    }

    /// Whether `value` satisfies this condition.
    pub fn matches(&self, value: &T) -> bool {
        (self.test)(value)
    }

    /// Description of the condition, used as the "expected" rendering.
    pub fn describe(&self) -> &str {
        &self.description
    }
}

impl<T: ?Sized + 'static> Matcher<T> {
    /// Conjunction with another matcher; `other` is not evaluated when `self` fails.
    pub fn and(self, other: Matcher<T>) -> Matcher<T> {
        all_of(vec![self, other])
    }

    /// Disjunction with another matcher.
    pub fn or(self, other: Matcher<T>) -> Matcher<T> {
        any_of(vec![self, other])
    }
}

/// The first matcher in `matchers` that rejects `value`, in order.
pub fn first_mismatch<'a, T: ?Sized>(
    matchers: &'a [Matcher<T>],
    value: &T,
) -> Option<&'a Matcher<T>> {
    matchers.iter().find(|m| !m.matches(value))
}

fn join_descriptions<T: ?Sized>(matchers: &[Matcher<T>], sep: &str) -> String {
    let parts: Vec<&str> = matchers.iter().map(|m| m.describe()).collect();
    format!("({})", parts.join(sep))
}

pub fn anything<T: ?Sized + 'static>() -> Matcher<T> {
    Matcher::new("ANYTHING", |_| true)
}

pub fn equal_to<T>(expected: T) -> Matcher<T>
where
    T: PartialEq + Debug + Send + Sync + 'static,
{
    Matcher::new(format!("{:?}", expected), move |actual| *actual == expected)
}

pub fn not<T: ?Sized + 'static>(inner: Matcher<T>) -> Matcher<T> {
    let description = format!("not {}", inner.describe());
    Matcher::new(description, move |actual| !inner.matches(actual))
}

pub fn greater_than<T>(bound: T) -> Matcher<T>
where
    T: PartialOrd + Debug + Send + Sync + 'static,
{
    Matcher::new(format!("a value greater than {:?}", bound), move |actual| {
        *actual > bound
    })
}

pub fn greater_than_or_equal_to<T>(bound: T) -> Matcher<T>
where
    T: PartialOrd + Debug + Send + Sync + 'static,
{
    Matcher::new(
        format!("a value equal to or greater than {:?}", bound),
        move |actual| *actual >= bound,
    )
}

pub fn less_than<T>(bound: T) -> Matcher<T>
where
    T: PartialOrd + Debug + Send + Sync + 'static,
{
    Matcher::new(format!("a value less than {:?}", bound), move |actual| {
        *actual < bound
    })
}

pub fn less_than_or_equal_to<T>(bound: T) -> Matcher<T>
where
    T: PartialOrd + Debug + Send + Sync + 'static,
{
    Matcher::new(
        format!("a value less than or equal to {:?}", bound),
        move |actual| *actual <= bound,
    )
}

pub fn null_value<T: 'static>() -> Matcher<Option<T>> {
    Matcher::new("null", |actual: &Option<T>| actual.is_none())
}

pub fn not_null_value<T: 'static>() -> Matcher<Option<T>> {
    Matcher::new("not null", |actual: &Option<T>| actual.is_some())
}

pub fn is_true() -> Matcher<bool> {
    Matcher::new("is true", |actual: &bool| *actual)
}

pub fn is_false() -> Matcher<bool> {
    Matcher::new("is false", |actual: &bool| !*actual)
}

pub fn contains_string(substring: impl Into<String>) -> Matcher<str> {
    let substring = substring.into();
    Matcher::new(
        format!("a string containing {:?}", substring),
        move |actual: &str| actual.contains(substring.as_str()),
    )
}

pub fn starts_with(prefix: impl Into<String>) -> Matcher<str> {
    let prefix = prefix.into();
    Matcher::new(
        format!("a string starting with {:?}", prefix),
        move |actual: &str| actual.starts_with(prefix.as_str()),
    )
}

pub fn ends_with(suffix: impl Into<String>) -> Matcher<str> {
    let suffix = suffix.into();
    Matcher::new(
        format!("a string ending with {:?}", suffix),
        move |actual: &str| actual.ends_with(suffix.as_str()),
    )
}

/// Matches a value equal to one of `candidates`.
pub fn is_in<T>(candidates: Vec<T>) -> Matcher<T>
where
    T: PartialEq + Debug + Send + Sync + 'static,
{
    Matcher::new(format!("one of {:?}", candidates), move |actual| {
        candidates.contains(actual)
    })
}

/// Matches a collection with at least one element equal to `item`.
pub fn has_item<T>(item: T) -> Matcher<[T]>
where
    T: PartialEq + Debug + Send + Sync + 'static,
{
    Matcher::new(
        format!("a collection containing {:?}", item),
        move |actual: &[T]| actual.contains(&item),
    )
}

pub fn has_size<T: 'static>(size: usize) -> Matcher<[T]> {
    Matcher::new(
        format!("a collection with size {}", size),
        move |actual: &[T]| actual.len() == size,
    )
}

/// All matchers must hold. Evaluation stops at the first one that fails.
pub fn all_of<T: ?Sized + 'static>(matchers: Vec<Matcher<T>>) -> Matcher<T> {
    let description = join_descriptions(&matchers, " and ");
    Matcher::new(description, move |actual| {
        matchers.iter().all(|m| m.matches(actual))
    })
}

/// At least one matcher must hold. Evaluation stops at the first one that passes.
pub fn any_of<T: ?Sized + 'static>(matchers: Vec<Matcher<T>>) -> Matcher<T> {
    let description = join_descriptions(&matchers, " or ");
    Matcher::new(description, move |actual| {
        matchers.iter().any(|m| m.matches(actual))
    })
}

/// Matchers over generic JSON values, for path-addressed response checks.
pub mod json {
    use super::Matcher;
    use serde_json::Value;

    pub fn equal_to(expected: impl Into<Value>) -> Matcher<Value> {
        let expected = expected.into();
        Matcher::new(expected.to_string(), move |actual: &Value| {
            *actual == expected
        })
    }

    pub fn null_value() -> Matcher<Value> {
        Matcher::new("null", Value::is_null)
    }

    pub fn not_null_value() -> Matcher<Value> {
        Matcher::new("not null", |actual: &Value| !actual.is_null())
    }

    pub fn is_string() -> Matcher<Value> {
        Matcher::new("a string", Value::is_string)
    }

    pub fn is_number() -> Matcher<Value> {
        Matcher::new("a number", Value::is_number)
    }

    pub fn is_boolean() -> Matcher<Value> {
        Matcher::new("a boolean", Value::is_boolean)
    }

    pub fn is_array() -> Matcher<Value> {
        Matcher::new("an array", Value::is_array)
    }

    /// Matches a string value satisfying `inner`.
    pub fn string_that(inner: Matcher<str>) -> Matcher<Value> {
        let description = format!("a string that is {}", inner.describe());
        Matcher::new(description, move |actual: &Value| {
            actual.as_str().is_some_and(|s| inner.matches(s))
        })
    }

    /// Matches a numeric value satisfying `inner` when read as `f64`.
    pub fn number_that(inner: Matcher<f64>) -> Matcher<Value> {
        let description = format!("a number that is {}", inner.describe());
        Matcher::new(description, move |actual: &Value| {
            actual.as_f64().is_some_and(|n| inner.matches(&n))
        })
    }

    /// Matches an array with exactly `size` elements.
    pub fn has_size(size: usize) -> Matcher<Value> {
        Matcher::new(
            format!("an array with size {}", size),
            move |actual: &Value| actual.as_array().is_some_and(|a| a.len() == size),
        )
    }
}
