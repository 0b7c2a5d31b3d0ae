//! Tracing initialisation for restcheck binaries and test hosts.
//!
//! Assertion lines go to the `restcheck` target and lifecycle events to the
//! crate targets, so the default filter keeps those at the requested level and
//! everything else at `warn`. `RESTCHECK_LOG` overrides the filter, then
//! `RUST_LOG`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter override consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "RESTCHECK_LOG";

const TARGETS: [&str; 4] = [
    "restcheck",
    "restcheck_core",
    "restcheck_lifecycle",
    "restcheck_cli",
];

/// `warn` globally, `level` for every restcheck target.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(TARGETS.iter().map(|target| format!("{}={}", target, level)))
        .collect::<Vec<_>>()
        .join(",")
}

fn directives(level: Level, lookup: impl Fn(&str) -> Option<String>) -> String {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_directives(level))
}

/// Initialise the global tracing subscriber. Later calls are ignored.
///
/// * `json` - emit newline-delimited JSON log lines instead of text.
/// * `level` - verbosity of restcheck targets when no override is set.
pub fn init_tracing(json: bool, level: Level) {
    let raw = directives(level, |key| std::env::var(key).ok());
    let env_filter =
        EnvFilter::try_new(&raw).unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let (text, json_lines) = if json {
        (None, Some(fmt::layer().with_target(true).json()))
    } else {
        (Some(fmt::layer().with_target(true)), None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text)
        .with(json_lines)
        .try_init()
        .ok();
}
