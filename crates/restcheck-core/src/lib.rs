//! restcheck core
//!
//! A uniform library of typed verification checks for REST API test suites:
//! - [`Matcher`]: composable predicate-with-description values
//! - [`VerificationEngine`]: the check catalogue, over plain values and
//!   HTTP-response-shaped documents
//! - [`JsonPath`]: path queries over JSON bodies
//!
//! Every check writes one log line and one step entry; failures come back as
//! [`VerificationError`] for the caller to propagate.

pub mod engine;
pub mod error;
pub mod fakes;
pub mod http_checks;
pub mod matcher;
pub mod path;
pub mod response;
pub mod sink;
pub mod telemetry;

pub use engine::VerificationEngine;
pub use error::{Result, VerificationError, VerificationFailure, VerificationUsageError};
pub use matcher::{all_of, any_of, Matcher};
pub use path::JsonPath;
pub use response::{HttpResponse, RecordedResponse};
pub use sink::{LogSink, Step, StepRecorder, StepStatus, TracingLogSink, TracingStepRecorder};
pub use telemetry::init_tracing;

/// restcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
