use std::{fmt::Debug, time::Duration};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::macros::metric;

/// Error text recorded when an invocation exceeds its time budget.
pub const TIMEOUT_MARKER: &str = "Command timed out";

/// A `Metric` is a single observation produced by one call against the subject.
///
/// Metrics are folded into an [`crate::Aggregate`] and finally summarized by
/// [`crate::report`]. They must be cheap to clone and safe to hand between
/// worker tasks.
///
/// Use the [`macro@metric`] attribute to derive the required traits:
///
/// ```rust
/// use taskstorm::macros::metric;
///
/// #[metric]
/// struct ExitCode(i32);
/// ```
pub trait Metric
where
    Self: Serialize + DeserializeOwned + PartialEq + Send + Sync + Debug + Clone,
{
}

/// What the subject printed on a successful exit.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// Standard output parsed as a single JSON value.
    Json(serde_json::Value),
    /// Standard output that did not parse as JSON.
    Raw(String),
}

impl Payload {
    /// Parses standard output, falling back to the raw (lossy UTF-8) text.
    pub fn from_stdout(stdout: &[u8]) -> Self {
        match serde_json::from_slice(stdout) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(String::from_utf8_lossy(stdout).into_owned()),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }
}

/// Result of exactly one subject invocation. Produced once, never mutated.
#[metric]
pub struct InvocationOutcome {
    /// Zero exit status within the timeout.
    pub success: bool,
    /// Present only when `success` is true.
    pub payload: Option<Payload>,
    /// Captured standard error, or a marker for timeouts and scheduling failures.
    pub error_text: String,
    pub elapsed: Duration,
}

impl InvocationOutcome {
    pub fn succeeded(payload: Payload, elapsed: Duration) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error_text: String::new(),
            elapsed,
        }
    }

    pub fn failed(error_text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            payload: None,
            error_text: error_text.into(),
            elapsed,
        }
    }

    pub fn timed_out(elapsed: Duration) -> Self {
        Self::failed(TIMEOUT_MARKER, elapsed)
    }

    pub fn is_timeout(&self) -> bool {
        !self.success && self.error_text == TIMEOUT_MARKER
    }
}
