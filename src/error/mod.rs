use thiserror::Error;

use crate::model::DocumentId;

/// Input rejected before the pipeline starts.
///
/// A case that fails validation never enters the stage sequence; the caller
/// gets this back wrapped in [`PipelineError::Validation`].
///
/// # Examples
///
/// ```
/// use clinflow::{PatientProfile, Sex, ValidationError};
///
/// let patient = PatientProfile::new("P-001", -4, Sex::Female);
/// match patient.validate() {
///     Err(ValidationError::Age(age)) => assert_eq!(age, -4),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Age is negative or implausibly high
    #[error("age must be between 0 and 150, got {0}")]
    Age(i32),

    /// A body measurement is negative or not a finite number
    #[error("{field} must be a non-negative finite number, got {value}")]
    Measurement { field: &'static str, value: f64 },

    /// A vital-sign reading is not a finite number
    #[error("vital sign {name} must be a finite number, got {value}")]
    VitalSign { name: String, value: f64 },

    /// A required free-text field is blank
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A field the pipeline produces was already filled in by the caller
    #[error("{0} is produced by the pipeline and must be empty on input")]
    PrepopulatedOutput(&'static str),
}

/// Failure of a single call to an external reasoning or retrieval service.
///
/// These are always recoverable from the pipeline's point of view: the
/// affected stage degrades and records an alert instead of aborting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The call did not complete within its deadline
    #[error("gateway call timed out")]
    Timeout,

    /// The service answered, but not with the expected structure
    #[error("malformed structured output: {0}")]
    MalformedOutput(String),

    /// The service is temporarily unable to answer (overload, 5xx, rate limit)
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Network-level failure before a response was received
    #[error("transport error: {0}")]
    Transport(String),

    /// The service refused the request outright
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// No retrieval backend is registered under this source id
    #[error("unknown retrieval source: {0}")]
    UnknownSource(String),
}

impl GatewayError {
    /// Whether the call may succeed if simply issued again.
    ///
    /// Malformed output is deliberately not transient: asking again for the
    /// same thing is not retried, the stage degrades instead.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ServiceUnavailable(_) | GatewayError::Transport(_)
        )
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::MalformedOutput(e.to_string())
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::MalformedOutput(e.to_string())
        } else if let Some(status) = e.status() {
            GatewayError::Rejected {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// Lookup failure on the evidence store read API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("evidence document not found: {0}")]
    NotFound(DocumentId),
}

/// Hard failures of a pipeline run.
///
/// Everything else is converted into alerts on the final report; a caller
/// either gets a report or one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The input case was rejected before any stage ran
    #[error("invalid case: {0}")]
    Validation(#[from] ValidationError),

    /// An internal safety invariant was violated
    #[error("fatal consistency error: {0}")]
    FatalConsistency(String),

    /// The run was abandoned before it finished
    #[error("pipeline run cancelled")]
    Cancelled,
}

/// A specialized Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
