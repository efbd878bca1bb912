use thiserror::Error;

/// Failure taxonomy for the telemetry pipeline. Only `MalformedPayload` and
/// `Persistence` ever reach the HTTP caller; everything else is diagnosed via
/// logs and halts the pipeline quietly.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Whole-batch shape unrecognized. 400, nothing persisted.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// One or more of the three required vitals has no observation yet.
    #[error("incomplete vitals: missing {}", .missing.join(", "))]
    IncompleteVitals { missing: Vec<&'static str> },

    /// Classifier refused the feature vector (non-finite input).
    #[error("invalid classifier input: {0}")]
    InvalidInput(String),

    /// Model artifact failed to load at startup; adapter is disabled.
    #[error("classifier model unavailable")]
    ModelUnavailable,

    /// Transactional write failed. 500, the alert/condition scope rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[from] sea_orm::DbErr),
}
