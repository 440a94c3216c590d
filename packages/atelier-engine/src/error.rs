use std::time::Duration;
use thiserror::Error;

/// Failure of a single transport call to the generative model.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OracleError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("model overloaded: {0}")]
    Overloaded(String),
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("request rejected{}: {message}", status_suffix(.status))]
    Rejected {
        status: Option<u16>,
        message: String,
    },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl OracleError {
    /// Transient failures are worth another attempt; a rejection or an
    /// unreadable answer is not.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            OracleError::Rejected { .. } | OracleError::MalformedResponse(_)
        )
    }
}

/// Everything a generation request can surface to its caller.
#[derive(Debug, Error)]
pub enum FitError {
    #[error(
        "insufficient inventory: {found} distinct item(s), at least {required} are needed to fill top, bottom and shoes. Add more garments or borrow some."
    )]
    InsufficientInventory { found: usize, required: usize },

    #[error("oracle call failed after {attempts} attempt(s): {source}")]
    Oracle {
        attempts: u32,
        #[source]
        source: OracleError,
    },

    #[error("oracle response violated the expected schema: {0}")]
    SchemaViolation(String),

    #[error("oracle referenced item '{offending_id}' in '{field}', which is not in the inventory")]
    HallucinatedReference { field: String, offending_id: String },

    #[error("critique selected candidate {selected}, but only candidates {available:?} were generated")]
    StageMismatch { selected: u32, available: Vec<u32> },

    #[error("generation cancelled")]
    Cancelled,

    #[error("generation exceeded its {budget:?} budget")]
    DeadlineExceeded { budget: Duration },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FitError {
    /// The oracle answered, but the answer could not be trusted.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            FitError::SchemaViolation(_)
                | FitError::HallucinatedReference { .. }
                | FitError::StageMismatch { .. }
        )
    }

    /// Short machine-readable code, used in the generation log.
    pub fn code(&self) -> &'static str {
        match self {
            FitError::InsufficientInventory { .. } => "insufficient_inventory",
            FitError::Oracle { .. } => "oracle_error",
            FitError::SchemaViolation(_) => "schema_violation",
            FitError::HallucinatedReference { .. } => "hallucinated_reference",
            FitError::StageMismatch { .. } => "stage_mismatch",
            FitError::Cancelled => "cancelled",
            FitError::DeadlineExceeded { .. } => "deadline_exceeded",
            FitError::Configuration(_) => "configuration",
        }
    }
}
