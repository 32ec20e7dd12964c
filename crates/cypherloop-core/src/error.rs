use thiserror::Error;

/// Failure taxonomy of the translate-validate-repair pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The label catalogue could not be read; there is nothing to repair against.
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// The oracle answered, but not in the shape the call site requires.
    #[error("oracle contract violation in {call_site}: {reason}")]
    OracleContractViolation {
        call_site: &'static str,
        reason: String,
    },

    /// Plan-only submission rejected the draft query.
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// The retry ceiling was reached without producing any draft at all.
    #[error("repair exhausted after {attempts} attempts: {last_error}")]
    RepairExhausted { attempts: u32, last_error: String },

    /// The oracle call timed out or the transport failed.
    #[error("oracle timeout or transport failure in {call_site}: {reason}")]
    OracleTimeoutOrTransport {
        call_site: &'static str,
        reason: String,
    },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether the error must fail the whole request instead of one attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::SchemaUnavailable(_) | PipelineError::Config(_)
        )
    }

    pub fn contract(call_site: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::OracleContractViolation {
            call_site,
            reason: reason.into(),
        }
    }

    pub fn transport(call_site: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::OracleTimeoutOrTransport {
            call_site,
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// A structural defect found in an oracle-produced schema subset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractIssue {
    #[error("edge {edge} references undeclared node label {label}")]
    DanglingEndpoint { edge: String, label: String },

    #[error("node label {0} is not part of the database schema")]
    UnknownNode(String),

    #[error("edge {label} ({from_label} -> {to_label}) is not part of the database schema")]
    UnknownEdge {
        label: String,
        from_label: String,
        to_label: String,
    },

    #[error("{owner} has no property named {property}")]
    UnknownProperty { owner: String, property: String },
}
