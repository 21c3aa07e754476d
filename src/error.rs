use thiserror::Error;

use crate::schema::SchemaViolation;

/// Error taxonomy for form assembly.
///
/// Field-level validation failures are *not* errors: they live in the error
/// state of the affected control node and surface through message resolution.
/// Everything here is either fatal at construction time, a transport failure,
/// or a mutation that could not be routed.
#[derive(Debug, Error)]
pub enum FormError {
    /// Construction-time misconfiguration: invalid `multiple` usage, unknown
    /// element type, unknown validator name, bad validator parameter, or a
    /// duplicate qualified key.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A supplied or fetched config did not pass schema validation.
    #[error("schema validation failed with {} violation(s)", .0.len())]
    Schema(Vec<SchemaViolation>),

    /// Network or backend failure during a remote load.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// A runtime mutation targeted a container id with no registered match.
    #[error("no container registered under '{0}'")]
    TargetNotFound(String),

    /// A value operation targeted a qualified key with no registered control.
    #[error("no control registered under '{0}'")]
    UnknownKey(String),
}

impl FormError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FormError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}
