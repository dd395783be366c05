// ── Core error types ──
//
// User-facing errors from fbfuse-core. Consumers never see HTTP statuses
// or JSON parse failures from the collaborators directly: the
// `From<fbfuse_api::Error>` impl folds every outbound failure into
// `ExternalServiceFailure`, and `From<PoolError>` maps allocator failures
// onto the resource taxonomy.

use thiserror::Error;

use crate::pool::PoolError;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Request errors ───────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Invalid antennas: {reason}")]
    InvalidAntennas { reason: String },

    // ── Lookup / conflict ────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    // ── State machine ────────────────────────────────────────────────
    #[error("Cannot {operation} while product '{product}' is in state '{state}'")]
    InvalidState {
        product: String,
        operation: String,
        state: String,
    },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Insufficient resources: {message}")]
    InsufficientResources { message: String },

    // ── Collaborators ────────────────────────────────────────────────
    #[error("{service} failure: {message}")]
    ExternalServiceFailure { service: String, message: String },

    #[error("{service} did not answer within {timeout_secs}s")]
    Timeout { service: String, timeout_secs: u64 },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Master controller is not running")]
    ControllerStopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn product_not_found(name: &str) -> Self {
        Self::NotFound {
            entity_type: "Product".into(),
            identifier: name.into(),
        }
    }

    /// Attach the name of the collaborator to a transport failure.
    pub(crate) fn external(service: &str, err: fbfuse_api::Error) -> Self {
        match err {
            fbfuse_api::Error::Timeout { timeout_secs } => Self::Timeout {
                service: service.into(),
                timeout_secs,
            },
            other => Self::ExternalServiceFailure {
                service: service.into(),
                message: other.to_string(),
            },
        }
    }

    /// Returns `true` if the failure came from a worker or the authority.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceFailure { .. } | Self::Timeout { .. }
        )
    }
}

// ── Conversion from lower layers ─────────────────────────────────────

impl From<fbfuse_api::Error> for CoreError {
    fn from(err: fbfuse_api::Error) -> Self {
        Self::external("external service", err)
    }
}

impl From<PoolError> for CoreError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::InsufficientWorkers { .. } | PoolError::AddressExhausted { .. } => {
                Self::InsufficientResources {
                    message: err.to_string(),
                }
            }
            PoolError::WorkerBusy { .. } => Self::Conflict {
                message: err.to_string(),
            },
            PoolError::UnknownWorker { ref endpoint } => Self::NotFound {
                entity_type: "Worker".into(),
                identifier: endpoint.clone(),
            },
            PoolError::NotAllocated { .. } | PoolError::UnknownBlock { .. } => {
                Self::InvalidArgument {
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_maps_to_insufficient_resources() {
        let err: CoreError = PoolError::InsufficientWorkers {
            requested: 4,
            available: 1,
        }
        .into();
        assert!(matches!(err, CoreError::InsufficientResources { .. }));
    }

    #[test]
    fn busy_worker_maps_to_conflict() {
        let err: CoreError = PoolError::WorkerBusy {
            endpoint: "10.0.0.1:5000".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[test]
    fn api_timeout_keeps_budget() {
        let err = CoreError::external(
            "configuration authority",
            fbfuse_api::Error::Timeout { timeout_secs: 10 },
        );
        assert!(err.is_external());
        assert_eq!(
            err.to_string(),
            "configuration authority did not answer within 10s"
        );
    }
}
