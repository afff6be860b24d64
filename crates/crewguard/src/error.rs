use crewguard_core::ConfigError;
use thiserror::Error;

/// Misuse of a [`ResilienceManager`](crate::ResilienceManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// No circuit breaker is registered under this resource name.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// A configuration passed to the manager was rejected.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// A call was rejected because the resource's circuit is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{resource}' is open; call not permitted")]
pub struct CircuitOpenError {
    pub resource: String,
}

/// Errors returned by [`ResilienceManager::protected_call`](crate::ResilienceManager::protected_call).
#[derive(Debug, Error)]
pub enum ProtectedCallError<E> {
    /// No circuit breaker is registered under this resource name. The
    /// function was not invoked.
    #[error("unknown resource '{0}'")]
    UnknownResource(String),

    /// The circuit is open. The function was not invoked on the rejected
    /// attempt.
    #[error(transparent)]
    CircuitOpen(CircuitOpenError),

    /// The function failed, after any retries.
    #[error("{0}")]
    Inner(E),
}

impl<E> ProtectedCallError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ProtectedCallError::CircuitOpen(_))
    }

    pub fn is_unknown_resource(&self) -> bool {
        matches!(self, ProtectedCallError::UnknownResource(_))
    }

    /// Returns the function's error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            ProtectedCallError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
