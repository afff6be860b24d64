//! Health check registrations.

use crewguard_core::BoxError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

pub(crate) type CheckFn = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;
pub(crate) type RecoveryFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A named health check with an optional recovery action.
///
/// # Examples
///
/// ```
/// use crewguard_healthcheck::HealthCheck;
///
/// let check = HealthCheck::new("database", || async { true })
///     .with_recovery(|| async { Ok::<_, std::io::Error>(()) });
/// assert_eq!(check.name(), "database");
/// ```
#[derive(Clone)]
pub struct HealthCheck {
    pub(crate) name: String,
    pub(crate) check: CheckFn,
    pub(crate) recovery: Option<RecoveryFn>,
}

impl HealthCheck {
    /// Creates a check that reports healthy when `check` resolves to true.
    pub fn new<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(move || check().boxed()),
            recovery: None,
        }
    }

    /// Sets the action run when the check flips from healthy to unhealthy.
    pub fn with_recovery<F, Fut, E>(mut self, recovery: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.recovery = Some(Arc::new(move || {
            recovery().map(|result| result.map_err(Into::into)).boxed()
        }));
        self
    }

    /// Returns the check name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if a recovery action is registered.
    pub fn has_recovery(&self) -> bool {
        self.recovery.is_some()
    }
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("name", &self.name)
            .field("has_recovery", &self.has_recovery())
            .finish()
    }
}

/// Last known result of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CheckStatus {
    /// Result of the latest evaluation. Checks start healthy.
    pub healthy: bool,
    /// When the check was last evaluated, `None` before the first cycle.
    pub last_checked_at: Option<SystemTime>,
}

impl Default for CheckStatus {
    fn default() -> Self {
        Self {
            healthy: true,
            last_checked_at: None,
        }
    }
}
