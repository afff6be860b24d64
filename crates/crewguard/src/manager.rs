use crate::error::{CircuitOpenError, ManagerError, ProtectedCallError};
use crate::protected::{Protection, ProtectedLayer};
use crewguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use crewguard_core::{BoxError, ConfigError, Severity};
use crewguard_errors::{
    ErrorClassifier, ErrorLog, ErrorLogBuilder, ErrorRecord, ErrorReporter, ErrorStatistics,
    FailureContext,
};
use crewguard_healthcheck::{HealthCheck, HealthMonitor, HealthMonitorConfig};
use crewguard_orchestrator::{InjectedFailure, TaskError};
use crewguard_retry::{RetryConfig, RetryPolicy};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type RecoveryFn = Arc<dyn Fn(ErrorRecord) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;
type EscalationFn = Arc<dyn Fn(&ErrorRecord) + Send + Sync>;

struct Recovery {
    recognizes: Option<fn(&(dyn Error + 'static)) -> bool>,
    action: RecoveryFn,
}

/// Registry of named circuit breakers and retry policies, plus the error log
/// and health monitor they report into.
///
/// Construct one per application and share it behind an [`Arc`]. Every
/// method takes `&self`.
///
/// # Examples
///
/// ```rust
/// use crewguard::{ManagerError, ResilienceManager};
/// use crewguard::circuitbreaker::CircuitBreakerConfig;
/// use crewguard::retry::RetryConfig;
///
/// # async fn example() -> Result<(), ManagerError> {
/// let manager = ResilienceManager::new();
/// manager.get_or_create_circuit_breaker("search", CircuitBreakerConfig::default())?;
/// manager.get_or_create_retry_policy("search", RetryConfig::default())?;
///
/// let hits = manager
///     .protected_call("search", || async { Ok::<_, std::io::Error>(12) })
///     .await;
/// assert_eq!(hits.ok(), Some(12));
/// # Ok(())
/// # }
/// ```
pub struct ResilienceManager {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
    retries: RwLock<HashMap<String, RetryPolicy>>,
    recoveries: RwLock<HashMap<String, Recovery>>,
    escalation: Option<EscalationFn>,
    error_log: ErrorLog,
    health: HealthMonitor,
}

impl ResilienceManager {
    /// Creates a manager with default settings and no escalation callback.
    pub fn new() -> Self {
        Self::from_parts(
            ErrorLog::builder().classifier(with_builtin_rules(ErrorClassifier::new())),
            HealthMonitor::default(),
            None,
        )
    }

    pub fn builder() -> ResilienceManagerBuilder {
        ResilienceManagerBuilder::new()
    }

    fn from_parts(log: ErrorLogBuilder, health: HealthMonitor, escalation: Option<EscalationFn>) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            retries: RwLock::new(HashMap::new()),
            recoveries: RwLock::new(HashMap::new()),
            escalation,
            error_log: log.build(),
            health,
        }
    }

    /// Returns the breaker for `name`, creating it with `config` if absent.
    ///
    /// An existing breaker is returned unchanged; `config` only applies on
    /// creation.
    pub fn get_or_create_circuit_breaker(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Result<CircuitBreaker, ManagerError> {
        if let Some(existing) = read(&self.breakers).get(name) {
            return Ok(existing.clone());
        }

        let mut breakers = write(&self.breakers);
        if let Some(existing) = breakers.get(name) {
            return Ok(existing.clone());
        }
        let breaker = CircuitBreaker::new(name, config)?;
        breakers.insert(name.to_string(), breaker.clone());

        #[cfg(feature = "tracing")]
        tracing::info!(circuitbreaker = %name, "circuit breaker created");

        Ok(breaker)
    }

    /// Registers a breaker built elsewhere, e.g. with custom failure
    /// matching or listeners. Replaces and returns any breaker of the same
    /// name.
    pub fn register_circuit_breaker(&self, breaker: CircuitBreaker) -> Option<CircuitBreaker> {
        write(&self.breakers).insert(breaker.name().to_string(), breaker)
    }

    pub fn circuit_breaker(&self, name: &str) -> Option<CircuitBreaker> {
        read(&self.breakers).get(name).cloned()
    }

    /// Names of all registered breakers, sorted.
    pub fn circuit_breaker_names(&self) -> Vec<String> {
        let mut names: Vec<_> = read(&self.breakers).keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the retry policy for `name`, creating it with `config` if
    /// absent.
    pub fn get_or_create_retry_policy(
        &self,
        name: &str,
        config: RetryConfig,
    ) -> Result<RetryPolicy, ManagerError> {
        if let Some(existing) = read(&self.retries).get(name) {
            return Ok(existing.clone());
        }

        let mut retries = write(&self.retries);
        if let Some(existing) = retries.get(name) {
            return Ok(existing.clone());
        }
        let policy = RetryPolicy::new(name, config)?;
        retries.insert(name.to_string(), policy.clone());

        #[cfg(feature = "tracing")]
        tracing::info!(retry = %name, "retry policy created");

        Ok(policy)
    }

    /// Registers a policy built elsewhere. Replaces and returns any policy of
    /// the same name.
    pub fn register_retry_policy(&self, policy: RetryPolicy) -> Option<RetryPolicy> {
        write(&self.retries).insert(policy.name().to_string(), policy)
    }

    pub fn retry_policy(&self, name: &str) -> Option<RetryPolicy> {
        read(&self.retries).get(name).cloned()
    }

    /// Runs `f` under the protection of the resource's breaker and, if one is
    /// registered under the same name, its retry policy.
    ///
    /// The breaker is consulted before every attempt. An open circuit fails
    /// the call with [`ProtectedCallError::CircuitOpen`] without invoking
    /// `f`, and ends any retry sequence in progress. Without a retry policy
    /// `f` is attempted once.
    pub async fn protected_call<F, Fut, T, E>(
        &self,
        resource: &str,
        f: F,
    ) -> Result<T, ProtectedCallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: 'static,
    {
        let protection = self
            .protection(resource)
            .map_err(|_| ProtectedCallError::UnknownResource(resource.to_string()))?;
        protection.call(f).await
    }

    /// Returns a tower layer that runs every request through
    /// [`protected_call`](Self::protected_call) for `resource`.
    ///
    /// The breaker and retry policy are looked up now, so they must be
    /// registered first.
    pub fn layer(&self, resource: &str) -> Result<ProtectedLayer, ManagerError> {
        self.protection(resource).map(ProtectedLayer::new)
    }

    fn protection(&self, resource: &str) -> Result<Protection, ManagerError> {
        let breaker = self
            .circuit_breaker(resource)
            .ok_or_else(|| ManagerError::UnknownResource(resource.to_string()))?;
        Ok(Protection::new(resource, breaker, self.retry_policy(resource)))
    }

    /// Registers a recovery strategy for errors of type `E`.
    ///
    /// The strategy receives the error's record. It is tried for every
    /// handled error of exactly this type, whether it arrives statically
    /// typed or boxed. A later registration for the same type replaces the
    /// earlier one.
    pub fn register_recovery<E, F, Fut, Er>(&self, strategy: F)
    where
        E: Error + 'static,
        F: Fn(ErrorRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Er>> + Send + 'static,
        Er: Into<BoxError>,
    {
        self.insert_recovery(std::any::type_name::<E>().to_string(), Some(is_type::<E>), strategy);
    }

    /// Registers a recovery strategy by error type label, as it appears in
    /// [`ErrorRecord::error_type`].
    pub fn register_recovery_for<F, Fut, Er>(&self, error_type: impl Into<String>, strategy: F)
    where
        F: Fn(ErrorRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Er>> + Send + 'static,
        Er: Into<BoxError>,
    {
        self.insert_recovery(error_type.into(), None, strategy);
    }

    fn insert_recovery<F, Fut, Er>(
        &self,
        label: String,
        recognizes: Option<fn(&(dyn Error + 'static)) -> bool>,
        strategy: F,
    ) where
        F: Fn(ErrorRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Er>> + Send + 'static,
        Er: Into<BoxError>,
    {
        #[cfg(feature = "tracing")]
        tracing::info!(error_type = %label, "recovery strategy registered");

        let action: RecoveryFn = Arc::new(move |record| {
            let fut = strategy(record);
            Box::pin(async move { fut.await.map_err(Into::into) })
        });
        write(&self.recoveries).insert(label, Recovery { recognizes, action });
    }

    /// Records a statically typed failure and attempts recovery.
    ///
    /// 1. The error is classified and appended to the error log.
    /// 2. The recovery strategy registered for its type, if any, is run. Its
    ///    outcome is stored on the record.
    /// 3. If there is no strategy, or it failed, the severity decides: a
    ///    critical error is escalated, lower severities are only logged.
    ///
    /// Returns the record as stored after recovery.
    pub async fn handle_error<E>(&self, error: &E, context: FailureContext) -> ErrorRecord
    where
        E: Error + Send + Sync + 'static,
    {
        let classification = self
            .error_log
            .classifier()
            .classify_typed(error);
        let record = self.error_log.append(error, classification, context);
        self.recover(record).await
    }

    /// Type-erased variant of [`handle_error`](Self::handle_error).
    ///
    /// Errors no classifier rule recognizes are labelled with the type they
    /// were registered under with [`register_recovery`](Self::register_recovery),
    /// if any.
    pub async fn handle_error_dyn(
        &self,
        error: &(dyn Error + Send + Sync + 'static),
        context: FailureContext,
    ) -> ErrorRecord {
        let error: &(dyn Error + 'static) = error;
        let fallback = read(&self.recoveries)
            .iter()
            .find(|(_, r)| r.recognizes.is_some_and(|recognizes| recognizes(error)))
            .map(|(label, _)| label.clone());
        let classification = self
            .error_log
            .classifier()
            .classify_labelled(error, fallback.as_deref());
        let record = self.error_log.append(error, classification, context);
        self.recover(record).await
    }

    async fn recover(&self, record: ErrorRecord) -> ErrorRecord {
        let action = read(&self.recoveries)
            .get(&record.error_type)
            .map(|r| Arc::clone(&r.action));

        let mut record = record;
        if let Some(action) = action {
            let outcome = AssertUnwindSafe(async { action(record.clone()).await })
                .catch_unwind()
                .await;
            let successful = matches!(outcome, Ok(Ok(())));

            #[cfg(feature = "tracing")]
            match &outcome {
                Ok(Ok(())) => tracing::info!(record = %record.id, error_type = %record.error_type, "recovery succeeded"),
                Ok(Err(err)) => tracing::error!(record = %record.id, error_type = %record.error_type, error = %err, "recovery failed"),
                Err(_) => tracing::error!(record = %record.id, error_type = %record.error_type, "recovery panicked"),
            }

            if let Ok(updated) = self.error_log.set_recovery_outcome(&record.id, successful) {
                record = updated;
            }
            if successful {
                return record;
            }
        }

        self.fall_back(&record);
        record
    }

    fn fall_back(&self, record: &ErrorRecord) {
        match record.severity {
            Severity::Critical => {
                #[cfg(feature = "tracing")]
                tracing::error!(record = %record.id, component = %record.component, "escalating critical error");

                if let Some(escalate) = &self.escalation {
                    escalate(record);
                }
            }
            Severity::High => {
                #[cfg(feature = "tracing")]
                tracing::warn!(record = %record.id, component = %record.component, "high severity error; running degraded");
            }
            Severity::Medium => {
                #[cfg(feature = "tracing")]
                tracing::info!(record = %record.id, component = %record.component, "medium severity error; retry with backoff");
            }
            Severity::Low => {}
        }
    }

    /// Statistics over every handled error.
    pub fn error_statistics(&self) -> ErrorStatistics {
        self.error_log.statistics()
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    pub fn health_monitor(&self) -> &HealthMonitor {
        &self.health
    }

    /// Registers a health check with the monitor.
    pub fn register_health_check(&self, check: HealthCheck) -> Result<(), ManagerError> {
        Ok(self.health.register(check)?)
    }

    /// Starts the periodic health monitor.
    pub fn start_monitoring(&self) {
        self.health.start();
    }

    pub fn stop_monitoring(&self) {
        self.health.stop();
    }
}

impl Default for ResilienceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResilienceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut recoveries: Vec<_> = read(&self.recoveries).keys().cloned().collect();
        recoveries.sort();
        f.debug_struct("ResilienceManager")
            .field("circuit_breakers", &self.circuit_breaker_names())
            .field("retry_policies", &read(&self.retries).len())
            .field("recoveries", &recoveries)
            .field("errors", &self.error_log.len())
            .finish()
    }
}

impl ErrorReporter for ResilienceManager {
    fn report<'a>(
        &'a self,
        error: &'a (dyn Error + Send + Sync + 'static),
        context: FailureContext,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.handle_error_dyn(error, context).await;
        })
    }
}

/// Builder for [`ResilienceManager`].
pub struct ResilienceManagerBuilder {
    classifier: ErrorClassifier,
    log: ErrorLogBuilder,
    health: HealthMonitorConfig,
    escalation: Option<EscalationFn>,
}

impl ResilienceManagerBuilder {
    fn new() -> Self {
        Self {
            classifier: ErrorClassifier::new(),
            log: ErrorLog::builder(),
            health: HealthMonitorConfig::default(),
            escalation: None,
        }
    }

    /// Sets the classifier for handled errors. Rules for crewguard's own
    /// error types are appended after its rules.
    ///
    /// Default: [`ErrorClassifier::new`]
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the health monitor configuration.
    ///
    /// Default: 30 second interval, 10 second check timeout
    pub fn health_config(mut self, config: HealthMonitorConfig) -> Self {
        self.health = config;
        self
    }

    /// Sets the callback run for critical errors that no recovery strategy
    /// resolved.
    ///
    /// Default: none
    pub fn on_escalation<F>(mut self, f: F) -> Self
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        self.escalation = Some(Arc::new(f));
        self
    }

    /// Registers a callback invoked for every recorded error.
    pub fn on_error_recorded<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Severity) + Send + Sync + 'static,
    {
        self.log = self.log.on_error_recorded(f);
        self
    }

    pub fn build(self) -> Result<ResilienceManager, ConfigError> {
        let health = HealthMonitor::new(self.health)?;
        Ok(ResilienceManager::from_parts(
            self.log.classifier(with_builtin_rules(self.classifier)),
            health,
            self.escalation,
        ))
    }
}

fn with_builtin_rules(classifier: ErrorClassifier) -> ErrorClassifier {
    classifier
        .with_rule::<TaskError, _>(|err| {
            Some(match err {
                TaskError::Timeout => Severity::High,
                TaskError::Routing { .. } | TaskError::Rejected(_) => Severity::Medium,
                TaskError::Expired { .. } => Severity::Medium,
                TaskError::Execution(_) | TaskError::Cancelled | TaskError::Discarded => {
                    Severity::Low
                }
            })
        })
        .with_severity::<CircuitOpenError>(Severity::High)
        .with_severity::<InjectedFailure>(Severity::High)
}

fn is_type<T: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    err.is::<T>()
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
