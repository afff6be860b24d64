//! Periodic health monitor.

use crate::check::{CheckStatus, HealthCheck};
use crate::config::HealthMonitorConfig;
use crate::events::HealthEvent;
use crewguard_core::{ConfigError, EventListeners};
use futures::future::join_all;
use futures::FutureExt;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};
use tokio::task::JoinHandle;

/// Evaluates registered health checks on a fixed interval.
///
/// Every cycle evaluates all checks concurrently. A check that panics or
/// runs longer than the check timeout counts as unhealthy, so one bad check
/// never holds up the others. When a check flips from healthy to unhealthy
/// its recovery action, if any, is run. A failing recovery is logged and the
/// loop carries on.
///
/// # Examples
///
/// ```
/// use crewguard_healthcheck::{HealthCheck, HealthMonitor};
/// use std::time::Duration;
///
/// # async fn example() {
/// let monitor = HealthMonitor::builder()
///     .interval(Duration::from_secs(30))
///     .build()
///     .unwrap();
///
/// monitor
///     .register(HealthCheck::new("cache", || async { true }))
///     .unwrap();
///
/// monitor.run_once().await;
/// assert_eq!(monitor.status("cache").map(|s| s.healthy), Some(true));
///
/// monitor.start();
/// // ...
/// monitor.stop();
/// # }
/// ```
pub struct HealthMonitor {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: HealthMonitorConfig,
    checks: Mutex<Vec<Entry>>,
    event_listeners: EventListeners<HealthEvent>,
}

struct Entry {
    check: HealthCheck,
    status: CheckStatus,
}

impl HealthMonitor {
    /// Creates a monitor with the given timing.
    pub fn new(config: HealthMonitorConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    /// Starts building a monitor.
    pub fn builder() -> HealthMonitorBuilder {
        HealthMonitorBuilder::new()
    }

    /// Returns the monitor configuration.
    pub fn config(&self) -> &HealthMonitorConfig {
        &self.inner.config
    }

    /// Registers a check. Names must be unique.
    pub fn register(&self, check: HealthCheck) -> Result<(), ConfigError> {
        let mut checks = self.inner.lock_checks();
        if checks.iter().any(|e| e.check.name == check.name) {
            return Err(ConfigError::Conflict(format!(
                "health check '{}' is already registered",
                check.name
            )));
        }
        checks.push(Entry {
            check,
            status: CheckStatus::default(),
        });
        Ok(())
    }

    /// Removes a check, returning true if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut checks = self.inner.lock_checks();
        let before = checks.len();
        checks.retain(|e| e.check.name != name);
        checks.len() != before
    }

    /// Runs one evaluation cycle over every registered check.
    pub async fn run_once(&self) {
        self.inner.run_cycle().await;
    }

    /// Spawns the periodic loop on the current tokio runtime.
    ///
    /// The first cycle runs immediately. Calling `start` while the loop is
    /// already running has no effect.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                inner.run_cycle().await;
            }
        }));

        #[cfg(feature = "tracing")]
        tracing::info!(
            interval_ms = self.inner.config.interval.as_millis() as u64,
            "health monitor started"
        );
    }

    /// Stops the periodic loop. A cycle in progress is abandoned.
    pub fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();

            #[cfg(feature = "tracing")]
            tracing::info!("health monitor stopped");
        }
    }

    /// Returns true while the periodic loop is running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Returns the status of every check, in registration order.
    pub fn statuses(&self) -> Vec<(String, CheckStatus)> {
        self.inner
            .lock_checks()
            .iter()
            .map(|e| (e.check.name.clone(), e.status))
            .collect()
    }

    /// Returns the status of one check.
    pub fn status(&self, name: &str) -> Option<CheckStatus> {
        self.inner
            .lock_checks()
            .iter()
            .find(|e| e.check.name == name)
            .map(|e| e.status)
    }

    /// Returns true if every registered check is currently healthy.
    pub fn all_healthy(&self) -> bool {
        self.inner.lock_checks().iter().all(|e| e.status.healthy)
    }
}

impl Default for HealthMonitor {
    /// A monitor with the default interval and check timeout.
    fn default() -> Self {
        HealthMonitorBuilder::new().assemble()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("config", &self.inner.config)
            .field("checks", &self.inner.lock_checks().len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Inner {
    fn lock_checks(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.checks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_cycle(&self) {
        // Evaluate outside the lock; checks may take up to `check_timeout`.
        let checks: Vec<HealthCheck> = self
            .lock_checks()
            .iter()
            .map(|e| e.check.clone())
            .collect();

        join_all(checks.iter().map(|check| self.evaluate(check))).await;
    }

    async fn evaluate(&self, check: &HealthCheck) {
        let healthy = self.probe(check).await;
        let checked_at = SystemTime::now();

        let previous = {
            let mut checks = self.lock_checks();
            // Unregistered while the probe ran.
            let Some(entry) = checks.iter_mut().find(|e| e.check.name == check.name) else {
                return;
            };
            let previous = entry.status.healthy;
            entry.status = CheckStatus {
                healthy,
                last_checked_at: Some(checked_at),
            };
            previous
        };

        #[cfg(feature = "metrics")]
        gauge!("healthcheck_status", "check" => check.name.clone())
            .set(if healthy { 1.0 } else { 0.0 });

        if previous == healthy {
            return;
        }

        if healthy {
            #[cfg(feature = "tracing")]
            tracing::info!(check = %check.name, "health check recovered");
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(check = %check.name, "health check became unhealthy");
        }

        self.emit(HealthEvent::StatusChanged {
            check: check.name.clone(),
            timestamp: Instant::now(),
            healthy,
        });

        if !healthy {
            self.recover(check).await;
        }
    }

    async fn probe(&self, check: &HealthCheck) -> bool {
        // The closure itself may panic before handing back a future.
        let run = AssertUnwindSafe(async { (check.check)().await }).catch_unwind();
        match tokio::time::timeout(self.config.check_timeout, run).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(_panic)) => {
                #[cfg(feature = "tracing")]
                tracing::error!(check = %check.name, "health check panicked");
                false
            }
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    check = %check.name,
                    timeout_ms = self.config.check_timeout.as_millis() as u64,
                    "health check timed out"
                );
                false
            }
        }
    }

    async fn recover(&self, check: &HealthCheck) {
        let Some(recovery) = &check.recovery else {
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::info!(check = %check.name, "running recovery action");

        let successful = match AssertUnwindSafe(async { recovery().await }).catch_unwind().await {
            Ok(Ok(())) => {
                #[cfg(feature = "tracing")]
                tracing::info!(check = %check.name, "recovery action succeeded");
                true
            }
            Ok(Err(_error)) => {
                #[cfg(feature = "tracing")]
                tracing::error!(check = %check.name, error = %_error, "recovery action failed");
                false
            }
            Err(_panic) => {
                #[cfg(feature = "tracing")]
                tracing::error!(check = %check.name, "recovery action panicked");
                false
            }
        };

        #[cfg(feature = "metrics")]
        counter!(
            "healthcheck_recoveries_total",
            "check" => check.name.clone(),
            "outcome" => if successful { "success" } else { "failure" }
        )
        .increment(1);

        self.emit(HealthEvent::RecoveryAttempted {
            check: check.name.clone(),
            timestamp: Instant::now(),
            successful,
        });
    }

    fn emit(&self, event: HealthEvent) {
        if !self.event_listeners.is_empty() {
            self.event_listeners.emit(&event);
        }
    }
}

/// Builder for [`HealthMonitor`].
pub struct HealthMonitorBuilder {
    config: HealthMonitorConfig,
    event_listeners: EventListeners<HealthEvent>,
}

impl HealthMonitorBuilder {
    fn new() -> Self {
        Self {
            config: HealthMonitorConfig::default(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: HealthMonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the time between cycles.
    ///
    /// Default: 30 seconds
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Sets how long a single check may run.
    ///
    /// Default: 10 seconds
    pub fn check_timeout(mut self, timeout: Duration) -> Self {
        self.config.check_timeout = timeout;
        self
    }

    /// Registers a callback for status changes.
    ///
    /// The callback receives the check name and its new status.
    pub fn on_status_change<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &HealthEvent| {
            if let HealthEvent::StatusChanged { check, healthy, .. } = event {
                f(check, *healthy);
            }
        });
        self
    }

    /// Registers a callback for recovery outcomes.
    pub fn on_recovery<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &HealthEvent| {
            if let HealthEvent::RecoveryAttempted {
                check, successful, ..
            } = event
            {
                f(check, *successful);
            }
        });
        self
    }

    /// Registers a listener for every monitor event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&HealthEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Validates the configuration and builds the monitor.
    pub fn build(self) -> Result<HealthMonitor, ConfigError> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    fn assemble(self) -> HealthMonitor {
        HealthMonitor {
            inner: Arc::new(Inner {
                config: self.config,
                checks: Mutex::new(Vec::new()),
                event_listeners: self.event_listeners,
            }),
            task: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn monitor() -> HealthMonitor {
        HealthMonitor::builder().build().unwrap()
    }

    fn toggled(flag: &Arc<AtomicBool>) -> impl Fn() -> futures::future::Ready<bool> {
        let flag = Arc::clone(flag);
        move || futures::future::ready(flag.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn checks_start_healthy() {
        let monitor = monitor();
        monitor
            .register(HealthCheck::new("db", || async { false }))
            .unwrap();

        let status = monitor.status("db").unwrap();
        assert!(status.healthy);
        assert!(status.last_checked_at.is_none());

        monitor.run_once().await;
        let status = monitor.status("db").unwrap();
        assert!(!status.healthy);
        assert!(status.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_names_conflict() {
        let monitor = monitor();
        monitor
            .register(HealthCheck::new("db", || async { true }))
            .unwrap();
        assert!(matches!(
            monitor.register(HealthCheck::new("db", || async { true })),
            Err(ConfigError::Conflict(_))
        ));
        assert!(monitor.unregister("db"));
        assert!(!monitor.unregister("db"));
    }

    #[tokio::test]
    async fn recovery_runs_only_on_healthy_to_unhealthy() {
        let healthy = Arc::new(AtomicBool::new(true));
        let recoveries = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&recoveries);

        let monitor = monitor();
        monitor
            .register(HealthCheck::new("api", toggled(&healthy)).with_recovery(move || {
                r.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, std::io::Error>(()) }
            }))
            .unwrap();

        monitor.run_once().await;
        assert_eq!(recoveries.load(Ordering::SeqCst), 0);

        healthy.store(false, Ordering::SeqCst);
        monitor.run_once().await;
        monitor.run_once().await;
        assert_eq!(recoveries.load(Ordering::SeqCst), 1);

        healthy.store(true, Ordering::SeqCst);
        monitor.run_once().await;
        healthy.store(false, Ordering::SeqCst);
        monitor.run_once().await;
        assert_eq!(recoveries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_recovery_is_reported_not_propagated() {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&outcomes);
        let monitor = HealthMonitor::builder()
            .on_recovery(move |name, ok| o.lock().unwrap().push((name.to_string(), ok)))
            .build()
            .unwrap();

        monitor
            .register(
                HealthCheck::new("queue", || async { false })
                    .with_recovery(|| async { Err::<(), _>(std::io::Error::other("still down")) }),
            )
            .unwrap();
        monitor
            .register(HealthCheck::new("cache", || async { true }))
            .unwrap();

        monitor.run_once().await;

        assert_eq!(*outcomes.lock().unwrap(), vec![("queue".to_string(), false)]);
        assert_eq!(monitor.status("cache").map(|s| s.healthy), Some(true));
    }

    async fn exploding_probe() -> bool {
        panic!("probe exploded")
    }

    #[tokio::test]
    async fn panicking_check_is_unhealthy_and_isolated() {
        let monitor = monitor();
        monitor
            .register(HealthCheck::new("broken", exploding_probe))
            .unwrap();
        monitor
            .register(HealthCheck::new("fine", || async { true }))
            .unwrap();

        monitor.run_once().await;

        assert_eq!(monitor.status("broken").map(|s| s.healthy), Some(false));
        assert_eq!(monitor.status("fine").map(|s| s.healthy), Some(true));
        assert!(!monitor.all_healthy());
    }

    #[tokio::test]
    async fn check_panicking_before_its_future_is_unhealthy() {
        let monitor = monitor();
        monitor
            .register(HealthCheck::new("eager", || -> futures::future::Ready<bool> {
                panic!("probe setup failed")
            }))
            .unwrap();
        monitor
            .register(HealthCheck::new("fine", || async { true }))
            .unwrap();

        monitor.run_once().await;

        let eager = monitor.status("eager").unwrap();
        assert!(!eager.healthy);
        assert!(eager.last_checked_at.is_some());
        assert_eq!(monitor.status("fine").map(|s| s.healthy), Some(true));
    }

    #[tokio::test]
    async fn recovery_panicking_before_its_future_is_a_failed_recovery() {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let o = Arc::clone(&outcomes);
        let monitor = HealthMonitor::builder()
            .on_recovery(move |name, ok| o.lock().unwrap().push((name.to_string(), ok)))
            .build()
            .unwrap();
        monitor
            .register(
                HealthCheck::new("queue", || async { false }).with_recovery(
                    || -> futures::future::Ready<Result<(), std::io::Error>> {
                        panic!("restart script missing")
                    },
                ),
            )
            .unwrap();

        monitor.run_once().await;

        assert!(!monitor.all_healthy());
        assert_eq!(*outcomes.lock().unwrap(), vec![("queue".to_string(), false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_check_times_out_as_unhealthy() {
        let monitor = HealthMonitor::builder()
            .check_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        monitor
            .register(HealthCheck::new("slow", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                true
            }))
            .unwrap();

        let start = tokio::time::Instant::now();
        monitor.run_once().await;

        assert_eq!(monitor.status("slow").map(|s| s.healthy), Some(false));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_runs_on_interval_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let monitor = HealthMonitor::builder()
            .interval(Duration::from_secs(30))
            .build()
            .unwrap();
        monitor
            .register(HealthCheck::new("tick", move || {
                r.fetch_add(1, Ordering::SeqCst);
                async { true }
            }))
            .unwrap();

        monitor.start();
        monitor.start();
        assert!(monitor.is_running());

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        monitor.stop();
        assert!(!monitor.is_running());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
