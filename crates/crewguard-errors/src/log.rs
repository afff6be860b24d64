//! Append-only error log and its statistics.

use crate::classifier::{Classification, ErrorClassifier};
use crate::events::ErrorEvent;
use crate::record::{ErrorRecord, FailureContext};
use crewguard_core::{EventListeners, Severity};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime};

/// Window for the "recent" figures in [`ErrorStatistics`].
pub const RECENT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

const MOST_COMMON_LIMIT: usize = 5;

/// Errors returned when updating an [`ErrorLog`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorLogError {
    /// No record with this id exists.
    #[error("no error record with id '{0}'")]
    UnknownRecord(String),
    /// The record's recovery outcome was already set.
    #[error("recovery outcome for error record '{0}' is already set")]
    AlreadyResolved(String),
}

/// Aggregated view over an [`ErrorLog`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorStatistics {
    /// Every record in the log.
    pub total_errors: usize,
    /// Records from the last 24 hours.
    pub recent_errors: usize,
    /// Record count per type label, over the whole log.
    pub error_types: BTreeMap<String, usize>,
    /// Recent record count per severity. Every severity is present.
    pub severity_breakdown: BTreeMap<Severity, usize>,
    /// Percentage of recent recovery attempts that succeeded, 0 when none
    /// were attempted.
    pub recovery_success_rate: f64,
    /// The five most common type labels, most frequent first.
    pub most_common_errors: Vec<(String, usize)>,
}

/// Thread-safe, append-only store of [`ErrorRecord`]s.
///
/// Cloning an `ErrorLog` yields a handle to the same records.
///
/// # Examples
///
/// ```
/// use crewguard_errors::{ErrorLog, FailureContext};
/// use crewguard_core::Severity;
/// use std::io;
///
/// let log = ErrorLog::new();
/// let record = log.record(
///     &io::Error::from(io::ErrorKind::ConnectionRefused),
///     FailureContext::new("model-api"),
/// );
/// assert_eq!(record.severity, Severity::High);
///
/// log.set_recovery_outcome(&record.id, true).unwrap();
/// assert_eq!(log.statistics().recovery_success_rate, 100.0);
/// ```
#[derive(Clone)]
pub struct ErrorLog {
    inner: Arc<Inner>,
}

struct Inner {
    classifier: ErrorClassifier,
    records: RwLock<Vec<ErrorRecord>>,
    next_id: AtomicU64,
    event_listeners: EventListeners<ErrorEvent>,
}

impl ErrorLog {
    /// Creates an empty log with the built-in classifier.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a log.
    pub fn builder() -> ErrorLogBuilder {
        ErrorLogBuilder::new()
    }

    /// Returns the classifier used for new records.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.inner.classifier
    }

    /// Classifies and appends a statically typed error.
    pub fn record<E>(&self, error: &E, context: FailureContext) -> ErrorRecord
    where
        E: Error + 'static,
    {
        let classification = self.inner.classifier.classify_typed(error);
        self.append(error, classification, context)
    }

    /// Classifies and appends a type-erased error.
    pub fn record_dyn(&self, error: &(dyn Error + 'static), context: FailureContext) -> ErrorRecord {
        let classification = self.inner.classifier.classify(error);
        self.append(error, classification, context)
    }

    /// Appends an error with a classification decided by the caller.
    pub fn append(
        &self,
        error: &(dyn Error + 'static),
        classification: Classification,
        context: FailureContext,
    ) -> ErrorRecord {
        let id = format!("err-{}", self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let causes = std::iter::successors(error.source(), |&e| e.source())
            .map(|e| e.to_string())
            .collect();

        let record = ErrorRecord {
            id,
            error_type: classification.error_type,
            message: error.to_string(),
            severity: classification.severity,
            component: context.component,
            worker_id: context.worker_id,
            timestamp: SystemTime::now(),
            context: context.context,
            causes,
            recovery_attempted: false,
            recovery_successful: false,
        };

        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());

        #[cfg(feature = "tracing")]
        log_record(&record);

        #[cfg(feature = "metrics")]
        counter!("errors_recorded_total", "severity" => record.severity.as_str()).increment(1);

        self.emit(ErrorEvent::ErrorRecorded {
            component: record.component.clone(),
            timestamp: Instant::now(),
            record_id: record.id.clone(),
            error_type: record.error_type.clone(),
            severity: record.severity,
        });

        record
    }

    /// Sets the recovery outcome of a record. Marks the record as attempted.
    ///
    /// The outcome can be set once; later calls return
    /// [`ErrorLogError::AlreadyResolved`].
    pub fn set_recovery_outcome(
        &self,
        id: &str,
        successful: bool,
    ) -> Result<ErrorRecord, ErrorLogError> {
        let updated = {
            let mut records = self
                .inner
                .records
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let record = records
                .iter_mut()
                .rev()
                .find(|r| r.id == id)
                .ok_or_else(|| ErrorLogError::UnknownRecord(id.to_string()))?;
            if record.recovery_attempted {
                return Err(ErrorLogError::AlreadyResolved(id.to_string()));
            }
            record.recovery_attempted = true;
            record.recovery_successful = successful;
            record.clone()
        };

        self.emit(ErrorEvent::RecoveryResolved {
            component: updated.component.clone(),
            timestamp: Instant::now(),
            record_id: updated.id.clone(),
            successful,
        });

        Ok(updated)
    }

    /// Returns the record with `id`, if any.
    pub fn get(&self, id: &str) -> Option<ErrorRecord> {
        self.read(|records| records.iter().find(|r| r.id == id).cloned())
    }

    /// Returns a copy of every record, oldest first.
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.read(|records| records.to_vec())
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.read(|records| records.len())
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Computes statistics as of now.
    pub fn statistics(&self) -> ErrorStatistics {
        self.statistics_at(SystemTime::now())
    }

    /// Computes statistics with the recent window ending at `now`.
    pub fn statistics_at(&self, now: SystemTime) -> ErrorStatistics {
        self.read(|records| compute_statistics(records, now))
    }

    fn read<T>(&self, f: impl FnOnce(&[ErrorRecord]) -> T) -> T {
        let records = self
            .inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&records)
    }

    fn emit(&self, event: ErrorEvent) {
        if !self.inner.event_listeners.is_empty() {
            self.inner.event_listeners.emit(&event);
        }
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorLog")
            .field("records", &self.len())
            .field("classifier", &self.inner.classifier)
            .finish()
    }
}

fn compute_statistics(records: &[ErrorRecord], now: SystemTime) -> ErrorStatistics {
    let is_recent = |r: &ErrorRecord| match now.duration_since(r.timestamp) {
        Ok(age) => age <= RECENT_WINDOW,
        // Recorded after `now`.
        Err(_) => true,
    };

    let mut error_types: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        *error_types.entry(record.error_type.clone()).or_default() += 1;
    }

    let mut severity_breakdown: BTreeMap<Severity, usize> =
        Severity::ALL.iter().map(|s| (*s, 0)).collect();
    let mut recent_errors = 0;
    let mut attempted = 0usize;
    let mut successful = 0usize;
    for record in records.iter().filter(|r| is_recent(r)) {
        recent_errors += 1;
        *severity_breakdown.entry(record.severity).or_default() += 1;
        if record.recovery_attempted {
            attempted += 1;
            if record.recovery_successful {
                successful += 1;
            }
        }
    }

    let recovery_success_rate = if attempted == 0 {
        0.0
    } else {
        successful as f64 / attempted as f64 * 100.0
    };

    let mut most_common_errors: Vec<(String, usize)> = error_types
        .iter()
        .map(|(name, count)| (name.clone(), *count))
        .collect();
    most_common_errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    most_common_errors.truncate(MOST_COMMON_LIMIT);

    ErrorStatistics {
        total_errors: records.len(),
        recent_errors,
        error_types,
        severity_breakdown,
        recovery_success_rate,
        most_common_errors,
    }
}

#[cfg(feature = "tracing")]
fn log_record(record: &ErrorRecord) {
    match record.severity {
        Severity::Critical => tracing::error!(
            id = %record.id,
            component = %record.component,
            error_type = %record.error_type,
            message = %record.message,
            "critical error recorded"
        ),
        Severity::High => tracing::warn!(
            id = %record.id,
            component = %record.component,
            error_type = %record.error_type,
            message = %record.message,
            "error recorded"
        ),
        Severity::Medium => tracing::info!(
            id = %record.id,
            component = %record.component,
            error_type = %record.error_type,
            message = %record.message,
            "error recorded"
        ),
        Severity::Low => tracing::debug!(
            id = %record.id,
            component = %record.component,
            error_type = %record.error_type,
            "error recorded"
        ),
    }
}

/// Builder for [`ErrorLog`].
pub struct ErrorLogBuilder {
    classifier: ErrorClassifier,
    event_listeners: EventListeners<ErrorEvent>,
}

impl ErrorLogBuilder {
    fn new() -> Self {
        Self {
            classifier: ErrorClassifier::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the classifier used for new records.
    ///
    /// Default: [`ErrorClassifier::new`] (built-in rules only)
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Registers a callback invoked for every appended record.
    pub fn on_error_recorded<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Severity) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &ErrorEvent| {
            if let ErrorEvent::ErrorRecorded {
                error_type,
                severity,
                ..
            } = event
            {
                f(error_type, *severity);
            }
        });
        self
    }

    /// Registers a listener for every error log event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds the log.
    pub fn build(self) -> ErrorLog {
        ErrorLog {
            inner: Arc::new(Inner {
                classifier: self.classifier,
                records: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
                event_listeners: self.event_listeners,
            }),
        }
    }
}
