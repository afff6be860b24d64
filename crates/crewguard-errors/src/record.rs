use crewguard_core::Severity;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// One recorded failure.
///
/// Records are append-only. The only change a record ever sees is its
/// recovery outcome, which is set at most once.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorRecord {
    /// Unique id within the owning log.
    pub id: String,
    /// Type label from the classifier.
    pub error_type: String,
    /// Display form of the error.
    pub message: String,
    /// Classified severity.
    pub severity: Severity,
    /// Component that reported the failure.
    pub component: String,
    /// Worker the failure occurred on, if any.
    pub worker_id: Option<String>,
    /// Wall-clock time the failure was recorded.
    pub timestamp: SystemTime,
    /// Free-form context supplied by the reporter.
    pub context: BTreeMap<String, String>,
    /// Display forms of the error's sources, outermost first.
    pub causes: Vec<String>,
    /// Whether a recovery strategy was run for this failure.
    pub recovery_attempted: bool,
    /// Whether that recovery succeeded.
    pub recovery_successful: bool,
}

/// Details of a failure about to be appended to an
/// [`ErrorLog`](crate::ErrorLog).
#[derive(Debug, Clone, Default)]
pub struct FailureContext {
    /// Component reporting the failure.
    pub component: String,
    /// Worker the failure occurred on, if any.
    pub worker_id: Option<String>,
    /// Free-form key/value context.
    pub context: BTreeMap<String, String>,
}

impl FailureContext {
    /// Context for a failure in `component`.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Self::default()
        }
    }

    /// Attributes the failure to a worker.
    pub fn worker(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    /// Adds one key/value pair of context.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}
