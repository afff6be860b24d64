//! Severity classification for failures.
//!
//! The [`ErrorClassifier`] walks an error's source chain, outermost first,
//! and returns the severity and type label of the first error it recognizes.
//! Custom rules take precedence over the built-in ones.

use crewguard_core::Severity;
use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;

type RuleFn = Arc<dyn Fn(&(dyn Error + 'static)) -> Option<Severity> + Send + Sync>;

#[derive(Clone)]
struct Rule {
    label: String,
    recognizes: fn(&(dyn Error + 'static)) -> bool,
    classify: RuleFn,
}

/// Outcome of classifying one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Type label used for per-type statistics and recovery lookup.
    pub error_type: String,
    /// How serious the failure is.
    pub severity: Severity,
}

/// Maps failures to a [`Severity`] and a type label.
///
/// Built-in knowledge:
///
/// | Error | Severity |
/// |---|---|
/// | `io::Error` of kind `OutOfMemory`, `TryReserveError` | Critical |
/// | `io::Error` connectivity, timeout and permission kinds, `tokio::time::error::Elapsed` | High |
/// | `io::Error` of kind `InvalidInput`/`InvalidData`/`Unsupported`, number/utf-8 parse errors | Medium |
/// | anything else | Low |
#[derive(Clone)]
pub struct ErrorClassifier {
    custom: Vec<Rule>,
    builtin: Vec<Rule>,
}

impl ErrorClassifier {
    /// Creates a classifier with only the built-in rules.
    pub fn new() -> Self {
        Self {
            custom: Vec::new(),
            builtin: builtin_rules(),
        }
    }

    /// Adds a rule for errors of type `T`.
    ///
    /// `severity` may return `None` to defer to later rules, e.g. for enum
    /// variants it has no opinion on.
    pub fn with_rule<T, F>(mut self, severity: F) -> Self
    where
        T: Error + 'static,
        F: Fn(&T) -> Option<Severity> + Send + Sync + 'static,
    {
        self.push_rule::<T, F>(severity);
        self
    }

    /// Adds a rule mapping every error of type `T` to `severity`.
    pub fn with_severity<T>(self, severity: Severity) -> Self
    where
        T: Error + 'static,
    {
        self.with_rule::<T, _>(move |_| Some(severity))
    }

    /// In-place variant of [`with_rule`](Self::with_rule).
    pub fn push_rule<T, F>(&mut self, severity: F)
    where
        T: Error + 'static,
        F: Fn(&T) -> Option<Severity> + Send + Sync + 'static,
    {
        self.custom.push(typed_rule::<T, F>(severity));
    }

    /// Classifies `error` by its source chain.
    pub fn classify(&self, error: &(dyn Error + 'static)) -> Classification {
        self.classify_labelled(error, None)
    }

    /// Classifies a statically typed error, falling back to its Rust type
    /// name as the label when no rule recognizes it.
    pub fn classify_typed<E>(&self, error: &E) -> Classification
    where
        E: Error + 'static,
    {
        self.classify_labelled(error, Some(std::any::type_name::<E>()))
    }

    /// Classifies `error`, using `fallback` as the type label when no rule
    /// recognizes the outermost error.
    pub fn classify_labelled(
        &self,
        error: &(dyn Error + 'static),
        fallback: Option<&str>,
    ) -> Classification {
        let label = self
            .rules()
            .find(|rule| (rule.recognizes)(error))
            .map(|rule| rule.label.clone())
            .or_else(|| fallback.map(str::to_string))
            .unwrap_or_else(|| "dyn Error".to_string());

        let severity = std::iter::successors(Some(error), |&e| e.source())
            .find_map(|e| self.rules().find_map(|rule| (rule.classify)(e)))
            .unwrap_or(Severity::Low);

        Classification {
            error_type: label,
            severity,
        }
    }

    fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.custom.iter().chain(self.builtin.iter())
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field(
                "custom",
                &self.custom.iter().map(|r| &r.label).collect::<Vec<_>>(),
            )
            .field("builtin", &self.builtin.len())
            .finish()
    }
}

fn is_type<T: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    err.is::<T>()
}

fn typed_rule<T, F>(severity: F) -> Rule
where
    T: Error + 'static,
    F: Fn(&T) -> Option<Severity> + Send + Sync + 'static,
{
    Rule {
        label: std::any::type_name::<T>().to_string(),
        recognizes: is_type::<T>,
        classify: Arc::new(move |err: &(dyn Error + 'static)| {
            err.downcast_ref::<T>().and_then(&severity)
        }),
    }
}

fn builtin_rules() -> Vec<Rule> {
    vec![
        typed_rule::<io::Error, _>(|err| Some(io_severity(err.kind()))),
        typed_rule::<tokio::time::error::Elapsed, _>(|_| Some(Severity::High)),
        typed_rule::<std::collections::TryReserveError, _>(|_| Some(Severity::Critical)),
        typed_rule::<std::num::ParseIntError, _>(|_| Some(Severity::Medium)),
        typed_rule::<std::num::ParseFloatError, _>(|_| Some(Severity::Medium)),
        typed_rule::<std::str::ParseBoolError, _>(|_| Some(Severity::Medium)),
        typed_rule::<std::str::Utf8Error, _>(|_| Some(Severity::Medium)),
        typed_rule::<std::string::FromUtf8Error, _>(|_| Some(Severity::Medium)),
    ]
}

fn io_severity(kind: io::ErrorKind) -> Severity {
    use io::ErrorKind::*;
    match kind {
        OutOfMemory => Severity::Critical,
        ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected | BrokenPipe
        | AddrNotAvailable | AddrInUse | TimedOut | PermissionDenied | WouldBlock => {
            Severity::High
        }
        InvalidInput | InvalidData | Unsupported | UnexpectedEof => Severity::Medium,
        _ => Severity::Low,
    }
}
