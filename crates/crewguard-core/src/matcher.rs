//! Type-based error matching.
//!
//! Retry policies and circuit breakers only act on errors of configured
//! kinds. An [`ErrorMatcher`] describes that set. Matching works on concrete
//! error values as well as on [`BoxError`](crate::BoxError)s, whose source
//! chain is searched.

use crate::BoxError;
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;

type Rule = Arc<dyn Fn(&(dyn Any + 'static)) -> bool + Send + Sync>;

/// The set of error kinds a policy acts on.
///
/// A matcher with no rules matches every error. Once a rule is added it
/// matches only errors accepted by at least one rule, so the first `or_*`
/// call narrows the set and each later one widens it again.
///
/// # Examples
///
/// ```
/// use crewguard_core::ErrorMatcher;
/// use std::io;
///
/// let matcher = ErrorMatcher::any().or_io_kinds([io::ErrorKind::ConnectionRefused]);
///
/// assert!(matcher.matches(&io::Error::from(io::ErrorKind::ConnectionRefused)));
/// assert!(!matcher.matches(&io::Error::from(io::ErrorKind::NotFound)));
/// ```
#[derive(Clone, Default)]
pub struct ErrorMatcher {
    rules: Vec<Rule>,
    labels: Vec<String>,
}

impl ErrorMatcher {
    /// Matches every error, until the first `or_*` rule is added.
    pub fn any() -> Self {
        Self::default()
    }

    /// Adds errors of type `T`, or boxed errors whose source chain contains
    /// a `T`.
    ///
    /// On a matcher without rules this replaces "every error".
    pub fn or_type<T>(mut self) -> Self
    where
        T: Error + 'static,
    {
        self.labels.push(std::any::type_name::<T>().to_string());
        self.rules.push(Arc::new(|err: &(dyn Any + 'static)| {
            err.is::<T>() || boxed_chain(err).any(|e| e.is::<T>())
        }));
        self
    }

    /// Adds `std::io::Error`s whose kind is one of `kinds`.
    ///
    /// On a matcher without rules this replaces "every error".
    pub fn or_io_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = io::ErrorKind>,
    {
        let kinds: Vec<io::ErrorKind> = kinds.into_iter().collect();
        self.labels.push(format!("io::Error{:?}", kinds));
        self.rules.push(Arc::new(move |err: &(dyn Any + 'static)| {
            let direct = err
                .downcast_ref::<io::Error>()
                .is_some_and(|e| kinds.contains(&e.kind()));
            direct
                || boxed_chain(err).any(|e| {
                    e.downcast_ref::<io::Error>()
                        .is_some_and(|e| kinds.contains(&e.kind()))
                })
        }));
        self
    }

    /// Adds boxed errors for which `predicate` holds on any error in the
    /// source chain.
    ///
    /// On a matcher without rules this replaces "every error".
    pub fn or_boxed<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.labels.push("<predicate>".to_string());
        self.rules.push(Arc::new(move |err: &(dyn Any + 'static)| {
            boxed_chain(err).any(|e| predicate(e))
        }));
        self
    }

    /// Returns true if this matcher accepts every error.
    pub fn is_any(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if `err` belongs to the configured set.
    pub fn matches<E: 'static>(&self, err: &E) -> bool {
        if self.rules.is_empty() {
            return true;
        }
        let err: &(dyn Any + 'static) = err;
        self.rules.iter().any(|rule| rule(err))
    }
}

impl fmt::Debug for ErrorMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rules.is_empty() {
            f.write_str("ErrorMatcher(any)")
        } else {
            f.debug_tuple("ErrorMatcher").field(&self.labels).finish()
        }
    }
}

/// Iterates the source chain of `err` if it is a [`BoxError`].
fn boxed_chain<'a>(
    err: &'a (dyn Any + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    let head: Option<&'a (dyn Error + 'static)> = err
        .downcast_ref::<BoxError>()
        .map(|boxed| &**boxed as &(dyn Error + 'static));
    std::iter::successors(head, |&e| e.source())
}
