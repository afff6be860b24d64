use crate::log::ErrorLog;
use crate::record::FailureContext;
use futures::future::{self, BoxFuture};
use std::error::Error;
use std::sync::Arc;

/// Receives failures from components that do not own an error log.
///
/// Workers report every execution failure through this seam before they
/// release the failed task's slot. [`ErrorLog`] implements it by recording
/// the failure; richer implementations can also run recovery.
pub trait ErrorReporter: Send + Sync {
    /// Reports one failure.
    fn report<'a>(
        &'a self,
        error: &'a (dyn Error + Send + Sync + 'static),
        context: FailureContext,
    ) -> BoxFuture<'a, ()>;
}

impl ErrorReporter for ErrorLog {
    fn report<'a>(
        &'a self,
        error: &'a (dyn Error + Send + Sync + 'static),
        context: FailureContext,
    ) -> BoxFuture<'a, ()> {
        self.record_dyn(error, context);
        Box::pin(future::ready(()))
    }
}

impl<T: ErrorReporter + ?Sized> ErrorReporter for Arc<T> {
    fn report<'a>(
        &'a self,
        error: &'a (dyn Error + Send + Sync + 'static),
        context: FailureContext,
    ) -> BoxFuture<'a, ()> {
        (**self).report(error, context)
    }
}
