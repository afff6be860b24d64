//! Circuit-breaker-then-retry protection, as a call helper and a tower layer.

use crate::error::{CircuitOpenError, ManagerError, ProtectedCallError};
use crewguard_circuitbreaker::{CircuitBreaker, CircuitBreakerError};
use crewguard_core::BoxError;
use crewguard_retry::RetryPolicy;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

/// The breaker and optional retry policy guarding one resource.
#[derive(Clone)]
pub(crate) struct Protection {
    resource: String,
    breaker: CircuitBreaker,
    retry: Option<RetryPolicy>,
}

impl Protection {
    pub(crate) fn new(resource: impl Into<String>, breaker: CircuitBreaker, retry: Option<RetryPolicy>) -> Self {
        Self {
            resource: resource.into(),
            breaker,
            retry,
        }
    }

    /// Every attempt, including the first, asks the breaker for permission.
    /// An open circuit ends the call; it is never retried.
    pub(crate) async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, ProtectedCallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: 'static,
    {
        let f = Mutex::new(f);
        let breaker = &self.breaker;
        let f = &f;
        let attempt = move || {
            breaker.call(move || {
                let mut f = f.lock().unwrap_or_else(PoisonError::into_inner);
                (*f)()
            })
        };

        let result = match &self.retry {
            Some(policy) => {
                policy
                    .retry_if(attempt, |err: &CircuitBreakerError<E>| match err {
                        CircuitBreakerError::Inner(e) => policy.should_retry(e),
                        CircuitBreakerError::OpenCircuit { .. } => false,
                    })
                    .await
            }
            None => attempt().await,
        };

        result.map_err(|err| match err {
            CircuitBreakerError::OpenCircuit { .. } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(resource = %self.resource, "protected call rejected by open circuit");

                ProtectedCallError::CircuitOpen(CircuitOpenError {
                    resource: self.resource.clone(),
                })
            }
            CircuitBreakerError::Inner(e) => ProtectedCallError::Inner(e),
        })
    }
}

impl fmt::Debug for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protection")
            .field("resource", &self.resource)
            .field("state", &self.breaker.state())
            .field("retry", &self.retry.as_ref().map(RetryPolicy::name))
            .finish()
    }
}

/// Tower layer running every call through a resource's breaker and retry
/// policy.
///
/// Created by [`ResilienceManager::layer`](crate::ResilienceManager::layer).
/// The breaker and policy are resolved once, when the layer is created.
///
/// Requests must be `Clone` so that failed attempts can be retried.
#[derive(Clone, Debug)]
pub struct ProtectedLayer {
    protection: Protection,
}

impl ProtectedLayer {
    pub(crate) fn new(protection: Protection) -> Self {
        Self { protection }
    }
}

impl<S> Layer<S> for ProtectedLayer {
    type Service = Protected<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Protected {
            inner,
            protection: self.protection.clone(),
        }
    }
}

/// A service guarded by [`ProtectedLayer`].
///
/// Errors are boxed: the inner service's own error is passed through
/// unchanged, and a rejected call yields a [`CircuitOpenError`].
#[derive(Clone, Debug)]
pub struct Protected<S> {
    inner: S,
    protection: Protection,
}

impl<S, Req> Service<Req> for Protected<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Error: Into<BoxError> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Each attempt drives its own clone of the inner service to readiness.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let inner = self.inner.clone();
        let protection = self.protection.clone();

        Box::pin(async move {
            protection
                .call(move || inner.clone().oneshot(req.clone()))
                .await
                .map_err(|err| match err {
                    ProtectedCallError::Inner(e) => e.into(),
                    ProtectedCallError::CircuitOpen(open) => open.into(),
                    ProtectedCallError::UnknownResource(name) => {
                        ManagerError::UnknownResource(name).into()
                    }
                })
        })
    }
}
