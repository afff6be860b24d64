//! Fault injection for executors.
//!
//! [`FailureInjectorLayer`] wraps an executor and fails selected tasks
//! before they reach it. It exists to exercise the failure paths of workers,
//! error logs and recovery strategies without a real faulty backend.

use crate::task::Task;
use crewguard_core::{BoxError, ConfigError};
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tower_layer::Layer;
use tower_service::Service;

/// The error returned for a task the injector chose to fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("injected failure for task '{task_id}'")]
pub struct InjectedFailure {
    pub task_id: String,
}

type Selector<P> = Arc<dyn Fn(&Task<P>) -> bool + Send + Sync>;

enum Mode<P> {
    When(Selector<P>),
    Rate { rate: f64, rng: Arc<Mutex<StdRng>> },
}

impl<P> Clone for Mode<P> {
    fn clone(&self) -> Self {
        match self {
            Mode::When(f) => Mode::When(Arc::clone(f)),
            Mode::Rate { rate, rng } => Mode::Rate {
                rate: *rate,
                rng: Arc::clone(rng),
            },
        }
    }
}

struct Config<P> {
    name: String,
    mode: Mode<P>,
    latency: Duration,
}

impl<P> Config<P> {
    fn should_fail(&self, task: &Task<P>) -> bool {
        match &self.mode {
            Mode::When(f) => f(task),
            Mode::Rate { rate, rng } => {
                let roll: f64 = rng.lock().unwrap_or_else(PoisonError::into_inner).random();
                roll < *rate
            }
        }
    }
}

/// Tower layer producing [`FailureInjector`] services.
///
/// # Examples
///
/// ```
/// use crewguard_orchestrator::{FailureInjectorLayer, Task, Worker};
/// use crewguard_core::BoxError;
/// use tower::ServiceBuilder;
///
/// let injector = FailureInjectorLayer::<u32>::builder()
///     .fail_when(|task: &Task<u32>| *task.payload() % 2 == 1)
///     .build()
///     .unwrap();
///
/// let executor = ServiceBuilder::new()
///     .layer(injector)
///     .service_fn(|task: Task<u32>| async move { Ok::<_, BoxError>(*task.payload()) });
///
/// let worker = Worker::builder("flaky").build(executor).unwrap();
/// ```
pub struct FailureInjectorLayer<P> {
    config: Arc<Config<P>>,
}

impl<P> Clone for FailureInjectorLayer<P> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<P> FailureInjectorLayer<P> {
    pub fn builder() -> FailureInjectorBuilder<P> {
        FailureInjectorBuilder {
            name: String::from("<unnamed>"),
            selector: None,
            rate: None,
            seed: None,
            latency: Duration::ZERO,
            _payload: PhantomData,
        }
    }
}

impl<S, P> Layer<S> for FailureInjectorLayer<P> {
    type Service = FailureInjector<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        FailureInjector {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Builder for [`FailureInjectorLayer`].
pub struct FailureInjectorBuilder<P> {
    name: String,
    selector: Option<Selector<P>>,
    rate: Option<f64>,
    seed: Option<u64>,
    latency: Duration,
    _payload: PhantomData<fn(&P)>,
}

impl<P> FailureInjectorBuilder<P> {
    /// Sets the name used in logs and metrics.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fails exactly the tasks matching `f`.
    pub fn fail_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&Task<P>) -> bool + Send + Sync + 'static,
    {
        self.selector = Some(Arc::new(f));
        self
    }

    /// Fails each task with probability `rate`, in `[0.0, 1.0]`.
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Seeds the random source used by [`failure_rate`](Self::failure_rate).
    ///
    /// Default: seeded from the operating system
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Delays every task, failed or not, before it proceeds.
    ///
    /// Default: no delay
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Builds the layer.
    ///
    /// Exactly one of [`fail_when`](Self::fail_when) and
    /// [`failure_rate`](Self::failure_rate) must be set.
    pub fn build(self) -> Result<FailureInjectorLayer<P>, ConfigError> {
        let mode = match (self.selector, self.rate) {
            (Some(f), None) => Mode::When(f),
            (None, Some(rate)) => {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(ConfigError::invalid(
                        "failure_rate",
                        format!("must be within [0.0, 1.0], got {rate}"),
                    ));
                }
                let rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                Mode::Rate {
                    rate,
                    rng: Arc::new(Mutex::new(rng)),
                }
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflict(
                    "fail_when and failure_rate are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(ConfigError::invalid(
                    "mode",
                    "either fail_when or failure_rate is required",
                ))
            }
        };

        Ok(FailureInjectorLayer {
            config: Arc::new(Config {
                name: self.name,
                mode,
                latency: self.latency,
            }),
        })
    }
}

/// An executor wrapper that fails selected tasks.
pub struct FailureInjector<S, P> {
    inner: S,
    config: Arc<Config<P>>,
}

impl<S: Clone, P> Clone for FailureInjector<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, P> fmt::Debug for FailureInjector<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureInjector")
            .field("name", &self.config.name)
            .field("latency", &self.config.latency)
            .finish()
    }
}

impl<S, P> Service<Task<P>> for FailureInjector<S, P>
where
    S: Service<Task<P>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    P: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, task: Task<P>) -> Self::Future {
        // Keep the instance that was driven ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);
        let fail = config.should_fail(&task);

        Box::pin(async move {
            if !config.latency.is_zero() {
                tokio::time::sleep(config.latency).await;
            }

            if fail {
                #[cfg(feature = "tracing")]
                tracing::warn!(injector = %config.name, task = %task.id(), "injecting failure");

                #[cfg(feature = "metrics")]
                metrics::counter!("injected_failures_total", "injector" => config.name.clone())
                    .increment(1);

                return Err(InjectedFailure {
                    task_id: task.id().to_string(),
                }
                .into());
            }

            inner.call(task).await.map_err(Into::into)
        })
    }
}
