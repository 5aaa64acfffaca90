use crate::metrics::ScanMetrics;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;

/// Priming failed. Cloneable so every waiter of one attempt gets the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("request priming failed: {0}")]
pub struct PrimerError(pub String);

/// The setup operation being guarded.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<(), PrimerError>>`,
/// so tests can pass a closure.
#[async_trait]
pub trait PrimeOperation: Send + Sync {
    async fn prime(&self) -> Result<(), PrimerError>;
}

#[async_trait]
impl<F, Fut> PrimeOperation for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PrimerError>> + Send + 'static,
{
    async fn prime(&self) -> Result<(), PrimerError> {
        (self)().await
    }
}

type InFlight = Shared<BoxFuture<'static, Result<(), PrimerError>>>;

#[derive(Default)]
struct PrimerState {
    ready: bool,
    in_flight: Option<InFlight>,
}

fn lock(state: &Mutex<PrimerState>) -> MutexGuard<'_, PrimerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ensure-once coordination around a shared async setup step
///
/// - Already primed: [`ensure()`](Self::ensure) returns immediately.
/// - Priming in flight: callers await the same attempt; the operation is not
///   started twice.
/// - Otherwise a new attempt starts. Success marks the primer ready; either
///   way the in-flight slot is cleared so a failure can be retried.
///
/// [`invalidate()`](Self::invalidate) clears the ready flag when the server
/// reports that the earlier result is stale, so the next `ensure()` primes again.
///
/// One instance is meant to be shared by every caller of the network layer.
pub struct SingleFlightPrimer {
    operation: Arc<dyn PrimeOperation>,
    state: Arc<Mutex<PrimerState>>,
    metrics: Option<Arc<ScanMetrics>>,
}

impl SingleFlightPrimer {
    pub fn new(operation: Arc<dyn PrimeOperation>) -> Self {
        Self {
            operation,
            state: Arc::new(Mutex::new(PrimerState::default())),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.state).ready
    }

    pub fn is_in_flight(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    pub async fn ensure(&self) -> Result<(), PrimerError> {
        let attempt = {
            let mut state = lock(&self.state);
            if state.ready {
                return Ok(());
            }
            match &state.in_flight {
                Some(attempt) => attempt.clone(),
                None => {
                    let attempt = self.begin(Arc::downgrade(&self.state));
                    state.in_flight = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Forget the primed state. An attempt already in flight is left alone.
    pub fn invalidate(&self) {
        let mut state = lock(&self.state);
        if state.ready {
            tracing::info!("Request priming invalidated; next mutating call will prime again");
        }
        state.ready = false;
    }

    fn begin(&self, state: Weak<Mutex<PrimerState>>) -> InFlight {
        if let Some(metrics) = &self.metrics {
            metrics.record_prime_started();
        }
        tracing::debug!("Starting request priming");

        let operation = Arc::clone(&self.operation);
        async move {
            let result = operation.prime().await;

            if let Some(state) = state.upgrade() {
                let mut state = lock(&state);
                if result.is_ok() {
                    state.ready = true;
                }
                state.in_flight = None;
            }

            match &result {
                Ok(()) => tracing::debug!("Request priming complete"),
                Err(e) => tracing::warn!("{}", e),
            }

            result
        }
        .boxed()
        .shared()
    }
}
