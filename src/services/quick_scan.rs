use crate::metrics::ScanMetrics;
use crate::platform::{FieldFocus, NoopFocus};
use crate::state::{ScanChange, ScanStateManager};
use crate::storage::KeyValueStore;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(180);
pub const DEFAULT_DEDUPE: Duration = Duration::from_millis(600);

/// Caller logic run for a scanned code, typically an API call plus feedback.
///
/// Errors are the action's own business to report; the controller only logs them.
pub type ScanAction = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`ScanAction`].
pub fn action<F, Fut>(f: F) -> ScanAction
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// What a call to the shared run procedure did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The action ran (it may still have returned an error)
    Executed,
    /// Nothing to submit
    Empty,
    /// Same code already ran within the dedupe window
    Duplicate,
    /// Another action is still in flight
    Locked,
}

/// Construction options for [`QuickScanController`].
pub struct QuickScanOptions {
    pub debounce: Duration,
    pub dedupe: Duration,
    pub on_auto: ScanAction,
    /// Defaults to `on_auto`
    pub on_enter: Option<ScanAction>,
    pub focus: Arc<dyn FieldFocus>,
    pub storage: Option<Arc<dyn KeyValueStore>>,
    pub storage_key: Option<String>,
    pub metrics: Option<Arc<ScanMetrics>>,
}

impl QuickScanOptions {
    pub fn new(on_auto: ScanAction) -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            dedupe: DEFAULT_DEDUPE,
            on_auto,
            on_enter: None,
            focus: Arc::new(NoopFocus),
            storage: None,
            storage_key: None,
            metrics: None,
        }
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn dedupe(mut self, dedupe: Duration) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn on_enter(mut self, on_enter: ScanAction) -> Self {
        self.on_enter = Some(on_enter);
        self
    }

    pub fn focus(mut self, focus: Arc<dyn FieldFocus>) -> Self {
        self.focus = focus;
        self
    }

    /// Persist the enabled toggle under `key`.
    pub fn persist(mut self, storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        self.storage = Some(storage);
        self.storage_key = Some(key.into());
        self
    }

    pub fn metrics(mut self, metrics: Arc<ScanMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

struct PendingTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone)]
struct LastAction {
    code: String,
    at: Instant,
}

struct Inner {
    state: Arc<ScanStateManager>,
    debounce: Duration,
    dedupe: Duration,
    on_auto: ScanAction,
    on_enter: ScanAction,
    focus: Arc<dyn FieldFocus>,
    persistence: Option<(Arc<dyn KeyValueStore>, String)>,
    metrics: Option<Arc<ScanMetrics>>,

    pending: Mutex<Option<PendingTimer>>,
    timer_seq: AtomicU64,
    locked: AtomicBool,
    last_action: Mutex<Option<LastAction>>,
}

/// Releases the lock and records the code, even if the action future is dropped.
struct RunGuard<'a> {
    inner: &'a Inner,
    code: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.inner.last_action) = Some(LastAction {
            code: std::mem::take(&mut self.code),
            at: Instant::now(),
        });
        self.inner.locked.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parse a stored toggle. Anything unrecognised is ignored.
fn parse_toggle(raw: &str) -> Option<bool> {
    match raw {
        "0" | "false" => Some(false),
        "1" | "true" => Some(true),
        _ => None,
    }
}

/// Focus after the UI has had a chance to settle.
async fn restore_focus(focus: &dyn FieldFocus) {
    tokio::task::yield_now().await;
    focus.focus();
    focus.select();
}

impl Inner {
    fn clear_timer(&self) {
        if let Some(timer) = lock(&self.pending).take() {
            timer.handle.abort();
        }
    }

    fn is_duplicate(&self, code: &str) -> bool {
        lock(&self.last_action)
            .as_ref()
            .is_some_and(|last| last.code == code && last.at.elapsed() < self.dedupe)
    }

    fn record_skip(&self, outcome: RunOutcome) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match outcome {
            RunOutcome::Empty => metrics.record_skipped_empty(),
            RunOutcome::Duplicate => metrics.record_skipped_duplicate(),
            RunOutcome::Locked => metrics.record_skipped_locked(),
            RunOutcome::Executed => {}
        }
    }

    async fn run(&self, action: &ScanAction) -> RunOutcome {
        self.clear_timer();

        let code = self.state.value().trim().to_owned();
        if code.is_empty() {
            self.record_skip(RunOutcome::Empty);
            return RunOutcome::Empty;
        }

        if self.is_duplicate(&code) {
            tracing::debug!(%code, "Skipping duplicate scan");
            self.record_skip(RunOutcome::Duplicate);
            return RunOutcome::Duplicate;
        }

        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(%code, "Scan action still running, ignoring");
            self.record_skip(RunOutcome::Locked);
            return RunOutcome::Locked;
        }

        tracing::debug!(%code, "Running scan action");
        let result = {
            let _guard = RunGuard {
                inner: self,
                code: code.clone(),
            };
            action().await
        };

        if let Err(e) = &result {
            tracing::warn!(%code, "Scan action failed: {:#}", e);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_action(result.is_ok());
        }

        restore_focus(self.focus.as_ref()).await;
        RunOutcome::Executed
    }

    /// Re-arm the debounce timer for a new value.
    fn on_value_changed(self: &Arc<Self>, value: &str) {
        let (enabled, busy) = self.state.read(|s| (s.enabled, s.busy));
        if !enabled || busy {
            return;
        }

        let trimmed = value.trim().to_owned();
        if trimmed.is_empty() {
            return;
        }

        let mut pending = lock(&self.pending);
        if let Some(timer) = pending.take() {
            timer.handle.abort();
        }

        let seq = self.timer_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.fire_timer(seq, trimmed).await;
        });
        *pending = Some(PendingTimer { seq, handle });
    }

    async fn fire_timer(&self, seq: u64, scheduled: String) {
        {
            let mut pending = lock(&self.pending);
            if !pending.as_ref().is_some_and(|timer| timer.seq == seq) {
                return;
            }
            // Detach rather than abort: the action below runs on this task
            pending.take();
        }

        let still_valid = self
            .state
            .read(|s| s.enabled && !s.busy && s.value.trim() == scheduled);
        if !still_valid {
            tracing::debug!(code = %scheduled, "Debounced scan is stale, dropping");
            return;
        }

        let on_auto = Arc::clone(&self.on_auto);
        self.run(&on_auto).await;
    }

    fn on_enabled_changed(&self, enabled: bool) {
        if let Some((storage, key)) = &self.persistence {
            let raw = if enabled { "1" } else { "0" };
            if let Err(e) = storage.set(key, raw) {
                tracing::warn!("Failed to persist quick scan toggle: {}", e);
            }
        }

        tracing::info!(enabled, "Quick scan toggled");

        if enabled {
            let focus = Arc::clone(&self.focus);
            tokio::spawn(async move { restore_focus(focus.as_ref()).await });
        }
    }
}

async fn watch_changes(inner: Arc<Inner>, mut changes: broadcast::Receiver<ScanChange>) {
    loop {
        match changes.recv().await {
            Ok(ScanChange::ValueChanged { value }) => inner.on_value_changed(&value),
            Ok(ScanChange::EnabledChanged { enabled }) => inner.on_enabled_changed(enabled),
            Ok(ScanChange::BusyChanged { .. }) => {}
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Quick scan fell behind on field changes");
                let value = inner.state.value();
                inner.on_value_changed(&value);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Turns a live scan field into well-timed, non-overlapping action calls
///
/// Watches the field's value, enabled and busy cells through
/// [`ScanStateManager`]. Keystroke bursts and repeated camera writes are
/// debounced; only the value that has been quiet for `debounce` fires
/// `on_auto`. [`on_enter()`](Self::on_enter) submits immediately with
/// `on_enter`. Both paths go through one run procedure that:
///
/// - drops blank codes and codes that ran within `dedupe`
/// - never runs two actions at once
/// - records the code and releases the lock whether the action failed or not
/// - puts focus back on the field afterwards
///
/// An action that never completes keeps the lock held; there is no timeout.
///
/// Must be created inside a tokio runtime. Dropping the controller cancels a
/// pending debounce but lets an in-flight action finish.
pub struct QuickScanController {
    inner: Arc<Inner>,
    watcher: JoinHandle<()>,
}

impl QuickScanController {
    pub fn new(state: Arc<ScanStateManager>, options: QuickScanOptions) -> Self {
        let persistence = match (options.storage, options.storage_key) {
            (Some(storage), Some(key)) => Some((storage, key)),
            _ => None,
        };

        if let Some((storage, key)) = &persistence {
            match storage.get(key) {
                Ok(Some(raw)) => {
                    if let Some(enabled) = parse_toggle(&raw) {
                        state.set_enabled(enabled);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::debug!("Quick scan toggle not restored: {}", e),
            }
        }

        // Subscribe after restoring so the restored value isn't written back
        let changes = state.subscribe();

        let on_enter = options
            .on_enter
            .unwrap_or_else(|| Arc::clone(&options.on_auto));

        let inner = Arc::new(Inner {
            state,
            debounce: options.debounce,
            dedupe: options.dedupe,
            on_auto: options.on_auto,
            on_enter,
            focus: options.focus,
            persistence,
            metrics: options.metrics,
            pending: Mutex::new(None),
            timer_seq: AtomicU64::new(0),
            locked: AtomicBool::new(false),
            last_action: Mutex::new(None),
        });

        let watcher = tokio::spawn(watch_changes(Arc::clone(&inner), changes));

        Self { inner, watcher }
    }

    /// Explicit submit (hardware scanner terminator key). Skips the debounce,
    /// still deduped and locked.
    pub async fn on_enter(&self) -> RunOutcome {
        let on_enter = Arc::clone(&self.inner.on_enter);
        self.inner.run(&on_enter).await
    }

    /// Focus and select the field after the UI settles.
    pub async fn focus(&self) {
        restore_focus(self.inner.focus.as_ref()).await;
    }

    /// Cancel a pending debounce, if any.
    pub fn clear_timer(&self) {
        self.inner.clear_timer();
    }

    pub fn has_pending_timer(&self) -> bool {
        lock(&self.inner.pending).is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.is_enabled()
    }

    /// Switch quick scan on or off. Persisted and focused by the watcher.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.state.set_enabled(enabled);
    }
}

impl Drop for QuickScanController {
    fn drop(&mut self) {
        self.watcher.abort();
        self.inner.clear_timer();
    }
}
