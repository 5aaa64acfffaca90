use crate::metrics::ScanMetrics;
use crate::models::ScannerConfig;
use crate::platform::{
    BarcodeDetector, CaptureConstraints, CaptureDevice, CaptureStream, DetectedBarcode,
    DetectorFactory, DeviceError, DisplaySurface, FrameClock, IntervalFrameClock,
};
use crate::services::capability::{Capabilities, CapabilitySource, EnvironmentError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors surfaced by [`CameraScanController::start`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("the camera preview is not ready yet; wait for the scanner view to open and try again")]
    Mount,

    #[error("could not open the camera: {0}")]
    Acquisition(#[from] DeviceError),
}

/// Callback receiving the first detected code of a session
pub type ResultCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// Options for one capture session
pub struct CameraScanOptions {
    pub on_result: ResultCallback,
    pub formats: Option<Vec<String>>,
}

impl CameraScanOptions {
    pub fn new(on_result: impl FnOnce(String) + Send + 'static) -> Self {
        Self {
            on_result: Box::new(on_result),
            formats: None,
        }
    }

    pub fn with_formats(mut self, formats: Vec<String>) -> Self {
        self.formats = Some(formats);
        self
    }

    /// Options using the configured detector formats
    pub fn from_config(
        on_result: impl FnOnce(String) + Send + 'static,
        config: &ScannerConfig,
    ) -> Self {
        Self {
            on_result: Box::new(on_result),
            formats: config.formats.clone(),
        }
    }
}

/// Lifecycle of the controller's capture session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing has been started yet
    #[default]
    Idle,
    /// Waiting on the camera
    Acquiring,
    /// Stream attached and detection loop running
    Scanning,
    /// Torn down by `stop`, a hit, an unmounted surface or a failed acquisition
    Stopped,
}

/// Platform pieces the controller drives
#[derive(Clone)]
pub struct CameraBackend {
    pub device: Arc<dyn CaptureDevice>,
    pub surface: Arc<dyn DisplaySurface>,
    pub detectors: Arc<dyn DetectorFactory>,
    pub clock: Arc<dyn FrameClock>,
}

impl CameraBackend {
    /// Backend paced by an [`IntervalFrameClock`] at the configured frame interval
    pub fn from_config(
        device: Arc<dyn CaptureDevice>,
        surface: Arc<dyn DisplaySurface>,
        detectors: Arc<dyn DetectorFactory>,
        config: &ScannerConfig,
    ) -> Self {
        Self {
            device,
            surface,
            detectors,
            clock: Arc::new(IntervalFrameClock::new(config.frame_interval())),
        }
    }
}

struct PollHandle {
    cancel: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

#[derive(Default)]
struct CaptureSession {
    /// Bumped by every start and stop; stale acquisitions and loops compare against it
    generation: u64,
    phase: SessionPhase,
    active: bool,
    stream: Option<Arc<dyn CaptureStream>>,
    poll: Option<PollHandle>,
    detector: Option<Arc<dyn BarcodeDetector>>,
}

struct Shared {
    backend: CameraBackend,
    session: Mutex<CaptureSession>,
    metrics: Option<Arc<ScanMetrics>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CaptureSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tear down whatever the session holds. Safe on an idle session.
    fn teardown(&self, session: &mut CaptureSession) {
        session.generation += 1;

        if let Some(poll) = session.poll.take() {
            let _ = poll.cancel.send(true);
        }

        let had_stream = match session.stream.take() {
            Some(stream) => {
                stream.stop_all_tracks();
                true
            }
            None => false,
        };

        session.detector = None;

        if had_stream {
            self.backend.surface.detach();
        }

        if session.active {
            tracing::info!("Camera scan session stopped");
        }
        session.active = false;

        if session.phase != SessionPhase::Idle {
            session.phase = SessionPhase::Stopped;
        }
    }

    /// Tear down the previous session and claim a new generation for the
    /// caller. One guard covers the teardown, the mount check and the phase
    /// change, so concurrent starts never share a generation.
    fn begin_session(&self) -> Result<u64, CameraError> {
        let mut session = self.lock();
        self.teardown(&mut session);

        if !self.backend.surface.is_mounted() {
            return Err(CameraError::Mount);
        }

        session.phase = SessionPhase::Acquiring;
        Ok(session.generation)
    }

    /// Stop only if `generation` is still the live session.
    fn stop_generation(&self, generation: u64) -> bool {
        let mut session = self.lock();
        if session.generation != generation || !session.active {
            return false;
        }
        self.teardown(&mut session);
        true
    }
}

/// Camera-based barcode capture
///
/// Owns the capture stream and a frame-paced detection loop. At most one
/// session is live per controller: [`start()`](Self::start) always tears the
/// previous one down first, and dropping the controller stops it.
///
/// # Session flow
///
/// 1. Capability check (secure context, capture API, detector)
/// 2. Stop any previous session
/// 3. Require a mounted display surface
/// 4. Open the rear camera, falling back to any camera
/// 5. Attach and play (playback failures are ignored)
/// 6. Detect once per frame until the first non-empty code, then stop and
///    hand the code to `on_result`
pub struct CameraScanController {
    capabilities: Capabilities,
    shared: Arc<Shared>,
}

impl CameraScanController {
    /// Probe the environment and build an idle controller. Never fails.
    pub fn new(environment: &dyn CapabilitySource, backend: CameraBackend) -> Self {
        Self::build(environment, backend, None)
    }

    pub fn with_metrics(
        environment: &dyn CapabilitySource,
        backend: CameraBackend,
        metrics: Arc<ScanMetrics>,
    ) -> Self {
        Self::build(environment, backend, Some(metrics))
    }

    fn build(
        environment: &dyn CapabilitySource,
        backend: CameraBackend,
        metrics: Option<Arc<ScanMetrics>>,
    ) -> Self {
        let capabilities = Capabilities::probe(environment);
        tracing::debug!(?capabilities, "Camera scan controller created");

        Self {
            capabilities,
            shared: Arc::new(Shared {
                backend,
                session: Mutex::new(CaptureSession::default()),
                metrics,
            }),
        }
    }

    /// Capabilities found at construction
    pub fn probe(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.lock().phase
    }

    /// Start a capture session
    ///
    /// # Errors
    ///
    /// - [`CameraError::Environment`] when a capability is missing
    /// - [`CameraError::Mount`] when the display surface isn't mounted
    /// - [`CameraError::Acquisition`] when both the rear-facing and the
    ///   unconstrained camera requests fail
    ///
    /// A `stop()` (or another `start()`) that lands while the camera is being
    /// acquired wins: the late stream is released and `Ok(())` is returned
    /// with the controller inactive.
    pub async fn start(&self, options: CameraScanOptions) -> Result<(), CameraError> {
        self.capabilities.check()?;

        let generation = self.shared.begin_session()?;

        let surface = Arc::clone(&self.shared.backend.surface);
        if let Err(e) = surface.prepare_inline_playback() {
            tracing::debug!("Inline playback setup failed: {}", e);
        }

        let stream = match self.acquire().await {
            Ok(stream) => stream,
            Err(e) => {
                let mut session = self.shared.lock();
                if session.generation == generation {
                    session.phase = SessionPhase::Stopped;
                }
                tracing::warn!("Camera acquisition failed: {}", e);
                return Err(e.into());
            }
        };

        {
            let mut session = self.shared.lock();
            if session.generation != generation {
                stream.stop_all_tracks();
                tracing::debug!("Camera session superseded during acquisition");
                return Ok(());
            }
            session.stream = Some(Arc::clone(&stream));
            surface.attach(stream);
        }

        if let Err(e) = surface.play().await {
            tracing::warn!("{}; continuing, frames may still arrive", e);
        }

        let detector = self
            .shared
            .backend
            .detectors
            .create(options.formats.as_deref());

        let mut session = self.shared.lock();
        if session.generation != generation {
            // Stopped while playback was starting; teardown already released the stream
            return Ok(());
        }

        session.active = true;
        session.phase = SessionPhase::Scanning;
        session.detector = Some(Arc::clone(&detector));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(detection_loop(
            Arc::clone(&self.shared),
            generation,
            detector,
            cancel_rx,
            options.on_result,
        ));
        session.poll = Some(PollHandle {
            cancel: cancel_tx,
            _task: task,
        });

        if let Some(metrics) = &self.shared.metrics {
            metrics.record_camera_session();
        }
        tracing::info!(generation, "Camera scan session started");

        Ok(())
    }

    /// Stop the session: cancel the next tick, release every track, drop the
    /// detector and detach the preview. No-op when nothing is running.
    pub fn stop(&self) {
        let mut session = self.shared.lock();
        self.shared.teardown(&mut session);
    }

    /// Rear camera first; some devices reject facing hints, so retry without them.
    async fn acquire(&self) -> Result<Arc<dyn CaptureStream>, DeviceError> {
        let device = &self.shared.backend.device;

        match device.open(&CaptureConstraints::rear_facing()).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                tracing::warn!("Rear camera request failed ({}), retrying unconstrained", e);
                device.open(&CaptureConstraints::unconstrained()).await
            }
        }
    }
}

impl Drop for CameraScanController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// First detected value, trimmed, if it isn't blank.
fn first_hit(codes: &[DetectedBarcode]) -> Option<String> {
    codes
        .first()
        .map(|code| code.raw_value.trim())
        .filter(|code| !code.is_empty())
        .map(str::to_owned)
}

/// One detection pass per frame, at most one pass outstanding.
async fn detection_loop(
    shared: Arc<Shared>,
    generation: u64,
    detector: Arc<dyn BarcodeDetector>,
    mut cancel: watch::Receiver<bool>,
    on_result: ResultCallback,
) {
    loop {
        if *cancel.borrow() {
            return;
        }

        if !shared.backend.surface.is_mounted() {
            if shared.stop_generation(generation) {
                tracing::debug!("Display surface unmounted; camera scan session ended");
            }
            return;
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.changed() => return,
            outcome = detector.detect(shared.backend.surface.as_ref()) => outcome,
        };

        match outcome {
            Ok(codes) => {
                if let Some(code) = first_hit(&codes) {
                    if shared.stop_generation(generation) {
                        if let Some(metrics) = &shared.metrics {
                            metrics.record_camera_hit();
                        }
                        tracing::debug!(%code, "Barcode detected");
                        on_result(code);
                    }
                    return;
                }
            }
            Err(e) => {
                if let Some(metrics) = &shared.metrics {
                    metrics.record_detection_error();
                }
                tracing::debug!("{}; retrying next frame", e);
            }
        }

        tokio::select! {
            biased;
            _ = cancel.changed() => return,
            _ = shared.backend.clock.next_frame() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_hit_trims() {
        let codes = vec![DetectedBarcode::new("  8991234567890\n"), DetectedBarcode::new("X")];
        assert_eq!(first_hit(&codes).as_deref(), Some("8991234567890"));
    }

    #[test]
    fn test_first_hit_ignores_blank_first_code() {
        assert_eq!(first_hit(&[DetectedBarcode::new("   ")]), None);
        assert_eq!(first_hit(&[]), None);
    }

    #[test]
    fn test_mount_error_message() {
        assert!(CameraError::Mount.to_string().contains("not ready"));
        let err: CameraError = DeviceError::PermissionDenied.into();
        assert!(err.to_string().contains("permission"));
    }
}
