//! Platform capability seams.
//!
//! The scan pipeline never touches a camera, a preview element, or an input
//! field directly. Hosts hand in implementations of these traits, which keeps
//! the controllers testable with plain in-memory fakes.
//!
//! # Components
//!
//! - [`CaptureDevice`] / [`CaptureStream`]: camera acquisition and the stream it yields
//! - [`DisplaySurface`]: the preview target a stream is attached to
//! - [`DetectorFactory`] / [`BarcodeDetector`]: symbology decoding over the current frame
//! - [`FrameClock`]: the "next display frame" scheduling primitive
//! - [`FieldFocus`]: focus/select on the scan input field

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Preferred camera orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear-facing camera, the one pointed at the shelf.
    Environment,
    /// Front-facing camera.
    User,
}

/// Constraints for a capture request. Audio is never requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Ideal facing mode; `None` means any video device.
    pub facing: Option<FacingMode>,
}

impl CaptureConstraints {
    /// Prefer the rear camera.
    pub fn rear_facing() -> Self {
        Self {
            facing: Some(FacingMode::Environment),
        }
    }

    /// Any video device, no hints.
    pub fn unconstrained() -> Self {
        Self::default()
    }
}

/// Errors reported by the capture device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("camera permission was denied; allow camera access for this site and try again")]
    PermissionDenied,

    #[error("no camera was found on this device")]
    NotFound,

    #[error("camera does not satisfy the requested constraints: {0}")]
    Constraint(String),

    #[error("camera is unavailable: {0}")]
    Unavailable(String),
}

/// Playback or attachment failure on the display surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("preview playback failed: {0}")]
pub struct SurfaceError(pub String);

/// A single frame's detection pass failed. Always transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("barcode detection failed: {0}")]
pub struct DetectionError(pub String);

/// One barcode found in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBarcode {
    pub raw_value: String,
    pub format: Option<String>,
}

impl DetectedBarcode {
    pub fn new(raw_value: impl Into<String>) -> Self {
        Self {
            raw_value: raw_value.into(),
            format: None,
        }
    }
}

/// An acquired camera stream. Owned exclusively by the controller that opened it.
pub trait CaptureStream: Send + Sync {
    /// Stop and release every track of the stream.
    fn stop_all_tracks(&self);
}

/// Camera access.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn CaptureStream>, DeviceError>;
}

/// Externally owned preview target.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Whether the surface exists yet (the view has been mounted).
    fn is_mounted(&self) -> bool;

    /// Inline, muted, autoplay setup some mobile browsers need. Best effort.
    fn prepare_inline_playback(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn attach(&self, stream: Arc<dyn CaptureStream>);

    fn detach(&self);

    async fn play(&self) -> Result<(), SurfaceError>;
}

/// A configured decoder instance.
#[async_trait]
pub trait BarcodeDetector: Send + Sync {
    /// Run one detection pass over the surface's current frame.
    async fn detect(
        &self,
        surface: &dyn DisplaySurface,
    ) -> Result<Vec<DetectedBarcode>, DetectionError>;
}

/// Builds detectors, optionally restricted to a set of formats.
pub trait DetectorFactory: Send + Sync {
    fn create(&self, formats: Option<&[String]>) -> Arc<dyn BarcodeDetector>;
}

/// Resolves when the next display frame is due.
#[async_trait]
pub trait FrameClock: Send + Sync {
    async fn next_frame(&self);
}

/// Frame clock ticking at a fixed refresh period.
#[derive(Debug, Clone, Copy)]
pub struct IntervalFrameClock {
    period: Duration,
}

impl IntervalFrameClock {
    /// ~60 Hz.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(16);

    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for IntervalFrameClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERIOD)
    }
}

#[async_trait]
impl FrameClock for IntervalFrameClock {
    async fn next_frame(&self) {
        tokio::time::sleep(self.period).await;
    }
}

/// Focus/select on the scan input field, so the next wedge scan lands in it.
#[cfg_attr(test, mockall::automock)]
pub trait FieldFocus: Send + Sync {
    fn focus(&self);

    fn select(&self) {}
}

/// Used when the screen has no input field to focus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFocus;

impl FieldFocus for NoopFocus {
    fn focus(&self) {}
}
