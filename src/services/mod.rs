//! Services module - the scan-to-action pipeline.
//!
//! Turns a noisy stream of camera frames or keystroke bursts into exactly one
//! well-timed, non-overlapping downstream action. None of these services know
//! about a UI toolkit; the host reaches them through [`crate::platform`] traits
//! and the [`crate::state::ScanStateManager`] cells.
//!
//! # Components
//!
//! - [`Capabilities`]: probes for a secure context, camera access and a barcode detector
//! - [`CameraScanController`]: owns the camera stream and the frame-paced detection loop;
//!   the first non-empty code stops the session and is handed to the caller
//! - [`QuickScanController`]: watches the scan field and fires the caller's action
//!   under debounce, dedupe and a one-at-a-time lock
//! - [`SingleFlightPrimer`]: shares one in-flight setup operation between concurrent
//!   callers (the network layer uses it for the CSRF cookie)
//! - [`VariantPicker`]: awaits the user's choice of product variant
//!
//! # Usage Example
//!
//! ```ignore
//! let state = Arc::new(ScanStateManager::new());
//!
//! let quick_scan = QuickScanController::new(
//!     Arc::clone(&state),
//!     QuickScanOptions::new(quick_scan::action(move || lookup(client.clone()))),
//! );
//!
//! // Camera results land in the same field the wedge scanner types into
//! let field = Arc::clone(&state);
//! camera.start(CameraScanOptions::new(move |code| { field.set_value(code); })).await?;
//! ```

pub mod camera;
pub mod capability;
pub mod primer;
pub mod quick_scan;
pub mod variant_picker;

pub use camera::{
    CameraBackend, CameraError, CameraScanController, CameraScanOptions, SessionPhase,
};
pub use capability::{Capabilities, CapabilitySource, EnvironmentError};
pub use primer::{PrimeOperation, PrimerError, SingleFlightPrimer};
pub use quick_scan::{QuickScanController, QuickScanOptions, RunOutcome, ScanAction};
pub use variant_picker::{VariantAction, VariantPicker, VariantSheet};
