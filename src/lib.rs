// wms-scan - scan-to-action pipeline for a mobile warehouse client
//
// This is the library crate containing the scanning services, the network
// layer and the supporting config/state/storage plumbing. The binary crate
// (main.rs) drives it from a keyboard-wedge scanner on stdin.

pub mod client;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod platform;
pub mod services;
pub mod state;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{ApiClient, ApiError, UiHooks, wms::WmsApi};
pub use config::ConfigManager;
pub use metrics::ScanMetrics;
pub use models::AppConfig;
pub use state::{ScanChange, ScanStateManager};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
