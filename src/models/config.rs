use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration from `wms-scan.yaml`
///
/// Every section and field has a default, so a partial (or missing) file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub scanner: ScannerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Backend API location and request policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Scheme + host (+ port) of the backend, e.g. `https://wms.example.com`
    pub origin: String,

    /// Prefix for API endpoints, joined onto the origin
    pub base_path: String,

    /// Endpoint that sets the XSRF cookie; lives on the origin, outside `base_path`
    pub csrf_cookie_path: String,

    /// Where an unauthenticated session is sent
    pub login_path: String,

    pub timeout_ms: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            base_path: "/api".to_string(),
            csrf_cookie_path: "/sanctum/csrf-cookie".to_string(),
            login_path: "/mobile-auth/login".to_string(),
            timeout_ms: 6000,
        }
    }
}

/// Quick scan and camera tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub debounce_ms: u64,
    pub dedupe_ms: u64,

    /// Detector formats; `None` leaves the platform defaults
    pub formats: Option<Vec<String>>,

    /// Storage key for the persisted quick-scan toggle
    pub quick_scan_key: Option<String>,

    /// Period of the default frame clock
    pub frame_interval_ms: u64,
}

impl ScannerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn dedupe(&self) -> Duration {
        Duration::from_millis(self.dedupe_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 180,
            dedupe_ms: 600,
            formats: None,
            quick_scan_key: Some("wms.quick-scan".to_string()),
            frame_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Key-value file, relative to the config directory unless absolute
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "state.yaml".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: String,
    pub prefix: String,
    pub debug: bool,
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            prefix: "wms-scan".to_string(),
            debug: false,
            console: true,
        }
    }
}
