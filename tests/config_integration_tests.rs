//! Integration tests for ConfigManager and file-backed storage
//!
//! These tests verify:
//! - Default configuration when no file exists
//! - Saving and reloading configuration
//! - Environment overrides on top of the file
//! - The quick-scan toggle surviving a restart through FileStore

use camino::Utf8PathBuf;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wms_scan::models::AppConfig;
use wms_scan::services::{QuickScanController, QuickScanOptions, quick_scan};
use wms_scan::{ConfigManager, FileStore, KeyValueStore, ScanStateManager};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert!(manager.config_path().ends_with("wms-scan.yaml"));
}

#[test]
fn test_load_defaults_without_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = manager.load().unwrap();

    assert_eq!(config.api.base_path, "/api");
    assert_eq!(config.api.login_path, "/mobile-auth/login");
    assert_eq!(config.api.timeout_ms, 6000);
    assert_eq!(config.scanner.debounce(), Duration::from_millis(180));
    assert_eq!(config.scanner.dedupe(), Duration::from_millis(600));
    assert_eq!(config.scanner.formats, None);
    assert_eq!(config.storage.path, "state.yaml");
}

#[test]
fn test_save_and_reload_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = AppConfig::default();
    config.api.origin = "https://wms.example.com".to_string();
    config.scanner.debounce_ms = 250;
    config.scanner.formats = Some(vec!["ean_13".to_string(), "qr_code".to_string()]);
    config.scanner.quick_scan_key = None;
    manager.save(&config).unwrap();

    let loaded = manager.load().unwrap();

    assert_eq!(loaded.api.origin, "https://wms.example.com");
    assert_eq!(loaded.scanner.debounce_ms, 250);
    assert_eq!(
        loaded.scanner.formats,
        Some(vec!["ean_13".to_string(), "qr_code".to_string()])
    );
    assert_eq!(loaded.scanner.quick_scan_key, None);
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(
        manager.config_path(),
        "logging:\n  prefix: from-file\n  debug: false\n",
    )
    .unwrap();

    // SAFETY: only this test reads or writes this variable
    unsafe { std::env::set_var("WMS_SCAN__LOGGING__PREFIX", "from-env") };
    let config = manager.load();
    unsafe { std::env::remove_var("WMS_SCAN__LOGGING__PREFIX") };

    let config = config.unwrap();
    assert_eq!(config.logging.prefix, "from-env");
    assert!(!config.logging.debug);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.config_path(), "scanner: [unclosed\n").unwrap();

    assert!(manager.load().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_quick_scan_toggle_persisted_to_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let store_path = config_path.join("state.yaml");

    {
        let store = Arc::new(FileStore::open(&store_path).unwrap());
        let state = Arc::new(ScanStateManager::new());
        let controller = QuickScanController::new(
            Arc::clone(&state),
            QuickScanOptions::new(quick_scan::action(|| async { anyhow::Ok(()) }))
                .persist(store, "inbound.quick-scan"),
        );
        controller.set_enabled(false);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let contents = fs::read_to_string(&store_path).unwrap();
    assert!(contents.contains("inbound.quick-scan"));

    let store = Arc::new(FileStore::open(&store_path).unwrap());
    assert_eq!(store.get("inbound.quick-scan").unwrap().as_deref(), Some("0"));

    let state = Arc::new(ScanStateManager::new());
    let controller = QuickScanController::new(
        Arc::clone(&state),
        QuickScanOptions::new(quick_scan::action(|| async { anyhow::Ok(()) }))
            .persist(store, "inbound.quick-scan"),
    );
    assert!(!controller.is_enabled());
    assert!(!state.is_enabled());
}
