//! Data models for the scan client.
//!
//! - [`AppConfig`]: configuration loaded from `wms-scan.yaml` (API location, scanner tuning, storage, logging)
//! - [`wms`]: request/response shapes for the warehouse endpoints

pub mod config;
pub mod wms;

pub use config::{ApiConfig, AppConfig, LoggingConfig, ScannerConfig, StorageConfig};
pub use wms::{
    ApiEnvelope, MeData, MeUser, ProductLookupParams, UserInfo, VariantLike, WarehouseDto,
};
