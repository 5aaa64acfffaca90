//! wms-scan - keyboard-wedge scanner front end
//!
//! Reads one scan per line from stdin, the way a hardware scanner in
//! keyboard-wedge mode "types" a code followed by Enter. Each line is written
//! into the scan field and submitted through the quick-scan controller, whose
//! action looks the product up on the WMS backend and prints the match.
//!
//! When a matched product has variants the action prints a numbered variant
//! sheet and waits. The next stdin line answers it: a row number picks that
//! row, anything else cancels.
//!
//! # Execution Flow
//!
//! 1. Load `wms-scan.yaml` from the config directory (first argument, default `config`)
//! 2. Initialize logging → `<logging.dir>/<logging.prefix>.<date>`
//! 3. Build the API client, the key-value store and the scan field state
//! 4. Feed stdin lines into the quick-scan controller, or into the open
//!    variant sheet, until EOF
//! 5. Log the metrics summary and exit

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use wms_scan::client::LogHooks;
use wms_scan::models::ProductLookupParams;
use wms_scan::services::{QuickScanController, QuickScanOptions, VariantPicker, quick_scan};
use wms_scan::{
    APP_NAME, ApiClient, ConfigManager, FileStore, ScanMetrics, ScanStateManager, VERSION, WmsApi,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = std::env::args()
        .nth(1)
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| Utf8PathBuf::from("config"));

    let config_manager = ConfigManager::new(&config_dir)?;
    let config = config_manager.load()?;

    let _guard = wms_scan::logging::init(&config.logging)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let metrics = Arc::new(ScanMetrics::new());

    let client = ApiClient::with_metrics(&config.api, Arc::new(LogHooks), Arc::clone(&metrics))
        .context("Failed to build API client")?;
    let api = WmsApi::new(Arc::new(client));

    let storage_path = config_manager.config_dir().join(&config.storage.path);
    let store = Arc::new(FileStore::open(&storage_path)?);

    let state = Arc::new(ScanStateManager::new());
    let picker = Arc::new(VariantPicker::new());

    let lookup = {
        let api = api.clone();
        let state = Arc::clone(&state);
        let picker = Arc::clone(&picker);
        quick_scan::action(move || {
            let api = api.clone();
            let state = Arc::clone(&state);
            let picker = Arc::clone(&picker);
            async move {
                let code = state.value().trim().to_owned();
                state.set_busy(true);
                let result = api.product_lookup(&ProductLookupParams::barcode(&code)).await;
                state.set_busy(false);
                state.clear_value();

                let products = result.with_context(|| format!("Lookup failed for {code}"))?;
                if products.is_empty() {
                    println!("{code}: no match");
                }
                for product in products {
                    println!("{code}: #{} {}", product.id, product.name);
                    if product.variants.is_empty() {
                        continue;
                    }

                    let choice = picker.pick(&product.variants);
                    let sheet = picker.sheet();
                    if sheet.show {
                        for (row, action) in sheet.actions.iter().enumerate() {
                            println!("    [{row}] {}", action.name);
                        }
                    }
                    match choice.await {
                        Some(action) => println!("{code}: #{} -> {}", product.id, action.name),
                        None => println!("{code}: #{} variant not chosen", product.id),
                    }
                }
                Ok(())
            }
        })
    };

    let mut options = QuickScanOptions::new(lookup)
        .debounce(config.scanner.debounce())
        .dedupe(config.scanner.dedupe())
        .metrics(Arc::clone(&metrics));
    if let Some(key) = &config.scanner.quick_scan_key {
        options = options.persist(store, key.clone());
    }

    let controller = Arc::new(QuickScanController::new(Arc::clone(&state), options));
    tracing::info!(enabled = controller.is_enabled(), "Ready for scans on stdin");

    // Submissions run as tasks so the loop can keep reading while an action
    // waits on the variant sheet
    let mut last_submit = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if picker.sheet().show {
            answer_variant(&picker, &line);
            continue;
        }

        state.set_value(line);
        let controller = Arc::clone(&controller);
        last_submit = Some(tokio::spawn(async move {
            let outcome = controller.on_enter().await;
            tracing::debug!(?outcome, "Scan submitted");
        }));
    }

    tracing::info!("Input closed, shutting down");
    picker.close();
    if let Some(submit) = last_submit {
        submit.await.context("Scan task failed")?;
    }
    metrics.log_summary();

    Ok(())
}

/// Resolve the open variant sheet from one input line.
fn answer_variant(picker: &VariantPicker, line: &str) {
    let sheet = picker.sheet();
    let chosen = line
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|row| sheet.actions.get(row));

    match chosen {
        Some(action) => picker.select(action.clone()),
        None => picker.cancel(),
    }
}
