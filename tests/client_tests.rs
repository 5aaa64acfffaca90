//! Integration tests for ApiClient and WmsApi against a local axum server
//!
//! The server mimics the backend's session behavior: a cookie endpoint that
//! sets `XSRF-TOKEN`, mutating endpoints that require the header, and the
//! 401/403/419 responses the client reacts to.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wms_scan::client::{NotifyKind, UiHooks};
use wms_scan::models::{ApiConfig, ProductLookupParams};
use wms_scan::{ApiClient, ApiError, ScanMetrics, WmsApi};

const TOKEN: &str = "tok=123";

#[derive(Default)]
struct ServerState {
    primes: AtomicUsize,
    creates: AtomicUsize,
    expire_next: AtomicBool,
}

async fn csrf_cookie(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.primes.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, "XSRF-TOKEN=tok%3D123; Path=/")],
    )
}

fn has_token(headers: &HeaderMap) -> bool {
    headers
        .get("x-xsrf-token")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TOKEN)
}

fn token_mismatch() -> Response {
    (
        StatusCode::from_u16(419).unwrap(),
        Json(json!({ "message": "CSRF token mismatch." })),
    )
        .into_response()
}

async fn create_inbound(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if state.expire_next.swap(false, Ordering::SeqCst) || !has_token(&headers) {
        return token_mismatch();
    }
    let id = state.creates.fetch_add(1, Ordering::SeqCst) + 1;
    (
        StatusCode::CREATED,
        Json(json!({ "data": { "id": id, "reference": body["reference"] } })),
    )
        .into_response()
}

async fn warehouses() -> Json<Value> {
    Json(json!({
        "data": [
            { "id": 1, "code": "JKT", "name": "Jakarta" },
            { "id": 2, "code": "SBY", "name": "Surabaya", "address": "Jl. Rungkut 5" }
        ]
    }))
}

async fn lookup(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let barcode = params.get("barcode").cloned().unwrap_or_default();
    let warehouse = params.get("warehouse_id").cloned().unwrap_or_default();
    Json(json!({
        "data": [{
            "id": 5,
            "name": format!("Shirt @{warehouse}"),
            "barcode": barcode,
            "variants": [
                { "id": 11, "variant_name": "Red", "variant_sku": "TS-RED" }
            ]
        }]
    }))
}

async fn me() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Session expired" })),
    )
        .into_response()
}

async fn forbidden(headers: HeaderMap) -> Response {
    if !has_token(&headers) {
        return token_mismatch();
    }
    StatusCode::FORBIDDEN.into_response()
}

async fn ship(headers: HeaderMap, Path(_id): Path<u64>) -> Response {
    if !has_token(&headers) {
        return token_mismatch();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn spawn_server() -> (String, Arc<ServerState>) {
    let state = Arc::new(ServerState::default());
    let app = Router::new()
        .route("/sanctum/csrf-cookie", get(csrf_cookie))
        .route("/api/mobile/me", get(me))
        .route("/api/mobile/wms/warehouses", get(warehouses))
        .route("/api/mobile/wms/products/lookup", get(lookup))
        .route("/api/mobile/wms/inbound", post(create_inbound))
        .route("/api/mobile/wms/inbound/{id}/cancel", post(forbidden))
        .route("/api/mobile/wms/outbound/{id}/ship", post(ship))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

#[derive(Default)]
struct RecordingHooks {
    notices: Mutex<Vec<(NotifyKind, String)>>,
    navigations: Mutex<Vec<String>>,
}

impl UiHooks for RecordingHooks {
    fn notify(&self, kind: NotifyKind, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
    }

    fn navigate(&self, path: &str) {
        self.navigations.lock().unwrap().push(path.to_string());
    }
}

async fn setup() -> (WmsApi, Arc<ServerState>, Arc<RecordingHooks>) {
    let (origin, state) = spawn_server().await;
    let hooks = Arc::new(RecordingHooks::default());
    let client = ApiClient::new(
        &ApiConfig {
            origin,
            ..ApiConfig::default()
        },
        Arc::clone(&hooks) as Arc<dyn UiHooks>,
    )
    .unwrap();
    (WmsApi::new(Arc::new(client)), state, hooks)
}

#[tokio::test]
async fn test_get_does_not_prime() {
    let (api, server, _hooks) = setup().await;

    let warehouses = api.list_warehouses().await.unwrap();

    assert_eq!(warehouses.len(), 2);
    assert_eq!(warehouses[1].address.as_deref(), Some("Jl. Rungkut 5"));
    assert_eq!(server.primes.load(Ordering::SeqCst), 0);
    assert!(!api.client().primer().is_ready());
}

#[tokio::test]
async fn test_post_primes_once_and_sends_token() {
    let (api, server, _hooks) = setup().await;

    let first = api.inbound_create(&json!({ "reference": "PO-1" })).await.unwrap();
    let second = api.inbound_create(&json!({ "reference": "PO-2" })).await.unwrap();

    assert_eq!(first["data"]["reference"], "PO-1");
    assert_eq!(second["data"]["id"], 2);
    assert_eq!(server.primes.load(Ordering::SeqCst), 1);
    assert_eq!(api.client().xsrf_token().as_deref(), Some(TOKEN));
}

#[tokio::test]
async fn test_concurrent_posts_share_one_prime() {
    let (api, server, _hooks) = setup().await;

    let body_a = json!({ "reference": "A" });
    let body_b = json!({ "reference": "B" });
    let body_c = json!({ "reference": "C" });
    let (a, b, c) = tokio::join!(
        api.inbound_create(&body_a),
        api.inbound_create(&body_b),
        api.inbound_create(&body_c),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(server.primes.load(Ordering::SeqCst), 1);
    assert_eq!(server.creates.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_token_mismatch_invalidates_and_reprimes() {
    let (api, server, _hooks) = setup().await;

    api.inbound_create(&json!({ "reference": "PO-1" })).await.unwrap();
    server.expire_next.store(true, Ordering::SeqCst);

    let err = api
        .inbound_create(&json!({ "reference": "PO-2" }))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(419));
    assert!(err.to_string().contains("CSRF token mismatch"));
    assert!(!api.client().primer().is_ready());

    api.inbound_create(&json!({ "reference": "PO-2" })).await.unwrap();
    assert_eq!(server.primes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unauthenticated_notifies_and_navigates_to_login() {
    let (api, _server, hooks) = setup().await;

    let err = api.me().await.unwrap_err();

    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Session expired");
        }
        other => panic!("Expected status error, got: {:?}", other),
    }
    assert_eq!(
        hooks.notices.lock().unwrap().clone(),
        vec![(NotifyKind::Danger, "Session expired".to_string())]
    );
    assert_eq!(
        hooks.navigations.lock().unwrap().clone(),
        vec!["/mobile-auth/login".to_string()]
    );
}

#[tokio::test]
async fn test_forbidden_without_body_uses_status_reason() {
    let (api, _server, hooks) = setup().await;

    let err = api.inbound_cancel(9).await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(
        hooks.notices.lock().unwrap().clone(),
        vec![(NotifyKind::Danger, "Forbidden".to_string())]
    );
    assert!(hooks.navigations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_product_lookup_sends_query() {
    let (api, _server, _hooks) = setup().await;

    let products = api
        .product_lookup(&ProductLookupParams::barcode("8991234567890").in_warehouse(3))
        .await
        .unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].barcode.as_deref(), Some("8991234567890"));
    assert_eq!(products[0].name, "Shirt @3");
    assert_eq!(products[0].variants[0].variant_sku.as_deref(), Some("TS-RED"));
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let (api, _server, _hooks) = setup().await;

    let body = api.outbound_ship(7).await.unwrap();
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_prime_failure_blocks_mutating_call() {
    let (origin, server) = spawn_server().await;
    let metrics = Arc::new(ScanMetrics::new());
    let client = ApiClient::with_metrics(
        &ApiConfig {
            origin,
            csrf_cookie_path: "/missing-cookie-route".to_string(),
            ..ApiConfig::default()
        },
        Arc::new(RecordingHooks::default()),
        Arc::clone(&metrics),
    )
    .unwrap();
    let api = WmsApi::new(Arc::new(client));

    let err = api
        .inbound_create(&json!({ "reference": "PO-1" }))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Primer(_)), "got: {:?}", err);
    assert_eq!(server.creates.load(Ordering::SeqCst), 0);
    assert!(!api.client().primer().is_in_flight());
    assert_eq!(metrics.primes_started.load(Ordering::Relaxed), 1);
}
