//! HTTP client for the warehouse backend.
//!
//! Session-cookie based: every request carries the cookie jar, and
//! state-changing requests (POST, PUT, PATCH, DELETE) first make sure the
//! XSRF cookie exists through a shared [`SingleFlightPrimer`], then echo it in
//! the `X-XSRF-TOKEN` header.
//!
//! Error responses are mapped to [`ApiError::Status`] after the side effects
//! the app expects:
//!
//! - 401: notify and navigate to the login page
//! - 403: notify
//! - 419 (token mismatch): invalidate the primer so the next mutating call re-primes

pub mod wms;

use crate::metrics::ScanMetrics;
use crate::models::ApiConfig;
use crate::services::primer::{PrimeOperation, PrimerError, SingleFlightPrimer};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub const XSRF_COOKIE: &str = "XSRF-TOKEN";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Primer(#[from] PrimerError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Warning,
    Danger,
}

/// User-facing side effects of API failures.
pub trait UiHooks: Send + Sync {
    fn notify(&self, kind: NotifyKind, message: &str);

    fn navigate(&self, path: &str);
}

/// Writes notifications and navigation requests to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHooks;

impl UiHooks for LogHooks {
    fn notify(&self, kind: NotifyKind, message: &str) {
        match kind {
            NotifyKind::Danger => tracing::error!("{}", message),
            NotifyKind::Warning => tracing::warn!("{}", message),
            NotifyKind::Success => tracing::info!("{}", message),
        }
    }

    fn navigate(&self, path: &str) {
        tracing::info!("Navigation requested: {}", path);
    }
}

/// GET of the CSRF cookie endpoint.
struct CsrfCookieFetch {
    http: reqwest::Client,
    url: Url,
}

#[async_trait]
impl PrimeOperation for CsrfCookieFetch {
    async fn prime(&self) -> Result<(), PrimerError> {
        self.http
            .get(self.url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map(|_| ())
            .map_err(|e| PrimerError(e.to_string()))
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Pull a cookie out of a `Cookie` header value, URL-decoded.
fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        url::form_urlencoded::parse(pair.trim().as_bytes())
            .next()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    })
}

/// Backend client with CSRF priming and status handling.
pub struct ApiClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    origin: Url,
    base_url: Url,
    login_path: String,
    primer: Arc<SingleFlightPrimer>,
    hooks: Arc<dyn UiHooks>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, hooks: Arc<dyn UiHooks>) -> Result<Self, ApiError> {
        Self::build(config, hooks, None)
    }

    pub fn with_metrics(
        config: &ApiConfig,
        hooks: Arc<dyn UiHooks>,
        metrics: Arc<ScanMetrics>,
    ) -> Result<Self, ApiError> {
        Self::build(config, hooks, Some(metrics))
    }

    fn build(
        config: &ApiConfig,
        hooks: Arc<dyn UiHooks>,
        metrics: Option<Arc<ScanMetrics>>,
    ) -> Result<Self, ApiError> {
        let origin = Url::parse(&config.origin)?;
        let base_url = origin.join(&format!("{}/", config.base_path.trim_end_matches('/')))?;
        let csrf_url = origin.join(&config.csrf_cookie_path)?;

        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        let mut primer = SingleFlightPrimer::new(Arc::new(CsrfCookieFetch {
            http: http.clone(),
            url: csrf_url,
        }));
        if let Some(metrics) = metrics {
            primer = primer.with_metrics(metrics);
        }

        tracing::debug!("API client for {} (base {})", origin, base_url);

        Ok(Self {
            http,
            jar,
            origin,
            base_url,
            login_path: config.login_path.clone(),
            primer: Arc::new(primer),
            hooks,
        })
    }

    pub fn primer(&self) -> &Arc<SingleFlightPrimer> {
        &self.primer
    }

    /// Current XSRF token from the cookie jar, if the server has set one.
    pub fn xsrf_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        cookie_value(header.to_str().ok()?, XSRF_COOKIE)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        self.send(Method::GET, self.http.get(url).query(query)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let mut builder = self.http.post(url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(Method::POST, builder).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        mut builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        if is_state_changing(&method) {
            self.primer.ensure().await?;
            if let Some(token) = self.xsrf_token() {
                builder = builder.header(XSRF_HEADER, token);
            }
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
            return Ok(serde_json::from_slice(body)?);
        }

        let server_message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty());

        Err(self.handle_failure(status, server_message))
    }

    fn handle_failure(&self, status: StatusCode, server_message: Option<String>) -> ApiError {
        let reason = status.canonical_reason().unwrap_or("Request failed");

        let message = match status.as_u16() {
            401 => {
                let message = server_message.unwrap_or_else(|| "Unauthenticated".to_string());
                self.hooks.notify(NotifyKind::Danger, &message);
                self.hooks.navigate(&self.login_path);
                message
            }
            403 => {
                let message = server_message.unwrap_or_else(|| reason.to_string());
                self.hooks.notify(NotifyKind::Danger, &message);
                message
            }
            419 => {
                tracing::warn!("CSRF token mismatch, re-priming on next request");
                self.primer.invalidate();
                server_message.unwrap_or_else(|| "Page expired".to_string())
            }
            _ => server_message.unwrap_or_else(|| reason.to_string()),
        };

        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}
