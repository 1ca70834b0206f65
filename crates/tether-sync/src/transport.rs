//! # Transport Capability
//!
//! Performs the remote call for one queued action.
//!
//! ## Header Merge Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Content-Type: application/json     (always, lowest)                   │
//! │        ▼ overridden by                                                 │
//! │  [transport.default_headers]        (config)                           │
//! │        ▼ overridden by                                                 │
//! │  HeaderProvider::headers()          (injected, e.g. auth)              │
//! │        ▼ overridden by                                                 │
//! │  ActionRecord.headers               (per action, highest)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tether_core::{ActionId, ActionRecord, Verb};
use tracing::{debug, warn};
use url::Url;

use crate::config::TransportSettings;
use crate::error::{QueueResult, SyncError};

/// Response bodies are cut to this many characters in error text.
const MAX_ERROR_BODY: usize = 200;

// =============================================================================
// Request
// =============================================================================

/// Everything a transport needs to replay one record.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub id: ActionId,
    pub kind: String,
    pub target: String,
    pub verb: Verb,
    pub payload: Value,
    pub headers: BTreeMap<String, String>,
}

impl From<&ActionRecord> for ActionRequest {
    fn from(record: &ActionRecord) -> Self {
        ActionRequest {
            id: record.id.clone(),
            kind: record.kind.clone(),
            target: record.target.clone(),
            verb: record.verb,
            payload: record.payload.clone(),
            headers: record.headers.clone(),
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Injected collaborator that performs the remote call.
///
/// `Ok(())` is the explicit success signal. Every `Err` counts as a failed
/// attempt; [`SyncError::is_permanent`] tells the executor which failures
/// cannot succeed on retry.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self, request: &ActionRequest) -> impl Future<Output = QueueResult<()>> + Send;
}

/// Supplies headers computed at call time, such as auth tokens.
pub trait HeaderProvider: Send + Sync {
    fn headers(&self) -> BTreeMap<String, String>;
}

impl<F> HeaderProvider for F
where
    F: Fn() -> BTreeMap<String, String> + Send + Sync,
{
    fn headers(&self) -> BTreeMap<String, String> {
        self()
    }
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Option<Url>,
    default_headers: BTreeMap<String, String>,
    header_provider: Option<Arc<dyn HeaderProvider>>,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds the client from `[transport]` settings.
    pub fn new(settings: &TransportSettings) -> QueueResult<Self> {
        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {e}")))?;

        let base_url = settings
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()?;

        Ok(HttpTransport {
            client,
            base_url,
            default_headers: settings.default_headers.clone(),
            header_provider: None,
            timeout,
        })
    }

    /// Adds an injected header source.
    pub fn with_header_provider(mut self, provider: Arc<dyn HeaderProvider>) -> Self {
        self.header_provider = Some(provider);
        self
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Turns a record target into an absolute URL.
    pub fn resolve(&self, target: &str) -> QueueResult<Url> {
        match Url::parse(target) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(url),
            Ok(_) => Err(SyncError::InvalidTarget(target.to_string())),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| {
                    SyncError::InvalidTarget(format!("{target} (no base URL configured)"))
                })?;
                base.join(target)
                    .map_err(|_| SyncError::InvalidTarget(target.to_string()))
            }
            Err(_) => Err(SyncError::InvalidTarget(target.to_string())),
        }
    }

    /// Headers for one call, after the merge.
    pub fn merged_headers(&self, request: &ActionRequest) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        merged.insert("Content-Type".to_string(), "application/json".to_string());

        let provided = self
            .header_provider
            .as_ref()
            .map(|p| p.headers())
            .unwrap_or_default();

        for (name, value) in self
            .default_headers
            .iter()
            .chain(provided.iter())
            .chain(request.headers.iter())
        {
            // Header names are case-insensitive; the later layer wins.
            merged.retain(|existing: &String, _| !existing.eq_ignore_ascii_case(name));
            merged.insert(name.clone(), value.clone());
        }

        merged
    }

    fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid header"),
            }
        }
        map
    }

    fn method(verb: Verb) -> Method {
        match verb {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: &ActionRequest) -> QueueResult<()> {
        let url = self.resolve(&request.target)?;
        let headers = Self::header_map(&self.merged_headers(request));

        debug!(
            id = %request.id,
            kind = %request.kind,
            method = %request.verb,
            url = %url,
            "Sending action"
        );

        let mut builder = self
            .client
            .request(Self::method(request.verb), url)
            .headers(headers);

        if !request.payload.is_null() {
            builder = builder.json(&request.payload);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout(self.timeout.as_secs())
            } else {
                SyncError::from(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        Err(SyncError::from_status(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::NewAction;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn settings(base: Option<&str>) -> TransportSettings {
        TransportSettings {
            base_url: base.map(String::from),
            timeout_secs: 5,
            default_headers: BTreeMap::new(),
        }
    }

    fn request(target: &str) -> ActionRequest {
        let record = NewAction::new("test", target, Verb::Post)
            .payload(json!({"hello": "world"}))
            .into_record(chrono::Utc::now());
        ActionRequest::from(&record)
    }

    /// Accepts one connection, answers with `status_line`, returns the raw request.
    async fn serve_once(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\ncontent-length: 4\r\nconnection: close\r\n\r\nnope"
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (format!("http://{addr}"), task)
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let transport = HttpTransport::new(&settings(Some("https://api.example.com"))).unwrap();
        assert_eq!(
            transport.resolve("/api/content/1").unwrap().as_str(),
            "https://api.example.com/api/content/1"
        );
        assert_eq!(
            transport.resolve("http://other.test/hook").unwrap().as_str(),
            "http://other.test/hook"
        );
        assert!(transport.resolve("ftp://files.test/x").is_err());
    }

    #[test]
    fn test_relative_target_without_base_is_permanent() {
        let transport = HttpTransport::new(&settings(None)).unwrap();
        let err = transport.resolve("/api/content").unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn test_header_merge_order() {
        let mut config = settings(Some("https://api.example.com"));
        config.default_headers.insert("X-Client".into(), "tether".into());
        config.default_headers.insert("Authorization".into(), "default".into());

        let provider: Arc<dyn HeaderProvider> = Arc::new(|| {
            BTreeMap::from([("authorization".to_string(), "Bearer provided".to_string())])
        });
        let transport = HttpTransport::new(&config)
            .unwrap()
            .with_header_provider(provider);

        let mut req = request("/x");
        req.headers.insert("content-type".into(), "application/merge-patch+json".into());

        let merged = transport.merged_headers(&req);
        assert_eq!(merged.get("X-Client").map(String::as_str), Some("tether"));
        assert_eq!(
            merged.get("authorization").map(String::as_str),
            Some("Bearer provided")
        );
        assert!(!merged.contains_key("Authorization"));
        assert_eq!(
            merged.get("content-type").map(String::as_str),
            Some("application/merge-patch+json")
        );
        assert!(!merged.contains_key("Content-Type"));
    }

    #[tokio::test]
    async fn test_success_status() {
        let (base, server) = serve_once("HTTP/1.1 200 OK").await;
        let transport = HttpTransport::new(&settings(Some(&base))).unwrap();

        transport.execute(&request("/api/user/actions")).await.unwrap();

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/user/actions HTTP/1.1"));
        assert!(raw.to_lowercase().contains("content-type: application/json"));
        assert!(raw.contains("\"hello\":\"world\""));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let (base, server) = serve_once("HTTP/1.1 503 Service Unavailable").await;
        let transport = HttpTransport::new(&settings(Some(&base))).unwrap();

        let err = transport.execute(&request("/x")).await.unwrap_err();
        assert!(matches!(err, SyncError::ServerStatus { status: 503, .. }));
        assert!(err.is_retryable());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let (base, server) = serve_once("HTTP/1.1 422 Unprocessable Entity").await;
        let transport = HttpTransport::new(&settings(Some(&base))).unwrap();

        let err = transport.execute(&request("/x")).await.unwrap_err();
        assert!(matches!(err, SyncError::ClientStatus { status: 422, .. }));
        assert!(err.is_permanent());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::new(&settings(Some(&format!("http://{addr}")))).unwrap();
        let err = transport.execute(&request("/x")).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }
}
