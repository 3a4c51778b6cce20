//! reqwest-backed [`Transport`].

use reqwest::{StatusCode, Url};
use rollcall_core::transport::HttpMethod;
use rollcall_core::{ApiRequest, Transport, TransportError};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
const USER_AGENT: &str = concat!("rollcall/", env!("CARGO_PKG_VERSION"));
/// Longest slice of an unparsable body kept in a `Status` error.
const BODY_EXCERPT_LEN: usize = 200;

/// Attendance service client bound to one base URL.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a client for `base_url` (e.g. `http://127.0.0.1:5000/`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = normalize_base(base_url)?;
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        tracing::debug!(base_url = %base_url, timeout_secs = timeout.as_secs(), "http transport ready");
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for a request, path segments percent-encoded.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Request(format!("cannot use {} as a base", self.base_url)))?
            .pop_if_empty()
            .extend(request.path_segments());
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let url = self.url_for(&request)?;
        let mut builder = match request.method() {
            HttpMethod::Get => self.http_client.get(url),
            HttpMethod::Post => self.http_client.post(url),
            HttpMethod::Delete => self.http_client.delete(url),
        };
        let query = request.query();
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = request.body() {
            builder = builder.json(&body);
        }

        tracing::debug!(
            kind = request.kind(),
            method = request.method().as_str(),
            path = %request.path(),
            "sending request"
        );

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        let result = interpret_body(status, &bytes);
        match &result {
            Ok(_) => tracing::info!(kind = request.kind(), status = status.as_u16(), "request completed"),
            Err(error) => tracing::warn!(kind = request.kind(), %error, "request failed"),
        }
        result
    }
}

/// Ensure the base URL parses and ends in `/` so segments append below it.
fn normalize_base(base_url: &str) -> Result<Url, TransportError> {
    let mut url =
        Url::parse(base_url).map_err(|e| TransportError::Request(format!("{base_url}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_decode() || e.is_body() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

/// Classify a received body.
///
/// Any 2xx JSON body is handed up for envelope interpretation. A non-2xx
/// body is handed up only when it is a `{success: false}` envelope, so
/// the caller sees a service rejection; otherwise the status is the
/// failure.
pub fn interpret_body(status: StatusCode, body: &[u8]) -> Result<Value, TransportError> {
    let parsed = serde_json::from_slice::<Value>(body);

    if status.is_success() {
        return parsed.map_err(|e| TransportError::Decode(e.to_string()));
    }

    match parsed {
        Ok(value) if value.get("success") == Some(&Value::Bool(false)) => Ok(value),
        _ => Err(TransportError::Status {
            status: status.as_u16(),
            body: excerpt(body),
        }),
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
