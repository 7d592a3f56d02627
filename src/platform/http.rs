//! HTTP utilities for Platform REST API calls

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::error::ApiError;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut cut = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A fully rendered outbound request
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    /// Path segment immediately following `marker`
    /// e.g. `/api/compute-envs/abc` with marker `compute-envs` -> `abc`
    pub fn path_segment_after(&self, marker: &str) -> Option<String> {
        let mut segments = self.url.path_segments()?;
        segments.by_ref().find(|s| *s == marker)?;
        segments
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<_> = self
            .headers
            .iter()
            .map(|(name, value)| {
                let value = if name == AUTHORIZATION {
                    "(sensitive)"
                } else {
                    value.to_str().unwrap_or("(binary)")
                };
                (name.as_str(), value)
            })
            .collect();

        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

/// A buffered response; hooks may read and replace the body freely
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub request: ApiRequest,
}

impl ApiResponse {
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Replace status and body with a synthetic JSON payload
    pub fn replace_json_body(&mut self, status: StatusCode, body: &str) {
        self.status = status;
        self.body = body.as_bytes().to_vec();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
}

/// HTTP client wrapper for Platform API calls
#[derive(Clone)]
pub struct PlatformHttpClient {
    client: Client,
}

impl PlatformHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("seqsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Shared connection pool, handed to the status poller
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send a request and buffer the whole response
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        tracing::debug!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await.map_err(ApiError::Transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(ApiError::Transport)?.to_vec();

        Ok(ApiResponse {
            status,
            headers,
            body,
            request: request.clone(),
        })
    }
}

/// Format request and response for an error message
/// Security: the Authorization header is always redacted
pub fn debug_response(response: &ApiResponse) -> String {
    let request = &response.request;

    let mut dump_req = format!("{} {}\n", request.method, request.url);
    for (name, value) in &request.headers {
        let value = if name == AUTHORIZATION {
            "(sensitive)".to_string()
        } else {
            value.to_str().unwrap_or("(binary)").to_string()
        };
        dump_req.push_str(&format!("{}: {}\n", name, value));
    }

    let mut dump_res = format!("{}\n", response.status);
    for (name, value) in &response.headers {
        dump_res.push_str(&format!("{}: {}\n", name, value.to_str().unwrap_or("(binary)")));
    }
    dump_res.push('\n');
    dump_res.push_str(&sanitize_for_log(&response.text()));

    format!("**Request**:\n{}\n**Response**:\n{}", dump_req, dump_res)
}

/// Format a Platform API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_platform_error(error: &ApiError) -> String {
    match error {
        // Already written for humans
        ApiError::Conflict { message, .. } => return message.clone(),
        ApiError::ComputeEnv { .. } => return error.to_string(),
        _ => {}
    }

    if let Some(status) = error.status() {
        match status.as_u16() {
            403 => return "Permission denied. Check your workspace role.".to_string(),
            401 => return format!("Authentication failed. Check {}.", super::auth::TOKEN_ENV),
            404 => return "Resource not found.".to_string(),
            429 => return "Rate limit exceeded. Please try again later.".to_string(),
            400 => return "Invalid request. Check your parameters.".to_string(),
            409 => {
                return "Resource conflict. The resource may already exist or be in use."
                    .to_string();
            }
            s if s >= 500 => {
                return "Platform service temporarily unavailable. Please try again.".to_string();
            }
            _ => {}
        }
    }

    if matches!(error, ApiError::Transport(_)) {
        return "Request failed. Check your network connection and try again.".to_string();
    }

    let error_str = error.to_string();
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(80)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
