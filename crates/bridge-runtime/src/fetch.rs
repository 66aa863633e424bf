//! # Network Primitive
//!
//! The fetch capability the privileged context lends to handlers. Cookie
//! inclusion is chosen per call: backend endpoints that need the signed-in
//! session use [`Credentials::Include`], everything else
//! [`Credentials::Omit`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Whether a request carries the cookie jar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Credentials {
    #[default]
    Omit,
    Include,
}

/// One outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against the fetcher's base URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
    pub credentials: Credentials,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            credentials: Credentials::Omit,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).json(body)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// A completed HTTP exchange. Non-2xx statuses are not errors until
/// [`error_for_status`](Self::error_for_status) says so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Fetch errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid header {0:?}")]
    InvalidHeader(String),
}

/// The fetch capability handed to handlers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// [`Fetcher`] backed by `reqwest`.
///
/// Holds two clients so cookies set by credentialed calls never leak into
/// anonymous ones.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
    with_cookies: reqwest::Client,
    without_cookies: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            with_cookies: reqwest::Client::builder().cookie_store(true).build()?,
            without_cookies: reqwest::Client::builder().build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through; paths are joined to the base URL.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    fn client_for(&self, credentials: Credentials) -> &reqwest::Client {
        match credentials {
            Credentials::Include => &self.with_cookies,
            Credentials::Omit => &self.without_cookies,
        }
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.to_string()))?;
        map.append(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = self.resolve_url(&request.url);
        let mut builder = self
            .client_for(request.credentials)
            .request(request.method.clone(), &url)
            .headers(header_map(&request.headers)?);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(
            method = %request.method,
            %url,
            status,
            credentials = ?request.credentials,
            "Fetch completed"
        );
        Ok(FetchResponse { status, body })
    }
}
