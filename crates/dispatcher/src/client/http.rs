//! HTTP client capability and its reqwest-backed implementation

use std::error::Error as StdError;
use std::fmt;

use contracts::ResponseSummary;
use thiserror::Error;
use tracing::debug;

/// HTTP method accepted by the HTTP sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    /// Parse a method name, case-insensitively
    pub fn parse(method: &str) -> Option<Self> {
        match method.trim().to_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }

    /// Whether a record is sent as the request body
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpBody {
    #[default]
    Empty,
    /// Pre-encoded JSON text
    Json(String),
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
    /// Sent verbatim
    Raw(String),
}

/// Fully built request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: HttpBody,
}

/// Response as seen by the failure predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Success in the `ok` sense: any status below 400
    pub fn is_ok(&self) -> bool {
        self.status < 400
    }

    pub fn summary(&self) -> ResponseSummary {
        ResponseSummary {
            status: self.status,
            body: self.body.clone(),
        }
    }
}

/// Kind of client-side failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Connect,
    Timeout,
    Other,
}

/// Request never produced a response
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpClientError {
    pub kind: HttpErrorKind,
    pub message: String,
    /// Full source chain of the underlying error
    pub trace: Option<String>,
}

impl HttpClientError {
    pub fn new(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: None,
        }
    }
}

impl From<reqwest::Error> for HttpClientError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            HttpErrorKind::Timeout
        } else if err.is_connect() {
            HttpErrorKind::Connect
        } else {
            HttpErrorKind::Other
        };
        Self {
            kind,
            message: err.to_string(),
            trace: Some(error_chain(&err)),
        }
    }
}

/// Render an error and all of its sources, outermost first
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push_str("\n  caused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// HTTP client capability injected into the HTTP sink
#[trait_variant::make(HttpClient: Send)]
pub trait LocalHttpClient {
    /// Issue one request and read the whole response body
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError>;
}

/// Default client over `reqwest`
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, HttpClientError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

impl HttpClient for ReqwestClient {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Json(text) | HttpBody::Raw(text) => builder.body(text),
            HttpBody::Form(pairs) => builder.form(&pairs),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(url = %request.url, status, "HTTP response received");

        Ok(HttpResponse { status, body })
    }
}
