use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use crate::Result;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Raw body; may be empty.
    pub body: String,
}

/// The single request/response primitive the client is built on.
///
/// Implementations bound every call by their own timeout and report it as
/// [`crate::Error::Timeout`].
pub trait Transport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        async move {
            let resp = builder.send().await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            trace!(status, body = %body, "raw response");
            Ok(Response { status, body })
        }
    }
}
