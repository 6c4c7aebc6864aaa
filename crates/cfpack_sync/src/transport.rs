//! HTTP access behind a small trait.
//!
//! The engine only ever issues blocking GET requests and streams the body to
//! disk or into a JSON parser, so the [`Transport`] seam is a single method.
//! [`HttpTransport`] is the production implementation; tests plug in
//! in-memory transports.

use std::io::Read;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use crate::error::{Error, Result};

/// User agent sent to the project info provider unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// A GET request issued by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub user_agent: Option<String>,
    /// Send `content-type: application/json`.
    pub json: bool,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: None,
            json: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Blocking source of response bodies.
///
/// Implementations must return an error for non-success responses so callers
/// never mistake an error page for file content.
pub trait Transport: Send + Sync {
    fn get(&self, request: &Request) -> Result<Box<dyn Read + Send>>;
}

/// Read a whole response body into memory.
pub fn get_bytes(transport: &dyn Transport, request: &Request) -> Result<Vec<u8>> {
    let mut body = transport.get(request)?;
    let mut buf = Vec::new();
    body.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Options applied when building the HTTP client for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// Skip TLS certificate verification. Off unless the caller opts in.
    pub accept_invalid_certs: bool,
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled for this run");
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &Request) -> Result<Box<dyn Read + Send>> {
        let mut builder = self.client.get(&request.url);
        if let Some(user_agent) = &request.user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }
        if request.json {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }

        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(Box::new(response))
    }
}
