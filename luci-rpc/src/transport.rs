//! HTTP transport for the JSON-RPC endpoint
//!
//! `HttpTransport` is the single blocking request/response seam the client
//! depends on. `ReqwestTransport` is the production implementation;
//! `TransportCaller` sits on top and turns status codes into `RpcError`s.

use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::client::RpcError;
use crate::session::{Credentials, ServerEndpoint};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Raw outcome of one POST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Blocking POST of a JSON body
pub trait HttpTransport: Send + Sync {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a transport for the endpoint.
    ///
    /// The credential timeout bounds both connection setup and TCP
    /// keep-alive. Certificate checks follow `endpoint.verify_tls`.
    ///
    /// Must not be called from inside an async runtime (reqwest's blocking
    /// client owns its own).
    pub fn new(endpoint: &ServerEndpoint, credentials: &Credentials) -> Result<Self, TransportError> {
        let timeout = credentials.timeout_duration();
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!endpoint.verify_tls)
            .connect_timeout(timeout)
            .tcp_keepalive(timeout)
            .timeout(Option::<std::time::Duration>::None)
            .build()?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        let status = resp.status().as_u16();
        let body = resp.bytes()?.to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// Sends payloads and classifies the HTTP outcome
pub struct TransportCaller {
    transport: Box<dyn HttpTransport>,
}

impl TransportCaller {
    pub fn new(transport: Box<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// POST `body` to `url`, returning the response body on success
    pub fn call(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let resp = self.transport.post_json(url, body)?;
        classify_status(resp.status)?;
        Ok(resp.body)
    }
}

/// Map a status code onto the client's error taxonomy.
///
/// Anything up to and including 226 counts as success.
pub fn classify_status(status: u16) -> Result<(), RpcError> {
    match status {
        401 => Err(RpcError::Unauthorized),
        403 => Err(RpcError::Forbidden),
        s if s > 226 => Err(RpcError::HttpStatus(s)),
        _ => Ok(()),
    }
}
