//! Session state for a single LuCI peer
//!
//! The token issued by `auth.login` is not self-describing: the router keeps
//! the session and expires it on its own schedule (idle timeout, reboot).
//! The client only learns about expiry from a 401/403 and logs in again.

use std::fmt;
use std::time::Duration;

use crate::protocol::{AUTH_QUERY_PARAM, RPC_BASE_PATH};

/// Address of the router's JSON-RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    /// 0 means the scheme default
    pub port: u16,
    pub use_tls: bool,
    /// Check the server certificate (routers usually ship self-signed ones)
    pub verify_tls: bool,
}

impl ServerEndpoint {
    /// Plain HTTP on the default port
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 0,
            use_tls: false,
            verify_tls: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_tls { "https" } else { "http" }
    }

    fn default_port(&self) -> u16 {
        if self.use_tls { 443 } else { 80 }
    }

    /// `scheme://host[:port]`
    pub fn base_url(&self) -> String {
        if self.port == 0 || self.port == self.default_port() {
            format!("{}://{}", self.scheme(), self.host)
        } else {
            format!("{}://{}:{}", self.scheme(), self.host, self.port)
        }
    }
}

/// Login credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Connect and keep-alive timeout in seconds (0 = default)
    pub timeout: u64,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            timeout: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same credentials with a zero timeout replaced by the default
    pub fn resolved(mut self) -> Self {
        if self.timeout == 0 {
            self.timeout = crate::DEFAULT_TIMEOUT_SECS;
        }
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Per-client session: endpoint, credentials and the current token
#[derive(Debug, Clone)]
pub struct Session {
    endpoint: ServerEndpoint,
    credentials: Credentials,
    token: Option<String>,
    request_id: u64,
}

impl Session {
    pub fn new(endpoint: ServerEndpoint, credentials: Credentials) -> Self {
        Self {
            endpoint,
            credentials: credentials.resolved(),
            token: None,
            request_id: crate::DEFAULT_REQUEST_ID,
        }
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Replace the token after a successful login
    pub fn set_token(&mut self, token: String) {
        self.token = if token.is_empty() { None } else { Some(token) };
    }

    /// Id for the next request. Constant for every call; the router does
    /// not correlate ids.
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Full URL for a namespace, token-qualified when a token is held
    pub fn build_url(&self, namespace: &str) -> String {
        let mut url = format!("{}{}{}", self.endpoint.base_url(), RPC_BASE_PATH, namespace);
        if let Some(ref token) = self.token {
            url.push('?');
            url.push_str(AUTH_QUERY_PARAM);
            url.push('=');
            url.push_str(token);
        }
        url
    }

    /// URL without the token, for logging
    pub fn redacted_url(&self, namespace: &str) -> String {
        format!("{}{}{}", self.endpoint.base_url(), RPC_BASE_PATH, namespace)
    }
}
