//! LuCI JSON-RPC client
//!
//! Call protocol:
//! 1. Refuse anything but `auth` while no token is held
//! 2. POST the envelope to the (token-qualified) namespace URL
//! 3. On 401/403 log in again and repeat the call once
//! 4. Surface `error` from the response, or normalize `result` to text

use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::protocol::{CallEnvelope, LOGIN_METHOD, NS_AUTH, NS_FS, NS_SYS, NS_UCI, ResultEnvelope};
use crate::session::{Credentials, ServerEndpoint, Session};
use crate::transport::{HttpTransport, ReqwestTransport, TransportCaller, TransportError};

/// Number of sends for one call: the original plus one after re-login
const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC client is not authenticated")]
    Unauthenticated,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("http: Unauthorized")]
    Unauthorized,

    #[error("http: Forbidden")]
    Forbidden,

    #[error("HTTP status code: {0}")]
    HttpStatus(u16),

    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to parse response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Error reported by the server, passed through verbatim
    #[error("{0}")]
    Rpc(String),
}

impl RpcError {
    /// Session expired or rejected by the router
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RpcError::Unauthorized | RpcError::Forbidden)
    }
}

/// Client bound to one router
pub struct Client {
    caller: TransportCaller,
    session: Mutex<Session>,
}

impl Client {
    /// Connect over HTTP(S) and log in.
    ///
    /// Fails if the initial login fails; no client is produced then.
    pub fn new(endpoint: ServerEndpoint, credentials: Credentials) -> Result<Self, RpcError> {
        let credentials = credentials.resolved();
        let transport = ReqwestTransport::new(&endpoint, &credentials)?;
        Self::with_transport(endpoint, credentials, Box::new(transport))
    }

    /// Log in over a caller-supplied transport
    pub fn with_transport(
        endpoint: ServerEndpoint,
        credentials: Credentials,
        transport: Box<dyn HttpTransport>,
    ) -> Result<Self, RpcError> {
        let client = Self {
            caller: TransportCaller::new(transport),
            session: Mutex::new(Session::new(endpoint, credentials)),
        };
        client.login()?;
        Ok(client)
    }

    /// Obtain a fresh token.
    ///
    /// On failure any previous token is left in place.
    pub fn login(&self) -> Result<(), RpcError> {
        let mut session = self.lock_session();
        self.login_locked(&mut session)
    }

    /// Call `method` in `namespace` and return the result as text
    pub fn invoke(&self, namespace: &str, method: &str, params: &[&str]) -> Result<String, RpcError> {
        let mut session = self.lock_session();
        self.invoke_locked(&mut session, namespace, method, params)
    }

    /// Call into the `sys` namespace
    pub fn sys_rpc(&self, method: &str, params: &[&str]) -> Result<String, RpcError> {
        self.invoke(NS_SYS, method, params)
    }

    /// Call into the `uci` namespace
    pub fn uci_rpc(&self, method: &str, params: &[&str]) -> Result<String, RpcError> {
        self.invoke(NS_UCI, method, params)
    }

    /// Call into the `fs` namespace
    pub fn fs_rpc(&self, method: &str, params: &[&str]) -> Result<String, RpcError> {
        self.invoke(NS_FS, method, params)
    }

    /// Current session token, if any
    pub fn token(&self) -> Option<String> {
        self.lock_session().token().map(String::from)
    }

    pub fn endpoint(&self) -> ServerEndpoint {
        self.lock_session().endpoint().clone()
    }

    // Private helpers

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        // Session holds plain data; a panic elsewhere cannot leave it torn.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn login_locked(&self, session: &mut Session) -> Result<(), RpcError> {
        let username = session.credentials().username.clone();
        let password = session.credentials().password.clone();

        match self.invoke_locked(session, NS_AUTH, LOGIN_METHOD, &[username.as_str(), password.as_str()]) {
            Ok(token) => {
                tracing::info!("Logged in to {} as {}", session.endpoint().host, username);
                session.set_token(token);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Login to {} failed: {}", session.endpoint().host, e);
                Err(e)
            }
        }
    }

    fn invoke_locked(
        &self,
        session: &mut Session,
        namespace: &str,
        method: &str,
        params: &[&str],
    ) -> Result<String, RpcError> {
        if namespace != NS_AUTH && !session.is_authenticated() {
            return Err(RpcError::Unauthenticated);
        }

        let payload = CallEnvelope::new(session.request_id(), method, params);
        let body = serde_json::to_vec(&payload).map_err(RpcError::Encode)?;

        let mut attempt = 1;
        let resp_body = loop {
            tracing::debug!("RPC {}.{} -> {}", namespace, method, session.redacted_url(namespace));

            match self.caller.call(&session.build_url(namespace), body.clone()) {
                // Session timeout or router reboot. The login call itself is
                // never retried this way.
                Err(e) if e.is_auth_failure() && namespace != NS_AUTH && attempt < MAX_ATTEMPTS => {
                    tracing::warn!("{} on {}.{}, logging in again", e, namespace, method);
                    if let Err(login_err) = self.login_locked(session) {
                        tracing::warn!("Re-login failed, retrying with previous token: {}", login_err);
                    }
                    attempt += 1;
                }
                result => break result?,
            }
        };

        let response: ResultEnvelope = serde_json::from_slice(&resp_body).map_err(RpcError::Decode)?;

        if let Some(message) = response.error {
            return Err(RpcError::Rpc(message));
        }

        response.result.into_text().map_err(RpcError::Encode)
    }
}
