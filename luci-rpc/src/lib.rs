//! luci-rpc: Client library for the OpenWrt LuCI JSON-RPC management API
//!
//! This crate provides:
//! - Session handling with token login and transparent re-login on expiry
//! - Wire types for the `/cgi-bin/luci/rpc/` call envelope
//! - A blocking HTTP transport (reqwest) behind a swappable trait
//! - Device profiles stored as TOML

pub mod client;
pub mod config;
pub mod protocol;
pub mod session;
pub mod transport;

pub use client::{Client, RpcError};
pub use config::{Config, DeviceConfig};
pub use protocol::{CallEnvelope, ResultEnvelope};
pub use session::{Credentials, ServerEndpoint, Session};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportCaller, TransportError};

/// Connect/keep-alive timeout used when credentials carry a zero timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Request id sent with every call
pub const DEFAULT_REQUEST_ID: u64 = 99;
