//! End-to-end tests against a fake LuCI JSON-RPC server over real HTTP

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};

use luci_rpc::{Client, Credentials, RpcError, ServerEndpoint};

/// Minimal stand-in for a router's `/cgi-bin/luci/rpc/` handlers
struct FakeLuci {
    password: String,
    /// Token the server currently accepts
    token: Mutex<Option<String>>,
    issued: AtomicUsize,
    logins: AtomicUsize,
    calls: AtomicUsize,
    /// Every `auth` query value seen on non-auth calls
    seen_tokens: Mutex<Vec<String>>,
}

impl FakeLuci {
    fn new(password: &str) -> Arc<Self> {
        Arc::new(Self {
            password: password.to_string(),
            token: Mutex::new(None),
            issued: AtomicUsize::new(0),
            logins: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            seen_tokens: Mutex::new(Vec::new()),
        })
    }

    /// Simulate session timeout or reboot
    fn expire_session(&self) {
        *self.token.lock().unwrap() = None;
    }

    fn current_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}

fn reply(result: Value) -> Response {
    Json(json!({ "id": 99, "result": result, "error": null })).into_response()
}

async fn rpc_handler(
    Path(namespace): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    State(luci): State<Arc<FakeLuci>>,
    Json(call): Json<Value>,
) -> Response {
    let method = call["method"].as_str().unwrap_or_default().to_string();
    let params: Vec<String> = call["params"]
        .as_array()
        .map(|p| p.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    if namespace == "auth" {
        luci.logins.fetch_add(1, Ordering::SeqCst);
        if method != "login" || params.len() != 2 || params[1] != luci.password {
            return StatusCode::FORBIDDEN.into_response();
        }
        let n = luci.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("2149750d18d5da63b123b3e6830995{:02}", n);
        *luci.token.lock().unwrap() = Some(token.clone());
        return reply(Value::String(token));
    }

    luci.calls.fetch_add(1, Ordering::SeqCst);
    let presented = query.get("auth").cloned().unwrap_or_default();
    luci.seen_tokens.lock().unwrap().push(presented.clone());
    if luci.current_token().as_deref() != Some(presented.as_str()) {
        return StatusCode::FORBIDDEN.into_response();
    }

    match (namespace.as_str(), method.as_str()) {
        ("sys", "hostname") => reply(json!("OpenWrt")),
        ("sys", "uptime") => reply(json!(48650)),
        ("sys", "testBool") => reply(json!(true)),
        ("sys", "net.devices") => reply(json!(["lo", "eth0", "eth1", "br-lan"])),
        ("sys", "getObject") => reply(json!({"b": true, "m": [1, 2, 3], "n": 99, "s": "String"})),
        ("sys", "forbidden") => StatusCode::FORBIDDEN.into_response(),
        ("sys", "broken") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        ("sys", "garbage") => "not json".into_response(),
        ("uci", "get") => reply(json!(params.join("."))),
        ("fs", "readfile") => reply(json!("cm9vdDp4OjA6MA==")),
        _ => Json(json!({ "id": 99, "result": null, "error": "FakeError" })).into_response(),
    }
}

/// Serve the fake router on a background thread and return its address
fn spawn_server(luci: Arc<FakeLuci>) -> SocketAddr {
    let app = Router::new()
        .route("/cgi-bin/luci/rpc/{namespace}", post(rpc_handler))
        .with_state(luci);

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });
    rx.recv().unwrap()
}

fn connect(addr: SocketAddr, password: &str) -> Result<Client, RpcError> {
    Client::new(
        ServerEndpoint::new(addr.ip().to_string()).with_port(addr.port()),
        Credentials::new("root", password),
    )
}

fn setup() -> (Client, Arc<FakeLuci>) {
    let luci = FakeLuci::new("openwrt");
    let addr = spawn_server(Arc::clone(&luci));
    let client = connect(addr, "openwrt").unwrap();
    (client, luci)
}

#[test]
fn test_login_token_used_on_calls() {
    let (client, luci) = setup();
    let token = client.token().unwrap();
    assert_eq!(Some(token.clone()), luci.current_token());

    client.sys_rpc("hostname", &[]).unwrap();
    client.sys_rpc("uptime", &[]).unwrap();
    assert_eq!(*luci.seen_tokens.lock().unwrap(), vec![token.clone(), token]);
}

#[test]
fn test_response_shapes() {
    let (client, _luci) = setup();

    assert_eq!(client.sys_rpc("hostname", &[]).unwrap(), "OpenWrt");
    assert_eq!(client.sys_rpc("uptime", &[]).unwrap(), "48650");
    assert_eq!(client.sys_rpc("testBool", &[]).unwrap(), "true");
    assert_eq!(
        client.sys_rpc("net.devices", &[]).unwrap(),
        r#"["lo","eth0","eth1","br-lan"]"#
    );
    assert_eq!(
        client.sys_rpc("getObject", &[]).unwrap(),
        r#"{"b":true,"m":[1,2,3],"n":99,"s":"String"}"#
    );
}

#[test]
fn test_uci_and_fs_namespaces() {
    let (client, _luci) = setup();

    assert_eq!(
        client.uci_rpc("get", &["system", "ntp", "enabled"]).unwrap(),
        "system.ntp.enabled"
    );
    assert_eq!(client.fs_rpc("readfile", &["/etc/passwd"]).unwrap(), "cm9vdDp4OjA6MA==");
}

#[test]
fn test_rpc_error() {
    let (client, _luci) = setup();

    let err = client.sys_rpc("test", &[]).unwrap_err();
    assert_eq!(err.to_string(), "FakeError");
}

#[test]
fn test_forbidden_retries_once() {
    let (client, luci) = setup();
    let logins_before = luci.logins.load(Ordering::SeqCst);

    let err = client.sys_rpc("forbidden", &[]).unwrap_err();
    assert!(matches!(err, RpcError::Forbidden));
    assert_eq!(luci.logins.load(Ordering::SeqCst), logins_before + 1);
    assert_eq!(luci.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_session_expiry_is_transparent() {
    let (client, luci) = setup();
    let first = client.token().unwrap();

    luci.expire_session();
    assert_eq!(client.sys_rpc("hostname", &[]).unwrap(), "OpenWrt");

    let second = client.token().unwrap();
    assert_ne!(first, second);
    assert_eq!(luci.current_token(), Some(second.clone()));
    assert_eq!(luci.seen_tokens.lock().unwrap().last(), Some(&second));
}

#[test]
fn test_http_and_decode_errors() {
    let (client, _luci) = setup();

    let err = client.sys_rpc("broken", &[]).unwrap_err();
    assert!(matches!(err, RpcError::HttpStatus(500)));
    assert_eq!(err.to_string(), "HTTP status code: 500");

    assert!(matches!(client.sys_rpc("garbage", &[]), Err(RpcError::Decode(_))));
}

#[test]
fn test_bad_credentials_produce_no_client() {
    let luci = FakeLuci::new("openwrt");
    let addr = spawn_server(Arc::clone(&luci));

    assert!(matches!(connect(addr, "wrong"), Err(RpcError::Forbidden)));
    assert_eq!(luci.logins.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unreachable_server() {
    // Bind then drop to get a port nobody listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let result = Client::new(
        ServerEndpoint::new("127.0.0.1").with_port(port),
        Credentials::new("root", "openwrt").with_timeout(2),
    );
    assert!(matches!(result, Err(RpcError::Transport(_))));
}
