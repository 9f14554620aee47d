//! LuCI JSON-RPC wire types
//!
//! Every call is a POST of a small JSON envelope to
//! `/cgi-bin/luci/rpc/<namespace>`. The server answers with
//! `{"id": .., "result": .., "error": ..}` where `result` may be any JSON
//! shape. Callers of this crate always receive text:
//! - String results are returned verbatim
//! - Everything else is re-encoded as compact JSON

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Path prefix shared by all namespaces
pub const RPC_BASE_PATH: &str = "/cgi-bin/luci/rpc/";

/// Query parameter carrying the session token
pub const AUTH_QUERY_PARAM: &str = "auth";

/// Namespace for login
pub const NS_AUTH: &str = "auth";
/// System information namespace
pub const NS_SYS: &str = "sys";
/// UCI configuration namespace
pub const NS_UCI: &str = "uci";
/// Filesystem namespace
pub const NS_FS: &str = "fs";

/// Method used to obtain a session token
pub const LOGIN_METHOD: &str = "login";

/// Request body sent for every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub id: u64,
    pub method: String,
    /// Parameters are always sent as strings
    pub params: Vec<String>,
}

impl CallEnvelope {
    pub fn new(id: u64, method: &str, params: &[&str]) -> Self {
        Self {
            id,
            method: method.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Response body returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct ResultEnvelope {
    /// Echoed request id; not used for correlation
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub result: RpcValue,
    #[serde(default)]
    pub error: Option<String>,
}

/// Shape of the `result` field
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RpcValue {
    /// Missing or `null`
    #[default]
    Absent,
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Array(Vec<Value>),
    Object(serde_json::Map<String, Value>),
}

impl From<Value> for RpcValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RpcValue::Absent,
            Value::String(s) => RpcValue::Text(s),
            Value::Number(n) => RpcValue::Number(n),
            Value::Bool(b) => RpcValue::Bool(b),
            Value::Array(items) => RpcValue::Array(items),
            Value::Object(map) => RpcValue::Object(map),
        }
    }
}

impl<'de> Deserialize<'de> for RpcValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(RpcValue::from)
    }
}

impl RpcValue {
    /// Textual form handed back to callers.
    ///
    /// Strings pass through untouched; any other shape (including an absent
    /// result, which becomes `null`) is encoded as compact JSON.
    pub fn into_text(self) -> Result<String, serde_json::Error> {
        let value = match self {
            RpcValue::Text(s) => return Ok(s),
            RpcValue::Absent => Value::Null,
            RpcValue::Number(n) => Value::Number(n),
            RpcValue::Bool(b) => Value::Bool(b),
            RpcValue::Array(items) => Value::Array(items),
            RpcValue::Object(map) => Value::Object(map),
        };
        serde_json::to_string(&canonical(value))
    }
}

/// Rewrite whole-valued floats (`1.0`, `1e3`) as integers, recursively.
fn canonical(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(canonical_number(n)),
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, canonical(v))).collect()),
        other => other,
    }
}

fn canonical_number(n: serde_json::Number) -> serde_json::Number {
    let Some(f) = n.as_f64().filter(|_| n.is_f64()) else {
        return n;
    };
    if !f.is_finite() || f.fract() != 0.0 {
        return n;
    }
    // i64::MAX and u64::MAX are not exactly representable; compare against 2^63 / 2^64
    if f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0 {
        serde_json::Number::from(f as i64)
    } else if f >= 0.0 && f < 18_446_744_073_709_551_616.0 {
        serde_json::Number::from(f as u64)
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(body: &str) -> String {
        let envelope: ResultEnvelope = serde_json::from_str(body).unwrap();
        envelope.result.into_text().unwrap()
    }

    #[test]
    fn test_call_envelope_wire_format() {
        let call = CallEnvelope::new(99, LOGIN_METHOD, &["root", "openwrt"]);
        let json = serde_json::to_string(&call).unwrap();
        assert_eq!(json, r#"{"id":99,"method":"login","params":["root","openwrt"]}"#);
    }

    #[test]
    fn test_call_envelope_without_params() {
        let call = CallEnvelope::new(99, "hostname", &[]);
        let json = serde_json::to_string(&call).unwrap();
        assert_eq!(json, r#"{"id":99,"method":"hostname","params":[]}"#);
    }

    #[test]
    fn test_string_result_is_not_quoted() {
        assert_eq!(normalize(r#"{"id":99,"result":"OpenWrt","error":null}"#), "OpenWrt");
    }

    #[test]
    fn test_scalar_results_are_reencoded() {
        assert_eq!(normalize(r#"{"id":99,"result":48650,"error":null}"#), "48650");
        assert_eq!(normalize(r#"{"id":99,"result":true,"error":null}"#), "true");
        assert_eq!(normalize(r#"{"id":99,"result":1.0,"error":null}"#), "1");
        assert_eq!(normalize(r#"{"id":99,"result":1e3,"error":null}"#), "1000");
        assert_eq!(normalize(r#"{"id":99,"result":-2.0,"error":null}"#), "-2");
        assert_eq!(normalize(r#"{"id":99,"result":0.25,"error":null}"#), "0.25");
    }

    #[test]
    fn test_nested_floats_are_canonical() {
        assert_eq!(
            normalize(r#"{"id":99,"result":{"load":[1.0,0.5],"mem":2e2},"error":null}"#),
            r#"{"load":[1,0.5],"mem":200}"#
        );
    }

    #[test]
    fn test_negative_id_accepted() {
        let envelope: ResultEnvelope =
            serde_json::from_str(r#"{"id":-1,"result":"OpenWrt","error":null}"#).unwrap();
        assert_eq!(envelope.id, Some(-1));
        assert_eq!(envelope.result.into_text().unwrap(), "OpenWrt");
    }

    #[test]
    fn test_structured_results_are_compacted() {
        assert_eq!(
            normalize(r#"{"id":99,"result":[ "lo", "eth0" ],"error":null}"#),
            r#"["lo","eth0"]"#
        );
        assert_eq!(
            normalize(r#"{"id":99,"result":{"b":true,"m":[1,2,3],"n":99,"s":"String"},"error":null}"#),
            r#"{"b":true,"m":[1,2,3],"n":99,"s":"String"}"#
        );
    }

    #[test]
    fn test_absent_result_becomes_null() {
        assert_eq!(normalize(r#"{"id":99,"error":null}"#), "null");
        assert_eq!(normalize(r#"{"id":99,"result":null,"error":null}"#), "null");
    }

    #[test]
    fn test_error_field() {
        let envelope: ResultEnvelope =
            serde_json::from_str(r#"{"id":99,"result":null,"error":"FakeError"}"#).unwrap();
        assert_eq!(envelope.error.as_deref(), Some("FakeError"));
        assert_eq!(envelope.result, RpcValue::Absent);
        assert_eq!(envelope.id, Some(99));
    }
}
