use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque correlation token of an in-flight dapp request.
///
/// In-page providers send either strings or numbers, both are kept as their string form so the
/// response can echo the id back unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            String(String),
            Number(u64),
        }

        match RawId::deserialize(deserializer)? {
            RawId::String(s) if s.is_empty() => {
                Err(serde::de::Error::custom("request id must not be empty"))
            }
            RawId::String(s) => Ok(Self(s)),
            RawId::Number(n) => Ok(Self(n.to_string())),
        }
    }
}

/// An untyped method call as forwarded by the in-page provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcCall {
    pub request_id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl RpcCall {
    pub fn new(request_id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), method: method.into(), params: Default::default() }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Returns the params, substituting an empty sequence when none were sent.
    pub fn params_or_empty(&self) -> serde_json::Value {
        if self.params.is_null() { serde_json::Value::Array(vec![]) } else { self.params.clone() }
    }
}
