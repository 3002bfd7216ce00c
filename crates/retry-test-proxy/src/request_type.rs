//! Request classification by storage API shape.
//!
//! Every inbound request is mapped to a [`RequestType`] from its method and
//! path alone. The classification decides which instruction queue a request
//! consumes from, so the branch order below is load-bearing: the path shape is
//! tested first, the method second.

use hyper::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path marker of the JSON metadata API
/// (`/storage/v1/b/<bucket>/o/<object>`).
const JSON_API_MARKER: &str = "/storage/v1";

/// Closed set of request shapes the proxy knows how to script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum RequestType {
    /// Direct object-data read through the XML API.
    XmlRead,
    JsonStat,
    JsonDelete,
    JsonUpdate,
    JsonCreate,
    JsonCopy,
    JsonList,
    JsonCompose,
    /// Anything the classifier does not recognize. Never injected.
    Unknown,
}

impl RequestType {
    pub const ALL: [RequestType; 9] = [
        RequestType::XmlRead,
        RequestType::JsonStat,
        RequestType::JsonDelete,
        RequestType::JsonUpdate,
        RequestType::JsonCreate,
        RequestType::JsonCopy,
        RequestType::JsonList,
        RequestType::JsonCompose,
        RequestType::Unknown,
    ];

    /// Classify a request from its method and path.
    pub fn classify(method: &Method, path: &str) -> Self {
        if path.contains(JSON_API_MARKER) {
            match *method {
                Method::GET => RequestType::JsonStat,
                Method::POST => RequestType::JsonCreate,
                Method::PUT => RequestType::JsonUpdate,
                _ => RequestType::Unknown,
            }
        } else {
            match *method {
                Method::GET => RequestType::XmlRead,
                _ => RequestType::Unknown,
            }
        }
    }

    /// Backend operation name used as the key of a retry-test instruction map.
    ///
    /// `None` means the request type is never eligible for injection.
    pub fn operation_name(&self) -> Option<&'static str> {
        match self {
            RequestType::XmlRead | RequestType::JsonStat => Some("storage.objects.get"),
            RequestType::JsonDelete => Some("storage.objects.delete"),
            RequestType::JsonUpdate => Some("storage.objects.update"),
            RequestType::JsonCreate => Some("storage.objects.insert"),
            RequestType::JsonCopy => Some("storage.objects.rewrite"),
            RequestType::JsonList => Some("storage.objects.list"),
            RequestType::JsonCompose => Some("storage.objects.compose"),
            RequestType::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::XmlRead => "XmlRead",
            RequestType::JsonStat => "JsonStat",
            RequestType::JsonDelete => "JsonDelete",
            RequestType::JsonUpdate => "JsonUpdate",
            RequestType::JsonCreate => "JsonCreate",
            RequestType::JsonCopy => "JsonCopy",
            RequestType::JsonList => "JsonList",
            RequestType::JsonCompose => "JsonCompose",
            RequestType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestType::ALL
            .iter()
            .copied()
            .find(|rt| rt.as_str() == s)
            .ok_or_else(|| format!("Unknown request type: '{s}'"))
    }
}
