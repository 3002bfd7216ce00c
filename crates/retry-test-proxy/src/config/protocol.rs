//! Backend URL scheme handling.

use serde::{Deserialize, Serialize};

/// Scheme of a backend or control-plane host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Parse protocol from URL scheme
    pub fn from_scheme(scheme: &str) -> Result<Self, String> {
        match scheme.to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(format!("Unsupported protocol scheme: {scheme}")),
        }
    }
}

/// Validate that `host` is an absolute http(s) URL with an authority and
/// return its protocol.
pub fn parse_host_url(host: &str) -> Result<Protocol, String> {
    let uri: hyper::Uri = host
        .parse()
        .map_err(|e| format!("Invalid host URL '{host}': {e}"))?;
    let scheme = uri
        .scheme_str()
        .ok_or_else(|| format!("Invalid host URL (missing scheme): {host}"))?;
    let protocol = Protocol::from_scheme(scheme)?;
    if uri.authority().is_none() {
        return Err(format!("Invalid host URL (missing authority): {host}"));
    }
    Ok(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scheme_case_insensitive() {
        assert_eq!(Protocol::from_scheme("HTTPS").unwrap(), Protocol::Https);
        assert_eq!(Protocol::from_scheme("http").unwrap(), Protocol::Http);
        assert!(Protocol::from_scheme("ftp").is_err());
    }

    #[test]
    fn test_parse_host_url() {
        assert_eq!(
            parse_host_url("http://localhost:9000").unwrap(),
            Protocol::Http
        );
        assert_eq!(
            parse_host_url("https://storage.googleapis.com").unwrap(),
            Protocol::Https
        );
        assert!(parse_host_url("localhost:9000").is_err());
        assert!(parse_host_url("/just/a/path").is_err());
        assert!(parse_host_url("grpc://localhost:9000").is_err());
    }
}
