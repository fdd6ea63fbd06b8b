//! Client identification and rate limit key generation.

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use std::net::SocketAddr;

pub const KEY_PREFIX: &str = "rate-limiter";

/// Where the client identifier is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSource {
    /// Peer socket address only
    PeerAddress,
    /// Proxy headers first, then the peer address
    ForwardedHeaders,
}

/// Generates rate limiting keys from request context
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    source: ClientSource,
}

impl KeyGenerator {
    pub fn new(source: ClientSource) -> Self {
        Self { source }
    }

    pub fn from_trust(trust_forwarded_headers: bool) -> Self {
        if trust_forwarded_headers {
            Self::new(ClientSource::ForwardedHeaders)
        } else {
            Self::new(ClientSource::PeerAddress)
        }
    }

    /// Identify the caller of `request`.
    pub fn client_identifier(&self, request: &Request) -> String {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let forwarded = match self.source {
            ClientSource::ForwardedHeaders => Self::extract_forwarded_ip(request.headers()),
            ClientSource::PeerAddress => None,
        };

        forwarded
            .or(peer)
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Build the counter key for a client identifier
    pub fn generate_key(client_id: &str) -> String {
        format!("{}:{}", KEY_PREFIX, Self::sanitize_key(client_id))
    }

    /// Extract client IP from proxy headers
    pub fn extract_forwarded_ip(headers: &HeaderMap) -> Option<String> {
        if let Some(forwarded) = headers.get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    let first_ip = first_ip.trim();
                    if !first_ip.is_empty() {
                        return Some(first_ip.to_string());
                    }
                }
            }
        }

        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(String::from)
    }

    /// Sanitize key components to ensure valid Redis keys
    pub fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, ':' | '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(ClientSource::PeerAddress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn request_from(addr: &str) -> Request {
        let mut request = Request::new(Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        request
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            KeyGenerator::generate_key("192.168.1.1"),
            "rate-limiter:192.168.1.1"
        );
        assert_eq!(KeyGenerator::generate_key("::1"), "rate-limiter:::1");
    }

    #[test]
    fn test_peer_address() {
        let generator = KeyGenerator::default();
        let request = request_from("10.1.2.3:54321");
        assert_eq!(generator.client_identifier(&request), "10.1.2.3");
    }

    #[test]
    fn test_forwarded_header_ignored_unless_trusted() {
        let mut request = request_from("10.1.2.3:54321");
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        assert_eq!(KeyGenerator::default().client_identifier(&request), "10.1.2.3");
        assert_eq!(
            KeyGenerator::from_trust(true).client_identifier(&request),
            "192.168.1.1"
        );
    }

    #[test]
    fn test_real_ip_header() {
        let mut request = Request::new(Body::empty());
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));

        assert_eq!(
            KeyGenerator::from_trust(true).client_identifier(&request),
            "203.0.113.1"
        );
    }

    #[test]
    fn test_unknown_fallback() {
        let request = Request::new(Body::empty());
        assert_eq!(KeyGenerator::default().client_identifier(&request), "unknown");
    }

    #[test]
    fn test_sanitize_key() {
        let sanitized = KeyGenerator::sanitize_key("test@key#with$special%chars");
        assert_eq!(sanitized, "test_key_with_special_chars");
    }
}
