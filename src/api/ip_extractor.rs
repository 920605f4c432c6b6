//! Client IP extraction for visit recording
//!
//! Precedence:
//! - the first entry of `X-Forwarded-For`, when present and non-empty
//! - the socket peer address, when the server was started with connect info
//! - nothing, in which case the visit is recorded without a location

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Best-known address of the visitor, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let socket_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(ClientIp(extract_client_ip(&parts.headers, socket_ip)))
    }
}

/// Resolve the client address from headers, falling back to the peer address
///
/// The forwarded value is passed on verbatim; the geolocation layer decides
/// whether it is usable.
pub fn extract_client_ip(headers: &HeaderMap, socket_ip: Option<IpAddr>) -> Option<String> {
    extract_from_x_forwarded_for(headers).or_else(|| {
        // Dual-stack listeners report IPv4 peers as ::ffff:a.b.c.d
        socket_ip.map(|ip| ip.to_canonical().to_string())
    })
}

/// Leftmost entry of X-Forwarded-For, i.e. the originating client
fn extract_from_x_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    xff.split(',')
        .map(str::trim)
        .find(|entry| !entry.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_socket_address_without_headers() {
        let headers = HeaderMap::new();
        let socket_ip: IpAddr = "192.168.1.1".parse().unwrap();

        let result = extract_client_ip(&headers, Some(socket_ip));
        assert_eq!(result.as_deref(), Some("192.168.1.1"));
    }

    #[test]
    fn test_forwarded_for_wins_over_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5"));
        let socket_ip: IpAddr = "10.0.0.1".parse().unwrap();

        let result = extract_client_ip(&headers, Some(socket_ip));
        assert_eq!(result.as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_forwarded_for_chain_uses_originating_client() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.1 , 198.51.100.1"),
        );

        let result = extract_client_ip(&headers, None);
        assert_eq!(result.as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn test_blank_forwarded_for_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , "));
        let socket_ip: IpAddr = "10.0.0.1".parse().unwrap();

        let result = extract_client_ip(&headers, Some(socket_ip));
        assert_eq!(result.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_ipv4_mapped_peer_is_canonicalized() {
        let headers = HeaderMap::new();
        let socket_ip: IpAddr = "::ffff:192.0.2.33".parse().unwrap();

        let result = extract_client_ip(&headers, Some(socket_ip));
        assert_eq!(result.as_deref(), Some("192.0.2.33"));
    }

    #[test]
    fn test_nothing_known() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }
}
