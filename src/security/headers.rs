//! Client address extraction.
//!
//! `X-Forwarded-For` is only trusted when explicitly configured; otherwise the
//! socket peer address is used. Addresses are canonicalized so one client
//! never splits into two identities (IPv4-mapped IPv6 collapses to IPv4).

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Placeholder used when neither the socket nor a trusted header yields an address.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Resolve the normalized client address of a request.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return canonical(ip).to_string();
        }
    }

    peer.map(|addr| canonical(addr.ip()).to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_forwarded_ignored_unless_trusted() {
        let peer: SocketAddr = "10.1.1.1:5555".parse().unwrap();
        let headers = forwarded("203.0.113.9, 10.0.0.1");
        assert_eq!(client_address(&headers, Some(peer), false), "10.1.1.1");
        assert_eq!(client_address(&headers, Some(peer), true), "203.0.113.9");
    }

    #[test]
    fn test_garbage_forwarded_falls_back_to_peer() {
        let peer: SocketAddr = "10.1.1.1:5555".parse().unwrap();
        assert_eq!(client_address(&forwarded("not-an-ip"), Some(peer), true), "10.1.1.1");
    }

    #[test]
    fn test_ipv4_mapped_is_canonicalized() {
        let peer: SocketAddr = "[::ffff:192.0.2.7]:80".parse().unwrap();
        assert_eq!(client_address(&HeaderMap::new(), Some(peer), false), "192.0.2.7");
    }

    #[test]
    fn test_missing_peer() {
        assert_eq!(client_address(&HeaderMap::new(), None, false), UNKNOWN_ADDRESS);
    }
}
