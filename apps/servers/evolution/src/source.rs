//! Pluggable source-identifier extraction (spec §9 design notes: "the
//! source identifier ... implementations should make this a pluggable
//! extractor"). Grounded on
//! `file_host::websocket::connection::core::ClientId::from_request`'s
//! `X-Forwarded-For` priority chain, simplified to the identifier the
//! admission controller actually keys on: an IP address string.

use axum::http::HeaderMap;
use std::net::SocketAddr;

pub trait SourceExtractor: Send + Sync {
	fn extract(&self, addr: SocketAddr, headers: &HeaderMap) -> String;
}

/// Uses the raw peer socket address. Correct for direct connections; behind
/// a load balancer every client resolves to the balancer's own address
/// unless it forwards the original, which is what [`ForwardedForExtractor`]
/// is for.
pub struct PeerAddrExtractor;

impl SourceExtractor for PeerAddrExtractor {
	fn extract(&self, addr: SocketAddr, _headers: &HeaderMap) -> String {
		addr.ip().to_string()
	}
}

/// Prefers the first hop recorded in `X-Forwarded-For`, falling back to the
/// peer address when the header is absent, empty, or malformed. Only safe
/// to enable behind a load balancer that can be trusted to set the header
/// itself, since an end client could otherwise spoof it to dodge the
/// per-source rate limit.
pub struct ForwardedForExtractor;

impl SourceExtractor for ForwardedForExtractor {
	fn extract(&self, addr: SocketAddr, headers: &HeaderMap) -> String {
		headers
			.get("x-forwarded-for")
			.and_then(|v| v.to_str().ok())
			.and_then(|v| v.split(',').next())
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map_or_else(|| addr.ip().to_string(), ToString::to_string)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	fn addr() -> SocketAddr {
		"203.0.113.9:443".parse().unwrap()
	}

	#[test]
	fn peer_addr_extractor_ignores_headers() {
		let mut headers = HeaderMap::new();
		headers.insert("x-forwarded-for", HeaderValue::from_static("9.9.9.9"));
		assert_eq!(PeerAddrExtractor.extract(addr(), &headers), "203.0.113.9");
	}

	#[test]
	fn forwarded_for_extractor_prefers_first_hop() {
		let mut headers = HeaderMap::new();
		headers.insert("x-forwarded-for", HeaderValue::from_static("9.9.9.9, 10.0.0.1"));
		assert_eq!(ForwardedForExtractor.extract(addr(), &headers), "9.9.9.9");
	}

	#[test]
	fn forwarded_for_extractor_falls_back_without_header() {
		let headers = HeaderMap::new();
		assert_eq!(ForwardedForExtractor.extract(addr(), &headers), "203.0.113.9");
	}
}
