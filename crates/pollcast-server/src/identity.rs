//! Voter identity from request metadata.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use pollcast_core::VoterId;

use crate::config::{ServerConfig, UnknownIdentityPolicy};
use crate::error::AppError;

/// Identity shared by every sender that cannot be identified.
pub const UNKNOWN_IDENTITY: &str = "unknown-ip";

/// Best-effort client address.
///
/// Tries the first entry of `X-Forwarded-For`, then `X-Real-IP` (both only
/// when `trust_forwarded` is set), then the TCP peer address.
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> Option<String> {
    if trust_forwarded {
        let forwarded = header_str(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }

        if let Some(ip) = header_str(headers, "x-real-ip")
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return Some(ip.to_string());
        }
    }

    peer.map(|addr| addr.ip().to_string())
}

/// Resolve the voter identity for a vote request under `config`'s policy.
pub fn resolve_voter(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    config: &ServerConfig,
) -> Result<VoterId, AppError> {
    match client_address(headers, peer, config.trust_forwarded_headers) {
        Some(addr) => Ok(VoterId::new(addr)?),
        None => match config.unknown_identity {
            UnknownIdentityPolicy::Shared => Ok(VoterId::new(UNKNOWN_IDENTITY)?),
            UnknownIdentityPolicy::Reject => Err(AppError::UnknownIdentity),
        },
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
