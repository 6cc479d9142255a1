//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

/// Extract the client IP address.
///
/// Behind a reverse proxy (`trust_forwarded_for`), the first `X-Forwarded-For`
/// entry is used and a missing header is an error. Otherwise the socket peer
/// from `ConnectInfo` is used.
pub fn extract_client_ip(
    source: &Request,
    trust_forwarded_for: bool,
) -> Result<String, &'static str> {
    if trust_forwarded_for {
        let value = source
            .headers()
            .get("x-forwarded-for")
            .ok_or("X-Forwarded-For header not present")?
            .to_str()
            .map_err(|_| "X-Forwarded-For header contains invalid characters")?;
        return value
            .split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .ok_or("X-Forwarded-For header is empty");
    }

    source
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .ok_or("No client IP available")
}
