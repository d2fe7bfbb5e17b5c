// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request context: who is calling and which browser session they hold.
//!
//! ```rust,ignore
//! async fn handler(ClientIp(ip): ClientIp, Extension(session): Extension<BrowserSession>) {
//!     // ip names the caller's folder; session.requester() feeds PinService
//! }
//! ```

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::ApiError;
use crate::pins::{Requester, SESSION_COOKIE, UNLOCK_COOKIE};
use crate::state::AppState;

/// The caller's address, which is also the name of their folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ConnectInfo(peer) = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .copied()
            .ok_or_else(|| {
                warn!("No connection info on request");
                ApiError::internal("Client address unavailable")
            })?;
        Ok(ClientIp(client_ip(
            &parts.headers,
            peer.ip(),
            &state.trusted_proxies,
        )))
    }
}

/// Resolve the client address.
///
/// `X-Forwarded-For` (rightmost entry) and then `X-Real-IP` are used only
/// when the direct peer is a trusted proxy; otherwise the peer address is
/// the client. IPv4-mapped IPv6 addresses are folded to IPv4.
pub fn client_ip(headers: &HeaderMap, peer: IpAddr, trusted_proxies: &[IpAddr]) -> IpAddr {
    let peer = peer.to_canonical();
    if !trusted_proxies.contains(&peer) {
        return peer;
    }

    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.rsplit(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    let real_ip = || {
        headers
            .get("X-Real-IP")
            .and_then(|h| h.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    };

    forwarded
        .or_else(real_ip)
        .map(|ip| ip.to_canonical())
        .unwrap_or(peer)
}

/// Value of cookie `name` in the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// The browser's session id and raw unlock cookie, set by [`session_layer`].
#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub id: String,
    pub unlock_cookie: Option<String>,
}

impl BrowserSession {
    pub fn requester(&self) -> Requester<'_> {
        Requester {
            session_id: Some(&self.id),
            unlock_cookie: self.unlock_cookie.as_deref(),
        }
    }
}

/// Attach a [`BrowserSession`] to every request, starting a new session
/// (and setting `ft_session`) when the browser has none or it expired.
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = cookie_value(request.headers(), SESSION_COOKIE)
        .filter(|id| state.sessions.touch(id));

    let (id, is_new) = match existing {
        Some(id) => (id, false),
        None => match state.sessions.create() {
            Ok(id) => (id, true),
            Err(e) => {
                warn!(error = %e, "Could not start session");
                return ApiError::internal("Could not start session").into_response();
            }
        },
    };

    let unlock_cookie = cookie_value(request.headers(), UNLOCK_COOKIE);
    request.extensions_mut().insert(BrowserSession {
        id: id.clone(),
        unlock_cookie,
    });

    let mut response = next.run(request).await;
    if is_new {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; SameSite=Lax; HttpOnly");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn untrusted_peer_cannot_spoof() {
        let h = headers(&[("X-Forwarded-For", "9.9.9.9")]);
        assert_eq!(client_ip(&h, ip("10.0.0.5"), &[LOOPBACK]), ip("10.0.0.5"));
    }

    #[test]
    fn trusted_proxy_uses_rightmost_forwarded() {
        let h = headers(&[("X-Forwarded-For", "1.1.1.1, 2.2.2.2")]);
        assert_eq!(client_ip(&h, LOOPBACK, &[LOOPBACK]), ip("2.2.2.2"));
    }

    #[test]
    fn trusted_proxy_falls_back_to_real_ip_then_peer() {
        let h = headers(&[("X-Forwarded-For", "garbage"), ("X-Real-IP", "3.3.3.3")]);
        assert_eq!(client_ip(&h, LOOPBACK, &[LOOPBACK]), ip("3.3.3.3"));
        assert_eq!(client_ip(&HeaderMap::new(), LOOPBACK, &[LOOPBACK]), LOOPBACK);
    }

    #[test]
    fn mapped_ipv4_is_folded() {
        assert_eq!(
            client_ip(&HeaderMap::new(), ip("::ffff:10.1.2.3"), &[]),
            ip("10.1.2.3")
        );
    }

    #[test]
    fn cookie_lookup() {
        let h = headers(&[
            ("Cookie", "a=1; ft_session=abc"),
            ("Cookie", "FT_UNLOCKS=\"x.y.z\""),
        ]);
        assert_eq!(cookie_value(&h, "ft_session").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&h, "FT_UNLOCKS").as_deref(), Some("x.y.z"));
        assert_eq!(cookie_value(&h, "missing"), None);
    }
}
