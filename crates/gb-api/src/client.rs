//! Who is calling: the client address and user agent behind the proxy chain.
//!
//! The address keys the submission limiter, so it is only as trustworthy as
//! the `X-Forwarded-For` header it is read from. Behind an edge that
//! overwrites the header the first hop is safe. Behind proxies that append,
//! configure how many of them there are with [`ProxyTrust::Hops`]; otherwise a
//! client can mint a fresh budget by sending its own header.

use actix_web::http::header::USER_AGENT;
use actix_web::HttpRequest;

const UNKNOWN: &str = "unknown";

/// How much of the forwarding chain is believed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyTrust {
    /// The edge replaces `X-Forwarded-For`, so its first hop is the client.
    #[default]
    FirstHop,
    /// This many proxies append to `X-Forwarded-For`; the client is the hop
    /// the outermost one recorded. `Hops(0)` ignores forwarding headers.
    Hops(usize),
}

impl ProxyTrust {
    pub fn from_hops(hops: Option<usize>) -> Self {
        hops.map_or(Self::FirstHop, Self::Hops)
    }
}

/// The client address under the given trust model, falling back to the peer.
pub fn client_ip(req: &HttpRequest, trust: ProxyTrust) -> String {
    let forwarded = match trust {
        ProxyTrust::FirstHop => first_hop(req),
        ProxyTrust::Hops(0) => None,
        ProxyTrust::Hops(trusted) => {
            let hops = forwarded_hops(req);
            (!hops.is_empty()).then(|| hops[hops.len().saturating_sub(trusted)].to_string())
        }
    };
    if let Some(ip) = forwarded {
        return ip;
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// First `X-Forwarded-For` hop, else `X-Real-IP`.
fn first_hop(req: &HttpRequest) -> Option<String> {
    forwarded_hops(req)
        .first()
        .copied()
        .or_else(|| header(req, "x-real-ip").map(str::trim).filter(|v| !v.is_empty()))
        .map(str::to_string)
}

fn forwarded_hops(req: &HttpRequest) -> Vec<&str> {
    header(req, "x-forwarded-for")
        .map(|v| v.split(',').map(str::trim).filter(|v| !v.is_empty()).collect())
        .unwrap_or_default()
}

pub fn user_agent(req: &HttpRequest) -> String {
    req.headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}
