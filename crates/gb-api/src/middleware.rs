//! guestbook/crates/gb-api/src/middleware.rs Middleware
//!
//! Access logging and cross-origin policy for the public API.

use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};

/// Access log line per request. Client addresses are left out; the
/// services only ever log their digests.
pub fn access_log() -> Logger {
    Logger::new(r#""%r" %s %b %Dms"#)
}

/// The site's pages and the API may be served from different origins.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST"])
        .allow_any_header()
        .max_age(3600)
}

/// Browsers must not sniff uploaded photos into another content type.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff"))
}
