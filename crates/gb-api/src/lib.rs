//! # gb-api
//!
//! The HTTP layer of the guestbook: guest-facing routes, the visitor ping
//! and the Telegram webhook.

pub mod client;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod webhook;

use actix_web::web;

pub use client::ProxyTrust;
pub use handlers::AppState;

/// Mounts every route under `/api`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/guestbook/submit", web::post().to(handlers::submit_entry))
            .route("/guestbook/list", web::get().to(handlers::list_entries))
            .route("/status", web::get().to(handlers::get_status))
            .route("/scan", web::post().to(handlers::record_scan))
            .route("/keep-alive", web::get().to(handlers::keep_alive))
            .service(
                web::resource("/telegram/webhook")
                    .route(web::post().to(webhook::telegram_webhook))
                    .route(web::get().to(webhook::method_not_allowed)),
            ),
    );
}
