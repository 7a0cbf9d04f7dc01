//! # Guestbook Binary
//!
//! The entry point that assembles the application based on compile-time features.

use std::sync::Arc;
use std::time::Duration;

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use gb_api::{configure_routes, middleware, AppState, ProxyTrust};
use gb_config::Settings;
use gb_core::moderation::ModerationProcessor;
use gb_core::notify::NotificationDispatcher;
use gb_core::rate_limit::{FixedWindowLimiter, VisitorThrottle};
use gb_core::submission::SubmissionGateway;
use gb_core::visits::VisitTracker;
use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Feature-gated imports: one adapter per port
#[cfg(feature = "db-sqlite")]
use gb_db_sqlite::SqliteStore;

#[cfg(feature = "storage-local")]
use gb_storage_local::LocalPhotoStore;

#[cfg(feature = "auth-simple")]
use gb_auth_simple::SimpleIdentityProvider;

#[cfg(feature = "chat-telegram")]
use gb_telegram::TelegramChannel;

#[cfg(not(all(
    feature = "db-sqlite",
    feature = "storage-local",
    feature = "auth-simple",
    feature = "chat-telegram"
)))]
compile_error!("every port needs an adapter: enable db-sqlite, storage-local, auth-simple and chat-telegram");

const CHAT_TIMEOUT: Duration = Duration::from_secs(10);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing();

    let site = settings.site_info()?;
    let policy = settings.guestbook.publication;
    let operator = settings.telegram.chat_id;

    // 1. Persistence
    let store = Arc::new(SqliteStore::new(&settings.database.url).await?);

    // 2. Photo storage, served back by this process when the prefix is a path
    tokio::fs::create_dir_all(&settings.media.root).await?;
    let (photo_prefix, media_mount) = if settings.media.url_prefix.starts_with('/') {
        let mount = settings.media.url_prefix.trim_end_matches('/').to_string();
        (format!("{}{}", site.public_base_url, mount), Some(mount))
    } else {
        (settings.media.url_prefix.clone(), None)
    };
    let photos = Arc::new(LocalPhotoStore::new(&settings.media.root, photo_prefix));

    // 3. Identity and the operator chat
    if settings.identity.salt.expose_secret().is_empty() {
        warn!("identity.salt is empty; visitor hashes are unsalted");
    }
    let identity = Arc::new(SimpleIdentityProvider::new(settings.identity.salt.clone(), operator));

    if settings.telegram.bot_token.expose_secret().is_empty() || operator == 0 {
        warn!("telegram is not configured; operator messages will fail");
    }
    let chat = Arc::new(TelegramChannel::new(
        &settings.telegram.api_base,
        settings.telegram.bot_token.clone(),
        CHAT_TIMEOUT,
    )?);

    // 4. Services
    let notifier = NotificationDispatcher::new(chat.clone(), operator, site.clone(), policy);
    let gateway = SubmissionGateway::new(
        store.clone(),
        photos,
        Arc::new(FixedWindowLimiter::new()),
        notifier.clone(),
        policy,
    )
    .with_limits(settings.submission_limits());
    let moderation =
        ModerationProcessor::new(store.clone(), store.clone(), chat, identity.clone(), site)
            .with_pages(settings.listing_pages());
    let visits = VisitTracker::new(
        store.clone(),
        identity,
        Arc::new(VisitorThrottle::new()),
        notifier,
        settings.visitor_window(),
    );

    let state = web::Data::new(AppState {
        gateway,
        moderation,
        visits,
        entries: store.clone(),
        status: store.clone(),
        scans: store,
        policy,
        proxy: ProxyTrust::from_hops(settings.server.trusted_proxy_hops),
    });

    let (host, port) = settings.bind_address();
    info!(%host, port, ?policy, "guestbook starting");

    let media_root = settings.media.root.clone();
    HttpServer::new(move || {
        let app = App::new()
            .app_data(state.clone())
            .wrap(middleware::cors_policy())
            .wrap(middleware::security_headers())
            .wrap(middleware::access_log())
            .configure(configure_routes);
        match &media_mount {
            Some(mount) => app.service(Files::new(mount, &media_root)),
            None => app,
        }
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}

/// JSON logs filtered by `RUST_LOG` (default `info`). Also captures the
/// `log` records actix emits.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .init();
}
