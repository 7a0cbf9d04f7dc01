//! Visitor pings: one operator alert per visitor per window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::error::{AppError, Result};
use crate::models::ScanEvent;
use crate::notify::NotificationDispatcher;
use crate::rate_limit::VisitorThrottle;
use crate::sanitize::truncate_chars;
use crate::traits::{IdentityProvider, ScanRepo};

const DEFAULT_PATH: &str = "/h";
const MAX_PATH_CHARS: usize = 200;

pub struct VisitTracker {
    scans: Arc<dyn ScanRepo>,
    identity: Arc<dyn IdentityProvider>,
    throttle: Arc<VisitorThrottle>,
    notifier: NotificationDispatcher,
    window: Duration,
}

impl VisitTracker {
    pub fn new(
        scans: Arc<dyn ScanRepo>,
        identity: Arc<dyn IdentityProvider>,
        throttle: Arc<VisitorThrottle>,
        notifier: NotificationDispatcher,
        window: Duration,
    ) -> Self {
        Self { scans, identity, throttle, notifier, window }
    }

    /// Logs the visit and alerts the operator, unless this visitor was seen
    /// within the window (`RateLimited`). A failed scan write is only logged.
    pub async fn record(
        &self,
        ip: &str,
        user_agent: &str,
        path: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<ScanEvent> {
        let visitor = self.identity.visitor_key(ip, user_agent);
        if self.throttle.should_limit(&visitor, self.window) {
            debug!("visitor ping throttled");
            return Err(AppError::RateLimited);
        }

        let path = path.map(str::trim).filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PATH);
        let event = ScanEvent {
            path: truncate_chars(path, MAX_PATH_CHARS).to_string(),
            ip_hash: self.identity.digest(ip),
            ua_hash: self.identity.digest(user_agent),
        };

        if let Err(err) = self.scans.record_scan(event.clone()).await {
            error!(error = %err, "failed to log scan event");
        }

        drop(self.notifier.dispatch_visitor_alert(event.path.clone(), at, event.ip_hash.clone()));
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PublicationPolicy, SiteInfo};
    use crate::testing::{FixedIdentity, MemoryStore, RecordingChat};

    fn tracker(store: Arc<MemoryStore>) -> VisitTracker {
        let notifier = NotificationDispatcher::new(
            Arc::new(RecordingChat::default()),
            7,
            SiteInfo::default(),
            PublicationPolicy::Auto,
        );
        VisitTracker::new(
            store,
            Arc::new(FixedIdentity { operator: 7 }),
            Arc::new(VisitorThrottle::new()),
            notifier,
            Duration::from_secs(600),
        )
    }

    #[tokio::test]
    async fn records_hashed_visit_once_per_window() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store.clone());

        let event = tracker.record("1.1.1.1", "curl", None, Utc::now()).await.unwrap();
        assert_eq!(
            event,
            ScanEvent {
                path: "/h".into(),
                ip_hash: "h(1.1.1.1)".into(),
                ua_hash: "h(curl)".into(),
            }
        );
        assert!(matches!(
            tracker.record("1.1.1.1", "curl", Some("/h/wifi"), Utc::now()).await,
            Err(AppError::RateLimited)
        ));
        // Same address, different browser: a different visitor.
        assert!(tracker.record("1.1.1.1", "firefox", None, Utc::now()).await.is_ok());
        assert_eq!(store.scans().len(), 2);
    }

    #[tokio::test]
    async fn scan_store_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        assert!(tracker(store).record("2.2.2.2", "ua", Some("/h"), Utc::now()).await.is_ok());
    }
}
