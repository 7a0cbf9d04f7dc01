//! # gb-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core services.

use std::sync::Arc;

use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::TryStreamExt;
use gb_core::error::AppError;
use gb_core::moderation::ModerationProcessor;
use gb_core::models::{PhotoUpload, PublicEntry, PublicationPolicy, Submission};
use gb_core::submission::{SubmissionGateway, MAX_PHOTO_BYTES};
use gb_core::traits::{GuestbookRepo, ScanRepo, StatusRepo};
use gb_core::visits::VisitTracker;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::client::{client_ip, user_agent, ProxyTrust};
use crate::error::ApiError;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 100;
/// Text fields are truncated well below this by validation anyway.
const MAX_TEXT_FIELD_BYTES: usize = 16 * 1024;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub gateway: SubmissionGateway,
    pub moderation: ModerationProcessor,
    pub visits: VisitTracker,
    pub entries: Arc<dyn GuestbookRepo>,
    pub status: Arc<dyn StatusRepo>,
    pub scans: Arc<dyn ScanRepo>,
    pub policy: PublicationPolicy,
    pub proxy: ProxyTrust,
}

/// `POST /api/guestbook/submit`, a multipart form with `name`, `phone`, `message`, `photo`.
pub async fn submit_entry(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: Multipart,
) -> Result<HttpResponse, ApiError> {
    let submission = read_submission(form).await.map_err(|err| {
        warn!(error = %err, "unreadable guestbook form");
        AppError::Validation("Invalid form data.".to_string())
    })?;

    let identity = client_ip(&req, data.proxy);
    let entry = data.gateway.submit(&identity, submission).await?;

    let message = match data.policy {
        PublicationPolicy::Auto => "Your message is live!",
        PublicationPolicy::Moderated => "Thank you! Your message will appear once approved.",
    };
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "entryId": entry.id,
    })))
}

async fn read_submission(mut form: Multipart) -> Result<Submission, MultipartError> {
    let mut submission = Submission::default();

    while let Some(field) = form.try_next().await? {
        let name = field.name().to_string();
        match name.as_str() {
            "name" => submission.name = read_text(field).await?,
            "phone" => submission.phone = Some(read_text(field).await?),
            "message" => submission.message = read_text(field).await?,
            "photo" => submission.photo = read_photo(field).await?,
            _ => drain(field).await?,
        }
    }
    Ok(submission)
}

async fn read_text(field: Field) -> Result<String, MultipartError> {
    let bytes = read_capped(field, MAX_TEXT_FIELD_BYTES).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// An empty file input counts as no photo. Oversized uploads keep one byte
/// past the limit so validation can reject them.
async fn read_photo(field: Field) -> Result<Option<PhotoUpload>, MultipartError> {
    let file_name = field
        .content_disposition()
        .get_filename()
        .map(str::to_string);
    let declared = field.content_type().map(|m| m.essence_str().to_string());

    let data = read_capped(field, MAX_PHOTO_BYTES + 1).await?;
    if data.is_empty() {
        return Ok(None);
    }

    let content_type = declared
        .filter(|m| m != "application/octet-stream")
        .or_else(|| {
            file_name
                .as_deref()
                .and_then(|n| mime_guess::from_path(n).first())
                .map(|m| m.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(Some(PhotoUpload { file_name, content_type, data }))
}

/// Reads the whole field but keeps at most `cap` bytes.
async fn read_capped(mut field: Field, cap: usize) -> Result<Bytes, MultipartError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.try_next().await? {
        let room = cap.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
    Ok(buf.freeze())
}

async fn drain(mut field: Field) -> Result<(), MultipartError> {
    while field.try_next().await?.is_some() {}
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<String>,
}

/// `GET /api/guestbook/list`. Never fails: a store error yields `[]`.
pub async fn list_entries(
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let limit = clamp_limit(query.limit.as_deref());
    match data.entries.list_published(limit).await {
        Ok(entries) => {
            let public: Vec<PublicEntry> = entries.into_iter().map(PublicEntry::from).collect();
            HttpResponse::Ok().json(public)
        }
        Err(err) => {
            error!(error = %err, "failed to fetch guestbook entries");
            HttpResponse::Ok().json(Vec::<PublicEntry>::new())
        }
    }
}

fn clamp_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT)
}

/// `GET /api/status`. Missing or unreadable status yields an empty message.
pub async fn get_status(data: web::Data<AppState>) -> HttpResponse {
    match data.status.get_status().await {
        Ok(Some(status)) => HttpResponse::Ok().json(json!({
            "message": status.message,
            "updated_at": status.updated_at,
        })),
        Ok(None) => HttpResponse::Ok().json(json!({ "message": "" })),
        Err(err) => {
            error!(error = %err, "failed to fetch status");
            HttpResponse::Ok().json(json!({ "message": "" }))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    path: Option<String>,
    timestamp: Option<ScanTimestamp>,
}

/// Epoch milliseconds or an RFC 3339 string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScanTimestamp {
    Millis(i64),
    Text(String),
}

impl ScanTimestamp {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// `POST /api/scan`, a homepage visit ping.
pub async fn record_scan(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: Option<web::Json<ScanRequest>>,
) -> Result<HttpResponse, ApiError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let at = body
        .timestamp
        .as_ref()
        .and_then(ScanTimestamp::to_utc)
        .unwrap_or_else(Utc::now);

    match data
        .visits
        .record(&client_ip(&req, data.proxy), &user_agent(&req), body.path.as_deref(), at)
        .await
    {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({ "success": true }))),
        Err(AppError::RateLimited) => {
            Ok(HttpResponse::TooManyRequests().json(json!({ "message": "Rate limited" })))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /api/keep-alive`. Touches every table so an idle database stays warm.
pub async fn keep_alive(data: web::Data<AppState>) -> HttpResponse {
    let results = [
        data.entries.count_entries().await.map(drop),
        data.status.get_status().await.map(drop),
        data.scans.count_scans().await.map(drop),
    ];

    let errors = results.iter().filter(|r| r.is_err()).count();
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        error!(error = %err, "keep-alive query failed");
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "timestamp": Utc::now(),
        "queriesExecuted": results.len(),
        "errors": errors,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_limit_defaults_and_caps() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some("abc")), 50);
        assert_eq!(clamp_limit(Some("-3")), 50);
        assert_eq!(clamp_limit(Some("7")), 7);
        assert_eq!(clamp_limit(Some("500")), 100);
    }

    #[test]
    fn scan_timestamps_accept_millis_and_rfc3339() {
        let millis: ScanRequest = serde_json::from_str(r#"{"timestamp": 1700000000000}"#).unwrap();
        assert_eq!(
            millis.timestamp.unwrap().to_utc().unwrap().timestamp(),
            1_700_000_000
        );

        let text: ScanRequest =
            serde_json::from_str(r#"{"path": "/h", "timestamp": "2026-03-04T14:05:00Z"}"#).unwrap();
        assert_eq!(text.path.as_deref(), Some("/h"));
        assert!(text.timestamp.unwrap().to_utc().is_some());

        let junk: ScanRequest = serde_json::from_str(r#"{"timestamp": "yesterday"}"#).unwrap();
        assert!(junk.timestamp.unwrap().to_utc().is_none());
    }
}
