use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use gb_api::{configure_routes, AppState, ProxyTrust};
use gb_core::moderation::ModerationProcessor;
use gb_core::notify::NotificationDispatcher;
use gb_core::rate_limit::{FixedWindowLimiter, VisitorThrottle};
use gb_core::submission::SubmissionGateway;
use gb_core::testing::{ChatCall, FixedIdentity, MemoryPhotos, MemoryStore, RecordingChat};
use gb_core::visits::VisitTracker;
use gb_core::{PublicationPolicy, SiteInfo};
use serde_json::{json, Value};

const OPERATOR: i64 = -1001;
const BOUNDARY: &str = "----guestbook-test-boundary";

struct Fixture {
    store: Arc<MemoryStore>,
    photos: Arc<MemoryPhotos>,
    chat: Arc<RecordingChat>,
    state: web::Data<AppState>,
}

fn fixture(store: MemoryStore, chat: RecordingChat) -> Fixture {
    let store = Arc::new(store);
    let photos = Arc::new(MemoryPhotos::default());
    let chat = Arc::new(chat);
    let identity = Arc::new(FixedIdentity { operator: OPERATOR });
    let site = SiteInfo::default();
    let policy = PublicationPolicy::Auto;
    let notifier = NotificationDispatcher::new(chat.clone(), OPERATOR, site.clone(), policy);

    let state = web::Data::new(AppState {
        gateway: SubmissionGateway::new(
            store.clone(),
            photos.clone(),
            Arc::new(FixedWindowLimiter::new()),
            notifier.clone(),
            policy,
        ),
        moderation: ModerationProcessor::new(
            store.clone(),
            store.clone(),
            chat.clone(),
            identity.clone(),
            site,
        ),
        visits: VisitTracker::new(
            store.clone(),
            identity,
            Arc::new(VisitorThrottle::new()),
            notifier,
            Duration::from_secs(600),
        ),
        entries: store.clone(),
        status: store.clone(),
        scans: store.clone(),
        policy,
        proxy: ProxyTrust::FirstHop,
    });

    Fixture { store, photos, chat, state }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File { name: &'a str, file_name: &'a str, content_type: &'a str, data: &'a [u8] },
}

fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File { name, file_name, content_type, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

fn submit_request(ip: &str, parts: &[Part<'_>]) -> test::TestRequest {
    let (content_type, body) = multipart(parts);
    test::TestRequest::post()
        .uri("/api/guestbook/submit")
        .insert_header(("Content-Type", content_type))
        .insert_header(("X-Forwarded-For", ip))
        .set_payload(body)
}

fn operator_text(text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {"message_id": 50, "chat": {"id": OPERATOR}, "text": text}
    })
}

#[actix_web::test]
async fn submission_is_listed_even_when_chat_is_down() {
    let fx = fixture(MemoryStore::new(), RecordingChat::failing());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = submit_request(
        "203.0.113.9",
        &[
            Part::Text("name", "Ana"),
            Part::Text("phone", "+971 55 000"),
            Part::Text("message", "Hello there!"),
        ],
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Your message is live!"));
    assert_eq!(body["entryId"], json!(fx.store.entries()[0].id));

    let req = test::TestRequest::get().uri("/api/guestbook/list").to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], json!("Ana"));
    assert_eq!(listed[0]["message"], json!("Hello there!"));
    assert!(listed[0].get("phone").is_none());
    assert!(listed[0].get("published").is_none());
}

#[actix_web::test]
async fn missing_fields_are_rejected_with_a_message() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = submit_request("198.51.100.2", &[Part::Text("name", "Ana")]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], json!("Name and message are required."));
    assert!(fx.store.entries().is_empty());
}

#[actix_web::test]
async fn sixth_submission_in_an_hour_is_throttled() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    for _ in 0..5 {
        let req = submit_request("192.0.2.1", &[Part::Text("name", "Sam"), Part::Text("message", "hey!")])
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = submit_request("192.0.2.1", &[Part::Text("name", "Sam"), Part::Text("message", "hey!")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different client is unaffected.
    let req = submit_request("192.0.2.2", &[Part::Text("name", "Lea"), Part::Text("message", "hi!!")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(fx.store.entries().len(), 6);
}

#[actix_web::test]
async fn photo_is_stored_and_linked() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = submit_request(
        "192.0.2.10",
        &[
            Part::Text("name", "Omar"),
            Part::Text("message", "Great view"),
            Part::File { name: "photo", file_name: "lake.PNG", content_type: "image/png", data: &[1, 2, 3, 4] },
        ],
    )
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let saved = fx.photos.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].0.ends_with(".png"));
    assert_eq!((saved[0].1, saved[0].2.as_str()), (4, "image/png"));
    assert_eq!(
        fx.store.entries()[0].photo_url.as_deref(),
        Some(format!("https://photos.test/{}", saved[0].0).as_str())
    );
}

#[actix_web::test]
async fn uploaded_html_is_stored_as_the_declared_image_type() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = submit_request(
        "192.0.2.12",
        &[
            Part::Text("name", "Omar"),
            Part::Text("message", "Great view"),
            Part::File {
                name: "photo",
                file_name: "evil.html",
                content_type: "image/png",
                data: b"<script>alert(1)</script>",
            },
        ],
    )
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let saved = fx.photos.saved.lock().unwrap().clone();
    assert!(saved[0].0.ends_with(".png"), "{}", saved[0].0);
    assert!(!saved[0].0.contains("html"));
}

#[actix_web::test]
async fn unsupported_photo_type_is_rejected() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = submit_request(
        "192.0.2.11",
        &[
            Part::Text("name", "Omar"),
            Part::Text("message", "Great view"),
            Part::File { name: "photo", file_name: "notes.txt", content_type: "text/plain", data: b"hi" },
        ],
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(fx.store.entries().is_empty());
    assert!(fx.photos.saved.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn status_round_trips_through_the_webhook() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/api/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"message": ""}));

    let req = test::TestRequest::post()
        .uri("/api/telegram/webhook")
        .set_json(operator_text("/status Back on <b>Monday</b>"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"ok": true}));

    let req = test::TestRequest::get().uri("/api/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], json!("Back on Monday"));
    assert!(body["updated_at"].is_string());

    match &fx.chat.calls()[..] {
        [ChatCall::Text { chat, reply_to, text, .. }] => {
            assert_eq!(*chat, OPERATOR);
            assert_eq!(*reply_to, Some(50));
            assert!(text.starts_with("Status updated."));
        }
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[actix_web::test]
async fn webhook_always_acknowledges() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/telegram/webhook")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Another chat's command is dropped silently.
    let req = test::TestRequest::post()
        .uri("/api/telegram/webhook")
        .set_json(json!({
            "update_id": 2,
            "message": {"message_id": 1, "chat": {"id": 5}, "text": "/nukeall"}
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(fx.chat.calls().is_empty());

    let req = test::TestRequest::get().uri("/api/telegram/webhook").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn nukeall_confirmation_empties_the_guestbook() {
    let fx = fixture(MemoryStore::seeded(3), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/api/telegram/webhook")
        .set_json(operator_text("/nukeall"))
        .to_request();
    test::call_service(&app, req).await;
    assert_eq!(fx.store.entries().len(), 3);

    let req = test::TestRequest::post()
        .uri("/api/telegram/webhook")
        .set_json(json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb-9",
                "data": "confirm_nuke",
                "message": {"message_id": 51, "chat": {"id": OPERATOR}}
            }
        }))
        .to_request();
    test::call_service(&app, req).await;

    assert!(fx.store.entries().is_empty());
    assert!(fx.chat.calls().contains(&ChatCall::ClearControls { chat: OPERATOR, message_id: 51 }));

    let req = test::TestRequest::get().uri("/api/guestbook/list").to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed, json!([]));
}

#[actix_web::test]
async fn scan_pings_are_throttled_per_visitor() {
    let fx = fixture(MemoryStore::new(), RecordingChat::default());
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let ping = || {
        test::TestRequest::post()
            .uri("/api/scan")
            .insert_header(("X-Forwarded-For", "203.0.113.50"))
            .insert_header(("User-Agent", "qr-scanner"))
            .set_json(json!({"path": "/h", "timestamp": 1_700_000_000_000_i64}))
            .to_request()
    };

    let resp = test::call_service(&app, ping()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": true}));

    assert_eq!(test::call_service(&app, ping()).await.status(), StatusCode::TOO_MANY_REQUESTS);

    let scans = fx.store.scans();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].ip_hash, "h(203.0.113.50)");
}

#[actix_web::test]
async fn read_endpoints_degrade_when_store_is_down() {
    let fx = fixture(MemoryStore::seeded(2), RecordingChat::default());
    fx.store.set_unavailable(true);
    let app = test::init_service(App::new().app_data(fx.state.clone()).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/api/guestbook/list?limit=5").to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed, json!([]));

    let req = test::TestRequest::get().uri("/api/status").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status, json!({"message": ""}));

    let req = test::TestRequest::get().uri("/api/keep-alive").to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(report["success"], json!(true));
    assert_eq!(report["queriesExecuted"], json!(3));
    assert_eq!(report["errors"], json!(3));

    let req = submit_request("192.0.2.99", &[Part::Text("name", "Ana"), Part::Text("message", "hello")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], json!("An error occurred. Please try again."));
}
