use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use fairytrail_client::{
    client::ApiClient,
    error::ClientError,
    forms::{ContactForm, SignupForm},
};
use fairytrail_core::{
    context::PageContext, copy_cache::CopyCache, referrer::SiteConfig, storage::MemoryStore,
    tracker::Tracker,
};

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    copy_hits: Arc<AtomicUsize>,
}

impl Recorded {
    fn bodies_for(&self, path: &str) -> Vec<Value> {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
            .collect()
    }
}

async fn record(State(rec): State<Recorded>, uri: Uri, Json(body): Json<Value>) -> StatusCode {
    rec.requests
        .lock()
        .expect("lock")
        .push((uri.path().to_string(), body));
    StatusCode::NO_CONTENT
}

async fn signup(
    State(rec): State<Recorded>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let taken = body["email"] == json!("taken@example.com");
    rec.requests
        .lock()
        .expect("lock")
        .push(("/api/signup".to_string(), body));
    if taken {
        (
            StatusCode::CONFLICT,
            Json(json!({ "message": "This email is already on the list" })),
        )
    } else {
        (StatusCode::CREATED, Json(json!({ "ok": true })))
    }
}

async fn copy(State(rec): State<Recorded>) -> Json<Value> {
    rec.copy_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "hero_title": "Track every tooth", "cta": "Join the list" }))
}

async fn spawn_api(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{addr}")
}

async fn fake_api() -> (Recorded, ApiClient) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/api/analytics/page-view", post(record))
        .route("/api/analytics/event", post(record))
        .route("/api/contact", post(record))
        .route("/api/signup", post(signup))
        .route("/api/copy", get(copy))
        .with_state(rec.clone());
    let base = spawn_api(app).await;
    (rec, ApiClient::new(&base))
}

fn tracker() -> Tracker<MemoryStore> {
    Tracker::new(
        Arc::new(MemoryStore::new()),
        SiteConfig::new("toothfairy.example"),
    )
}

fn signup_form(email: &str) -> SignupForm {
    SignupForm {
        name: " Ada ".to_string(),
        email: email.to_string(),
        child_name: Some("Lou".to_string()),
    }
}

#[tokio::test]
async fn signup_carries_visitor_attribution_and_journey() {
    let (rec, api) = fake_api().await;
    let tracker = tracker();
    let t0 = Utc
        .with_ymd_and_hms(2026, 6, 1, 10, 0, 0)
        .single()
        .expect("valid timestamp");
    tracker.on_page_load_at(
        &PageContext::new("/?utm_source=newsletter&utm_campaign=fall"),
        "Home",
        t0,
    );

    let snapshot = tracker.signup_snapshot(&PageContext::new("/signup"));
    let body = api
        .signup(signup_form("ada@example.com"), snapshot)
        .await
        .expect("signup");
    assert_eq!(body, json!({ "ok": true }));

    let sent = rec.bodies_for("/api/signup");
    assert_eq!(sent.len(), 1);
    let payload = &sent[0];
    assert_eq!(payload["name"], json!("Ada"));
    assert_eq!(payload["childName"], json!("Lou"));
    assert_eq!(payload["visitorId"], json!(tracker.visitor_id()));
    assert_eq!(payload["attribution"]["derivedSource"], json!("newsletter"));
    assert_eq!(payload["attribution"]["utmCampaign"], json!("fall"));
    assert_eq!(payload["journey"]["totalPages"], json!(1));
    assert!(payload["journey"]["pageViews"][0]["exitedAt"].is_string());
}

#[tokio::test]
async fn signup_surfaces_server_message_verbatim() {
    let (_, api) = fake_api().await;
    let snapshot = tracker().signup_snapshot(&PageContext::new("/signup"));
    let err = api
        .signup(signup_form("taken@example.com"), snapshot)
        .await
        .expect_err("conflict");
    assert_eq!(err.status(), Some(409));
    assert_eq!(err.to_string(), "This email is already on the list");
}

#[tokio::test]
async fn invalid_form_never_reaches_the_server() {
    let (rec, api) = fake_api().await;
    let snapshot = tracker().signup_snapshot(&PageContext::new("/signup"));
    let err = api
        .signup(signup_form("not-an-email"), snapshot)
        .await
        .expect_err("invalid");
    assert!(matches!(err, ClientError::Validation(ref v) if v.field == "email"));

    let contact = ContactForm {
        name: String::new(),
        email: "ada@example.com".to_string(),
        message: "hi".to_string(),
    };
    assert!(matches!(
        api.submit_contact(&contact).await,
        Err(ClientError::Validation(_))
    ));
    assert!(rec.requests.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn rejected_signup_leaves_the_journey_open() {
    let (rec, api) = fake_api().await;
    let tracker = tracker();
    tracker.on_page_load(&PageContext::new("/signup"), "Sign up");
    let ctx = PageContext::new("/signup");

    let err = api
        .signup_from(&tracker, signup_form("ada@"), &ctx)
        .await
        .expect_err("invalid");
    assert!(matches!(err, ClientError::Validation(_)));
    let journey = tracker.journey().current().expect("journey");
    assert!(journey.open_page().is_some(), "page view must stay open");
    assert!(rec.bodies_for("/api/signup").is_empty());

    api.signup_from(&tracker, signup_form("ada@example.com"), &ctx)
        .await
        .expect("signup");
    let sent = rec.bodies_for("/api/signup");
    assert_eq!(sent.len(), 1);
    assert!(sent[0]["journey"]["pageViews"][0]["exitedAt"].is_string());
    assert!(tracker.journey().current().expect("journey").open_page().is_none());
}

#[tokio::test]
async fn contact_form_is_posted() {
    let (rec, api) = fake_api().await;
    let contact = ContactForm {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        message: "Does it work for molars?".to_string(),
    };
    api.submit_contact(&contact).await.expect("contact");
    let sent = rec.bodies_for("/api/contact");
    assert_eq!(sent[0]["message"], json!("Does it work for molars?"));
}

#[tokio::test]
async fn beacons_are_delivered_in_the_background() {
    let (rec, api) = fake_api().await;
    let tracker = tracker();
    let load = tracker.on_page_load(
        &PageContext::new("/blog?utm_source=tiktok").with_referrer("https://www.tiktok.com/"),
        "Blog",
    );
    api.track_page_view(load.beacon)
        .expect("runtime present")
        .await
        .expect("task");
    let click = tracker.on_cta_click("hero-signup", Some("Join"));
    api.track_event(click)
        .expect("runtime present")
        .await
        .expect("task");

    let views = rec.bodies_for("/api/analytics/page-view");
    assert_eq!(views[0]["path"], json!("/blog"));
    assert_eq!(views[0]["utmSource"], json!("tiktok"));
    let events = rec.bodies_for("/api/analytics/event");
    assert_eq!(events[0]["eventName"], json!("cta_click"));
    assert_eq!(events[0]["eventData"]["element"], json!("hero-signup"));
}

#[tokio::test]
async fn beacon_failures_are_swallowed() {
    // Nothing listens on port 1.
    let api = ApiClient::new("http://127.0.0.1:1");
    let load = tracker().on_page_load(&PageContext::new("/"), "Home");
    let handle = api.track_page_view(load.beacon).expect("runtime present");
    handle.await.expect("beacon task must not panic");
}

#[tokio::test]
async fn copy_is_cached_until_ttl_expires() {
    let (rec, api) = fake_api().await;
    let cache = CopyCache::new(Duration::from_secs(30));

    let first = api.fetch_copy(&cache).await;
    let second = api.fetch_copy(&cache).await;
    assert_eq!(first.get("hero_title").map(String::as_str), Some("Track every tooth"));
    assert_eq!(first, second);
    assert_eq!(rec.copy_hits.load(Ordering::SeqCst), 1);

    cache.invalidate();
    api.fetch_copy(&cache).await;
    assert_eq!(rec.copy_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn copy_falls_back_to_stale_then_empty() {
    let (_, api) = fake_api().await;
    let cache = CopyCache::new(Duration::ZERO);
    let fresh = api.fetch_copy(&cache).await;
    assert!(!fresh.is_empty());

    let broken = spawn_api(Router::new().route(
        "/api/copy",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;
    let broken = ApiClient::new(&broken);
    assert_eq!(broken.fetch_copy(&cache).await, fresh);
    assert!(broken.fetch_copy(&CopyCache::default()).await.is_empty());
}
