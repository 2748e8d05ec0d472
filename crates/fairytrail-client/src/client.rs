//! HTTP client for the site's `/api/*` service.
//!
//! Two delivery modes:
//! - beacons (`page-view`, `event`) are fire-and-forget: spawned, never
//!   retried, failures logged at debug level and dropped;
//! - form submissions are awaited and surface the server's error text.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use fairytrail_core::context::PageContext;
use fairytrail_core::copy_cache::{CopyCache, CopySections};
use fairytrail_core::event::{EventBeacon, PageViewBeacon};
use fairytrail_core::storage::KeyValueStore;
use fairytrail_core::tracker::{SignupSnapshot, Tracker};

use crate::error::ClientError;
use crate::forms::{ContactForm, SignupForm};

pub const PAGE_VIEW_PATH: &str = "/api/analytics/page-view";
pub const EVENT_PATH: &str = "/api/analytics/event";
pub const SIGNUP_PATH: &str = "/api/signup";
pub const CONTACT_PATH: &str = "/api/contact";
pub const COPY_PATH: &str = "/api/copy";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /api/analytics/page-view` in the background.
    ///
    /// The handle may be dropped; it is returned so short-lived callers can
    /// wait for delivery before exiting.
    pub fn track_page_view(&self, beacon: PageViewBeacon) -> Option<JoinHandle<()>> {
        self.fire_and_forget(PAGE_VIEW_PATH, beacon)
    }

    /// `POST /api/analytics/event` in the background.
    pub fn track_event(&self, beacon: EventBeacon) -> Option<JoinHandle<()>> {
        self.fire_and_forget(EVENT_PATH, beacon)
    }

    fn fire_and_forget<T>(&self, path: &'static str, body: T) -> Option<JoinHandle<()>>
    where
        T: Serialize + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(path, "no async runtime; analytics beacon dropped");
            return None;
        };
        let client = self.client.clone();
        let url = self.endpoint(path);
        Some(runtime.spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => debug!(path, status = %resp.status(), "analytics beacon rejected"),
                Err(e) => debug!(path, error = %e, "analytics beacon failed"),
            }
        }))
    }

    /// Validate the form, attach the snapshot, and `POST /api/signup`.
    ///
    /// Nothing is sent when validation fails.
    pub async fn signup(
        &self,
        form: SignupForm,
        snapshot: SignupSnapshot,
    ) -> Result<Value, ClientError> {
        form.validate()?;
        let request = form.into_request(snapshot);
        let body = self.post_json(SIGNUP_PATH, &request).await?;
        info!(
            source = %request.snapshot.attribution.derived_source,
            pages = request.snapshot.journey.total_pages,
            "signup submitted"
        );
        Ok(body)
    }

    /// Validate the form, then take the tracker's signup snapshot and submit.
    ///
    /// Taking a snapshot closes the open page view, so an invalid form must
    /// leave the journey untouched.
    pub async fn signup_from<S>(
        &self,
        tracker: &Tracker<S>,
        form: SignupForm,
        ctx: &PageContext,
    ) -> Result<Value, ClientError>
    where
        S: KeyValueStore + ?Sized,
    {
        form.validate()?;
        let snapshot = tracker.signup_snapshot(ctx);
        self.signup(form, snapshot).await
    }

    /// Validate the form and `POST /api/contact`.
    pub async fn submit_contact(&self, form: &ContactForm) -> Result<Value, ClientError> {
        form.validate()?;
        self.post_json(CONTACT_PATH, form).await
    }

    /// Copy sections, served from `cache` while fresh.
    ///
    /// On a failed refresh the last cached sections are returned even if
    /// stale, else an empty map: missing copy must not break rendering.
    pub async fn fetch_copy(&self, cache: &CopyCache) -> CopySections {
        if let Some(sections) = cache.get() {
            return sections;
        }
        match self.get_copy().await {
            Ok(sections) => {
                cache.put(sections.clone());
                sections
            }
            Err(e) => {
                debug!(error = %e, "copy fetch failed; serving cached copy");
                cache.stale().unwrap_or_default()
            }
        }
    }

    async fn get_copy(&self) -> Result<CopySections, ClientError> {
        let resp = self.client.get(self.endpoint(COPY_PATH)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }
        Ok(resp.json().await?)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Value, ClientError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// Build [`ClientError::Api`] from a non-2xx response body.
///
/// Accepts `{"message": ".."}`, `{"error": ".."}` and
/// `{"error": {"message": ".."}}`; falls back to the raw body, then to the
/// status reason.
fn api_error(status: reqwest::StatusCode, body: &str) -> ClientError {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("message")
            .and_then(Value::as_str)
            .or_else(|| v.get("error").and_then(Value::as_str))
            .or_else(|| v.pointer("/error/message").and_then(Value::as_str))
            .map(str::to_string)
    });
    let message = from_json
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}
