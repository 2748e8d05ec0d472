//! Per-session navigation trail: page views, dwell time, scroll depth and
//! call-to-action clicks.
//!
//! Entries are append-only. The only in-place change is closing the open
//! page view (the most recent one) when the visitor moves on.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::{KeyValueStore, JOURNEY_KEY};
use crate::versioned::{Decoded, Migration, VersionedCodec};

pub const JOURNEY_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[Migration] = &[];

const CODEC: VersionedCodec = VersionedCodec::new(JOURNEY_SCHEMA_VERSION, MIGRATIONS);

/// Generate a cryptographically random hex string of `n` bytes (2n hex chars).
fn rand_hex(n: usize) -> String {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub path: String,
    pub title: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    /// Whole seconds between entry and exit; set when the entry is closed.
    pub time_on_page: Option<u64>,
    /// Maximum scroll depth reached, in percent.
    pub scroll_depth: Option<u8>,
}

impl PageView {
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }

    fn close(&mut self, now: DateTime<Utc>) {
        let seconds = (now - self.entered_at).num_seconds().max(0);
        self.exited_at = Some(now);
        self.time_on_page = Some(u64::try_from(seconds).unwrap_or(0));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtaClick {
    pub element: String,
    pub page: String,
    pub timestamp: DateTime<Utc>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyRecord {
    pub schema_version: u32,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub page_views: Vec<PageView>,
    pub cta_clicks: Vec<CtaClick>,
    pub total_pages: usize,
    pub total_time_seconds: u64,
}

impl JourneyRecord {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            schema_version: JOURNEY_SCHEMA_VERSION,
            session_id: rand_hex(16),
            started_at: now,
            page_views: Vec::new(),
            cta_clicks: Vec::new(),
            total_pages: 0,
            total_time_seconds: 0,
        }
    }

    /// The page view still lacking `exited_at`. Only the last entry can be open.
    pub fn open_page(&self) -> Option<&PageView> {
        self.page_views.last().filter(|p| p.is_open())
    }

    fn open_page_mut(&mut self) -> Option<&mut PageView> {
        self.page_views.last_mut().filter(|p| p.is_open())
    }

    fn close_open_page(&mut self, now: DateTime<Utc>) {
        if let Some(page) = self.open_page_mut() {
            page.close(now);
        }
    }

    fn enter_page(&mut self, path: &str, title: &str, now: DateTime<Utc>) {
        self.close_open_page(now);
        self.page_views.push(PageView {
            path: path.to_string(),
            title: title.to_string(),
            entered_at: now,
            exited_at: None,
            time_on_page: None,
            scroll_depth: None,
        });
    }

    fn record_scroll(&mut self, percent: u8) {
        let percent = percent.min(100);
        if let Some(page) = self.open_page_mut() {
            page.scroll_depth = Some(page.scroll_depth.map_or(percent, |d| d.max(percent)));
        }
    }

    fn record_click(&mut self, element: &str, text: Option<&str>, now: DateTime<Utc>) {
        let page = self
            .open_page()
            .map(|p| p.path.clone())
            .unwrap_or_default();
        self.cta_clicks.push(CtaClick {
            element: element.to_string(),
            page,
            timestamp: now,
            text: text.map(str::to_string),
        });
    }

    fn recompute(&mut self) {
        self.total_pages = self.page_views.len();
        self.total_time_seconds = self.page_views.iter().filter_map(|p| p.time_on_page).sum();
    }
}

pub struct JourneyStore<S> {
    storage: S,
    /// Last record we produced; stands in when storage is unavailable.
    fallback: Mutex<Option<JourneyRecord>>,
}

impl<S: KeyValueStore> JourneyStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            fallback: Mutex::new(None),
        }
    }

    pub fn init(&self) -> JourneyRecord {
        self.init_at(Utc::now())
    }

    /// Return the stored journey if its schema is current, otherwise start
    /// and persist a fresh one with a new session id.
    pub fn init_at(&self, now: DateTime<Utc>) -> JourneyRecord {
        match self.load() {
            Ok(Some(record)) => {
                self.remember(&record);
                record
            }
            Ok(None) => {
                let record = JourneyRecord::new(now);
                self.save(&record);
                record
            }
            Err(e) => {
                warn!(error = %e, "journey storage unreadable; using in-memory journey");
                self.fallback_or_new(now)
            }
        }
    }

    pub fn track_page_view(&self, path: &str, title: &str) {
        self.track_page_view_at(path, title, Utc::now());
    }

    /// Close the open page view (stamping its dwell time) and open a new one.
    pub fn track_page_view_at(&self, path: &str, title: &str, now: DateTime<Utc>) {
        self.mutate(now, |record| record.enter_page(path, title, now));
    }

    /// Raise the open page's scroll depth to `percent` if it is deeper than
    /// anything seen so far on that page. Values above 100 are clamped.
    pub fn track_scroll_depth(&self, percent: u8) {
        self.mutate(Utc::now(), |record| record.record_scroll(percent));
    }

    pub fn track_cta_click(&self, element: &str, text: Option<&str>) {
        self.track_cta_click_at(element, text, Utc::now());
    }

    pub fn track_cta_click_at(&self, element: &str, text: Option<&str>, now: DateTime<Utc>) {
        self.mutate(now, |record| record.record_click(element, text, now));
    }

    pub fn get_for_signup(&self) -> JourneyRecord {
        self.get_for_signup_at(Utc::now())
    }

    /// Close any open page so dwell time is final, persist, and return the
    /// full record.
    pub fn get_for_signup_at(&self, now: DateTime<Utc>) -> JourneyRecord {
        self.mutate(now, |record| record.close_open_page(now))
    }

    /// The stored record, or `None` when absent, unreadable, or reset.
    pub fn current(&self) -> Option<JourneyRecord> {
        self.load().ok().flatten()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.fallback.lock() {
            *guard = None;
        }
        if let Err(e) = self.storage.remove(JOURNEY_KEY) {
            warn!(error = %e, "failed to clear journey");
        }
    }

    fn mutate<F>(&self, now: DateTime<Utc>, apply: F) -> JourneyRecord
    where
        F: FnOnce(&mut JourneyRecord),
    {
        let mut record = match self.load() {
            Ok(Some(record)) => record,
            Ok(None) => JourneyRecord::new(now),
            Err(e) => {
                warn!(error = %e, "journey storage unreadable; using in-memory journey");
                self.fallback_or_new(now)
            }
        };
        apply(&mut record);
        record.recompute();
        self.save(&record);
        record
    }

    fn load(&self) -> Result<Option<JourneyRecord>, StorageError> {
        let Some(raw) = self.storage.get(JOURNEY_KEY)? else {
            return Ok(None);
        };
        match CODEC.decode(&raw) {
            Decoded::Current(record) => Ok(Some(record)),
            Decoded::Reset => {
                debug!("stored journey has an incompatible schema; starting fresh");
                Ok(None)
            }
        }
    }

    fn save(&self, record: &JourneyRecord) {
        self.remember(record);
        let result = serde_json::to_string(record)
            .map_err(|e| StorageError::Backend(e.to_string()))
            .and_then(|raw| self.storage.set(JOURNEY_KEY, &raw));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist journey");
        }
    }

    fn remember(&self, record: &JourneyRecord) {
        if let Ok(mut guard) = self.fallback.lock() {
            *guard = Some(record.clone());
        }
    }

    fn fallback_or_new(&self, now: DateTime<Utc>) -> JourneyRecord {
        match self.fallback.lock() {
            Ok(mut guard) => guard.get_or_insert_with(|| JourneyRecord::new(now)).clone(),
            Err(_) => JourneyRecord::new(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::storage::MemoryStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn open_count(record: &JourneyRecord) -> usize {
        record.page_views.iter().filter(|p| p.is_open()).count()
    }

    #[test]
    fn init_creates_and_reuses_session() {
        let store = JourneyStore::new(MemoryStore::new());
        let first = store.init_at(t0());
        assert_eq!(first.session_id.len(), 32);
        assert_eq!(first.started_at, t0());
        let second = store.init_at(t0() + Duration::minutes(5));
        assert_eq!(first.session_id, second.session_id);
        assert_eq!(second.started_at, t0());
    }

    #[test]
    fn entering_a_page_closes_the_previous_one() {
        let store = JourneyStore::new(MemoryStore::new());
        store.track_page_view_at("/", "Home", t0());
        store.track_page_view_at("/faq", "FAQ", t0() + Duration::seconds(42));

        let record = store.current().expect("journey");
        assert_eq!(record.total_pages, 2);
        assert_eq!(open_count(&record), 1);
        assert_eq!(record.page_views[0].time_on_page, Some(42));
        assert_eq!(record.page_views[0].exited_at, Some(t0() + Duration::seconds(42)));
        assert!(record.page_views[1].is_open());
        assert_eq!(record.total_time_seconds, 42);
    }

    #[test]
    fn at_most_one_open_page_and_totals_track_length() {
        let store = JourneyStore::new(MemoryStore::new());
        for i in 0..6 {
            store.track_page_view_at(&format!("/p{i}"), "Page", t0() + Duration::seconds(i * 10));
            let record = store.current().expect("journey");
            assert!(open_count(&record) <= 1);
            assert_eq!(record.total_pages, record.page_views.len());
        }
        let record = store.current().expect("journey");
        assert_eq!(record.total_time_seconds, 50);
    }

    #[test]
    fn scroll_depth_is_monotonic_per_page() {
        let store = JourneyStore::new(MemoryStore::new());
        store.track_page_view_at("/", "Home", t0());
        store.track_scroll_depth(45);
        store.track_scroll_depth(30);
        assert_eq!(store.current().expect("journey").page_views[0].scroll_depth, Some(45));

        store.track_scroll_depth(250);
        assert_eq!(store.current().expect("journey").page_views[0].scroll_depth, Some(100));

        store.track_page_view_at("/blog", "Blog", t0() + Duration::seconds(5));
        store.track_scroll_depth(10);
        let record = store.current().expect("journey");
        assert_eq!(record.page_views[0].scroll_depth, Some(100));
        assert_eq!(record.page_views[1].scroll_depth, Some(10));
    }

    #[test]
    fn scroll_without_open_page_is_ignored() {
        let store = JourneyStore::new(MemoryStore::new());
        store.track_scroll_depth(80);
        let record = store.current().expect("journey");
        assert!(record.page_views.is_empty());
    }

    #[test]
    fn cta_clicks_record_current_page() {
        let store = JourneyStore::new(MemoryStore::new());
        store.track_page_view_at("/pricing", "Pricing", t0());
        store.track_cta_click_at("hero-signup", Some("Get the tracker"), t0() + Duration::seconds(3));
        store.track_cta_click_at("footer-signup", None, t0() + Duration::seconds(8));

        let record = store.current().expect("journey");
        assert_eq!(record.cta_clicks.len(), 2);
        assert_eq!(record.cta_clicks[0].page, "/pricing");
        assert_eq!(record.cta_clicks[0].text.as_deref(), Some("Get the tracker"));
        assert_eq!(record.cta_clicks[1].element, "footer-signup");
        assert_eq!(record.cta_clicks[1].text, None);
    }

    #[test]
    fn signup_snapshot_closes_open_page() {
        let store = JourneyStore::new(MemoryStore::new());
        store.track_page_view_at("/", "Home", t0());
        store.track_page_view_at("/signup", "Sign up", t0() + Duration::seconds(20));

        let record = store.get_for_signup_at(t0() + Duration::seconds(35));
        assert_eq!(open_count(&record), 0);
        assert_eq!(record.page_views[1].time_on_page, Some(15));
        assert_eq!(record.total_time_seconds, 35);
        assert_eq!(store.current(), Some(record));
    }

    #[test]
    fn clock_skew_never_yields_negative_dwell() {
        let store = JourneyStore::new(MemoryStore::new());
        store.track_page_view_at("/", "Home", t0());
        store.track_page_view_at("/faq", "FAQ", t0() - Duration::seconds(30));
        assert_eq!(store.current().expect("journey").page_views[0].time_on_page, Some(0));
    }

    #[test]
    fn incompatible_schema_starts_fresh() {
        let storage = MemoryStore::new();
        storage
            .set(JOURNEY_KEY, r#"{"schemaVersion":0,"sessionId":"legacy"}"#)
            .expect("seed");
        let store = JourneyStore::new(storage);
        let record = store.init_at(t0());
        assert_ne!(record.session_id, "legacy");
        assert_eq!(record.schema_version, JOURNEY_SCHEMA_VERSION);
    }

    #[test]
    fn clear_removes_record() {
        let store = JourneyStore::new(MemoryStore::new());
        store.track_page_view_at("/", "Home", t0());
        store.clear();
        assert!(store.current().is_none());
    }
}
