use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use fairytrail_core::{
    attribution::CaptureOutcome, context::PageContext, referrer::SiteConfig,
    storage::KeyValueStore, tracker::Tracker,
};
use fairytrail_duckdb::DuckDbStore;

fn temp_db(name: &str) -> PathBuf {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!(
        "fairytrail-{name}-{}-{nanos}.db",
        std::process::id()
    ))
}

#[test]
fn values_survive_reopen() {
    let path = temp_db("reopen");
    let path_str = path.to_str().expect("utf-8 path");
    {
        let store = DuckDbStore::open(path_str, "128MB").expect("open");
        store.set("fairytrail_visitor_id", "abc").expect("set");
    }
    let store = DuckDbStore::open(path_str, "128MB").expect("reopen");
    assert_eq!(
        store.get("fairytrail_visitor_id").expect("get").as_deref(),
        Some("abc")
    );
    drop(store);
    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(path.with_extension("db.wal"));
}

#[test]
fn tracker_round_trip_over_duckdb() {
    let storage = Arc::new(DuckDbStore::open_in_memory().expect("db"));
    let tracker = Tracker::new(Arc::clone(&storage), SiteConfig::new("toothfairy.example"));
    let t0 = Utc
        .with_ymd_and_hms(2026, 4, 1, 7, 0, 0)
        .single()
        .expect("valid timestamp");

    let first = tracker.on_page_load_at(&PageContext::new("/"), "Home", t0);
    assert_eq!(first.attribution, CaptureOutcome::Created);

    let second = tracker.on_page_load_at(
        &PageContext::new("/blog/first-tooth").with_referrer("https://www.google.com/search?q=x"),
        "First tooth",
        t0 + Duration::seconds(40),
    );
    assert_eq!(second.attribution, CaptureOutcome::Upgraded);
    tracker.on_scroll(45);
    tracker.on_scroll(30);

    let snapshot = tracker.signup_snapshot_at(&PageContext::new("/signup"), t0 + Duration::seconds(100));
    assert_eq!(snapshot.attribution.derived_source, "google");
    assert_eq!(snapshot.attribution.landing_page, "/");
    assert_eq!(snapshot.journey.total_pages, 2);
    assert_eq!(snapshot.journey.page_views[1].scroll_depth, Some(45));
    assert_eq!(snapshot.journey.total_time_seconds, 100);
    assert_eq!(storage.count().expect("count"), 3);

    tracker.reset();
    assert_eq!(storage.count().expect("count"), 0);
}
