use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Marketing copy keyed by section name (`"hero_title"`, `"faq_intro"`, ...).
pub type CopySections = HashMap<String, String>;

pub const DEFAULT_COPY_TTL: Duration = Duration::from_secs(30);

/// Injected time-bounded cache for the last copy fetch.
///
/// Owned by whoever renders copy and passed explicitly to the fetch helper,
/// so separate instances (and separate tests) never share state.
#[derive(Debug)]
pub struct CopyCache {
    ttl: Duration,
    entry: Mutex<Option<(CopySections, Instant)>>,
}

impl CopyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached sections if they were stored less than `ttl` ago.
    pub fn get(&self) -> Option<CopySections> {
        self.get_at(Instant::now())
    }

    pub fn get_at(&self, now: Instant) -> Option<CopySections> {
        let guard = self.entry.lock().ok()?;
        let (sections, stored_at) = guard.as_ref()?;
        if now.saturating_duration_since(*stored_at) < self.ttl {
            Some(sections.clone())
        } else {
            None
        }
    }

    /// Cached sections regardless of age. Used when a refresh fails.
    pub fn stale(&self) -> Option<CopySections> {
        self.entry
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|(s, _)| s.clone()))
    }

    pub fn put(&self, sections: CopySections) {
        self.put_at(sections, Instant::now());
    }

    pub fn put_at(&self, sections: CopySections, now: Instant) {
        if let Ok(mut guard) = self.entry.lock() {
            *guard = Some((sections, now));
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.entry.lock() {
            *guard = None;
        }
    }
}

impl Default for CopyCache {
    fn default() -> Self {
        Self::new(DEFAULT_COPY_TTL)
    }
}
