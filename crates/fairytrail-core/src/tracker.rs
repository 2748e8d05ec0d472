//! One handle wiring attribution, journey and visitor identity over a single
//! storage scope, the way a page uses them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::attribution::{AttributionStore, CaptureOutcome, SignupAttribution};
use crate::context::PageContext;
use crate::event::{EventBeacon, PageViewBeacon};
use crate::journey::{JourneyRecord, JourneyStore};
use crate::referrer::SiteConfig;
use crate::storage::KeyValueStore;
use crate::visitor::VisitorIdentity;

pub const CTA_CLICK_EVENT: &str = "cta_click";

/// Everything attached to a signup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupSnapshot {
    pub visitor_id: String,
    pub attribution: SignupAttribution,
    pub journey: JourneyRecord,
}

/// Result of [`Tracker::on_page_load`].
#[derive(Debug, Clone)]
pub struct PageLoad {
    pub attribution: CaptureOutcome,
    /// Ready to hand to the analytics client.
    pub beacon: PageViewBeacon,
}

pub struct Tracker<S: ?Sized> {
    attribution: AttributionStore<Arc<S>>,
    journey: JourneyStore<Arc<S>>,
    visitor: VisitorIdentity<Arc<S>>,
}

impl<S: KeyValueStore + ?Sized> Tracker<S> {
    pub fn new(storage: Arc<S>, site: SiteConfig) -> Self {
        Self {
            attribution: AttributionStore::new(Arc::clone(&storage), site),
            journey: JourneyStore::new(Arc::clone(&storage)),
            visitor: VisitorIdentity::new(storage),
        }
    }

    pub fn attribution(&self) -> &AttributionStore<Arc<S>> {
        &self.attribution
    }

    pub fn journey(&self) -> &JourneyStore<Arc<S>> {
        &self.journey
    }

    pub fn visitor_id(&self) -> String {
        self.visitor.get_or_create()
    }

    pub fn on_page_load(&self, ctx: &PageContext, title: &str) -> PageLoad {
        self.on_page_load_at(ctx, title, Utc::now())
    }

    pub fn on_page_load_at(&self, ctx: &PageContext, title: &str, now: DateTime<Utc>) -> PageLoad {
        let attribution = self.attribution.capture_at(ctx, now);
        let session_id = self.journey.init_at(now).session_id;
        self.journey.track_page_view_at(&ctx.path(), title, now);
        let beacon = PageViewBeacon::from_context(ctx, self.visitor_id(), Some(session_id), Some(title));
        PageLoad {
            attribution,
            beacon,
        }
    }

    pub fn on_scroll(&self, percent: u8) {
        self.journey.track_scroll_depth(percent);
    }

    /// Record a call-to-action click and build the matching analytics event.
    pub fn on_cta_click(&self, element: &str, text: Option<&str>) -> EventBeacon {
        self.on_cta_click_at(element, text, Utc::now())
    }

    pub fn on_cta_click_at(
        &self,
        element: &str,
        text: Option<&str>,
        now: DateTime<Utc>,
    ) -> EventBeacon {
        self.journey.track_cta_click_at(element, text, now);
        let page = self
            .journey
            .current()
            .and_then(|j| j.open_page().map(|p| p.path.clone()))
            .unwrap_or_default();
        EventBeacon {
            visitor_id: self.visitor_id(),
            event_name: CTA_CLICK_EVENT.to_string(),
            page,
            event_data: Some(json!({ "element": element, "text": text })),
        }
    }

    pub fn signup_snapshot(&self, ctx: &PageContext) -> SignupSnapshot {
        self.signup_snapshot_at(ctx, Utc::now())
    }

    pub fn signup_snapshot_at(&self, ctx: &PageContext, now: DateTime<Utc>) -> SignupSnapshot {
        SignupSnapshot {
            visitor_id: self.visitor_id(),
            attribution: self.attribution.get_for_signup(ctx),
            journey: self.journey.get_for_signup_at(now),
        }
    }

    /// Wipe all three records (privacy reset, test teardown).
    pub fn reset(&self) {
        self.attribution.clear();
        self.journey.clear();
        self.visitor.clear();
    }
}
