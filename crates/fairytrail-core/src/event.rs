use serde::{Deserialize, Serialize};

use crate::context::PageContext;

/// Body of `POST /api/analytics/page-view`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewBeacon {
    pub visitor_id: String,
    pub session_id: Option<String>,
    pub path: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
}

impl PageViewBeacon {
    pub fn from_context(
        ctx: &PageContext,
        visitor_id: impl Into<String>,
        session_id: Option<String>,
        title: Option<&str>,
    ) -> Self {
        let utm = ctx.utm();
        Self {
            visitor_id: visitor_id.into(),
            session_id,
            path: ctx.path(),
            title: title.map(str::to_string),
            referrer: ctx.referrer.clone().filter(|r| !r.is_empty()),
            utm_source: utm.source,
            utm_medium: utm.medium,
            utm_campaign: utm.campaign,
        }
    }
}

/// Body of `POST /api/analytics/event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBeacon {
    pub visitor_id: String,
    pub event_name: String,
    pub page: String,
    /// Free-form properties; sent as a JSON object.
    pub event_data: Option<serde_json::Value>,
}
