//! The page the visitor is currently on: location plus referrer.

use serde::{Deserialize, Serialize};
use url::Url;

/// Stand-in for `window.location` and `document.referrer`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    /// Absolute URL or a path with optional query, e.g. `/blog?utm_source=x`.
    pub url: String,
    pub referrer: Option<String>,
}

/// Campaign tags read from a landing URL's query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

impl PageContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referrer: None,
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    fn parsed(&self) -> Option<Url> {
        match Url::parse(&self.url) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost")
                .ok()?
                .join(&self.url)
                .ok(),
            Err(_) => None,
        }
    }

    /// Path plus query string (`/pricing?utm_source=x`), never the host.
    pub fn landing_path(&self) -> String {
        match self.parsed() {
            Some(url) => match url.query() {
                Some(q) if !q.is_empty() => format!("{}?{}", url.path(), q),
                _ => url.path().to_string(),
            },
            None => self.url.clone(),
        }
    }

    /// Path only, used to label page views and clicks.
    pub fn path(&self) -> String {
        self.parsed()
            .map(|url| url.path().to_string())
            .unwrap_or_else(|| self.url.clone())
    }

    pub fn utm(&self) -> UtmParams {
        let mut utm = UtmParams::default();
        let Some(url) = self.parsed() else {
            return utm;
        };
        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "utm_source" => &mut utm.source,
                "utm_medium" => &mut utm.medium,
                "utm_campaign" => &mut utm.campaign,
                "utm_term" => &mut utm.term,
                "utm_content" => &mut utm.content,
                _ => continue,
            };
            // First occurrence wins, like URLSearchParams.get().
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        utm
    }
}
