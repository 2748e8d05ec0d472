//! First-touch attribution with a guarded upgrade policy.
//!
//! One record per storage scope. `landing_page` and `captured_at` are
//! written once; every other field can only be replaced when the visitor
//! re-enters through a new campaign or when a stored `"direct"` source can be
//! upgraded to a known one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::PageContext;
use crate::error::StorageError;
use crate::referrer::{derive_source, SiteConfig, DIRECT};
use crate::storage::{KeyValueStore, ATTRIBUTION_KEY};
use crate::versioned::{Decoded, Migration, VersionedCodec};

pub const ATTRIBUTION_SCHEMA_VERSION: u32 = 2;

// Version 1 records predate referrer-domain capture and are reset.
const MIGRATIONS: &[Migration] = &[];

const CODEC: VersionedCodec = VersionedCodec::new(ATTRIBUTION_SCHEMA_VERSION, MIGRATIONS);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionRecord {
    pub schema_version: u32,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    /// Full referrer URL; `None` for direct visits and self-referrals.
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    pub derived_source: String,
    pub landing_page: String,
    pub captured_at: DateTime<Utc>,
}

impl AttributionRecord {
    /// Build the record this page load would produce, ignoring any stored state.
    pub fn candidate(ctx: &PageContext, site: &SiteConfig, now: DateTime<Utc>) -> Self {
        let utm = ctx.utm();
        let referrer_domain = ctx
            .referrer
            .as_deref()
            .and_then(|r| site.external_referrer_domain(r));
        let referrer = referrer_domain
            .as_ref()
            .and(ctx.referrer.clone());
        let derived_source = derive_source(utm.source.as_deref(), referrer_domain.as_deref());

        Self {
            schema_version: ATTRIBUTION_SCHEMA_VERSION,
            utm_source: utm.source,
            utm_medium: utm.medium,
            utm_campaign: utm.campaign,
            utm_term: utm.term,
            utm_content: utm.content,
            referrer,
            referrer_domain,
            derived_source,
            landing_page: ctx.landing_path(),
            captured_at: now,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.derived_source == DIRECT
    }

    /// `true` if `incoming` carries a `utm_source` or `utm_campaign` that is
    /// present and differs from what is stored.
    fn is_new_campaign(&self, incoming: &Self) -> bool {
        let differs = |new: &Option<String>, old: &Option<String>| new.is_some() && new != old;
        differs(&incoming.utm_source, &self.utm_source)
            || differs(&incoming.utm_campaign, &self.utm_campaign)
    }
}

/// What [`AttributionStore::capture`] did with the current page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No prior record; the candidate was stored.
    Created,
    /// The visitor arrived through a new campaign; campaign fields replaced.
    CampaignReentry,
    /// A stored `"direct"` source was replaced by a known one.
    Upgraded,
    /// The stored record was kept as is.
    Unchanged,
    /// Storage could not be read or written; nothing was persisted.
    Unavailable,
}

/// Flattened attribution attached to a signup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupAttribution {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    pub derived_source: String,
    pub landing_page: String,
    /// `None` when nothing was stored and the projection came from the live URL.
    pub captured_at: Option<DateTime<Utc>>,
}

impl From<AttributionRecord> for SignupAttribution {
    fn from(r: AttributionRecord) -> Self {
        Self {
            utm_source: r.utm_source,
            utm_medium: r.utm_medium,
            utm_campaign: r.utm_campaign,
            utm_term: r.utm_term,
            utm_content: r.utm_content,
            referrer: r.referrer,
            referrer_domain: r.referrer_domain,
            derived_source: r.derived_source,
            landing_page: r.landing_page,
            captured_at: Some(r.captured_at),
        }
    }
}

pub struct AttributionStore<S> {
    storage: S,
    site: SiteConfig,
}

impl<S: KeyValueStore> AttributionStore<S> {
    pub fn new(storage: S, site: SiteConfig) -> Self {
        Self { storage, site }
    }

    pub fn capture(&self, ctx: &PageContext) -> CaptureOutcome {
        self.capture_at(ctx, Utc::now())
    }

    /// Record attribution for a page load at `now`.
    ///
    /// Writes only when there is no prior record, when the URL carries a new
    /// `utm_source`/`utm_campaign`, or when a `"direct"` record can be
    /// upgraded. A non-direct source is never downgraded.
    pub fn capture_at(&self, ctx: &PageContext, now: DateTime<Utc>) -> CaptureOutcome {
        let candidate = AttributionRecord::candidate(ctx, &self.site, now);

        let prior = match self.load() {
            Ok(prior) => prior,
            Err(e) => {
                warn!(error = %e, "attribution storage unreadable; skipping capture");
                return CaptureOutcome::Unavailable;
            }
        };

        let (record, outcome) = match prior {
            None => (candidate, CaptureOutcome::Created),
            Some(prior) => {
                let outcome = if prior.is_new_campaign(&candidate) {
                    CaptureOutcome::CampaignReentry
                } else if prior.is_direct() && !candidate.is_direct() {
                    CaptureOutcome::Upgraded
                } else {
                    debug!(source = %prior.derived_source, "attribution unchanged");
                    return CaptureOutcome::Unchanged;
                };
                let record = if candidate.is_direct() && !prior.is_direct() {
                    // Campaign tags without a source of their own: keep the
                    // known source and referrer, take only the utm_* fields.
                    AttributionRecord {
                        utm_source: candidate.utm_source,
                        utm_medium: candidate.utm_medium,
                        utm_campaign: candidate.utm_campaign,
                        utm_term: candidate.utm_term,
                        utm_content: candidate.utm_content,
                        ..prior
                    }
                } else {
                    AttributionRecord {
                        landing_page: prior.landing_page,
                        captured_at: prior.captured_at,
                        ..candidate
                    }
                };
                (record, outcome)
            }
        };

        if let Err(e) = self.persist(&record) {
            warn!(error = %e, "failed to persist attribution");
            return CaptureOutcome::Unavailable;
        }
        info!(
            source = %record.derived_source,
            outcome = ?outcome,
            "attribution captured"
        );
        outcome
    }

    /// The stored record projected for a signup payload, or a projection of
    /// the live page when nothing is stored. Never writes.
    pub fn get_for_signup(&self, ctx: &PageContext) -> SignupAttribution {
        match self.load() {
            Ok(Some(record)) => record.into(),
            Ok(None) => live_projection(ctx, &self.site),
            Err(e) => {
                warn!(error = %e, "attribution storage unreadable; using live URL");
                live_projection(ctx, &self.site)
            }
        }
    }

    /// The stored record, or `None` when absent, unreadable, or reset.
    pub fn current(&self) -> Option<AttributionRecord> {
        self.load().ok().flatten()
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(ATTRIBUTION_KEY) {
            warn!(error = %e, "failed to clear attribution");
        }
    }

    fn load(&self) -> Result<Option<AttributionRecord>, StorageError> {
        let Some(raw) = self.storage.get(ATTRIBUTION_KEY)? else {
            return Ok(None);
        };
        match CODEC.decode(&raw) {
            Decoded::Current(record) => Ok(Some(record)),
            Decoded::Reset => {
                debug!("stored attribution has an incompatible schema; ignoring it");
                Ok(None)
            }
        }
    }

    fn persist(&self, record: &AttributionRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(record)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.storage.set(ATTRIBUTION_KEY, &raw)
    }
}

fn live_projection(ctx: &PageContext, site: &SiteConfig) -> SignupAttribution {
    let mut projection: SignupAttribution =
        AttributionRecord::candidate(ctx, site, Utc::now()).into();
    projection.captured_at = None;
    projection
}
