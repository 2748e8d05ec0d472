//! Referrer parsing and traffic-source classification.

use url::Url;

/// Source label used when there is neither a campaign tag nor a referrer.
pub const DIRECT: &str = "direct";

#[derive(Debug, Clone, Copy)]
enum Match {
    /// Needle may appear anywhere in the domain (`google` in `news.google.co.uk`).
    Contains,
    /// Registrable domain must equal the needle. Used for short hosts such as
    /// `t.co` that would otherwise match unrelated domains.
    Exact,
}

const PLATFORMS: &[(&str, &str, Match)] = &[
    ("google", "google", Match::Contains),
    ("bing", "bing", Match::Contains),
    ("yahoo", "yahoo", Match::Contains),
    ("duckduckgo", "duckduckgo", Match::Contains),
    ("facebook", "facebook", Match::Contains),
    ("fb.com", "facebook", Match::Exact),
    ("instagram", "instagram", Match::Contains),
    ("twitter", "twitter", Match::Contains),
    ("x.com", "twitter", Match::Exact),
    ("t.co", "twitter", Match::Exact),
    ("pinterest", "pinterest", Match::Contains),
    ("tiktok", "tiktok", Match::Contains),
    ("linkedin", "linkedin", Match::Contains),
    ("lnkd.in", "linkedin", Match::Exact),
    ("reddit", "reddit", Match::Contains),
    ("youtube", "youtube", Match::Contains),
    ("youtu.be", "youtube", Match::Exact),
];

/// Extract the host from a full referrer URL.
///
/// Lower-cased, with a leading `www.` removed. Returns `None` if the referrer
/// is empty or has no host.
pub fn extract_referrer_domain(referrer: &str) -> Option<String> {
    let referrer = referrer.trim();
    if referrer.is_empty() {
        return None;
    }
    let parsed = Url::parse(referrer)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{referrer}")).ok())?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Registrable domain (eTLD+1) of `host`, falling back to the host itself
/// for names the public suffix list does not know (e.g. `localhost`).
pub fn registrable_domain(host: &str) -> String {
    psl::domain_str(host).unwrap_or(host).to_string()
}

/// Map a referrer domain onto a known platform label.
pub fn classify_platform(domain: &str) -> Option<&'static str> {
    let registrable = registrable_domain(domain);
    PLATFORMS
        .iter()
        .find(|(needle, _, kind)| match kind {
            Match::Contains => domain.contains(needle),
            Match::Exact => registrable == *needle || domain == *needle,
        })
        .map(|(_, label, _)| *label)
}

/// Choose the traffic source for a visit.
///
/// Precedence: explicit `utm_source` > known platform > registrable domain of
/// the referrer > [`DIRECT`]. `referrer_domain` must already have
/// self-referrals removed.
pub fn derive_source(utm_source: Option<&str>, referrer_domain: Option<&str>) -> String {
    if let Some(source) = utm_source.map(str::trim).filter(|s| !s.is_empty()) {
        return source.to_string();
    }
    match referrer_domain {
        Some(domain) => classify_platform(domain)
            .map(str::to_string)
            .unwrap_or_else(|| registrable_domain(domain)),
        None => DIRECT.to_string(),
    }
}

/// Which hosts count as "this site" when filtering self-referrals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub own_host: String,
    /// Extra deployment domains (preview/staging hosts) that are also internal.
    pub internal_domains: Vec<String>,
}

impl SiteConfig {
    pub fn new(own_host: impl Into<String>) -> Self {
        Self {
            own_host: own_host.into(),
            internal_domains: Vec::new(),
        }
    }

    pub fn with_internal_domains<I, D>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.internal_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// `true` if `domain` (as returned by [`extract_referrer_domain`]) is the
    /// site itself, one of its subdomains, or an internal deployment domain.
    pub fn is_internal(&self, domain: &str) -> bool {
        let own = normalize_host(&self.own_host);
        if !own.is_empty() && matches_host(domain, &own) {
            return true;
        }
        self.internal_domains
            .iter()
            .map(|d| normalize_host(d))
            .filter(|d| !d.is_empty())
            .any(|d| matches_host(domain, &d))
    }

    /// Referrer domain with self-referrals suppressed.
    pub fn external_referrer_domain(&self, referrer: &str) -> Option<String> {
        extract_referrer_domain(referrer).filter(|d| !self.is_internal(d))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

fn normalize_host(raw: &str) -> String {
    let host = raw.trim().to_lowercase();
    let host = host.split(':').next().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

fn matches_host(domain: &str, host: &str) -> bool {
    domain == host || domain.ends_with(&format!(".{host}"))
}
