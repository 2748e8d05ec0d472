use std::time::Duration;

use crate::referrer::SiteConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the `/api/*` service, without a trailing slash.
    pub api_url: String,
    pub data_dir: String,
    pub site_host: String,
    pub internal_domains: Vec<String>,
    pub copy_ttl_secs: u64,
    pub duckdb_memory_limit: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            api_url: std::env::var("FAIRYTRAIL_API_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            data_dir: std::env::var("FAIRYTRAIL_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string()),
            site_host: std::env::var("FAIRYTRAIL_SITE_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            internal_domains: std::env::var("FAIRYTRAIL_INTERNAL_DOMAINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            copy_ttl_secs: std::env::var("FAIRYTRAIL_COPY_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|e| format!("invalid FAIRYTRAIL_COPY_TTL_SECS: {e}"))?,
            duckdb_memory_limit: std::env::var("FAIRYTRAIL_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "256MB".to_string()),
        })
    }

    pub fn copy_ttl(&self) -> Duration {
        Duration::from_secs(self.copy_ttl_secs)
    }

    pub fn site(&self) -> SiteConfig {
        SiteConfig::new(self.site_host.clone())
            .with_internal_domains(self.internal_domains.iter().cloned())
    }
}
