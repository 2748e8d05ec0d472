/// DuckDB initialization SQL.
///
/// Executed once at open time via `Connection::execute_batch`. Every
/// statement uses `IF NOT EXISTS` so it is safe to re-run on each start.
///
/// Always set an explicit memory limit: the DuckDB default (80% of system
/// RAM) is far too much for a store holding a handful of small JSON blobs.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 1;

-- ===========================================
-- CLIENT STORAGE (durable key-value records)
-- ===========================================
-- Keys used today:
--   'fairytrail_attribution' – first-touch attribution JSON
--   'fairytrail_journey'     – current session journey JSON
--   'fairytrail_visitor_id'  – visitor UUID
CREATE TABLE IF NOT EXISTS client_storage (
    key             VARCHAR PRIMARY KEY,
    value           VARCHAR NOT NULL,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#
    )
}

pub const MIGRATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS _migrations (
    id          VARCHAR PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Identifier recorded in `_migrations` once `client_storage` exists.
pub const CLIENT_STORAGE_MIGRATION: &str = "0001_client_storage";
