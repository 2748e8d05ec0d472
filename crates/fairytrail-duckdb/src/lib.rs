pub mod backend;
pub mod schema;

pub use backend::DuckDbStore;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `fairytrail_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
