/// Re-export `Config` from `fairytrail-core` for use within this crate.
///
/// All environment-variable parsing lives in `fairytrail-core` so it can be
/// shared with tests and other crates without depending on the client.
pub use fairytrail_core::config::Config;
