pub mod attribution;
pub mod config;
pub mod context;
pub mod copy_cache;
pub mod error;
pub mod event;
pub mod journey;
pub mod referrer;
pub mod storage;
pub mod tracker;
pub mod versioned;
pub mod visitor;
