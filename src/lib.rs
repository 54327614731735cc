pub mod analyzer;
pub mod api;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod scheduler;
pub mod session;
pub mod types;
