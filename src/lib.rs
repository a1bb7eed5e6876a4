/// Cast Cache - actor metadata cache
///
/// Looks actors up in the TVmaze people directory, caches them with their
/// show credits in SQLite, and serves listings and statistics over REST.

pub mod actor_store;
pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod directory;
pub mod error;
pub mod listing;
pub mod metrics;
pub mod reconciler;
pub mod server;
pub mod statistics;
