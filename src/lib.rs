//! sentineld - community moderation daemon.
//!
//! Watches a stream of chat messages delivered by a platform connector,
//! flags content against a keyword blocklist, accumulates per-user
//! infraction counters, escalates through timed restrictions and a
//! lockdown/appeal workflow, and persists its state into per-guild pinned
//! messages backed by a local file mirror.

pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod http;
pub mod metrics;
pub mod persist;
pub mod platform;
pub mod services;
pub mod state;
pub mod watchdog;
