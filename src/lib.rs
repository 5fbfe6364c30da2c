//! mergebot - label-driven pull request merge bot
//!
//! Watches open GitHub pull requests carrying a "needs merge" label, checks
//! milestone, reviews and CI, keeps branches up to date by rebasing them, and
//! merges them with the configured method. Every piece of state (retry
//! counters, in-progress markers, per-PR merge method) lives in labels on the
//! pull request itself, so the bot is stateless between runs.

pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod labels;
pub mod mjolnir;
pub mod platform;
pub mod search;
pub mod server;
pub mod types;
pub mod workspace;

pub use error::{Error, Result};
