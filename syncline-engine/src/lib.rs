//! The Syncline live-state reconciliation engine.
//!
//! Keeps a UI-facing view consistent with an asynchronously updating ETL
//! backend under two independent update sources: a push channel and periodic
//! pulls. Each component is a tokio actor owning its state; other components
//! only read its watch channels or send it control messages.
//!
//! - [`reconciler`]: merges push and pull records into one deduplicated,
//!   bounded buffer and commits it to the view behind an anti-flicker gate.
//! - [`watchdog`]: flags streams that have gone silent and forces recovery.
//! - [`lifecycle`]: owns the connector state machine and all backend calls.
//! - [`tracker`]: derives per-step run progress with animated counters.
//! - [`app`]: the session harness wiring the controllers together.

pub mod app;
pub mod client;
pub mod config;
pub mod error;
#[cfg(test)]
mod fixtures;
pub mod lifecycle;
#[cfg(test)]
mod lifecycle_test;
pub mod push;
pub mod reconciler;
pub mod tracker;
pub mod watchdog;

pub use app::Session;
pub use config::Config;
