//! Real-time call rating and settlement engine
//!
//! Ingests call-lifecycle events from a telephony switch over its
//! event-socket protocol, rates destinations by longest-prefix match against
//! a versioned rate table, and settles call cost against prepaid/postpaid
//! balances with a reserve-then-commit ledger. Finalized CDRs and
//! active-call snapshots are mirrored to the administrative dashboard over
//! its HTTP API; the local ledger stays authoritative.

pub mod api;
pub mod config;
pub mod error;
pub mod esl;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::BillingError;
