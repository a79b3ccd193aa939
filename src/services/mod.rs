//! Engine services

pub mod cdr;
pub mod gateway;
pub mod ledger;
pub mod rating;
pub mod sweeper;
pub mod tracker;

pub use cdr::{CdrGenerator, HangupFacts};
pub use gateway::DashboardGateway;
pub use ledger::{Ledger, SettlementOutcome};
pub use rating::{RateTable, RatingEngine};
pub use sweeper::ReservationSweeper;
pub use tracker::CallRegistry;
