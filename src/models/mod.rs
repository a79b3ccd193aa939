//! Domain models

pub mod account;
pub mod call;
pub mod cdr;
pub mod rate;
pub mod reservation;

pub use account::{Account, AccountStatus, AccountType};
pub use call::{ActiveCall, CallDirection, CallState, CallUpdate};
pub use cdr::Cdr;
pub use rate::{RateCard, RatedResult, UNRATED_DESTINATION};
pub use reservation::{BalanceTransaction, Reservation, ReservationStatus, TransactionType};
