//! Balance reservation and transaction models
//!
//! A reservation holds balance from authorization until settlement. It makes
//! exactly one transition out of `Active`; once terminal the arithmetic
//! invariant `reserved == consumed + released` holds for committed and
//! released reservations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Holding balance, call in flight
    #[default]
    Active,
    /// Settled: consumed/released amounts are final
    Committed,
    /// Released without consumption (call never billable)
    Released,
    /// Expired by the sweeper; no longer holds balance
    Expired,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Active => write!(f, "active"),
            ReservationStatus::Committed => write!(f, "committed"),
            ReservationStatus::Released => write!(f, "released"),
            ReservationStatus::Expired => write!(f, "expired"),
        }
    }
}

impl ReservationStatus {
    /// Check if the reservation still holds balance
    pub fn is_holding(&self) -> bool {
        matches!(self, ReservationStatus::Active)
    }

    /// Check if the reservation reached a terminal state
    pub fn is_terminal(&self) -> bool {
        !self.is_holding()
    }
}

/// Balance reservation entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier
    pub id: Uuid,

    /// Associated account
    pub account_id: i64,

    /// Associated call id (at most one Active reservation per call)
    pub call_id: String,

    /// Total amount held
    pub reserved_amount: Decimal,

    /// Amount consumed at settlement
    pub consumed_amount: Decimal,

    /// Amount returned at settlement
    pub released_amount: Decimal,

    /// Current status
    pub status: ReservationStatus,

    /// Rate per minute at reservation time
    pub rate_per_minute: Decimal,

    /// When this hold stops counting against available balance
    pub expires_at: DateTime<Utc>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When the terminal transition happened
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn new(
        account_id: i64,
        call_id: String,
        reserved_amount: Decimal,
        rate_per_minute: Decimal,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            call_id,
            reserved_amount,
            consumed_amount: Decimal::ZERO,
            released_amount: Decimal::ZERO,
            status: ReservationStatus::Active,
            rate_per_minute,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
            created_at: now,
            finalized_at: None,
        }
    }

    /// Check whether this hold has passed its expiry time
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Maximum call duration the hold covers at the reserved rate
    pub fn max_duration_seconds(&self) -> i32 {
        use rust_decimal::prelude::ToPrimitive;

        if self.rate_per_minute <= Decimal::ZERO {
            // toll-free: cap at one hour
            return 3600;
        }

        ((self.reserved_amount / self.rate_per_minute) * Decimal::from(60))
            .to_i32()
            .unwrap_or(0)
    }
}

/// Transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Reservation consumed at settlement (debit)
    ReservationConsume,
    /// Balance recharge (credit)
    Recharge,
    /// Refund issued (credit)
    Refund,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::ReservationConsume => write!(f, "reservation_consume"),
            TransactionType::Recharge => write!(f, "recharge"),
            TransactionType::Refund => write!(f, "refund"),
        }
    }
}

/// Balance transaction entity
///
/// Immutable, append-only audit log of every balance change. The account
/// balance must always equal its initial balance plus the signed sum of
/// these amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTransaction {
    /// Associated account
    pub account_id: i64,

    /// Signed amount (negative for debits)
    pub amount: Decimal,

    /// Balance before this transaction
    pub previous_balance: Decimal,

    /// Balance after this transaction
    pub new_balance: Decimal,

    /// Type of transaction
    pub transaction_type: TransactionType,

    /// Associated call id (settlements only)
    pub call_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl BalanceTransaction {
    pub fn new(
        account_id: i64,
        amount: Decimal,
        previous_balance: Decimal,
        transaction_type: TransactionType,
        call_id: Option<String>,
    ) -> Self {
        Self {
            account_id,
            amount,
            previous_balance,
            new_balance: previous_balance + amount,
            transaction_type,
            call_id,
            created_at: Utc::now(),
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_reservation_is_active() {
        let res = Reservation::new(1, "call-1".to_string(), dec!(1.50), dec!(0.30), 2700);

        assert_eq!(res.status, ReservationStatus::Active);
        assert_eq!(res.consumed_amount, Decimal::ZERO);
        assert_eq!(res.released_amount, Decimal::ZERO);
        assert!(res.status.is_holding());
    }

    #[test]
    fn test_max_duration() {
        let res = Reservation::new(1, "call-1".to_string(), dec!(1.50), dec!(0.30), 2700);
        // 1.50 / 0.30 = 5 minutes
        assert_eq!(res.max_duration_seconds(), 300);

        let free = Reservation::new(1, "call-2".to_string(), dec!(0.30), Decimal::ZERO, 2700);
        assert_eq!(free.max_duration_seconds(), 3600);
    }

    #[test]
    fn test_expiry_check() {
        let mut res = Reservation::new(1, "call-1".to_string(), dec!(1.00), dec!(0.10), 60);
        let now = Utc::now();
        assert!(!res.is_expired_at(now));

        res.expires_at = now - chrono::Duration::seconds(1);
        assert!(res.is_expired_at(now));
    }

    #[test]
    fn test_transaction_balances() {
        let tx = BalanceTransaction::new(
            1,
            dec!(-2.50),
            dec!(10.00),
            TransactionType::ReservationConsume,
            Some("call-1".to_string()),
        );

        assert_eq!(tx.new_balance, dec!(7.50));
        assert!(tx.is_debit());

        let credit = BalanceTransaction::new(1, dec!(5.00), dec!(7.50), TransactionType::Recharge, None);
        assert_eq!(credit.new_balance, dec!(12.50));
        assert!(!credit.is_debit());
    }
}
