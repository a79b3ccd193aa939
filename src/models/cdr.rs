//! Call detail record model
//!
//! Immutable terminal record, produced exactly once per call at settlement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::call::CallDirection;

/// Call detail record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cdr {
    /// Switch-assigned call id
    pub call_id: String,

    /// Billed account, if the call was authorized against one
    pub account_id: Option<i64>,

    /// Calling number
    pub calling_number: String,

    /// Called number
    pub called_number: String,

    /// When the channel was created
    pub start_time: DateTime<Utc>,

    /// When the call was answered, if it was
    pub answer_time: Option<DateTime<Utc>>,

    /// When the channel hung up
    pub end_time: DateTime<Utc>,

    /// Total duration in seconds
    pub duration: i32,

    /// Billable seconds (answer to hangup)
    pub billsec: i32,

    /// Rate applied, if the destination was rated
    pub rate_per_minute: Option<Decimal>,

    /// Id of the matched rate card
    pub rate_id: Option<i64>,

    /// Final computed cost
    pub cost: Decimal,

    /// Switch hangup cause (e.g. NORMAL_CLEARING, CALL_REJECTED)
    pub hangup_cause: String,

    /// Call direction
    pub direction: CallDirection,
}

impl Cdr {
    /// Zero-cost record for a call denied at authorization. Denied calls
    /// must still leave a CDR trail, they never silently vanish.
    pub fn rejected(
        call_id: String,
        calling_number: String,
        called_number: String,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        direction: CallDirection,
    ) -> Self {
        Self {
            call_id,
            account_id: None,
            calling_number,
            called_number,
            start_time,
            answer_time: None,
            end_time,
            duration: 0,
            billsec: 0,
            rate_per_minute: None,
            rate_id: None,
            cost: Decimal::ZERO,
            hangup_cause: "CALL_REJECTED".to_string(),
            direction,
        }
    }

    /// Answered and billed for at least one second
    pub fn was_answered(&self) -> bool {
        self.answer_time.is_some() && self.billsec > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_cdr_is_zero_cost() {
        let now = Utc::now();
        let cdr = Cdr::rejected(
            "uuid-1".to_string(),
            "1001".to_string(),
            "999".to_string(),
            now,
            now,
            CallDirection::Outbound,
        );

        assert_eq!(cdr.cost, Decimal::ZERO);
        assert_eq!(cdr.hangup_cause, "CALL_REJECTED");
        assert!(!cdr.was_answered());
    }
}
