//! Rate card model and rating result
//!
//! Rates are matched by longest destination prefix within a temporal
//! validity window; cost is rounded up to the billing increment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Destination name reported when no rate card matches
pub const UNRATED_DESTINATION: &str = "UNKNOWN";

/// Rate card entity
///
/// Defines the billing rate for calls to a specific destination prefix.
/// Multiple cards can exist for overlapping prefixes; lookup resolves by
/// longest prefix, then priority, then lowest id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCard {
    /// Unique identifier
    pub id: i64,

    /// Destination prefix for matching (e.g., "51" for Peru, "519" for Peru Mobile)
    pub destination_prefix: String,

    /// Human-readable destination name
    pub destination_name: String,

    /// Rate per minute
    pub rate_per_minute: Decimal,

    /// Billing increment in seconds (e.g., 6 for 6-second billing)
    pub billing_increment: i32,

    /// Connection fee (charged once per call)
    pub connection_fee: Decimal,

    /// When this rate becomes effective
    pub effective_start: DateTime<Utc>,

    /// When this rate expires (None = no expiry)
    pub effective_end: Option<DateTime<Utc>>,

    /// Priority for conflict resolution (higher = preferred)
    pub priority: i32,
}

impl RateCard {
    /// Cost for a billable duration, rounded up to the billing increment.
    ///
    /// `cost = connection_fee + rate_per_minute / 60 * (ceil(billsec / increment) * increment)`
    #[inline]
    pub fn calculate_cost(&self, billsec: i32) -> Decimal {
        if billsec <= 0 {
            return self.connection_fee;
        }

        let increment = self.billing_increment.max(1);
        let rounded_seconds = ((billsec + increment - 1) / increment) * increment;

        let minutes = Decimal::from(rounded_seconds) / Decimal::from(60);
        (minutes * self.rate_per_minute) + self.connection_fee
    }

    /// Rate per second, used for reservation sizing
    #[inline]
    pub fn rate_per_second(&self) -> Decimal {
        self.rate_per_minute / Decimal::from(60)
    }

    /// Check whether the validity window contains `as_of`
    pub fn is_effective_at(&self, as_of: DateTime<Utc>) -> bool {
        self.effective_start <= as_of && self.effective_end.map_or(true, |end| end > as_of)
    }

    /// Strip everything but digits for prefix matching
    pub fn normalize_destination(destination: &str) -> String {
        destination.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

impl Default for RateCard {
    fn default() -> Self {
        Self {
            id: 0,
            destination_prefix: String::new(),
            destination_name: String::new(),
            rate_per_minute: Decimal::ZERO,
            billing_increment: 6,
            connection_fee: Decimal::ZERO,
            effective_start: Utc::now(),
            effective_end: None,
            priority: 0,
        }
    }
}

/// Result of rating a destination number
///
/// Always produced: an unmatched or unparseable destination yields a
/// zero-rate result rather than an error, so a call to an unknown
/// destination can still settle (at zero cost) or be rejected by policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatedResult {
    /// Normalized (digits-only) destination the lookup ran against
    pub destination: String,

    /// Destination name from the matched card, or `UNRATED_DESTINATION`
    pub destination_name: String,

    /// Matched rate card, None when unrated
    pub matched: Option<RateCard>,

    /// False when the number was empty after normalization or no prefix matched
    pub valid: bool,
}

impl RatedResult {
    /// A result for a destination no card matched (or an empty number)
    pub fn unrated(destination: String) -> Self {
        Self {
            destination,
            destination_name: UNRATED_DESTINATION.to_string(),
            matched: None,
            valid: false,
        }
    }

    pub fn rated(destination: String, card: RateCard) -> Self {
        Self {
            destination,
            destination_name: card.destination_name.clone(),
            matched: Some(card),
            valid: true,
        }
    }

    /// Rate per minute, zero when unrated
    pub fn rate_per_minute(&self) -> Decimal {
        self.matched
            .as_ref()
            .map(|c| c.rate_per_minute)
            .unwrap_or(Decimal::ZERO)
    }

    /// Final cost for a billable duration; unrated destinations cost zero
    pub fn cost(&self, billsec: i32) -> Decimal {
        match &self.matched {
            Some(card) => card.calculate_cost(billsec),
            None => Decimal::ZERO,
        }
    }
}
