//! Rating engine
//!
//! Longest-prefix-match lookup against a versioned rate table. The table is
//! replaced wholesale by the administrative collaborator and swapped in
//! lock-free; lookups always see one consistent version.

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::models::{RateCard, RatedResult};

/// One immutable version of the rate table
#[derive(Debug, Default)]
pub struct RateTable {
    cards: Vec<RateCard>,
}

impl RateTable {
    pub fn new(cards: Vec<RateCard>) -> Self {
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Best card for a digits-only destination at `as_of`: longest matching
    /// prefix wins, ties broken by highest priority, then lowest id.
    fn lookup(&self, digits: &str, as_of: DateTime<Utc>) -> Option<&RateCard> {
        self.cards
            .iter()
            .filter(|card| {
                !card.destination_prefix.is_empty()
                    && digits.starts_with(&card.destination_prefix)
                    && card.is_effective_at(as_of)
            })
            .max_by_key(|card| {
                (
                    card.destination_prefix.len(),
                    card.priority,
                    std::cmp::Reverse(card.id),
                )
            })
    }
}

/// Rating engine over the current rate table
pub struct RatingEngine {
    table: ArcSwap<RateTable>,
}

impl RatingEngine {
    pub fn new(cards: Vec<RateCard>) -> Self {
        Self {
            table: ArcSwap::from_pointee(RateTable::new(cards)),
        }
    }

    /// Replace the whole table with a new version
    pub fn replace_table(&self, cards: Vec<RateCard>) {
        let table = RateTable::new(cards);
        debug!("Rate table replaced, {} cards", table.len());
        self.table.store(Arc::new(table));
    }

    pub fn table_len(&self) -> usize {
        self.table.load().len()
    }

    /// Rate a destination as of a given instant.
    ///
    /// Never fails: an empty number or an unmatched prefix yields an
    /// explicit unrated result with zero rate.
    pub fn rate(&self, destination: &str, as_of: DateTime<Utc>) -> RatedResult {
        let digits = RateCard::normalize_destination(destination);
        if digits.is_empty() {
            return RatedResult::unrated(digits);
        }

        let table = self.table.load();
        match table.lookup(&digits, as_of) {
            Some(card) => RatedResult::rated(digits, card.clone()),
            None => {
                debug!("No rate matched destination {}", digits);
                RatedResult::unrated(digits)
            }
        }
    }

    /// Rate a destination right now (authorization-time quote)
    pub fn quote(&self, destination: &str) -> RatedResult {
        self.rate(destination, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn card(id: i64, prefix: &str, priority: i32) -> RateCard {
        RateCard {
            id,
            destination_prefix: prefix.to_string(),
            destination_name: format!("Zone {}", prefix),
            rate_per_minute: dec!(0.10),
            billing_increment: 6,
            effective_start: Utc::now() - chrono::Duration::days(1),
            priority,
            ..Default::default()
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let engine = RatingEngine::new(vec![
            card(1, "1", 1),
            card(2, "12", 1),
            card(3, "123", 1),
        ]);
        let now = Utc::now();

        assert_eq!(
            engine.rate("15551234", now).matched.unwrap().destination_prefix,
            "1"
        );
        assert_eq!(
            engine.rate("125551234", now).matched.unwrap().destination_prefix,
            "12"
        );
        assert_eq!(
            engine
                .rate("1235551234", now)
                .matched
                .unwrap()
                .destination_prefix,
            "123"
        );
    }

    #[test]
    fn test_no_match_is_unrated_not_error() {
        let engine = RatingEngine::new(vec![card(1, "1", 1)]);
        let result = engine.rate("999", Utc::now());

        assert!(!result.valid);
        assert!(result.matched.is_none());
        assert_eq!(result.cost(600), dec!(0));
    }

    #[test]
    fn test_empty_number_is_invalid() {
        let engine = RatingEngine::new(vec![card(1, "1", 1)]);
        let result = engine.rate("+-() ", Utc::now());

        assert!(!result.valid);
        assert!(result.destination.is_empty());
    }

    #[test]
    fn test_priority_breaks_prefix_ties() {
        let engine = RatingEngine::new(vec![card(1, "51", 1), card(2, "51", 5)]);
        let result = engine.rate("51999888777", Utc::now());

        assert_eq!(result.matched.unwrap().id, 2);
    }

    #[test]
    fn test_lowest_id_breaks_remaining_ties() {
        let engine = RatingEngine::new(vec![card(7, "51", 1), card(3, "51", 1)]);
        let result = engine.rate("51999888777", Utc::now());

        assert_eq!(result.matched.unwrap().id, 3);
    }

    #[test]
    fn test_expired_entry_never_selected() {
        let now = Utc::now();
        let mut expired = card(1, "519", 9);
        expired.effective_end = Some(now - chrono::Duration::hours(1));
        let engine = RatingEngine::new(vec![expired, card(2, "51", 1)]);

        // longer prefix exists but its window is closed: the shorter one wins
        let result = engine.rate("51999888777", now);
        assert_eq!(result.matched.unwrap().destination_prefix, "51");
    }

    #[test]
    fn test_future_entry_not_selected_yet() {
        let now = Utc::now();
        let mut future = card(1, "51", 1);
        future.effective_start = now + chrono::Duration::hours(1);
        let engine = RatingEngine::new(vec![future]);

        assert!(!engine.rate("51999888777", now).valid);
        // but it is selected once its window opens
        assert!(engine.rate("51999888777", now + chrono::Duration::hours(2)).valid);
    }

    #[test]
    fn test_replace_table_swaps_version() {
        let engine = RatingEngine::new(vec![card(1, "51", 1)]);
        assert!(engine.rate("51999", Utc::now()).valid);

        engine.replace_table(vec![card(2, "52", 1)]);
        assert!(!engine.rate("51999", Utc::now()).valid);
        assert!(engine.rate("52999", Utc::now()).valid);
    }

    #[test]
    fn test_normalization_strips_plus_and_spaces() {
        let engine = RatingEngine::new(vec![card(1, "51", 1)]);
        let result = engine.rate("+51 999-888-777", Utc::now());

        assert!(result.valid);
        assert_eq!(result.destination, "51999888777");
    }
}
