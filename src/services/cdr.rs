//! CDR generation
//!
//! On hangup the handler assembles the final call facts; this service
//! prices them, settles the reservation, and produces exactly one immutable
//! CDR, which is mirrored to the dashboard. Settlement defects
//! (missing/terminal reservation) degrade to a zero-cost record, never to a
//! dropped call or a torn-down connection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{CallDirection, Cdr, RatedResult};
use crate::services::gateway::DashboardGateway;
use crate::services::ledger::Ledger;
use crate::services::rating::RatingEngine;

/// Final facts about a finished call, pulled off the hangup event
#[derive(Debug, Clone)]
pub struct HangupFacts {
    pub call_id: String,
    pub calling_number: String,
    pub called_number: String,
    pub start_time: DateTime<Utc>,
    pub answer_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub duration: i32,
    pub billsec: i32,
    pub hangup_cause: String,
    pub direction: CallDirection,
}

pub struct CdrGenerator {
    ledger: Arc<Ledger>,
    rating: Arc<RatingEngine>,
    gateway: Option<Arc<DashboardGateway>>,
}

impl CdrGenerator {
    pub fn new(
        ledger: Arc<Ledger>,
        rating: Arc<RatingEngine>,
        gateway: Option<Arc<DashboardGateway>>,
    ) -> Self {
        Self {
            ledger,
            rating,
            gateway,
        }
    }

    /// Settle and record a finished call
    pub async fn generate(&self, facts: HangupFacts) -> Cdr {
        // tariff selection is pinned to call start, not hangup
        let rated = self.rating.rate(&facts.called_number, facts.start_time);

        let (account_id, cost) = if facts.direction.is_billable() {
            self.settle_billable(&facts, &rated).await
        } else {
            info!("Call {} is {}, no billing", facts.call_id, facts.direction);
            (None, Decimal::ZERO)
        };

        if facts.direction.is_billable() && !rated.valid {
            warn!(
                "Call {} to unrated destination {:?} settled at zero",
                facts.call_id, facts.called_number
            );
        }

        let cdr = Cdr {
            call_id: facts.call_id.clone(),
            account_id,
            calling_number: facts.calling_number,
            called_number: facts.called_number,
            start_time: facts.start_time,
            answer_time: facts.answer_time,
            end_time: facts.end_time,
            duration: facts.duration,
            billsec: facts.billsec,
            rate_per_minute: rated.matched.as_ref().map(|c| c.rate_per_minute),
            rate_id: rated.matched.as_ref().map(|c| c.id),
            cost,
            hangup_cause: facts.hangup_cause,
            direction: facts.direction,
        };

        info!(
            "CDR generated: {} duration {}s billsec {}s cost {} cause {}",
            cdr.call_id, cdr.duration, cdr.billsec, cdr.cost, cdr.hangup_cause
        );

        if let Some(gateway) = &self.gateway {
            gateway.create_cdr(&cdr).await;
        }

        cdr
    }

    async fn settle_billable(
        &self,
        facts: &HangupFacts,
        rated: &RatedResult,
    ) -> (Option<i64>, Decimal) {
        if facts.billsec > 0 {
            match self.ledger.settle(&facts.call_id, facts.billsec, rated).await {
                Ok(outcome) => (Some(outcome.account_id), outcome.cost),
                Err(e) => {
                    // ordering defect or a call that predates this process:
                    // settlement is a no-op, the CDR still gets written
                    warn!("Settlement for call {} skipped: {}", facts.call_id, e);
                    (None, Decimal::ZERO)
                }
            }
        } else {
            // never answered: return the hold without charge
            match self.ledger.release(&facts.call_id).await {
                Ok(reservation) => (Some(reservation.account_id), Decimal::ZERO),
                Err(e) => {
                    warn!("Release for call {} skipped: {}", facts.call_id, e);
                    (None, Decimal::ZERO)
                }
            }
        }
    }
}
