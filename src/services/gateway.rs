//! Dashboard collaborator gateway
//!
//! Thin outbound calls mirroring active-call state and finalized CDRs to
//! the administrative dashboard. The local ledger and registry stay
//! authoritative: a gateway failure is logged and retried once, never
//! propagated into call processing.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use crate::error::BillingError;
use crate::models::{ActiveCall, Cdr};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DashboardGateway {
    base_url: String,
    client: reqwest::Client,
}

impl DashboardGateway {
    pub fn new(base_url: &str) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BillingError::Internal(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Upsert the active-call mirror row (keyed remotely by `call_id`)
    pub async fn upsert_active_call(&self, call: &ActiveCall, current_cost: Decimal) {
        let payload = active_call_payload(call, current_cost);
        let url = format!("{}/active-calls", self.base_url);
        if let Err(e) = self.post(&url, &payload).await {
            warn!("Failed to publish active call {}: {}", call.call_id, e);
        }
    }

    /// Delete the active-call mirror row; the remote delete is idempotent
    pub async fn remove_active_call(&self, call_id: &str) {
        let url = format!("{}/active-calls/{}", self.base_url, call_id);
        if let Err(e) = self.delete(&url).await {
            warn!("Failed to remove active call {}: {}", call_id, e);
        }
    }

    /// Append a finalized call detail record
    pub async fn create_cdr(&self, cdr: &Cdr) {
        let payload = cdr_payload(cdr);
        let url = format!("{}/cdr", self.base_url);
        if let Err(e) = self.post(&url, &payload).await {
            warn!("Failed to publish CDR {}: {}", cdr.call_id, e);
        }
    }

    async fn post(&self, url: &str, payload: &Value) -> Result<(), BillingError> {
        for attempt in 0..2 {
            match self.client.post(url).json(payload).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    return Err(BillingError::Gateway(format!(
                        "{} returned {}",
                        url,
                        resp.status()
                    )));
                }
                Err(e) if attempt == 0 => {
                    warn!("POST {} failed ({}), retrying once", url, e);
                }
                Err(e) => return Err(BillingError::Gateway(e.to_string())),
            }
        }
        unreachable!()
    }

    async fn delete(&self, url: &str) -> Result<(), BillingError> {
        for attempt in 0..2 {
            match self.client.delete(url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    return Err(BillingError::Gateway(format!(
                        "{} returned {}",
                        url,
                        resp.status()
                    )));
                }
                Err(e) if attempt == 0 => {
                    warn!("DELETE {} failed ({}), retrying once", url, e);
                }
                Err(e) => return Err(BillingError::Gateway(e.to_string())),
            }
        }
        unreachable!()
    }
}

fn active_call_payload(call: &ActiveCall, current_cost: Decimal) -> Value {
    json!({
        "call_id": call.call_id,
        "calling_number": call.calling_number,
        "called_number": call.called_number,
        "direction": call.direction.to_string(),
        "start_time": call.start_time.to_rfc3339(),
        "current_duration": call.current_duration(Utc::now()),
        "current_cost": current_cost,
        "connection_id": call.connection_id,
    })
}

fn cdr_payload(cdr: &Cdr) -> Value {
    json!({
        "call_id": cdr.call_id,
        "calling_number": cdr.calling_number,
        "called_number": cdr.called_number,
        "start_time": cdr.start_time.to_rfc3339(),
        "answer_time": cdr.answer_time.map(|t| t.to_rfc3339()),
        "end_time": cdr.end_time.to_rfc3339(),
        "duration_seconds": cdr.duration,
        "duration_billable": cdr.billsec,
        "cost": cdr.cost,
        "status": cdr.hangup_cause,
        "direction": cdr.direction.to_string(),
        "rate_per_minute": cdr.rate_per_minute,
    })
}
