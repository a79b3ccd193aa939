//! Event dispatch and call lifecycle handling
//!
//! Routes decoded events to the create/answer/end handlers in arrival
//! order. Per-call failures are logged and isolated; they never tear down
//! the listening connection.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::esl::codec::Command;
use crate::esl::event::EslEvent;
use crate::models::{CallDirection, CallUpdate, Cdr};
use crate::services::cdr::{CdrGenerator, HangupFacts};
use crate::services::gateway::DashboardGateway;
use crate::services::ledger::{Ledger, RESERVATION_TTL_SECS};
use crate::services::rating::RatingEngine;
use crate::services::tracker::CallRegistry;

/// Shared engine services, one set per process
#[derive(Clone)]
pub struct EngineServices {
    pub registry: Arc<CallRegistry>,
    pub ledger: Arc<Ledger>,
    pub rating: Arc<RatingEngine>,
    pub cdr: Arc<CdrGenerator>,
    pub gateway: Option<Arc<DashboardGateway>>,
}

/// Per-connection event handler
pub struct EventHandler {
    server_id: String,
    services: EngineServices,
    /// Outbound command channel back to this connection's session
    commands: Option<mpsc::Sender<Command>>,
}

impl EventHandler {
    pub fn new(
        server_id: String,
        services: EngineServices,
        commands: Option<mpsc::Sender<Command>>,
    ) -> Self {
        Self {
            server_id,
            services,
            commands,
        }
    }

    pub async fn handle_event(&self, event: &EslEvent) {
        match event.event_name() {
            Some("CHANNEL_CREATE") => self.on_create(event).await,
            Some("CHANNEL_ANSWER") => self.on_answer(event).await,
            Some("CHANNEL_HANGUP") | Some("CHANNEL_HANGUP_COMPLETE") => self.on_end(event).await,
            _ => {}
        }
    }

    async fn on_create(&self, event: &EslEvent) {
        let Some(call_id) = event.unique_id().map(str::to_string) else {
            return;
        };
        let caller = event.caller_number().unwrap_or_default().to_string();
        let callee = event.destination_number().unwrap_or_default().to_string();
        let direction = event
            .direction()
            .map(CallDirection::parse)
            .unwrap_or(CallDirection::Outbound);
        let start_time = event.start_time().unwrap_or_else(Utc::now);

        info!(
            "CHANNEL_CREATE {}: {} -> {} [{}]",
            call_id, caller, callee, direction
        );

        let already_tracked = self.services.registry.get(&call_id).is_some();

        if direction.is_billable() && !already_tracked {
            if let Err(reason) = self.authorize(&call_id, &caller, &callee).await {
                warn!("Call {} denied: {}", call_id, reason);
                self.kill_call(&call_id).await;
                // denied calls still leave a CDR trail
                let cdr = Cdr::rejected(
                    call_id,
                    caller,
                    callee,
                    start_time,
                    Utc::now(),
                    direction,
                );
                if let Some(gateway) = &self.services.gateway {
                    gateway.create_cdr(&cdr).await;
                }
                return;
            }
        }

        let snapshot = self.services.registry.upsert(
            &call_id,
            CallUpdate {
                calling_number: Some(caller),
                called_number: Some(callee),
                direction: Some(direction),
                start_time: Some(start_time),
                connection_id: Some(self.server_id.clone()),
            },
        );

        if let Some(gateway) = &self.services.gateway {
            gateway.upsert_active_call(&snapshot, Decimal::ZERO).await;
        }
    }

    /// Authorize a billable call: resolve the account, quote the
    /// destination, place the hold. Returns the denial reason on failure.
    async fn authorize(&self, call_id: &str, caller: &str, callee: &str) -> Result<(), String> {
        let account = self
            .services
            .ledger
            .find_account_by_phone(caller)
            .await
            .ok_or_else(|| format!("account_not_found for {}", caller))?;

        if !account.is_active() {
            return Err(format!("account_{}", account.status));
        }

        let quote = self.services.rating.quote(callee);
        if !quote.valid {
            return Err(format!("no_rate_found for {}", callee));
        }

        let amount = Ledger::estimate_hold(quote.rate_per_minute());
        let reservation = self
            .services
            .ledger
            .reserve(
                account.id,
                call_id,
                amount,
                RESERVATION_TTL_SECS,
                quote.rate_per_minute(),
            )
            .await
            .map_err(|e| e.error_code().to_string())?;

        info!(
            "Call {} authorized for account {}: held {}, max {}s",
            call_id,
            account.account_number,
            reservation.reserved_amount,
            reservation.max_duration_seconds()
        );
        Ok(())
    }

    async fn on_answer(&self, event: &EslEvent) {
        let Some(call_id) = event.unique_id() else {
            return;
        };
        let at = event.answer_time().unwrap_or_else(Utc::now);

        info!("CHANNEL_ANSWER {}", call_id);
        // a miss is tolerated: the call may predate this process
        self.services.registry.mark_answered(call_id, at);
    }

    async fn on_end(&self, event: &EslEvent) {
        let Some(call_id) = event.unique_id().map(str::to_string) else {
            return;
        };

        let removed = self.services.registry.remove(&call_id);
        if removed.is_none() && !self.services.ledger.has_active_reservation(&call_id) {
            // duplicate hangup or a call this process never saw
            return;
        }

        let duration = event.duration().unwrap_or(0);
        let billsec = event.billsec().unwrap_or(0);
        let hangup_cause = event
            .hangup_cause()
            .unwrap_or("UNKNOWN")
            .to_string();

        info!(
            "CHANNEL_HANGUP {}: duration {}s billsec {}s cause {}",
            call_id, duration, billsec, hangup_cause
        );

        let (caller, callee, direction, start_time, answer_time) = match &removed {
            Some(call) => (
                call.calling_number.clone(),
                call.called_number.clone(),
                call.direction,
                call.start_time,
                call.answer_time,
            ),
            None => (
                event.caller_number().unwrap_or_default().to_string(),
                event.destination_number().unwrap_or_default().to_string(),
                event
                    .direction()
                    .map(CallDirection::parse)
                    .unwrap_or(CallDirection::Outbound),
                event.start_time().unwrap_or_else(Utc::now),
                event.answer_time(),
            ),
        };

        if let Some(gateway) = &self.services.gateway {
            gateway.remove_active_call(&call_id).await;
        }

        let facts = HangupFacts {
            call_id,
            calling_number: caller,
            called_number: callee,
            start_time,
            answer_time,
            end_time: event.end_time().unwrap_or_else(Utc::now),
            duration,
            billsec,
            hangup_cause,
            direction,
        };

        self.services.cdr.generate(facts).await;
    }

    async fn kill_call(&self, call_id: &str) {
        let Some(commands) = &self.commands else {
            return;
        };
        let cmd = Command::Api(format!("uuid_kill {} CALL_REJECTED", call_id));
        if let Err(e) = commands.send(cmd).await {
            error!("Failed to queue kill command for {}: {}", call_id, e);
        }
    }
}
