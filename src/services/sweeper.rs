//! Reservation expiry sweeper
//!
//! Periodically expires active holds past their TTL so a crashed or lost
//! call cannot lock balance forever.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::info;

use crate::services::ledger::Ledger;

/// Sweep period
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ReservationSweeper;

impl ReservationSweeper {
    pub fn spawn(ledger: Arc<Ledger>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(period);
            loop {
                tick.tick().await;
                let expired = ledger.expire_stale(Utc::now()).await;
                if expired > 0 {
                    info!("Expired {} stale reservations", expired);
                }
            }
        })
    }
}
