//! Settlement ledger
//!
//! Reserve-then-commit settlement against account balances. Each account's
//! state (balance, reservations, transaction log) lives behind its own
//! mutex: two settlements on the same account serialize, settlements on
//! different accounts run in parallel. The balance update and its
//! transaction record are written inside the same critical section; one is
//! never visible without the other.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::BillingError;
use crate::models::{
    Account, BalanceTransaction, RatedResult, Reservation, ReservationStatus, TransactionType,
};

/// Minutes of talk time covered by the initial hold
pub const INITIAL_RESERVATION_MINUTES: i64 = 5;

/// Safety buffer applied on top of the estimated hold
pub const RESERVATION_BUFFER_PERCENT: i64 = 8;

/// Hold bounds, in cents
const MIN_RESERVATION_CENTS: i64 = 30;
const MAX_RESERVATION_CENTS: i64 = 3_000;

/// Hold lifetime: a crashed or lost call stops locking balance after this
pub const RESERVATION_TTL_SECS: i64 = 2_700;

/// Per-account ledger state, guarded by one mutex per account
#[derive(Debug)]
struct AccountLedger {
    account: Account,
    initial_balance: Decimal,
    /// All reservations for this account, by call id, terminal ones included
    reservations: HashMap<String, Reservation>,
    /// Append-only transaction log
    transactions: Vec<BalanceTransaction>,
}

impl AccountLedger {
    /// Balance still reserved by active holds
    fn active_holds(&self) -> Decimal {
        self.reservations
            .values()
            .filter(|r| r.status.is_holding())
            .map(|r| r.reserved_amount)
            .sum()
    }

    fn active_hold_count(&self) -> i32 {
        self.reservations
            .values()
            .filter(|r| r.status.is_holding())
            .count() as i32
    }

    /// Debit `amount` and append the matching transaction, atomically with
    /// respect to this account's lock.
    fn apply_transaction(
        &mut self,
        amount: Decimal,
        transaction_type: TransactionType,
        call_id: Option<String>,
    ) -> Decimal {
        let tx = BalanceTransaction::new(
            self.account.id,
            amount,
            self.account.balance,
            transaction_type,
            call_id,
        );
        self.account.balance = tx.new_balance;
        self.account.updated_at = Utc::now();
        self.transactions.push(tx);
        self.account.balance
    }
}

/// Result of committing a reservation
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub account_id: i64,
    pub call_id: String,
    pub cost: Decimal,
    pub consumed: Decimal,
    pub released: Decimal,
    /// Amount by which the actual cost exceeded the hold, flagged for
    /// reconciliation; the full cost is still debited
    pub overage: Option<Decimal>,
    pub new_balance: Decimal,
}

/// The settlement ledger
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<i64, Arc<Mutex<AccountLedger>>>,
    /// Digits-normalized account number -> account id
    phone_index: DashMap<String, i64>,
    /// Call id -> account id, for active reservations only
    call_index: DashMap<String, i64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the initial hold for a call at the given rate
    pub fn estimate_hold(rate_per_minute: Decimal) -> Decimal {
        let base = rate_per_minute * Decimal::from(INITIAL_RESERVATION_MINUTES);
        let buffer = base * Decimal::from(RESERVATION_BUFFER_PERCENT) / Decimal::from(100);
        (base + buffer).clamp(
            Decimal::new(MIN_RESERVATION_CENTS, 2),
            Decimal::new(MAX_RESERVATION_CENTS, 2),
        )
    }

    pub fn register_account(&self, account: Account) {
        self.phone_index.insert(
            Account::normalize_phone(&account.account_number),
            account.id,
        );
        self.accounts.insert(
            account.id,
            Arc::new(Mutex::new(AccountLedger {
                initial_balance: account.balance,
                account,
                reservations: HashMap::new(),
                transactions: Vec::new(),
            })),
        );
    }

    fn ledger_for(&self, account_id: i64) -> Option<Arc<Mutex<AccountLedger>>> {
        self.accounts.get(&account_id).map(|e| e.value().clone())
    }

    pub async fn account(&self, account_id: i64) -> Option<Account> {
        let ledger = self.ledger_for(account_id)?;
        let guard = ledger.lock().await;
        Some(guard.account.clone())
    }

    /// Resolve the billing account for a caller number (digits-only match)
    pub async fn find_account_by_phone(&self, ani: &str) -> Option<Account> {
        let normalized = Account::normalize_phone(ani);
        let account_id = *self.phone_index.get(&normalized)?;
        self.account(account_id).await
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Credit the account and log the recharge
    pub async fn recharge(&self, account_id: i64, amount: Decimal) -> Result<Decimal, BillingError> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::InvalidInput(
                "recharge amount must be positive".to_string(),
            ));
        }
        let ledger = self
            .ledger_for(account_id)
            .ok_or_else(|| BillingError::AccountNotFound(account_id.to_string()))?;

        let mut guard = ledger.lock().await;
        let new_balance = guard.apply_transaction(amount, TransactionType::Recharge, None);
        info!("Recharged account {} by {}, balance {}", account_id, amount, new_balance);
        Ok(new_balance)
    }

    /// Create an active hold for a call.
    ///
    /// Fails with `DuplicateReservation` when the call already holds one,
    /// `ConcurrentLimitExceeded` past the account's call cap, and
    /// `InsufficientBalance` when `balance + credit − active holds` cannot
    /// cover the estimate.
    pub async fn reserve(
        &self,
        account_id: i64,
        call_id: &str,
        amount: Decimal,
        ttl_seconds: i64,
        rate_per_minute: Decimal,
    ) -> Result<Reservation, BillingError> {
        let ledger = self
            .ledger_for(account_id)
            .ok_or_else(|| BillingError::AccountNotFound(account_id.to_string()))?;

        let mut guard = ledger.lock().await;

        if let Some(existing) = guard.reservations.get(call_id) {
            if existing.status.is_holding() {
                return Err(BillingError::DuplicateReservation(call_id.to_string()));
            }
        }

        let max_calls = guard.account.max_concurrent_calls;
        if guard.active_hold_count() >= max_calls {
            return Err(BillingError::ConcurrentLimitExceeded { max: max_calls });
        }

        let available = guard.account.available_balance() - guard.active_holds();
        if available < amount {
            return Err(BillingError::InsufficientBalance {
                required: amount.to_string(),
                available: available.to_string(),
            });
        }

        let reservation = Reservation::new(
            account_id,
            call_id.to_string(),
            amount,
            rate_per_minute,
            ttl_seconds,
        );
        guard
            .reservations
            .insert(call_id.to_string(), reservation.clone());
        self.call_index.insert(call_id.to_string(), account_id);

        info!(
            "Reserved {} for call {} on account {} (expires {})",
            amount, call_id, account_id, reservation.expires_at
        );
        Ok(reservation)
    }

    /// Commit the hold for a finished call: debit the actual cost, release
    /// the remainder, append exactly one transaction.
    ///
    /// An absent or already-terminal reservation is `ReservationNotFound`;
    /// callers log it and treat settlement as a no-op.
    pub async fn settle(
        &self,
        call_id: &str,
        billsec: i32,
        rated: &RatedResult,
    ) -> Result<SettlementOutcome, BillingError> {
        let account_id = *self
            .call_index
            .get(call_id)
            .ok_or_else(|| BillingError::ReservationNotFound(call_id.to_string()))?;
        let ledger = self
            .ledger_for(account_id)
            .ok_or_else(|| BillingError::ReservationNotFound(call_id.to_string()))?;

        let mut guard = ledger.lock().await;

        let cost = rated.cost(billsec);
        let (reserved, consumed, released, overage) = {
            let res = guard
                .reservations
                .get_mut(call_id)
                .filter(|r| r.status.is_holding())
                .ok_or_else(|| BillingError::ReservationNotFound(call_id.to_string()))?;

            let reserved = res.reserved_amount;
            let (consumed, released, overage) = if cost <= reserved {
                (cost, reserved - cost, None)
            } else {
                // underestimated hold: debit in full, flag the overage
                (reserved, Decimal::ZERO, Some(cost - reserved))
            };

            res.consumed_amount = consumed;
            res.released_amount = released;
            res.status = ReservationStatus::Committed;
            res.finalized_at = Some(Utc::now());
            (reserved, consumed, released, overage)
        };

        let new_balance = guard.apply_transaction(
            -cost,
            TransactionType::ReservationConsume,
            Some(call_id.to_string()),
        );

        self.call_index.remove(call_id);

        if let Some(over) = overage {
            warn!(
                "Settlement overage on call {}: reserved {}, actual {}, over by {}",
                call_id, reserved, cost, over
            );
        }
        info!(
            "Settled call {}: cost {}, released {}, balance {}",
            call_id, cost, released, new_balance
        );

        Ok(SettlementOutcome {
            account_id,
            call_id: call_id.to_string(),
            cost,
            consumed,
            released,
            overage,
            new_balance,
        })
    }

    /// Release a hold without any debit (call never became billable)
    pub async fn release(&self, call_id: &str) -> Result<Reservation, BillingError> {
        let account_id = *self
            .call_index
            .get(call_id)
            .ok_or_else(|| BillingError::ReservationNotFound(call_id.to_string()))?;
        let ledger = self
            .ledger_for(account_id)
            .ok_or_else(|| BillingError::ReservationNotFound(call_id.to_string()))?;

        let mut guard = ledger.lock().await;
        let res = guard
            .reservations
            .get_mut(call_id)
            .filter(|r| r.status.is_holding())
            .ok_or_else(|| BillingError::ReservationNotFound(call_id.to_string()))?;

        res.released_amount = res.reserved_amount;
        res.status = ReservationStatus::Released;
        res.finalized_at = Some(Utc::now());
        let released = res.clone();
        drop(guard);

        self.call_index.remove(call_id);
        info!("Released hold for call {} without charge", call_id);
        Ok(released)
    }

    /// Expire active holds past their TTL so lost calls stop locking
    /// balance. Returns the number of holds expired.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> usize {
        let ledgers: Vec<_> = self.accounts.iter().map(|e| e.value().clone()).collect();
        let mut expired = 0;

        for ledger in ledgers {
            let mut guard = ledger.lock().await;
            let stale: Vec<String> = guard
                .reservations
                .values()
                .filter(|r| r.status.is_holding() && r.is_expired_at(now))
                .map(|r| r.call_id.clone())
                .collect();

            for call_id in stale {
                if let Some(res) = guard.reservations.get_mut(&call_id) {
                    res.status = ReservationStatus::Expired;
                    res.finalized_at = Some(now);
                }
                self.call_index.remove(&call_id);
                warn!("Expired stale reservation for call {}", call_id);
                expired += 1;
            }
        }

        expired
    }

    /// The reservation for a call, whatever its status
    pub async fn reservation(&self, account_id: i64, call_id: &str) -> Option<Reservation> {
        let ledger = self.ledger_for(account_id)?;
        let guard = ledger.lock().await;
        guard.reservations.get(call_id).cloned()
    }

    /// Whether a call currently holds an active reservation
    pub fn has_active_reservation(&self, call_id: &str) -> bool {
        self.call_index.contains_key(call_id)
    }

    pub async fn transactions(&self, account_id: i64) -> Vec<BalanceTransaction> {
        match self.ledger_for(account_id) {
            Some(ledger) => ledger.lock().await.transactions.clone(),
            None => Vec::new(),
        }
    }

    /// Reconciliation invariant: balance equals the initial balance plus
    /// the signed sum of every committed transaction.
    pub async fn verify_reconciliation(&self, account_id: i64) -> Option<bool> {
        let ledger = self.ledger_for(account_id)?;
        let guard = ledger.lock().await;
        let tx_sum: Decimal = guard.transactions.iter().map(|t| t.amount).sum();
        Some(guard.initial_balance + tx_sum == guard.account.balance)
    }
}
