//! Account model
//!
//! Customer accounts, supporting both prepaid and postpaid billing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Prepaid account - must hold positive balance
    #[default]
    Prepaid,
    /// Postpaid account - can draw on credit up to the limit
    Postpaid,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Prepaid => write!(f, "prepaid"),
            AccountType::Postpaid => write!(f, "postpaid"),
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Active - can place calls
    #[default]
    Active,
    /// Suspended - temporarily blocked
    Suspended,
    /// Closed - permanently deactivated
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Suspended => write!(f, "suspended"),
            AccountStatus::Closed => write!(f, "closed"),
        }
    }
}

impl AccountStatus {
    pub fn can_make_calls(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: i64,

    /// Account number (the ANI this account bills under)
    pub account_number: String,

    /// Billing type
    pub account_type: AccountType,

    /// Current balance (can go negative on settlement overage)
    pub balance: Decimal,

    /// Credit limit for postpaid accounts
    pub credit_limit: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Account status
    pub status: AccountStatus,

    /// Maximum concurrent calls allowed
    pub max_concurrent_calls: i32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.can_make_calls()
    }

    /// Balance usable for authorization: prepaid accounts spend their
    /// balance, postpaid accounts their balance plus credit limit.
    #[inline]
    pub fn available_balance(&self) -> Decimal {
        match self.account_type {
            AccountType::Prepaid => self.balance,
            AccountType::Postpaid => self.balance + self.credit_limit,
        }
    }

    /// Strip everything but digits for ANI matching
    pub fn normalize_phone(phone: &str) -> String {
        phone.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: 0,
            account_number: String::new(),
            account_type: AccountType::Prepaid,
            balance: Decimal::ZERO,
            credit_limit: Decimal::ZERO,
            currency: "USD".to_string(),
            status: AccountStatus::Active,
            max_concurrent_calls: 5,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_prepaid_available_balance() {
        let account = Account {
            account_type: AccountType::Prepaid,
            balance: dec!(100.00),
            credit_limit: dec!(50.00), // ignored for prepaid
            ..Default::default()
        };

        assert_eq!(account.available_balance(), dec!(100.00));
    }

    #[test]
    fn test_postpaid_available_balance() {
        let account = Account {
            account_type: AccountType::Postpaid,
            balance: dec!(-50.00),
            credit_limit: dec!(100.00),
            ..Default::default()
        };

        assert_eq!(account.available_balance(), dec!(50.00));
    }

    #[test]
    fn test_suspended_account_cannot_call() {
        let account = Account {
            status: AccountStatus::Suspended,
            ..Default::default()
        };

        assert!(!account.is_active());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(Account::normalize_phone("+1-555-123-4567"), "15551234567");
        assert_eq!(Account::normalize_phone("(555) 123-4567"), "5551234567");
    }
}
