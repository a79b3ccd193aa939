// src/api/handlers.rs
use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::BillingError;
use crate::models::{Account, AccountType, RateCard};
use crate::services::{CallRegistry, Ledger, RatingEngine};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct RechargeRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub id: i64,
    pub account_number: String,
    #[serde(default)]
    pub account_type: AccountType,
    pub balance: Decimal,
    #[serde(default)]
    pub credit_limit: Decimal,
    pub max_concurrent_calls: Option<i32>,
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "tollgate".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(
    registry: web::Data<Arc<CallRegistry>>,
    ledger: web::Data<Arc<Ledger>>,
    rating: web::Data<Arc<RatingEngine>>,
) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "active_calls": registry.len(),
        "accounts": ledger.account_count(),
        "rate_cards": rating.table_len(),
    }))
}

pub async fn account(
    path: web::Path<i64>,
    ledger: web::Data<Arc<Ledger>>,
) -> Result<HttpResponse, BillingError> {
    let id = path.into_inner();
    let account = ledger
        .account(id)
        .await
        .ok_or_else(|| BillingError::AccountNotFound(id.to_string()))?;
    Ok(HttpResponse::Ok().json(account))
}

pub async fn recharge(
    path: web::Path<i64>,
    req: web::Json<RechargeRequest>,
    ledger: web::Data<Arc<Ledger>>,
) -> Result<HttpResponse, BillingError> {
    let id = path.into_inner();
    let new_balance = ledger.recharge(id, req.amount).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "account_id": id,
        "balance": new_balance,
    })))
}

pub async fn create_account(
    req: web::Json<CreateAccountRequest>,
    ledger: web::Data<Arc<Ledger>>,
) -> Result<HttpResponse, BillingError> {
    let req = req.into_inner();
    if req.account_number.is_empty() {
        return Err(BillingError::InvalidInput(
            "account_number is required".to_string(),
        ));
    }

    let id = req.id;
    let account = Account {
        id,
        account_number: req.account_number,
        account_type: req.account_type,
        balance: req.balance,
        credit_limit: req.credit_limit,
        max_concurrent_calls: req.max_concurrent_calls.unwrap_or(5),
        ..Default::default()
    };
    ledger.register_account(account);
    Ok(HttpResponse::Created().json(serde_json::json!({ "account_id": id })))
}

pub async fn replace_rate_cards(
    req: web::Json<Vec<RateCard>>,
    rating: web::Data<Arc<RatingEngine>>,
) -> HttpResponse {
    let cards = req.into_inner();
    let count = cards.len();
    rating.replace_table(cards);
    HttpResponse::Ok().json(serde_json::json!({ "rate_cards": count }))
}
