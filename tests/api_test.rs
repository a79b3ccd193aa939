//! Operational API tests

use actix_web::{test, web, App};
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;

use tollgate::api::routes;
use tollgate::models::{Account, AccountStatus, AccountType};
use tollgate::services::{CallRegistry, Ledger, RatingEngine};

struct TestState {
    registry: Arc<CallRegistry>,
    ledger: Arc<Ledger>,
    rating: Arc<RatingEngine>,
}

fn state() -> TestState {
    TestState {
        registry: Arc::new(CallRegistry::new()),
        ledger: Arc::new(Ledger::new()),
        rating: Arc::new(RatingEngine::new(Vec::new())),
    }
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.registry.clone()))
                .app_data(web::Data::new($state.ledger.clone()))
                .app_data(web::Data::new($state.rating.clone()))
                .configure(routes::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health_endpoint() {
    let state = state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_recharge_and_lookup() {
    let state = state();
    state.ledger.register_account(Account {
        id: 1,
        account_number: "1001".to_string(),
        account_type: AccountType::Prepaid,
        balance: dec!(5.00),
        status: AccountStatus::Active,
        ..Default::default()
    });
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/accounts/1/recharge")
        .set_json(serde_json::json!({ "amount": "10.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get().uri("/api/v1/accounts/1").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["balance"], serde_json::json!(dec!(15.00)));
}

#[actix_web::test]
async fn test_unknown_account_is_404() {
    let state = state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/v1/accounts/99").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn test_rate_card_replacement_shows_in_stats() {
    let state = state();
    let app = test_app!(state);

    let cards = serde_json::json!([{
        "id": 1,
        "destination_prefix": "51",
        "destination_name": "Peru",
        "rate_per_minute": "0.10",
        "billing_increment": 6,
        "connection_fee": "0",
        "effective_start": Utc::now().to_rfc3339(),
        "effective_end": null,
        "priority": 1
    }]);

    let req = test::TestRequest::put()
        .uri("/api/v1/rate-cards")
        .set_json(&cards)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get().uri("/api/v1/stats").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["rate_cards"], 1);
    assert_eq!(body["active_calls"], 0);
}

#[actix_web::test]
async fn test_create_account_endpoint() {
    let state = state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/accounts")
        .set_json(serde_json::json!({
            "id": 7,
            "account_number": "2002",
            "balance": "25.00"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);

    let account = state.ledger.account(7).await.unwrap();
    assert_eq!(account.balance, dec!(25.00));
    assert_eq!(account.account_type, AccountType::Prepaid);
}
