//! End-to-end lifecycle tests: synthetic switch events driven through the
//! event handler, settling against the in-process ledger.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use tollgate::esl::{EngineServices, EslEvent, EslFrame, EventHandler};
use tollgate::models::{
    Account, AccountStatus, AccountType, CallState, RateCard, ReservationStatus,
};
use tollgate::services::{CallRegistry, CdrGenerator, HangupFacts, Ledger, RatingEngine};

fn lifecycle_event(fields: &[(&str, &str)]) -> EslEvent {
    EslEvent::new(EslFrame {
        headers: vec![(
            "Content-Type".to_string(),
            "text/event-plain".to_string(),
        )],
        body: Some(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
    })
}

fn test_account(balance: Decimal) -> Account {
    Account {
        id: 1,
        account_number: "1001".to_string(),
        account_type: AccountType::Prepaid,
        balance,
        status: AccountStatus::Active,
        max_concurrent_calls: 5,
        ..Default::default()
    }
}

fn peru_card() -> RateCard {
    RateCard {
        id: 1,
        destination_prefix: "51".to_string(),
        destination_name: "Peru".to_string(),
        rate_per_minute: dec!(0.10),
        billing_increment: 6,
        connection_fee: dec!(0.00),
        // far enough back to cover the synthetic event timestamps
        effective_start: Utc::now() - chrono::Duration::days(3650),
        effective_end: None,
        priority: 1,
    }
}

struct Engine {
    services: EngineServices,
    handler: EventHandler,
}

fn engine_with(balance: Decimal, cards: Vec<RateCard>) -> Engine {
    let registry = Arc::new(CallRegistry::new());
    let ledger = Arc::new(Ledger::new());
    ledger.register_account(test_account(balance));
    let rating = Arc::new(RatingEngine::new(cards));
    let cdr = Arc::new(CdrGenerator::new(ledger.clone(), rating.clone(), None));

    let services = EngineServices {
        registry,
        ledger,
        rating,
        cdr,
        gateway: None,
    };
    let handler = EventHandler::new("fs-test:8021".to_string(), services.clone(), None);
    Engine { services, handler }
}

fn create_event(uuid: &str) -> EslEvent {
    lifecycle_event(&[
        ("Event-Name", "CHANNEL_CREATE"),
        ("Unique-ID", uuid),
        ("Caller-Caller-ID-Number", "1001"),
        ("Caller-Destination-Number", "51999888777"),
        ("Call-Direction", "outbound"),
        ("Caller-Channel-Created-Time", "1700000000000000"),
    ])
}

fn answer_event(uuid: &str) -> EslEvent {
    lifecycle_event(&[
        ("Event-Name", "CHANNEL_ANSWER"),
        ("Unique-ID", uuid),
        ("Caller-Channel-Answered-Time", "1700000005000000"),
    ])
}

fn hangup_event(uuid: &str, duration: &str, billsec: &str) -> EslEvent {
    lifecycle_event(&[
        ("Event-Name", "CHANNEL_HANGUP_COMPLETE"),
        ("Unique-ID", uuid),
        ("variable_duration", duration),
        ("variable_billsec", billsec),
        ("Hangup-Cause", "NORMAL_CLEARING"),
        ("Caller-Channel-Created-Time", "1700000000000000"),
        ("Caller-Channel-Hangup-Time", "1700000066000000"),
    ])
}

#[tokio::test]
async fn full_call_lifecycle_settles_and_clears() {
    let engine = engine_with(dec!(10.00), vec![peru_card()]);

    engine.handler.handle_event(&create_event("u1")).await;

    // authorized: tracked and holding balance
    let call = engine.services.registry.get("u1").unwrap();
    assert_eq!(call.state, CallState::Ringing);
    assert!(engine.services.ledger.has_active_reservation("u1"));

    engine.handler.handle_event(&answer_event("u1")).await;
    assert_eq!(
        engine.services.registry.get("u1").unwrap().state,
        CallState::Answered
    );

    // 61 billable seconds round up to 66 at the 6s increment: 0.11
    engine.handler.handle_event(&hangup_event("u1", "66", "61")).await;

    assert!(engine.services.registry.get("u1").is_none());
    assert!(!engine.services.ledger.has_active_reservation("u1"));

    let account = engine.services.ledger.account(1).await.unwrap();
    assert_eq!(account.balance, dec!(9.89));

    let res = engine.services.ledger.reservation(1, "u1").await.unwrap();
    assert_eq!(res.status, ReservationStatus::Committed);
    assert_eq!(res.reserved_amount, res.consumed_amount + res.released_amount);

    assert_eq!(
        engine.services.ledger.verify_reconciliation(1).await,
        Some(true)
    );
}

#[tokio::test]
async fn duplicate_create_merges_and_keeps_reservation() {
    let engine = engine_with(dec!(10.00), vec![peru_card()]);

    engine.handler.handle_event(&create_event("u1")).await;
    engine.handler.handle_event(&create_event("u1")).await;

    // one record, one hold, call still alive
    assert_eq!(engine.services.registry.len(), 1);
    assert!(engine.services.ledger.has_active_reservation("u1"));
}

#[tokio::test]
async fn duplicate_hangup_is_a_no_op() {
    let engine = engine_with(dec!(10.00), vec![peru_card()]);

    engine.handler.handle_event(&create_event("u1")).await;
    engine.handler.handle_event(&answer_event("u1")).await;
    engine.handler.handle_event(&hangup_event("u1", "66", "61")).await;
    let balance_after_first = engine.services.ledger.account(1).await.unwrap().balance;

    engine.handler.handle_event(&hangup_event("u1", "66", "61")).await;

    assert_eq!(
        engine.services.ledger.account(1).await.unwrap().balance,
        balance_after_first
    );
    assert_eq!(engine.services.ledger.transactions(1).await.len(), 1);
}

#[tokio::test]
async fn unanswered_call_releases_hold_without_charge() {
    let engine = engine_with(dec!(10.00), vec![peru_card()]);

    engine.handler.handle_event(&create_event("u1")).await;
    engine.handler.handle_event(&hangup_event("u1", "30", "0")).await;

    let account = engine.services.ledger.account(1).await.unwrap();
    assert_eq!(account.balance, dec!(10.00));

    let res = engine.services.ledger.reservation(1, "u1").await.unwrap();
    assert_eq!(res.status, ReservationStatus::Released);
    assert!(engine.services.ledger.transactions(1).await.is_empty());
}

#[tokio::test]
async fn insufficient_balance_denies_and_tracks_nothing() {
    let engine = engine_with(dec!(0.10), vec![peru_card()]);

    engine.handler.handle_event(&create_event("u1")).await;

    assert!(engine.services.registry.is_empty());
    assert!(!engine.services.ledger.has_active_reservation("u1"));
    assert_eq!(
        engine.services.ledger.account(1).await.unwrap().balance,
        dec!(0.10)
    );
}

#[tokio::test]
async fn unrated_destination_is_denied_for_outbound() {
    // table has no card matching the dialed number
    let engine = engine_with(dec!(10.00), vec![]);

    engine.handler.handle_event(&create_event("u1")).await;

    assert!(engine.services.registry.is_empty());
    assert!(!engine.services.ledger.has_active_reservation("u1"));
}

#[tokio::test]
async fn inbound_call_is_tracked_but_never_billed() {
    let engine = engine_with(dec!(10.00), vec![peru_card()]);

    let create = lifecycle_event(&[
        ("Event-Name", "CHANNEL_CREATE"),
        ("Unique-ID", "in1"),
        ("Caller-Caller-ID-Number", "51999888777"),
        ("Caller-Destination-Number", "1001"),
        ("Call-Direction", "inbound"),
    ]);
    engine.handler.handle_event(&create).await;

    assert_eq!(engine.services.registry.len(), 1);
    assert!(!engine.services.ledger.has_active_reservation("in1"));

    let hangup = lifecycle_event(&[
        ("Event-Name", "CHANNEL_HANGUP"),
        ("Unique-ID", "in1"),
        ("variable_duration", "120"),
        ("variable_billsec", "115"),
        ("Hangup-Cause", "NORMAL_CLEARING"),
    ]);
    engine.handler.handle_event(&hangup).await;

    assert!(engine.services.registry.is_empty());
    assert_eq!(
        engine.services.ledger.account(1).await.unwrap().balance,
        dec!(10.00)
    );
}

#[tokio::test]
async fn unknown_event_kinds_are_ignored() {
    let engine = engine_with(dec!(10.00), vec![peru_card()]);

    let heartbeat = lifecycle_event(&[("Event-Name", "HEARTBEAT"), ("Unique-ID", "x")]);
    engine.handler.handle_event(&heartbeat).await;

    assert!(engine.services.registry.is_empty());
}

#[tokio::test]
async fn cdr_generator_prices_from_matched_card() {
    let ledger = Arc::new(Ledger::new());
    ledger.register_account(test_account(dec!(10.00)));
    let rating = Arc::new(RatingEngine::new(vec![peru_card()]));
    let generator = CdrGenerator::new(ledger.clone(), rating.clone(), None);

    ledger
        .reserve(1, "u1", dec!(0.54), 2700, dec!(0.10))
        .await
        .unwrap();

    let now = Utc::now();
    let cdr = generator
        .generate(HangupFacts {
            call_id: "u1".to_string(),
            calling_number: "1001".to_string(),
            called_number: "51999888777".to_string(),
            start_time: now - chrono::Duration::seconds(66),
            answer_time: Some(now - chrono::Duration::seconds(61)),
            end_time: now,
            duration: 66,
            billsec: 61,
            hangup_cause: "NORMAL_CLEARING".to_string(),
            direction: tollgate::models::CallDirection::Outbound,
        })
        .await;

    assert_eq!(cdr.cost, dec!(0.11));
    assert_eq!(cdr.account_id, Some(1));
    assert_eq!(cdr.rate_id, Some(1));
    assert_eq!(cdr.rate_per_minute, Some(dec!(0.10)));
    assert!(cdr.was_answered());
    assert_eq!(ledger.account(1).await.unwrap().balance, dec!(9.89));
}
