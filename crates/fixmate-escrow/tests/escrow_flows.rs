//! # Escrow Engine Scenarios
//!
//! Intent creation, capture, release, refunds and processor webhooks against
//! the in-memory ledger and the scripted gateway.

mod common;

use chrono::Duration;
use common::*;
use fixmate_core::{ChargeId, ConnectedAccountId, ErrorKind, JobId, PaymentId, TransferId, Uid};
use fixmate_escrow::escrow_engine::CreateIntentInput;
use fixmate_escrow::testing::{GatewayCall, RecordingSink, ScriptedGateway};
use fixmate_escrow::{
    Actor, GatewayError, LedgerStore, OpenDisputeInput, PaymentStatus, ProcessorEvent,
    TransferStatus, WebhookOutcome,
};
use rust_decimal_macros::dec;

fn intent_input(amount: rust_decimal::Decimal) -> CreateIntentInput {
    CreateIntentInput {
        job_id: JobId::new(JOB),
        customer_uid: Uid::new(CUSTOMER),
        amount: money(amount),
        currency: "EUR".to_string(),
        connected_account_id: Some(ConnectedAccountId::new(ACCOUNT)),
    }
}

fn captured_event(payment_id: &PaymentId) -> ProcessorEvent {
    ProcessorEvent::PaymentIntentSucceeded {
        event_id: "evt_capture_1".into(),
        payment_id: payment_id.clone(),
        charge_id: Some(ChargeId::new("ch_1")),
    }
}

// -- Intent Creation ----------------------------------------------------------

#[tokio::test]
async fn test_create_payment_intent_records_pending_payment() {
    let h = Harness::new();
    let created = h
        .escrow
        .create_payment_intent(Some(&customer()), intent_input(dec!(120.00)))
        .await
        .unwrap();
    assert!(created.client_secret.starts_with(created.payment_id.as_str()));

    let payment = h.payment(created.payment_id.as_str()).await;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount_gross, money(dec!(120)));
    assert_eq!(payment.currency, "eur");
    assert_eq!(payment.connected_account_id, Some(ConnectedAccountId::new(ACCOUNT)));

    match &h.gateway.calls()[0] {
        GatewayCall::Intent(req) => {
            assert_eq!(req.amount_minor, 12000);
            assert_eq!(req.idempotency_key, "intent:job-1:cust-1:12000");
        }
        other => panic!("unexpected call {other:?}"),
    }
    assert!(h.sink.event_names().contains(&"payment_intent_created"));
}

#[tokio::test]
async fn test_create_payment_intent_requires_authentication() {
    let h = Harness::new();
    let err = h
        .escrow
        .create_payment_intent(None, intent_input(dec!(20)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_create_payment_intent_rejects_amount_below_minimum() {
    let h = Harness::new();
    let err = h
        .escrow
        .create_payment_intent(Some(&customer()), intent_input(dec!(0.49)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(h.gateway.calls().is_empty());

    h.escrow
        .create_payment_intent(Some(&customer()), intent_input(dec!(0.50)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_payment_intent_rejects_unrepresentable_amount() {
    let h = Harness::new();
    let huge: fixmate_core::Money = "79228162514264337593543950335".parse().unwrap();
    let mut input = intent_input(dec!(20));
    input.amount = huge;
    input.job_id = JobId::new("no-such-job");
    let err = h
        .escrow
        .create_payment_intent(Some(&customer()), input)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(h.gateway.calls().is_empty());

    let err = h
        .escrow
        .create_payment_intent(Some(&customer()), intent_input(dec!(1000000.00)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(h.gateway.calls().is_empty());

    h.escrow
        .create_payment_intent(Some(&customer()), intent_input(dec!(999999.99)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_payment_intent_rejects_bad_currency() {
    let h = Harness::new();
    let mut input = intent_input(dec!(20));
    input.currency = "euro".into();
    let err = h
        .escrow
        .create_payment_intent(Some(&customer()), input)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_create_payment_intent_for_someone_else_is_denied() {
    let h = Harness::new();
    let err = h
        .escrow
        .create_payment_intent(Some(&stranger()), intent_input(dec!(20)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.seed_job("job-2", "other-customer", None);
    let mut input = intent_input(dec!(20));
    input.job_id = JobId::new("job-2");
    let err = h
        .escrow
        .create_payment_intent(Some(&customer()), input)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_create_payment_intent_unknown_job_is_not_found() {
    let h = Harness::new();
    let mut input = intent_input(dec!(20));
    input.job_id = JobId::new("job-missing");
    let err = h
        .escrow
        .create_payment_intent(Some(&customer()), input)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_gateway_failure_leaves_no_payment() {
    let h = Harness::new();
    h.gateway.fail_next(GatewayError::Transport {
        endpoint: "POST /v1/payment_intents".into(),
        message: "connection reset".into(),
    });
    let err = h
        .escrow
        .create_payment_intent(Some(&customer()), intent_input(dec!(20)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(h
        .ledger
        .get_payment(&PaymentId::new("pi_test_1"))
        .await
        .unwrap()
        .is_none());
}

// -- Capture Webhook ----------------------------------------------------------

#[tokio::test]
async fn test_capture_webhook_is_idempotent() {
    let h = Harness::new();
    let created = h
        .escrow
        .create_payment_intent(Some(&customer()), intent_input(dec!(80)))
        .await
        .unwrap();

    let first = h.escrow.handle_event(captured_event(&created.payment_id)).await.unwrap();
    assert_eq!(first, WebhookOutcome::Applied);
    let payment = h.payment(created.payment_id.as_str()).await;
    assert_eq!(payment.status, PaymentStatus::Captured);
    assert_eq!(payment.charge_id, Some(ChargeId::new("ch_1")));
    assert_eq!(
        payment.escrow_hold_until,
        Some(h.now().plus(h.policy.escrow_hold))
    );
    let job = h.job_doc(JOB);
    assert_eq!(job["status"], "assigned");
    assert_eq!(job["paymentStatus"], "captured");

    h.clock.advance(Duration::minutes(5));
    let second = h.escrow.handle_event(captured_event(&created.payment_id)).await.unwrap();
    assert_eq!(second, WebhookOutcome::Ignored);
    assert_eq!(h.payment(created.payment_id.as_str()).await, payment);
    assert_eq!(h.job_doc(JOB), job);
    let captured_events = h
        .sink
        .event_names()
        .into_iter()
        .filter(|n| *n == "payment_captured")
        .count();
    assert_eq!(captured_events, 1);
}

#[tokio::test]
async fn test_capture_for_unknown_payment_is_ignored() {
    let h = Harness::new();
    let before = h.job_doc(JOB);
    let outcome = h
        .escrow
        .handle_event(captured_event(&PaymentId::new("pi_unknown")))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
    assert_eq!(h.job_doc(JOB), before);
    assert!(h.sink.events().is_empty());
}

// -- Release ------------------------------------------------------------------

#[tokio::test]
async fn test_auto_release_after_hold_creates_transfer() {
    let h = Harness::new();
    h.seed_due("pi_a", dec!(100.00));

    let receipt = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_a"), false)
        .await
        .unwrap();
    assert_eq!(receipt.platform_fee, money(dec!(10.00)));
    assert_eq!(receipt.amount_net, money(dec!(90.00)));

    let payment = h.payment("pi_a").await;
    assert_eq!(payment.status, PaymentStatus::Transferred);
    assert_eq!(payment.transfer_id, Some(receipt.transfer_id.clone()));
    assert_eq!(payment.platform_fee, Some(money(dec!(10))));
    assert_eq!(payment.pro_uid, Some(Uid::new(PRO)));

    let transfer = h.ledger.get_transfer(&receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);
    assert_eq!(transfer.amount_net, money(dec!(90)));
    assert!(!transfer.manual_release);

    let sent = h.gateway.transfers();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].amount_minor, 9000);
    assert_eq!(sent[0].destination, ConnectedAccountId::new(ACCOUNT));
    assert_eq!(sent[0].idempotency_key, "transfer:pi_a");

    assert_eq!(h.job_doc(JOB)["paymentStatus"], "transferred");
    let notes = h.sink.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].recipient, Uid::new(PRO));
}

#[tokio::test]
async fn test_auto_release_before_hold_fails_without_gateway_call() {
    let h = Harness::new();
    h.seed_captured("pi_early", dec!(100), h.now().minus(Duration::days(1)));
    let err = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_early"), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_auto_release_exactly_at_hold_is_permitted() {
    let h = Harness::new();
    let captured_at = h.now().minus(h.policy.escrow_hold);
    h.seed_captured("pi_edge", dec!(50), captured_at);
    h.escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_edge"), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_release_of_pending_or_transferred_payment_fails_precondition() {
    let h = Harness::new();
    h.seed_pending("pi_pending", dec!(100));
    let err = h
        .escrow
        .release_transfer(&Actor::User(customer()), &PaymentId::new("pi_pending"), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert!(h.gateway.calls().is_empty());

    h.seed_due("pi_done", dec!(100));
    h.escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_done"), false)
        .await
        .unwrap();
    let calls_after_first = h.gateway.calls().len();
    let err = h
        .escrow
        .release_transfer(&Actor::User(customer()), &PaymentId::new("pi_done"), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert_eq!(h.gateway.calls().len(), calls_after_first);
}

#[tokio::test]
async fn test_release_of_missing_payment_is_not_found() {
    let h = Harness::new();
    let err = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_nope"), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_manual_release_by_other_user_is_denied_regardless_of_timer() {
    let h = Harness::new();
    h.seed_captured("pi_held", dec!(100), h.now());
    h.seed_captured_on("job-2", "pi_due", dec!(100), h.now().minus(Duration::days(30)));
    h.seed_job("job-2", CUSTOMER, Some(PRO));

    for id in ["pi_held", "pi_due"] {
        for caller in [stranger(), pro(), admin()] {
            let err = h
                .escrow
                .release_transfer(&Actor::User(caller), &PaymentId::new(id), true)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        }
    }
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_manual_release_by_customer_ignores_hold() {
    let h = Harness::new();
    h.seed_captured("pi_m", dec!(100), h.now());
    let receipt = h
        .escrow
        .release_transfer(&Actor::User(customer()), &PaymentId::new("pi_m"), true)
        .await
        .unwrap();
    let transfer = h.ledger.get_transfer(&receipt.transfer_id).await.unwrap().unwrap();
    assert!(transfer.manual_release);
}

#[tokio::test]
async fn test_automatic_release_by_plain_user_is_denied() {
    let h = Harness::new();
    h.seed_due("pi_a", dec!(100));
    let err = h
        .escrow
        .release_transfer(&Actor::User(customer()), &PaymentId::new("pi_a"), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.escrow
        .release_transfer(&Actor::User(admin()), &PaymentId::new("pi_a"), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_release_is_frozen_by_active_dispute() {
    let h = Harness::new();
    h.seed_captured("pi_d", dec!(100), h.now().minus(Duration::days(1)));
    h.disputes
        .open_dispute(
            Some(&customer()),
            OpenDisputeInput {
                job_id: JobId::new(JOB),
                payment_id: PaymentId::new("pi_d"),
                reason: "poor_quality".into(),
                description: "Leaking tap".into(),
                requested_amount: money(dec!(30)),
                media_paths: vec![],
            },
        )
        .await
        .unwrap();

    let err = h
        .escrow
        .release_transfer(&Actor::User(customer()), &PaymentId::new("pi_d"), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert!(err.to_string().contains("frozen"));
    assert!(h.gateway.transfers().is_empty());
}

#[tokio::test]
async fn test_release_requires_connected_account() {
    let h = Harness::new();
    let mut payment = h.seed_due("pi_na", dec!(100));
    payment.connected_account_id = None;
    h.ledger.put_payment(payment);
    let err = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_na"), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn test_release_blocked_when_payouts_disabled() {
    let h = Harness::new();
    h.seed_due("pi_p", dec!(100));
    let outcome = h
        .escrow
        .handle_event(ProcessorEvent::AccountUpdated {
            event_id: "evt_acct".into(),
            account_id: ConnectedAccountId::new(ACCOUNT),
            charges_enabled: true,
            payouts_enabled: false,
        })
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    let err = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_p"), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

    h.escrow
        .handle_account_updated(&ConnectedAccountId::new(ACCOUNT), true, true)
        .await
        .unwrap();
    h.escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_p"), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_release_after_partial_refund_releases_remainder() {
    let h = Harness::new();
    h.seed_due("pi_r", dec!(100));
    h.escrow
        .partial_refund(Some(&customer()), &PaymentId::new("pi_r"), money(dec!(40)), None)
        .await
        .unwrap();
    let receipt = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_r"), false)
        .await
        .unwrap();
    assert_eq!(receipt.platform_fee, money(dec!(6)));
    assert_eq!(receipt.amount_net, money(dec!(54)));
}

#[tokio::test]
async fn test_fully_refunded_payment_cannot_be_released() {
    let h = Harness::new();
    h.seed_due("pi_f", dec!(100));
    h.escrow
        .partial_refund(Some(&customer()), &PaymentId::new("pi_f"), money(dec!(100)), None)
        .await
        .unwrap();
    let err = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_f"), false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert!(h.gateway.transfers().is_empty());
}

// -- Refunds ------------------------------------------------------------------

#[tokio::test]
async fn test_refund_above_gross_is_invalid_without_gateway_call() {
    let h = Harness::new();
    h.seed_captured("pi_x", dec!(100), h.now());
    let err = h
        .escrow
        .partial_refund(Some(&customer()), &PaymentId::new("pi_x"), money(dec!(150)), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_refund_of_zero_is_invalid() {
    let h = Harness::new();
    h.seed_captured("pi_x", dec!(100), h.now());
    let err = h
        .escrow
        .partial_refund(Some(&customer()), &PaymentId::new("pi_x"), money(dec!(0)), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_refund_of_pending_payment_fails_precondition() {
    let h = Harness::new();
    h.seed_pending("pi_pend", dec!(100));
    let err = h
        .escrow
        .partial_refund(Some(&customer()), &PaymentId::new("pi_pend"), money(dec!(10)), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn test_refund_authorization() {
    let h = Harness::new();
    h.seed_captured("pi_auth", dec!(100), h.now());
    let id = PaymentId::new("pi_auth");

    let err = h
        .escrow
        .partial_refund(Some(&stranger()), &id, money(dec!(10)), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = h
        .escrow
        .partial_refund(None, &id, money(dec!(10)), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    let receipt = h
        .escrow
        .partial_refund(Some(&admin()), &id, money(dec!(10)), Some("goodwill".into()))
        .await
        .unwrap();
    assert_eq!(receipt.amount, money(dec!(10)));
    assert_eq!(receipt.currency, "eur");
}

#[tokio::test]
async fn test_refunds_accumulate_without_status_change() {
    let h = Harness::new();
    h.seed_captured("pi_acc", dec!(100), h.now());
    let id = PaymentId::new("pi_acc");
    h.escrow
        .partial_refund(Some(&customer()), &id, money(dec!(25)), Some("  ".into()))
        .await
        .unwrap();
    h.escrow
        .partial_refund(Some(&customer()), &id, money(dec!(25)), None)
        .await
        .unwrap();

    let payment = h.payment("pi_acc").await;
    assert_eq!(payment.status, PaymentStatus::Captured);
    assert_eq!(payment.refunds_issued, money(dec!(50)));
    assert_eq!(payment.refund_count, 2);

    let keys: Vec<String> = h
        .gateway
        .refunds()
        .into_iter()
        .map(|r| r.idempotency_key)
        .collect();
    assert_eq!(keys, vec!["refund:pi_acc:1", "refund:pi_acc:2"]);

    let refunds = h.ledger.list_refunds(&id).await.unwrap();
    assert_eq!(refunds.len(), 2);
    assert!(refunds.iter().all(|r| r.reason.is_none()));

    let err = h
        .escrow
        .partial_refund(Some(&customer()), &id, money(dec!(50.01)), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// -- Transfer and Refund Webhooks ---------------------------------------------

#[tokio::test]
async fn test_transfer_webhook_completes_once() {
    let h = Harness::new();
    h.seed_due("pi_t", dec!(100));
    let receipt = h
        .escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_t"), false)
        .await
        .unwrap();
    let event = ProcessorEvent::TransferCreated {
        event_id: "evt_tr".into(),
        transfer_id: receipt.transfer_id.clone(),
    };

    h.clock.advance(Duration::minutes(1));
    assert_eq!(h.escrow.handle_event(event.clone()).await.unwrap(), WebhookOutcome::Applied);
    let transfer = h.ledger.get_transfer(&receipt.transfer_id).await.unwrap().unwrap();
    assert_eq!(transfer.status, TransferStatus::Completed);
    assert_eq!(transfer.completed_at, Some(h.now()));

    assert_eq!(h.escrow.handle_event(event).await.unwrap(), WebhookOutcome::Ignored);
    let released = h
        .sink
        .event_names()
        .into_iter()
        .filter(|n| *n == "payment_released")
        .count();
    assert_eq!(released, 1);
}

#[tokio::test]
async fn test_transfer_webhook_for_unknown_transfer_is_ignored() {
    let h = Harness::new();
    let outcome = h
        .escrow
        .handle_transfer_created(&TransferId::new("tr_unknown"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn test_charge_refunded_webhook_tracks_cumulative_total() {
    let h = Harness::new();
    h.seed_captured("pi_cr", dec!(100), h.now());
    let event = |total: i64| ProcessorEvent::ChargeRefunded {
        event_id: format!("evt_{total}"),
        charge_id: ChargeId::new("ch_pi_cr"),
        payment_id: None,
        amount_refunded_minor: total,
    };

    assert_eq!(h.escrow.handle_event(event(3000)).await.unwrap(), WebhookOutcome::Applied);
    assert_eq!(h.payment("pi_cr").await.total_refunded, money(dec!(30)));

    assert_eq!(h.escrow.handle_event(event(3000)).await.unwrap(), WebhookOutcome::Ignored);
    assert_eq!(h.escrow.handle_event(event(4500)).await.unwrap(), WebhookOutcome::Applied);
    let payment = h.payment("pi_cr").await;
    assert_eq!(payment.total_refunded, money(dec!(45)));
    assert_eq!(payment.status, PaymentStatus::Captured);

    let deltas: Vec<serde_json::Value> = h
        .sink
        .events()
        .into_iter()
        .filter(|e| e.name == "payment_refunded")
        .map(|e| e.props["amount"].clone())
        .collect();
    assert_eq!(deltas, vec![serde_json::json!("30.00"), serde_json::json!("15.00")]);
}

#[tokio::test]
async fn test_charge_refunded_falls_back_to_payment_id() {
    let h = Harness::new();
    let mut payment = h.seed_captured("pi_nc", dec!(100), h.now());
    payment.charge_id = None;
    h.ledger.put_payment(payment);
    let outcome = h
        .escrow
        .handle_charge_refunded(&ChargeId::new("ch_other"), Some(&PaymentId::new("pi_nc")), 1000)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    let outcome = h
        .escrow
        .handle_charge_refunded(&ChargeId::new("ch_ghost"), None, 1000)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn test_unknown_event_is_ignored() {
    let h = Harness::new();
    let outcome = h
        .escrow
        .handle_event(ProcessorEvent::Unknown {
            event_id: "evt_x".into(),
            event_type: "customer.created".into(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn test_receive_webhook_verifies_signature_before_dispatch() {
    let h = Harness::new();
    h.seed_pending("pi_w", dec!(100));
    let payload = serde_json::to_vec(&captured_event(&PaymentId::new("pi_w"))).unwrap();

    let err = h.escrow.receive_webhook(&payload, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    let err = h
        .escrow
        .receive_webhook(&payload, Some("t=0,v1=forged"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert_eq!(h.payment("pi_w").await.status, PaymentStatus::Pending);

    let err = h
        .escrow
        .receive_webhook(b"not json", Some(ScriptedGateway::SIGNATURE))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let outcome = h
        .escrow
        .receive_webhook(&payload, Some(ScriptedGateway::SIGNATURE))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);
    assert_eq!(h.payment("pi_w").await.status, PaymentStatus::Captured);
}

// -- Auto-Release Sweep -------------------------------------------------------

#[tokio::test]
async fn test_release_sweep_releases_due_and_skips_frozen() {
    let h = Harness::new();
    h.seed_job("job-2", CUSTOMER, Some(PRO));
    h.seed_job("job-3", CUSTOMER, Some(PRO));
    let due_at = h.now().minus(h.policy.escrow_hold).minus(Duration::seconds(1));

    h.seed_captured_on("job-2", "pi_due", dec!(100), due_at);
    h.seed_captured_on("job-3", "pi_frozen", dec!(100), due_at);
    h.seed_captured("pi_held", dec!(100), h.now());

    // Open the dispute while the window is still open.
    h.clock.set(due_at.plus(Duration::hours(1)));
    h.disputes
        .open_dispute(
            Some(&customer()),
            OpenDisputeInput {
                job_id: JobId::new("job-3"),
                payment_id: PaymentId::new("pi_frozen"),
                reason: "incomplete".into(),
                description: String::new(),
                requested_amount: money(dec!(10)),
                media_paths: vec![],
            },
        )
        .await
        .unwrap();
    h.clock.set(due_at.plus(h.policy.escrow_hold).plus(Duration::seconds(2)));

    let report = h.escrow.release_due_payments().await.unwrap();
    assert_eq!(report.released, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(h.payment("pi_due").await.status, PaymentStatus::Transferred);
    assert_eq!(h.payment("pi_frozen").await.status, PaymentStatus::Captured);
    assert_eq!(h.payment("pi_held").await.status, PaymentStatus::Captured);
}

#[tokio::test]
async fn test_release_sweep_counts_gateway_failures_and_continues() {
    let h = Harness::new();
    h.seed_job("job-2", CUSTOMER, Some(PRO));
    let due_at = h.now().minus(h.policy.escrow_hold).minus(Duration::seconds(5));
    h.seed_captured("pi_1", dec!(100), due_at);
    h.seed_captured_on("job-2", "pi_2", dec!(100), due_at.plus(Duration::seconds(1)));
    h.gateway.fail_next(GatewayError::Rejected {
        endpoint: "POST /v1/transfers".into(),
        status: 503,
        body: String::new(),
    });

    let report = h.escrow.release_due_payments().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.released, 1);
}

// -- Side Effects and Reads ---------------------------------------------------

#[tokio::test]
async fn test_sink_failures_do_not_fail_transitions() {
    let h = Harness::with_sink(RecordingSink::failing());
    h.seed_due("pi_s", dec!(100));
    h.escrow
        .release_transfer(&Actor::System, &PaymentId::new("pi_s"), false)
        .await
        .unwrap();
    assert_eq!(h.payment("pi_s").await.status, PaymentStatus::Transferred);
    assert!(!h.sink.notifications().is_empty());
}

#[tokio::test]
async fn test_get_payment_visibility() {
    let h = Harness::new();
    h.seed_due("pi_v", dec!(100));
    h.escrow
        .partial_refund(Some(&customer()), &PaymentId::new("pi_v"), money(dec!(5)), None)
        .await
        .unwrap();
    let id = PaymentId::new("pi_v");

    let details = h.escrow.get_payment(Some(&customer()), &id).await.unwrap();
    assert_eq!(details.refunds.len(), 1);
    assert!(details.transfer.is_none());
    h.escrow.get_payment(Some(&pro()), &id).await.unwrap();
    h.escrow.get_payment(Some(&admin()), &id).await.unwrap();

    let err = h.escrow.get_payment(Some(&stranger()), &id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    let err = h
        .escrow
        .get_payment(Some(&customer()), &PaymentId::new("pi_missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
