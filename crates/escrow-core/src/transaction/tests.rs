//! Tests for the transaction state machine.

use chrono::{Duration, TimeZone, Utc};

use super::state::{next_status, required_actor};
use super::{Actor, EscrowAction, Transaction, TransactionStatus, is_local_record};

fn sample_transaction() -> Transaction {
    let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
    Transaction::new(
        "rec-1",
        "TXN20260115-000042",
        "buyer-1",
        "seller-1",
        None,
        500.0,
        "helper@bank",
        "upi://pay?pa=helper@bank&am=500&cu=INR&tn=SVIP-TXN20260115-000042",
        None,
        now,
        Duration::hours(24),
    )
}

// =============================================================================
// Transition table
// =============================================================================

#[test]
fn test_happy_path_transitions() {
    use EscrowAction as A;
    use TransactionStatus as S;

    assert_eq!(
        next_status(S::PaymentPending, A::SubmitPaymentProof),
        Some(S::Paid)
    );
    assert_eq!(next_status(S::Paid, A::SubmitWork), Some(S::WorkSubmitted));
    assert_eq!(next_status(S::WorkSubmitted, A::Approve), Some(S::Approved));
    assert_eq!(next_status(S::WorkSubmitted, A::Dispute), Some(S::Disputed));
}

#[test]
fn test_status_synonyms_share_transitions() {
    use EscrowAction as A;
    use TransactionStatus as S;

    // `pending` behaves as `payment_pending`, `work_in_progress` as `paid`.
    assert_eq!(
        next_status(S::Pending, A::SubmitPaymentProof),
        Some(S::Paid)
    );
    assert_eq!(
        next_status(S::WorkInProgress, A::SubmitWork),
        Some(S::WorkSubmitted)
    );
}

#[test]
fn test_approve_and_dispute_only_from_work_submitted() {
    use EscrowAction as A;
    use TransactionStatus as S;

    for status in [
        S::Pending,
        S::PaymentPending,
        S::Paid,
        S::WorkInProgress,
        S::Approved,
        S::Released,
        S::Disputed,
        S::Cancelled,
        S::Refunded,
    ] {
        assert_eq!(next_status(status, A::Approve), None, "approve from {status}");
        assert_eq!(next_status(status, A::Dispute), None, "dispute from {status}");
    }
}

#[test]
fn test_no_transitions_out_of_terminal_statuses() {
    use EscrowAction as A;
    use TransactionStatus as S;

    for status in [S::Approved, S::Released, S::Cancelled, S::Refunded] {
        for action in [
            A::SubmitPaymentProof,
            A::SubmitWork,
            A::Approve,
            A::Dispute,
            A::Cancel,
        ] {
            assert_eq!(next_status(status, action), None, "{action} from {status}");
        }
    }
}

#[test]
fn test_cancel_from_any_non_terminal_status() {
    use EscrowAction as A;
    use TransactionStatus as S;

    for status in [
        S::Pending,
        S::PaymentPending,
        S::Paid,
        S::WorkInProgress,
        S::WorkSubmitted,
    ] {
        assert_eq!(next_status(status, A::Cancel), Some(S::Cancelled));
    }
    // Disputed awaits external resolution and cannot be cancelled here.
    assert_eq!(next_status(S::Disputed, A::Cancel), None);
}

#[test]
fn test_required_actor_table() {
    use EscrowAction as A;

    assert_eq!(required_actor(A::Initiate), Some(Actor::Buyer));
    assert_eq!(required_actor(A::SubmitPaymentProof), Some(Actor::Buyer));
    assert_eq!(required_actor(A::SubmitWork), Some(Actor::Seller));
    assert_eq!(required_actor(A::Approve), Some(Actor::Buyer));
    assert_eq!(required_actor(A::Dispute), Some(Actor::Buyer));
    assert_eq!(required_actor(A::Cancel), None);
}

// =============================================================================
// Status predicates
// =============================================================================

#[test]
fn test_terminal_statuses() {
    use TransactionStatus as S;

    for status in [S::Approved, S::Released, S::Cancelled, S::Refunded] {
        assert!(status.is_terminal());
    }
    for status in [
        S::Pending,
        S::PaymentPending,
        S::Paid,
        S::WorkInProgress,
        S::WorkSubmitted,
        S::Disputed,
    ] {
        assert!(!status.is_terminal());
    }
}

#[test]
fn test_status_round_trips_through_storage_form() {
    use TransactionStatus as S;

    for status in [
        S::Pending,
        S::PaymentPending,
        S::Paid,
        S::WorkInProgress,
        S::WorkSubmitted,
        S::Approved,
        S::Released,
        S::Disputed,
        S::Cancelled,
        S::Refunded,
    ] {
        let parsed: S = status.as_str().parse().unwrap();
        assert_eq!(parsed, status);
    }
    assert!("banana".parse::<S>().is_err());
}

// =============================================================================
// Transaction entity
// =============================================================================

#[test]
fn test_new_transaction_starts_payment_pending_with_expiry() {
    let txn = sample_transaction();

    assert_eq!(txn.status, TransactionStatus::PaymentPending);
    assert_eq!(txn.expires_at - txn.created_at, Duration::hours(24));
    assert!(!txn.buyer_approval);
    assert!(txn.work_files.is_empty());
}

#[test]
fn test_role_of_parties() {
    let txn = sample_transaction();

    assert_eq!(txn.role_of("buyer-1"), Some(Actor::Buyer));
    assert_eq!(txn.role_of("seller-1"), Some(Actor::Seller));
    assert_eq!(txn.role_of("stranger"), None);
    assert!(txn.is_party("buyer-1"));
    assert!(!txn.is_party("stranger"));
}

#[test]
fn test_expiry_only_applies_during_payment_phase() {
    let mut txn = sample_transaction();
    let past_deadline = txn.expires_at + Duration::minutes(1);

    assert!(txn.is_expired(past_deadline));
    assert!(!txn.is_expired(txn.expires_at));

    txn.status = TransactionStatus::Paid;
    assert!(!txn.is_expired(past_deadline));
}

#[test]
fn test_local_record_detection() {
    assert!(is_local_record("local-1737000000000"));
    assert!(!is_local_record("rec-1"));

    let mut txn = sample_transaction();
    assert!(!txn.is_local());
    txn.record_id = "local-9".to_string();
    assert!(txn.is_local());
}
