//! Tests for the persistence boundary.

use chrono::{Duration, Utc};

use super::artifacts::{
    ArtifactStore, FallbackArtifactStore, FsArtifactStore, payment_proof_path, work_file_path,
};
use super::fallback::FallbackStore;
use super::memory::{InMemoryStore, UnprovisionedStore};
use super::sqlite::SqliteTransactionStore;
use super::{StoreError, TransactionPatch, TransactionStore};
use crate::transaction::{Transaction, TransactionStatus};

fn sample(buyer: &str, seller: &str, txn_id: &str) -> Transaction {
    Transaction::new(
        "",
        txn_id,
        buyer,
        seller,
        None,
        500.0,
        "helper@bank",
        format!("upi://pay?pa=helper@bank&am=500&cu=INR&tn=SVIP-{txn_id}"),
        None,
        Utc::now(),
        Duration::hours(24),
    )
}

fn stores() -> Vec<(&'static str, Box<dyn TransactionStore>)> {
    vec![
        ("memory", Box::new(InMemoryStore::new())),
        (
            "sqlite",
            Box::new(SqliteTransactionStore::in_memory().unwrap()),
        ),
    ]
}

// =============================================================================
// Backend contract (memory + sqlite)
// =============================================================================

#[test]
fn test_create_assigns_record_id_and_get_round_trips() {
    for (name, store) in stores() {
        let created = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();
        assert!(!created.record_id.is_empty(), "{name}");

        let fetched = store.get(&created.record_id).unwrap().unwrap();
        assert_eq!(fetched, created, "{name}");
        assert!(store.get("rec-nope").unwrap().is_none(), "{name}");
    }
}

#[test]
fn test_create_rejects_duplicate_transaction_id() {
    for (name, store) in stores() {
        store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();
        let result = store.create(&sample("buyer-2", "seller-2", "TXN-1"));
        assert!(
            matches!(result, Err(StoreError::DuplicateTransactionId { .. })),
            "{name}"
        );
        assert!(store.transaction_id_exists("TXN-1").unwrap(), "{name}");
        assert!(!store.transaction_id_exists("TXN-2").unwrap(), "{name}");
    }
}

#[test]
fn test_update_applies_patch() {
    for (name, store) in stores() {
        let created = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

        let patch = TransactionPatch {
            status: Some(TransactionStatus::Paid),
            payment_proof_url: Some("proofs/p.png".to_string()),
            ..TransactionPatch::default()
        };
        let updated = store.update(&created, &patch).unwrap();

        assert_eq!(updated.status, TransactionStatus::Paid, "{name}");
        assert_eq!(
            updated.payment_proof_url.as_deref(),
            Some("proofs/p.png"),
            "{name}"
        );

        let fetched = store.get(&created.record_id).unwrap().unwrap();
        assert_eq!(fetched.status, TransactionStatus::Paid, "{name}");
    }
}

#[test]
fn test_update_is_conditional_on_fetched_status() {
    for (name, store) in stores() {
        let created = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

        let patch = TransactionPatch {
            status: Some(TransactionStatus::Paid),
            ..TransactionPatch::default()
        };
        store.update(&created, &patch).unwrap();

        // Second writer still holds the PaymentPending snapshot.
        let stale_patch = TransactionPatch {
            status: Some(TransactionStatus::Cancelled),
            ..TransactionPatch::default()
        };
        let result = store.update(&created, &stale_patch);
        assert!(
            matches!(
                result,
                Err(StoreError::StaleStatus {
                    expected: TransactionStatus::PaymentPending,
                    actual: TransactionStatus::Paid,
                    ..
                })
            ),
            "{name}"
        );

        // The losing write must not have applied.
        let fetched = store.get(&created.record_id).unwrap().unwrap();
        assert_eq!(fetched.status, TransactionStatus::Paid, "{name}");
    }
}

#[test]
fn test_update_missing_record_is_not_found() {
    for (name, store) in stores() {
        let mut ghost = sample("buyer-1", "seller-1", "TXN-1");
        ghost.record_id = "rec-ghost".to_string();
        let result = store.update(&ghost, &TransactionPatch::default());
        assert!(
            matches!(result, Err(StoreError::RecordNotFound { .. })),
            "{name}"
        );
    }
}

#[test]
fn test_find_latest_matches_either_orientation() {
    for (name, store) in stores() {
        store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

        for (a, b) in [("buyer-1", "seller-1"), ("seller-1", "buyer-1")] {
            let found = store.find_latest_for_pair(a, b, None).unwrap().unwrap();
            assert_eq!(found.transaction_id, "TXN-1", "{name}");
        }
        assert!(
            store
                .find_latest_for_pair("buyer-1", "stranger", None)
                .unwrap()
                .is_none(),
            "{name}"
        );
    }
}

#[test]
fn test_find_active_skips_terminal_transactions() {
    for (name, store) in stores() {
        let created = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();
        let patch = TransactionPatch {
            status: Some(TransactionStatus::Cancelled),
            ..TransactionPatch::default()
        };
        store.update(&created, &patch).unwrap();

        assert!(
            store
                .find_active_for_pair("buyer-1", "seller-1", None)
                .unwrap()
                .is_none(),
            "{name}"
        );
        // Latest still finds the cancelled record.
        assert!(
            store
                .find_latest_for_pair("buyer-1", "seller-1", None)
                .unwrap()
                .is_some(),
            "{name}"
        );
    }
}

#[test]
fn test_find_scoped_to_post() {
    for (name, store) in stores() {
        let mut with_post = sample("buyer-1", "seller-1", "TXN-1");
        with_post.post_id = Some("post-9".to_string());
        store.create(&with_post).unwrap();

        assert!(
            store
                .find_active_for_pair("buyer-1", "seller-1", Some("post-9"))
                .unwrap()
                .is_some(),
            "{name}"
        );
        assert!(
            store
                .find_active_for_pair("buyer-1", "seller-1", Some("post-other"))
                .unwrap()
                .is_none(),
            "{name}"
        );
    }
}

// =============================================================================
// Unavailability classification
// =============================================================================

#[test]
fn test_missing_table_classifies_as_unavailable() {
    let store = SqliteTransactionStore::in_memory_unprovisioned().unwrap();

    let create_err = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap_err();
    assert!(create_err.is_unavailable());

    let get_err = store.get("rec-1").unwrap_err();
    assert!(get_err.is_unavailable());

    let find_err = store
        .find_latest_for_pair("buyer-1", "seller-1", None)
        .unwrap_err();
    assert!(find_err.is_unavailable());
}

#[test]
fn test_constraint_violation_is_not_unavailable() {
    let store = SqliteTransactionStore::in_memory().unwrap();
    let mut bad = sample("buyer-1", "buyer-1", "TXN-1");
    bad.seller_id = "buyer-1".to_string();

    let err = store.create(&bad).unwrap_err();
    assert!(!err.is_unavailable());
}

// =============================================================================
// Fallback adapter
// =============================================================================

#[test]
fn test_fallback_passes_through_when_store_present() {
    let store = FallbackStore::new(Box::new(InMemoryStore::new()));
    let created = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

    assert!(!created.is_local());
    assert_eq!(store.local_count(), 0);
}

#[test]
fn test_fallback_synthesizes_local_record_on_create() {
    let store = FallbackStore::new(Box::new(UnprovisionedStore));
    let created = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

    assert!(created.is_local());
    assert!(created.record_id.starts_with("local-"));
    assert_eq!(store.local_count(), 1);

    // The local record is readable and updatable without the backing store.
    let fetched = store.get(&created.record_id).unwrap().unwrap();
    assert_eq!(fetched, created);

    let patch = TransactionPatch {
        status: Some(TransactionStatus::Paid),
        ..TransactionPatch::default()
    };
    let updated = store.update(&created, &patch).unwrap();
    assert_eq!(updated.status, TransactionStatus::Paid);
}

#[test]
fn test_fallback_find_returns_local_records() {
    let store = FallbackStore::new(Box::new(UnprovisionedStore));
    store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

    let active = store
        .find_active_for_pair("seller-1", "buyer-1", None)
        .unwrap()
        .unwrap();
    assert_eq!(active.transaction_id, "TXN-1");
    assert!(store.transaction_id_exists("TXN-1").unwrap());
}

#[test]
fn test_fallback_find_returns_none_when_store_absent_and_no_local() {
    let store = FallbackStore::new(Box::new(UnprovisionedStore));

    assert!(store
        .find_latest_for_pair("buyer-1", "seller-1", None)
        .unwrap()
        .is_none());
    assert!(store.get("rec-1").unwrap().is_none());
}

#[test]
fn test_fallback_propagates_real_errors() {
    let backing = InMemoryStore::new();
    backing.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

    let store = FallbackStore::new(Box::new(backing));
    let result = store.create(&sample("buyer-2", "seller-2", "TXN-1"));
    assert!(matches!(
        result,
        Err(StoreError::DuplicateTransactionId { .. })
    ));
    assert_eq!(store.local_count(), 0);
}

#[test]
fn test_fallback_local_update_is_conditional() {
    let store = FallbackStore::new(Box::new(UnprovisionedStore));
    let created = store.create(&sample("buyer-1", "seller-1", "TXN-1")).unwrap();

    let patch = TransactionPatch {
        status: Some(TransactionStatus::Paid),
        ..TransactionPatch::default()
    };
    store.update(&created, &patch).unwrap();

    let stale = TransactionPatch {
        status: Some(TransactionStatus::Cancelled),
        ..TransactionPatch::default()
    };
    assert!(matches!(
        store.update(&created, &stale),
        Err(StoreError::StaleStatus { .. })
    ));
}

// =============================================================================
// Artifact stores
// =============================================================================

#[test]
fn test_fs_artifact_store_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsArtifactStore::provision(dir.path()).unwrap();

    let reference = store
        .upload("payment-proofs/rec-1-proof.png", b"png-bytes", "image/png")
        .unwrap();
    assert_eq!(std::fs::read(&reference).unwrap(), b"png-bytes");
}

#[test]
fn test_fs_artifact_store_missing_bucket_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let store = FsArtifactStore::new(missing);

    let err = store.upload("a/b.png", b"x", "image/png").unwrap_err();
    assert!(err.is_unavailable());
}

#[test]
fn test_fallback_artifact_store_inlines_data_url() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let store = FallbackArtifactStore::new(Box::new(FsArtifactStore::new(missing)));

    let reference = store.upload("a/b.png", b"png-bytes", "image/png").unwrap();
    assert!(reference.starts_with("data:image/png;base64,"));
}

#[test]
fn test_artifact_path_naming() {
    assert_eq!(
        payment_proof_path("rec-1", 42, "shot.png"),
        "payment-proofs/rec-1-payment-proof-42.png"
    );
    assert_eq!(
        work_file_path("rec-1", 42, "essay.pdf"),
        "work-files/rec-1-work-42-essay.pdf"
    );
    // No extension falls back to a binary suffix.
    assert_eq!(
        payment_proof_path("rec-1", 42, "proof"),
        "payment-proofs/rec-1-payment-proof-42.bin"
    );
}
