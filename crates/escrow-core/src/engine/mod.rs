//! The escrow protocol engine.
//!
//! Each caller-facing operation follows the same discipline:
//!
//! 1. re-fetch the transaction (persisted state is authoritative, never
//!    local memory),
//! 2. authorize the acting user against the role the action requires,
//! 3. check the transition table for legality from the current status,
//! 4. apply the change through the fallback store's conditional update.
//!
//! A concurrent transition between steps 1 and 4 surfaces as
//! [`EscrowError::InvalidTransition`] rather than a lost update.

mod error;


use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tracing::{debug, info};

pub use error::EscrowError;

use crate::config::EscrowConfig;
use crate::payment::{CodeRenderer, PaymentError, PaymentRequest, SvgQrRenderer};
use crate::role::{ConversationContext, Role};
use crate::store::artifacts::{payment_proof_path, work_file_path};
use crate::store::{
    ArtifactStore, FallbackArtifactStore, FallbackStore, InMemoryStore, InlineArtifactStore,
    StoreError, TransactionPatch, TransactionStore,
};
use crate::sync::TransactionWatcher;
use crate::transaction::{
    EscrowAction, Transaction, TransactionStatus, generate_transaction_id, next_status,
    required_actor,
};

/// Parameters for [`EscrowEngine::initiate`].
#[derive(Debug, Clone)]
pub struct InitiateRequest<'a> {
    /// The acting user; must resolve to the buyer role.
    pub buyer_id: &'a str,
    /// The counterpart who will perform the work.
    pub seller_id: &'a str,
    /// Post the transaction is scoped to, if any.
    pub post_id: Option<&'a str>,
    /// Agreed amount.
    pub amount: f64,
    /// The seller's payment address.
    pub payee: &'a str,
    /// Optional description of the work.
    pub work_description: Option<&'a str>,
    /// Conversation metadata for role resolution when no transaction
    /// history exists yet.
    pub context: Option<&'a ConversationContext>,
}

/// Result of a successful initiation.
#[derive(Debug, Clone)]
pub struct Initiated {
    /// The created transaction, in `PaymentPending`.
    pub transaction: Transaction,
    /// The rendered scannable code for the payment payload.
    pub code_svg: String,
}

/// A work artifact submitted by the seller.
#[derive(Debug, Clone)]
pub struct WorkFile {
    /// Original file name.
    pub name: String,
    /// MIME type.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// The escrow protocol engine.
///
/// Owns the fallback-wrapped stores; every operation takes the acting
/// user's id explicitly and authorizes it against the transaction record.
pub struct EscrowEngine {
    store: FallbackStore,
    artifacts: FallbackArtifactStore,
    renderer: Box<dyn CodeRenderer>,
    config: EscrowConfig,
}

impl EscrowEngine {
    /// Builds an engine over the given backends.
    #[must_use]
    pub fn new(
        store: Box<dyn TransactionStore>,
        artifacts: Box<dyn ArtifactStore>,
        renderer: Box<dyn CodeRenderer>,
        config: EscrowConfig,
    ) -> Self {
        Self {
            store: FallbackStore::new(store),
            artifacts: FallbackArtifactStore::new(artifacts),
            renderer,
            config,
        }
    }

    /// Builds a fully in-memory engine with default configuration.
    /// Artifacts become inline `data:` URLs.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(InMemoryStore::new()),
            Box::new(InlineArtifactStore),
            Box::new(SvgQrRenderer::new()),
            EscrowConfig::default(),
        )
    }

    /// The engine's transaction store (fallback-wrapped).
    #[must_use]
    pub fn store(&self) -> &dyn TransactionStore {
        &self.store
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Resolves the role `user_id` holds towards `counterpart_id`.
    #[must_use]
    pub fn resolve_role(
        &self,
        user_id: &str,
        counterpart_id: &str,
        post_id: Option<&str>,
        context: Option<&ConversationContext>,
    ) -> Role {
        crate::role::resolve(&self.store, user_id, counterpart_id, post_id, context)
    }

    /// Creates a watcher for the non-acting party to observe a
    /// transaction, using the configured poll interval.
    #[must_use]
    pub fn watch(&self, txn: &Transaction) -> TransactionWatcher {
        TransactionWatcher::new(txn, self.config.poll_interval())
    }

    /// Initiates a transaction: generates the id and payment payload,
    /// renders the scannable code, and persists the record in
    /// `PaymentPending` with the configured expiry.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::Unauthorized`] unless the acting user resolves to
    ///   the buyer role
    /// - [`EscrowError::InvalidInput`] for identical parties, a malformed
    ///   payee, or a non-positive amount
    /// - [`EscrowError::AlreadyActive`] when a non-terminal transaction
    ///   already exists for the pair
    pub fn initiate(&self, request: &InitiateRequest<'_>) -> Result<Initiated, EscrowError> {
        // A transaction always has two distinct parties.
        if request.buyer_id == request.seller_id {
            return Err(EscrowError::InvalidInput {
                reason: "buyer and seller must be distinct users".to_string(),
            });
        }

        let role = self.resolve_role(
            request.buyer_id,
            request.seller_id,
            request.post_id,
            request.context,
        );
        if !role.is_buyer() {
            return Err(EscrowError::Unauthorized {
                user_id: request.buyer_id.to_string(),
                action: EscrowAction::Initiate,
                required: Some(crate::transaction::Actor::Buyer),
            });
        }

        if let Some(existing) = self
            .store
            .find_active_for_pair(request.buyer_id, request.seller_id, request.post_id)
            .map_err(EscrowError::Upstream)?
        {
            return Err(EscrowError::AlreadyActive {
                transaction_id: existing.transaction_id,
            });
        }

        let now = Utc::now();
        let mut rng = rand::thread_rng();
        let mut transaction_id = generate_transaction_id(now, &mut rng);
        // One retry on collision, as the original id generator does.
        if self
            .store
            .transaction_id_exists(&transaction_id)
            .map_err(EscrowError::Upstream)?
        {
            transaction_id = generate_transaction_id(now, &mut rng);
        }

        let payment = PaymentRequest::new(
            request.payee,
            request.amount,
            &self.config.currency,
            &self.config.memo_prefix,
            &transaction_id,
        )
        .map_err(invalid_input)?;
        let payload = payment.encode();
        let code_svg = self
            .renderer
            .render(&payload)
            .map_err(EscrowError::Instrument)?;

        let txn = Transaction::new(
            "",
            &transaction_id,
            request.buyer_id,
            request.seller_id,
            request.post_id.map(str::to_string),
            request.amount,
            request.payee,
            payload,
            request.work_description.map(str::to_string),
            now,
            self.config.expiry(),
        );

        let stored = self.store.create(&txn).map_err(EscrowError::Upstream)?;
        info!(
            transaction_id = %stored.transaction_id,
            record_id = %stored.record_id,
            local = stored.is_local(),
            "transaction initiated"
        );

        Ok(Initiated {
            transaction: stored,
            code_svg,
        })
    }

    /// Fetches a transaction, verifying the requester is one of the two
    /// parties.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotFound`] for a missing record and
    /// [`EscrowError::AccessDenied`] for a non-party requester.
    pub fn fetch(&self, user_id: &str, record_id: &str) -> Result<Transaction, EscrowError> {
        let txn = self.load(record_id)?;
        if !txn.is_party(user_id) {
            return Err(EscrowError::AccessDenied {
                user_id: user_id.to_string(),
                record_id: record_id.to_string(),
            });
        }
        Ok(txn)
    }

    /// Buyer submits proof of the off-band payment. `PaymentPending` →
    /// `Paid`.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NotFound`], [`EscrowError::Unauthorized`], or
    /// [`EscrowError::InvalidTransition`] (including expiry).
    pub fn submit_payment_proof(
        &self,
        user_id: &str,
        record_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<Transaction, EscrowError> {
        let action = EscrowAction::SubmitPaymentProof;
        let txn = self.load(record_id)?;
        authorize(&txn, user_id, action)?;
        let next = check_transition(&txn, action)?;

        let path = payment_proof_path(&txn.record_id, now_nanos(), file_name);
        let proof_url = self
            .artifacts
            .upload(&path, bytes, content_type)
            .map_err(EscrowError::Upstream)?;

        let patch = TransactionPatch {
            status: Some(next),
            payment_proof_url: Some(proof_url),
            ..TransactionPatch::default()
        };
        self.apply(&txn, &patch, action)
    }

    /// Seller submits work artifacts. `Paid` → `WorkSubmitted`.
    ///
    /// # Errors
    ///
    /// [`EscrowError::InvalidInput`] when no files are supplied, plus the
    /// usual authorization and transition errors.
    pub fn submit_work(
        &self,
        user_id: &str,
        record_id: &str,
        files: &[WorkFile],
        preview_url: Option<&str>,
    ) -> Result<Transaction, EscrowError> {
        let action = EscrowAction::SubmitWork;
        if files.is_empty() {
            return Err(EscrowError::InvalidInput {
                reason: "at least one work file is required".to_string(),
            });
        }

        let txn = self.load(record_id)?;
        authorize(&txn, user_id, action)?;
        let next = check_transition(&txn, action)?;

        let mut references = Vec::with_capacity(files.len());
        for file in files {
            let path = work_file_path(&txn.record_id, now_nanos(), &file.name);
            let reference = self
                .artifacts
                .upload(&path, &file.bytes, &file.content_type)
                .map_err(EscrowError::Upstream)?;
            references.push(reference);
        }

        let patch = TransactionPatch {
            status: Some(next),
            work_files: Some(references),
            work_preview_url: preview_url.map(str::to_string),
            ..TransactionPatch::default()
        };
        self.apply(&txn, &patch, action)
    }

    /// Buyer approves the submitted work. `WorkSubmitted` → `Approved`;
    /// sets the approval flag and the approval/release timestamps.
    ///
    /// # Errors
    ///
    /// The usual authorization and transition errors.
    pub fn approve_work(
        &self,
        user_id: &str,
        record_id: &str,
        feedback: Option<&str>,
    ) -> Result<Transaction, EscrowError> {
        let action = EscrowAction::Approve;
        let txn = self.load(record_id)?;
        authorize(&txn, user_id, action)?;
        let next = check_transition(&txn, action)?;

        let now = Utc::now();
        let patch = TransactionPatch {
            status: Some(next),
            buyer_approval: Some(true),
            buyer_feedback: feedback.map(str::to_string),
            buyer_approval_at: Some(now),
            released_at: Some(now),
            ..TransactionPatch::default()
        };
        self.apply(&txn, &patch, action)
    }

    /// Buyer files a dispute. `WorkSubmitted` → `Disputed`. The reason is
    /// mandatory; an empty or whitespace-only reason aborts with no state
    /// change.
    ///
    /// # Errors
    ///
    /// [`EscrowError::InvalidInput`] for an empty reason, plus the usual
    /// authorization and transition errors.
    pub fn file_dispute(
        &self,
        user_id: &str,
        record_id: &str,
        reason: &str,
    ) -> Result<Transaction, EscrowError> {
        let action = EscrowAction::Dispute;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EscrowError::InvalidInput {
                reason: "a reason is required to file a dispute".to_string(),
            });
        }

        let txn = self.load(record_id)?;
        authorize(&txn, user_id, action)?;
        let next = check_transition(&txn, action)?;

        let patch = TransactionPatch {
            status: Some(next),
            dispute_reason: Some(reason.to_string()),
            ..TransactionPatch::default()
        };
        self.apply(&txn, &patch, action)
    }

    /// Either party abandons the transaction from any non-terminal status.
    ///
    /// # Errors
    ///
    /// The usual authorization and transition errors.
    pub fn cancel_transaction(
        &self,
        user_id: &str,
        record_id: &str,
    ) -> Result<Transaction, EscrowError> {
        let action = EscrowAction::Cancel;
        let txn = self.load(record_id)?;
        authorize(&txn, user_id, action)?;
        let next = check_transition(&txn, action)?;

        let patch = TransactionPatch {
            status: Some(next),
            ..TransactionPatch::default()
        };
        self.apply(&txn, &patch, action)
    }

    fn load(&self, record_id: &str) -> Result<Transaction, EscrowError> {
        self.store
            .get(record_id)
            .map_err(EscrowError::Upstream)?
            .ok_or_else(|| EscrowError::NotFound {
                record_id: record_id.to_string(),
            })
    }

    fn apply(
        &self,
        current: &Transaction,
        patch: &TransactionPatch,
        action: EscrowAction,
    ) -> Result<Transaction, EscrowError> {
        let updated = self
            .store
            .update(current, patch)
            .map_err(|err| map_store_error(err, action))?;
        debug!(
            transaction_id = %updated.transaction_id,
            %action,
            status = %updated.status,
            "transition applied"
        );
        Ok(updated)
    }
}

fn invalid_input(err: PaymentError) -> EscrowError {
    EscrowError::InvalidInput {
        reason: err.to_string(),
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

fn authorize(txn: &Transaction, user_id: &str, action: EscrowAction) -> Result<(), EscrowError> {
    let held = txn.role_of(user_id);
    match required_actor(action) {
        Some(required) if held == Some(required) => Ok(()),
        Some(required) => Err(EscrowError::Unauthorized {
            user_id: user_id.to_string(),
            action,
            required: Some(required),
        }),
        None if held.is_some() => Ok(()),
        None => Err(EscrowError::Unauthorized {
            user_id: user_id.to_string(),
            action,
            required: None,
        }),
    }
}

/// Checks the transition table, treating an expired payment-phase
/// transaction as having no legal payment or work actions.
fn check_transition(
    txn: &Transaction,
    action: EscrowAction,
) -> Result<TransactionStatus, EscrowError> {
    let stale = EscrowError::InvalidTransition {
        status: txn.status,
        action,
    };

    if txn.is_expired(Utc::now())
        && matches!(
            action,
            EscrowAction::SubmitPaymentProof | EscrowAction::SubmitWork
        )
    {
        return Err(stale);
    }

    next_status(txn.status, action).ok_or(stale)
}

fn map_store_error(err: StoreError, action: EscrowAction) -> EscrowError {
    match err {
        // A concurrent writer moved the record; the caller's view is stale.
        StoreError::StaleStatus { actual, .. } => EscrowError::InvalidTransition {
            status: actual,
            action,
        },
        StoreError::RecordNotFound { record_id } => EscrowError::NotFound { record_id },
        other => EscrowError::Upstream(other),
    }
}
