//! Transaction entity, status enum, and the transition table.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Protocol status of a transaction.
///
/// `Pending` and `WorkInProgress` are observed alongside `PaymentPending`
/// and `Paid` respectively for display purposes; they carry no distinct
/// transition rules and are treated as equivalent for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created but payment not yet requested (display synonym of
    /// `PaymentPending`).
    Pending,
    /// Awaiting the buyer's payment and proof upload.
    PaymentPending,
    /// Payment proof submitted; waiting on the seller's work.
    Paid,
    /// Display synonym of `Paid`.
    WorkInProgress,
    /// Seller submitted work; waiting on the buyer's review.
    WorkSubmitted,
    /// Buyer approved the work; payment is considered released.
    Approved,
    /// Payment released (terminal, reachable only via external settlement).
    Released,
    /// Buyer filed a dispute; resolution happens outside this system.
    Disputed,
    /// Cancelled by one of the parties.
    Cancelled,
    /// Refunded outside this system.
    Refunded,
}

impl TransactionStatus {
    /// Returns the wire/storage representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaymentPending => "payment_pending",
            Self::Paid => "paid",
            Self::WorkInProgress => "work_in_progress",
            Self::WorkSubmitted => "work_submitted",
            Self::Approved => "approved",
            Self::Released => "released",
            Self::Disputed => "disputed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Returns `true` for settled statuses that permit a fresh Initiate for
    /// the same pair.
    ///
    /// `Disputed` is deliberately not terminal: it blocks new initiation
    /// until resolved externally.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Released | Self::Cancelled | Self::Refunded
        )
    }

    /// Returns `true` while the buyer's payment (and proof) is outstanding.
    #[must_use]
    pub const fn is_payment_phase(self) -> bool {
        matches!(self, Self::Pending | Self::PaymentPending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "payment_pending" => Ok(Self::PaymentPending),
            "paid" => Ok(Self::Paid),
            "work_in_progress" => Ok(Self::WorkInProgress),
            "work_submitted" => Ok(Self::WorkSubmitted),
            "approved" => Ok(Self::Approved),
            "released" => Ok(Self::Released),
            "disputed" => Ok(Self::Disputed),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}

/// Error returned when parsing an unrecognized status string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown transaction status: {value}")]
pub struct UnknownStatus {
    /// The unrecognized value.
    pub value: String,
}

/// The two protocol roles a party can hold on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The post owner who pays for the work.
    Buyer,
    /// The helper who performs the work and receives payment.
    Seller,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer => f.write_str("buyer"),
            Self::Seller => f.write_str("seller"),
        }
    }
}

/// Protocol actions a party can attempt on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowAction {
    /// Create the transaction and the payment request (buyer).
    Initiate,
    /// Upload proof of the off-band payment (buyer).
    SubmitPaymentProof,
    /// Upload work artifacts for review (seller).
    SubmitWork,
    /// Approve the work and release the payment (buyer).
    Approve,
    /// File a dispute with a mandatory reason (buyer).
    Dispute,
    /// Abandon the transaction (either party).
    Cancel,
}

impl fmt::Display for EscrowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiate => "initiate",
            Self::SubmitPaymentProof => "submit_payment_proof",
            Self::SubmitWork => "submit_work",
            Self::Approve => "approve",
            Self::Dispute => "dispute",
            Self::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Returns the role required to perform an action, or `None` when either
/// party may perform it.
#[must_use]
pub const fn required_actor(action: EscrowAction) -> Option<Actor> {
    match action {
        EscrowAction::Initiate
        | EscrowAction::SubmitPaymentProof
        | EscrowAction::Approve
        | EscrowAction::Dispute => Some(Actor::Buyer),
        EscrowAction::SubmitWork => Some(Actor::Seller),
        EscrowAction::Cancel => None,
    }
}

/// The transition table: returns the status an action leads to, or `None`
/// when the action is not legal from the given status.
#[must_use]
pub const fn next_status(
    status: TransactionStatus,
    action: EscrowAction,
) -> Option<TransactionStatus> {
    use TransactionStatus as S;

    match (status, action) {
        (S::Pending | S::PaymentPending, EscrowAction::SubmitPaymentProof) => Some(S::Paid),
        (S::Paid | S::WorkInProgress, EscrowAction::SubmitWork) => Some(S::WorkSubmitted),
        (S::WorkSubmitted, EscrowAction::Approve) => Some(S::Approved),
        (S::WorkSubmitted, EscrowAction::Dispute) => Some(S::Disputed),
        (
            S::Pending | S::PaymentPending | S::Paid | S::WorkInProgress | S::WorkSubmitted,
            EscrowAction::Cancel,
        ) => Some(S::Cancelled),
        _ => None,
    }
}

/// The central escrow entity shared by the buyer/seller pair.
///
/// `record_id` is the storage-layer key (or a `local-` synthesized key);
/// `transaction_id` is the human-readable id referenced by the payment memo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Storage-layer record key. Starts with `local-` for transactions held
    /// only in session memory.
    pub record_id: String,

    /// Human-readable transaction id (`TXN{date}-{suffix}`).
    pub transaction_id: String,

    /// The paying party (post owner).
    pub buyer_id: String,

    /// The paid party (helper).
    pub seller_id: String,

    /// Originating post, when the transaction is scoped to one.
    pub post_id: Option<String>,

    /// Agreed amount (positive, currency implied by the payment request).
    pub amount: f64,

    /// Current protocol status. Authoritative.
    pub status: TransactionStatus,

    /// The seller's payment-instrument address (contains `@`).
    pub payee: String,

    /// The exact payment-request payload encoded into the scannable code.
    pub payment_payload: String,

    /// Reference to the uploaded payment proof, once the buyer submits it.
    pub payment_proof_url: Option<String>,

    /// References to the seller's uploaded work artifacts, in upload order.
    pub work_files: Vec<String>,

    /// Optional external preview link for the submitted work.
    pub work_preview_url: Option<String>,

    /// Optional free-text description attached at initiation.
    pub work_description: Option<String>,

    /// Set to `true` only at approval.
    pub buyer_approval: bool,

    /// Optional feedback supplied with the approval.
    pub buyer_feedback: Option<String>,

    /// Reason supplied with a dispute. Mandatory for the transition.
    pub dispute_reason: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last mutation time.
    pub updated_at: DateTime<Utc>,

    /// Payment deadline, fixed at creation + expiry window.
    pub expires_at: DateTime<Utc>,

    /// Set when the buyer approves.
    pub buyer_approval_at: Option<DateTime<Utc>>,

    /// Set when the payment is considered released.
    pub released_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Creates a transaction in `PaymentPending` with the expiry window
    /// applied. The caller supplies the already-generated ids and payload.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        record_id: impl Into<String>,
        transaction_id: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        post_id: Option<String>,
        amount: f64,
        payee: impl Into<String>,
        payment_payload: impl Into<String>,
        work_description: Option<String>,
        now: DateTime<Utc>,
        expiry: Duration,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            transaction_id: transaction_id.into(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            post_id,
            amount,
            status: TransactionStatus::PaymentPending,
            payee: payee.into(),
            payment_payload: payment_payload.into(),
            payment_proof_url: None,
            work_files: Vec::new(),
            work_preview_url: None,
            work_description,
            buyer_approval: false,
            buyer_feedback: None,
            dispute_reason: None,
            created_at: now,
            updated_at: now,
            expires_at: now + expiry,
            buyer_approval_at: None,
            released_at: None,
        }
    }

    /// Returns `true` if this record exists only in session memory.
    #[must_use]
    pub fn is_local(&self) -> bool {
        super::is_local_record(&self.record_id)
    }

    /// Returns the role `user_id` holds on this transaction, if any.
    #[must_use]
    pub fn role_of(&self, user_id: &str) -> Option<Actor> {
        if self.buyer_id == user_id {
            Some(Actor::Buyer)
        } else if self.seller_id == user_id {
            Some(Actor::Seller)
        } else {
            None
        }
    }

    /// Returns `true` if `user_id` is one of the two parties.
    #[must_use]
    pub fn is_party(&self, user_id: &str) -> bool {
        self.role_of(user_id).is_some()
    }

    /// A transaction still in the payment phase past its deadline is
    /// expired; further payment or work submission is refused.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_payment_phase() && now > self.expires_at
    }
}
