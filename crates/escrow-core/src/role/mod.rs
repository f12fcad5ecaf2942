//! Role resolution for the buyer/seller pair.
//!
//! A user's role is derived state, recomputed from whichever signal is
//! available, in strict precedence order:
//!
//! 1. an active (non-terminal) transaction between the pair,
//! 2. else the most recent transaction between the pair (terminal ones
//!    carry roles forward so a past buyer can initiate again),
//! 3. else the conversation context (post author = buyer, the party who
//!    initiated contact = seller),
//! 4. else [`Role::Unknown`] — no action is surfaced at all.
//!
//! The result is never cached independently of its inputs: callers must
//! re-resolve whenever the pair's transaction changes.


use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::TransactionStore;
use crate::transaction::Actor;

/// Three-way role result. `Unknown` is a first-class state: the protocol
/// must surface neither Initiate nor SubmitWork for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The user pays for the work.
    Buyer,
    /// The user performs the work.
    Seller,
    /// Neither role could be established. Fail safe: no action surfaced.
    Unknown,
}

impl Role {
    /// Returns `true` for the buyer role.
    #[must_use]
    pub const fn is_buyer(self) -> bool {
        matches!(self, Self::Buyer)
    }

    /// Returns `true` for the seller role.
    #[must_use]
    pub const fn is_seller(self) -> bool {
        matches!(self, Self::Seller)
    }
}

impl From<Actor> for Role {
    fn from(actor: Actor) -> Self {
        match actor {
            Actor::Buyer => Self::Buyer,
            Actor::Seller => Self::Seller,
        }
    }
}

/// Conversation metadata used when no transaction exists for the pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    /// The user who authored the originating post (the prospective buyer).
    pub post_author: Option<String>,
    /// The user who initiated contact on the post (the prospective seller).
    pub contact_initiator: Option<String>,
}

/// Resolves the role `user_id` holds towards `counterpart_id`.
///
/// Store failures are treated as "no transaction signal" and resolution
/// falls through to the conversation context; a wrongly-withheld button is
/// safer than a wrongly-surfaced one.
#[must_use]
pub fn resolve(
    store: &dyn TransactionStore,
    user_id: &str,
    counterpart_id: &str,
    post_id: Option<&str>,
    context: Option<&ConversationContext>,
) -> Role {
    // 1. An active transaction is authoritative over any other signal.
    match store.find_active_for_pair(user_id, counterpart_id, post_id) {
        Ok(Some(txn)) => {
            return txn.role_of(user_id).map_or(Role::Unknown, Role::from);
        }
        Ok(None) => {}
        Err(err) => {
            warn!(%err, "role resolution could not query active transactions");
        }
    }

    // 2. Roles carry over from the most recent transaction, terminal or not.
    match store.find_latest_for_pair(user_id, counterpart_id, post_id) {
        Ok(Some(txn)) => {
            return txn.role_of(user_id).map_or(Role::Unknown, Role::from);
        }
        Ok(None) => {}
        Err(err) => {
            warn!(%err, "role resolution could not query past transactions");
        }
    }

    // 3. No transaction: fall back to who posted and who reached out.
    if let Some(ctx) = context {
        if ctx.post_author.as_deref() == Some(user_id) {
            return Role::Buyer;
        }
        if ctx.contact_initiator.as_deref() == Some(user_id) {
            return Role::Seller;
        }
    }

    // 4. Nothing to go on.
    Role::Unknown
}
