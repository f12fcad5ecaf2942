//! Human-readable transaction id generation.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Generates a date-stamped transaction id of the form
/// `TXN{YYYYMMDD}-{6 random digits}`.
///
/// The id is distinct from any storage-layer primary key and is what the
/// payment memo references, so it must be stable once assigned.
#[must_use]
pub fn generate_transaction_id(now: DateTime<Utc>, rng: &mut impl Rng) -> String {
    let date = now.format("%Y%m%d");
    let suffix: u32 = rng.gen_range(0..1_000_000);
    format!("TXN{date}-{suffix:06}")
}
