//! Payment instrument generation.
//!
//! Builds the deterministic UPI payment-request payload for a transaction
//! and renders it as a scannable code. The payload is reproducible from
//! `(payee, amount, transaction id)` so it can be audited after the fact;
//! the code rendering is a pure function of the payload string.
//!
//! No money moves through this module. The payload merely directs the buyer
//! to pay the seller via whatever application scans the code.

mod render;
mod request;

#[cfg(test)]
mod tests;

pub use render::{CodeRenderer, SvgQrRenderer};
pub use request::{PaymentError, PaymentRequest, format_amount, validate_payee};
