//! UPI payment-request payload construction and parsing.

use thiserror::Error;

/// Errors from payment-instrument construction or rendering.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PaymentError {
    /// The payee identifier is not a plausible payment address.
    #[error("invalid payee identifier: {payee:?} (expected e.g. name@bank)")]
    InvalidPayee {
        /// The rejected identifier.
        payee: String,
    },

    /// The amount is zero, negative, or not a finite number.
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: f64,
    },

    /// A payload string could not be parsed back into a request.
    #[error("malformed payment payload: {reason}")]
    MalformedPayload {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The scannable-code renderer failed.
    #[error("code rendering failed: {reason}")]
    Render {
        /// Renderer-specific failure detail.
        reason: String,
    },
}

/// Validates a payee identifier.
///
/// Format validation only: the identifier must contain an `@` separator
/// with something on both sides. No liveness check against a payment
/// network is performed.
///
/// # Errors
///
/// Returns [`PaymentError::InvalidPayee`] if the format is wrong.
pub fn validate_payee(payee: &str) -> Result<(), PaymentError> {
    match payee.split_once('@') {
        Some((name, handle)) if !name.is_empty() && !handle.is_empty() => Ok(()),
        _ => Err(PaymentError::InvalidPayee {
            payee: payee.to_string(),
        }),
    }
}

/// Formats an amount the way it appears in the payload: no trailing
/// fraction for whole amounts (`500`, not `500.0`).
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount}")
    }
}

/// A deterministic payment request.
///
/// Encoding the same request always yields the same payload string, and the
/// payload parses back into an equal request (auditability).
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    /// Payee payment address (e.g. `helper@bank`).
    pub payee: String,
    /// Positive payment amount.
    pub amount: f64,
    /// ISO currency code (e.g. `INR`).
    pub currency: String,
    /// Memo prefix identifying the marketplace (e.g. `SVIP`). Must not
    /// contain `-`, which separates prefix from transaction id in the memo.
    pub memo_prefix: String,
    /// The transaction id the memo references.
    pub transaction_id: String,
}

impl PaymentRequest {
    /// Builds a validated payment request.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidPayee`] or
    /// [`PaymentError::InvalidAmount`] on malformed commercial terms.
    pub fn new(
        payee: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        memo_prefix: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let payee = payee.into();
        validate_payee(&payee)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PaymentError::InvalidAmount { amount });
        }

        Ok(Self {
            payee,
            amount,
            currency: currency.into(),
            memo_prefix: memo_prefix.into(),
            transaction_id: transaction_id.into(),
        })
    }

    /// Encodes the request as a UPI payment URI.
    ///
    /// Parameter order is fixed so identical inputs always produce an
    /// identical payload string.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "upi://pay?pa={}&am={}&cu={}&tn={}-{}",
            self.payee,
            format_amount(self.amount),
            self.currency,
            self.memo_prefix,
            self.transaction_id
        )
    }

    /// Parses a payload string produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::MalformedPayload`] when the URI scheme or a
    /// required parameter is missing, and [`PaymentError::InvalidAmount`] /
    /// [`PaymentError::InvalidPayee`] when a recovered field fails
    /// validation.
    pub fn parse(payload: &str) -> Result<Self, PaymentError> {
        let query = payload.strip_prefix("upi://pay?").ok_or_else(|| {
            PaymentError::MalformedPayload {
                reason: "missing upi://pay? scheme".to_string(),
            }
        })?;

        let mut payee = None;
        let mut amount = None;
        let mut currency = None;
        let mut memo = None;

        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(PaymentError::MalformedPayload {
                    reason: format!("parameter without value: {pair}"),
                });
            };
            match key {
                "pa" => payee = Some(value.to_string()),
                "am" => amount = Some(value.to_string()),
                "cu" => currency = Some(value.to_string()),
                "tn" => memo = Some(value.to_string()),
                _ => {}
            }
        }

        let missing = |field: &str| PaymentError::MalformedPayload {
            reason: format!("missing required parameter: {field}"),
        };
        let payee = payee.ok_or_else(|| missing("pa"))?;
        let amount_str = amount.ok_or_else(|| missing("am"))?;
        let currency = currency.ok_or_else(|| missing("cu"))?;
        let memo = memo.ok_or_else(|| missing("tn"))?;

        let amount: f64 =
            amount_str
                .parse()
                .map_err(|_| PaymentError::MalformedPayload {
                    reason: format!("unparseable amount: {amount_str}"),
                })?;

        let (memo_prefix, transaction_id) =
            memo.split_once('-')
                .ok_or_else(|| PaymentError::MalformedPayload {
                    reason: format!("memo without prefix separator: {memo}"),
                })?;

        Self::new(payee, amount, currency, memo_prefix, transaction_id)
    }
}
