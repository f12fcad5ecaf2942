//! Tests for the payment instrument generator.

use super::render::{CodeRenderer, SvgQrRenderer};
use super::request::{PaymentError, PaymentRequest, format_amount, validate_payee};

// =============================================================================
// Payee validation
// =============================================================================

#[test]
fn test_validate_payee_accepts_handle_format() {
    assert!(validate_payee("helper@bank").is_ok());
    assert!(validate_payee("a@b").is_ok());
    assert!(validate_payee("first.last@upi").is_ok());
}

#[test]
fn test_validate_payee_rejects_malformed_handles() {
    for payee in ["helperbank", "", "@bank", "helper@", "@"] {
        assert!(
            matches!(
                validate_payee(payee),
                Err(PaymentError::InvalidPayee { .. })
            ),
            "expected rejection for {payee:?}"
        );
    }
}

// =============================================================================
// Payload construction
// =============================================================================

#[test]
fn test_encode_produces_expected_uri() {
    let request =
        PaymentRequest::new("helper@bank", 500.0, "INR", "SVIP", "TXN20260115-000042").unwrap();

    assert_eq!(
        request.encode(),
        "upi://pay?pa=helper@bank&am=500&cu=INR&tn=SVIP-TXN20260115-000042"
    );
}

#[test]
fn test_encode_is_deterministic() {
    let a = PaymentRequest::new("helper@bank", 499.5, "INR", "SVIP", "TXN20260115-1").unwrap();
    let b = PaymentRequest::new("helper@bank", 499.5, "INR", "SVIP", "TXN20260115-1").unwrap();

    assert_eq!(a.encode(), b.encode());
}

#[test]
fn test_fractional_amount_formatting() {
    assert_eq!(format_amount(500.0), "500");
    assert_eq!(format_amount(499.5), "499.5");
    assert_eq!(format_amount(0.01), "0.01");
}

#[test]
fn test_new_rejects_non_positive_amounts() {
    for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert!(
            matches!(
                PaymentRequest::new("helper@bank", amount, "INR", "SVIP", "TXN-1"),
                Err(PaymentError::InvalidAmount { .. })
            ),
            "expected rejection for amount {amount}"
        );
    }
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn test_payload_round_trips() {
    let request =
        PaymentRequest::new("helper@bank", 499.5, "INR", "SVIP", "TXN20260115-000042").unwrap();

    let parsed = PaymentRequest::parse(&request.encode()).unwrap();
    assert_eq!(parsed, request);
    assert_eq!(parsed.encode(), request.encode());
}

#[test]
fn test_parse_recovers_fields() {
    let parsed =
        PaymentRequest::parse("upi://pay?pa=helper@bank&am=500&cu=INR&tn=SVIP-TXN20260115-000042")
            .unwrap();

    assert_eq!(parsed.payee, "helper@bank");
    assert_eq!(parsed.amount, 500.0);
    assert_eq!(parsed.currency, "INR");
    assert_eq!(parsed.memo_prefix, "SVIP");
    assert_eq!(parsed.transaction_id, "TXN20260115-000042");
}

#[test]
fn test_parse_rejects_wrong_scheme_and_missing_fields() {
    assert!(matches!(
        PaymentRequest::parse("http://pay?pa=a@b&am=1&cu=INR&tn=SVIP-T"),
        Err(PaymentError::MalformedPayload { .. })
    ));
    assert!(matches!(
        PaymentRequest::parse("upi://pay?pa=a@b&am=1&cu=INR"),
        Err(PaymentError::MalformedPayload { .. })
    ));
    assert!(matches!(
        PaymentRequest::parse("upi://pay?pa=a@b&am=abc&cu=INR&tn=SVIP-T"),
        Err(PaymentError::MalformedPayload { .. })
    ));
}

// =============================================================================
// Rendering
// =============================================================================

#[test]
fn test_svg_renderer_encodes_payload() {
    let payload = "upi://pay?pa=helper@bank&am=500&cu=INR&tn=SVIP-TXN20260115-000042";
    let svg = SvgQrRenderer::new().render(payload).unwrap();

    assert!(svg.contains("<svg"));
    assert!(svg.contains("</svg>"));
}

#[test]
fn test_svg_renderer_is_deterministic() {
    let payload = "upi://pay?pa=helper@bank&am=500&cu=INR&tn=SVIP-TXN20260115-000042";
    let renderer = SvgQrRenderer::new();

    assert_eq!(
        renderer.render(payload).unwrap(),
        renderer.render(payload).unwrap()
    );
}
