//! Tests for protocol error types

use crate::error::ProtocolError;

#[test]
fn test_too_large_carries_limit() {
    let err = ProtocolError::too_large(20 * 1024 * 1024);
    assert!(matches!(
        err,
        ProtocolError::FrameTooLarge {
            size: 20_971_520,
            max
        } if max == crate::MAX_FRAME_SIZE
    ));
    assert_eq!(
        err.to_string(),
        format!("frame size 20971520 exceeds maximum {}", crate::MAX_FRAME_SIZE)
    );
}

#[test]
fn test_display_messages() {
    assert_eq!(
        ProtocolError::Truncated("reply id").to_string(),
        "frame truncated: reply id"
    );
    assert_eq!(
        ProtocolError::UnknownFrameKind(0x7f).to_string(),
        "unknown frame kind: 127"
    );
    assert_eq!(ProtocolError::EmptyFrame.to_string(), "empty frame");
    assert_eq!(
        ProtocolError::UnknownConnectorType("garmin".into()).to_string(),
        "unknown connector type: garmin"
    );
}

#[test]
fn test_from_json_error() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: ProtocolError = json_err.into();
    assert!(matches!(err, ProtocolError::InvalidPayload(_)));
    assert!(err.to_string().starts_with("invalid payload: "));
}

#[test]
fn test_from_utf8_error() {
    let utf8_err = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
    let err: ProtocolError = utf8_err.into();
    assert!(matches!(err, ProtocolError::InvalidUtf8(_)));
}
