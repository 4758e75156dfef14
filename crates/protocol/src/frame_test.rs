//! Tests for the envelope wire format

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::json;

use crate::error::ProtocolError;
use crate::flag::MessageFlag;
use crate::frame::{FlaggedMessage, Frame, Reply, read_length_prefix};

/// Encode then strip the length prefix, as the transport does
fn transport(frame: &Frame) -> Frame {
    let encoded = frame.encode().unwrap();
    let len = read_length_prefix(&encoded).unwrap() as usize;
    assert_eq!(len, encoded.len() - 4);
    Frame::decode(encoded.slice(4..)).unwrap()
}

// ============================================================================
// Round trips through the transport framing
// ============================================================================

#[test]
fn test_request_preserves_payload() {
    let payload = json!({"connector_type": "file", "fast_sync": true, "force_sync": false});
    let frame = Frame::Request {
        id: 42,
        message: FlaggedMessage::new(MessageFlag::StartSync, payload.clone()),
    };

    match transport(&frame) {
        Frame::Request { id, message } => {
            assert_eq!(id, 42);
            assert_eq!(message.message_flag(), Some(MessageFlag::StartSync));
            assert_eq!(message.payload, payload);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[test]
fn test_reply_error_shape() {
    let frame = Frame::Reply {
        id: 7,
        reply: Reply::error("sync already running"),
    };

    let decoded = transport(&frame);
    assert_eq!(decoded, frame);

    if let Frame::Reply { reply, .. } = decoded {
        assert!(reply.success.is_none());
        assert_eq!(reply.error.as_deref(), Some("sync already running"));
    }
}

#[test]
fn test_push_with_unknown_flag_still_decodes() {
    let frame = Frame::Push(FlaggedMessage {
        flag: 200,
        payload: json!("future"),
    });

    match transport(&frame) {
        Frame::Push(message) => {
            assert_eq!(message.flag, 200);
            assert_eq!(message.message_flag(), None);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[test]
fn test_bare_message_has_null_payload() {
    let frame = Frame::Request {
        id: 1,
        message: FlaggedMessage::bare(MessageFlag::GetRuntimeInfo),
    };
    assert_eq!(transport(&frame), frame);
}

// ============================================================================
// Decode failures
// ============================================================================

#[test]
fn test_decode_empty() {
    assert!(matches!(
        Frame::decode(Bytes::new()),
        Err(ProtocolError::EmptyFrame)
    ));
}

#[test]
fn test_decode_unknown_kind() {
    assert!(matches!(
        Frame::decode(Bytes::from_static(&[0x09])),
        Err(ProtocolError::UnknownFrameKind(0x09))
    ));
}

#[test]
fn test_decode_truncated_request() {
    let mut buf = BytesMut::new();
    buf.put_u8(0x01);
    buf.put_u32(3); // id cut short

    assert!(matches!(
        Frame::decode(buf.freeze()),
        Err(ProtocolError::Truncated(_))
    ));
}

#[test]
fn test_decode_invalid_json_payload() {
    let mut buf = BytesMut::new();
    buf.put_u8(0x03);
    buf.put_u8(MessageFlag::SyncEvent.as_u8());
    buf.put_u32(5);
    buf.put_slice(b"{oops");

    assert!(matches!(
        Frame::decode(buf.freeze()),
        Err(ProtocolError::InvalidPayload(_))
    ));
}

// ============================================================================
// Reply helpers
// ============================================================================

#[test]
fn test_unknown_message_reply_text() {
    let message = FlaggedMessage {
        flag: 99,
        payload: json!({"hello": "world"}),
    };
    let reply = Reply::unknown_message(&message);

    assert!(reply.success.is_none());
    assert_eq!(
        reply.error.as_deref(),
        Some(r#"Unknown message received. FlaggedMessage: {"flag":99,"payload":{"hello":"world"}}"#)
    );
}

#[test]
fn test_reply_into_result() {
    assert_eq!(Reply::success(json!(1)).into_result(), Ok(json!(1)));
    assert_eq!(Reply::default().into_result(), Ok(serde_json::Value::Null));
    assert_eq!(
        Reply::error("boom").into_result(),
        Err("boom".to_string())
    );
}

#[test]
fn test_read_length_prefix_short() {
    assert_eq!(read_length_prefix(&[0, 0, 1]), None);
    assert_eq!(read_length_prefix(&[0, 0, 1, 0]), Some(256));
}
