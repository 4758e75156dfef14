//! Envelope wire format
//!
//! Every unit exchanged between the background and foreground contexts is a
//! `Frame`. Frames are length-prefixed so they can travel over any byte
//! stream (in-process pipe, Unix socket).
//!
//! # Wire Format
//!
//! ```text
//! ┌──────────────┬──────────┬──────────────────────────────┐
//! │ 4 bytes      │ 1 byte   │ N bytes                      │
//! │ length (BE)  │ kind     │ body                         │
//! └──────────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! # Frame Kinds
//!
//! - `Request` (0x01): `id: u64`, `flag: u8`, `payload: json`
//! - `Reply` (0x02): `id: u64`, `success: option<json>`, `error: option<string>`
//! - `Push` (0x03): `flag: u8`, `payload: json`
//!
//! Strings and JSON documents are encoded as `u32` length + UTF-8 bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::error::ProtocolError;
use crate::flag::MessageFlag;

/// Frame kind discriminants
const FRAME_REQUEST: u8 = 0x01;
const FRAME_REPLY: u8 = 0x02;
const FRAME_PUSH: u8 = 0x03;

/// Envelope: a flag plus an opaque payload
///
/// The flag is kept raw so that values unknown to this build still decode
/// and can be answered with an "unknown message" reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedMessage {
    pub flag: u8,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl FlaggedMessage {
    /// Create a message with a payload
    pub fn new(flag: MessageFlag, payload: Value) -> Self {
        Self {
            flag: flag.as_u8(),
            payload,
        }
    }

    /// Create a message without payload
    pub fn bare(flag: MessageFlag) -> Self {
        Self::new(flag, Value::Null)
    }

    /// Classify the raw flag
    #[inline]
    pub fn message_flag(&self) -> Option<MessageFlag> {
        MessageFlag::from_u8(self.flag)
    }

    /// JSON rendering used in log lines and "unknown message" replies
    pub fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"flag\":{}}}", self.flag))
    }
}

/// Answer to a request: exactly one of `success` / `error` is set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub success: Option<Value>,
    pub error: Option<String>,
}

impl Reply {
    /// Successful reply
    pub fn success(value: Value) -> Self {
        Self {
            success: Some(value),
            error: None,
        }
    }

    /// Failed reply
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: None,
            error: Some(message.into()),
        }
    }

    /// Reply sent for a flag the receiver does not handle
    pub fn unknown_message(message: &FlaggedMessage) -> Self {
        Self::error(format!(
            "Unknown message received. FlaggedMessage: {}",
            message.describe()
        ))
    }

    /// Check if this is an error reply
    #[inline]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into a `Result`, treating an absent success value as `null`
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.success.unwrap_or(Value::Null)),
        }
    }
}

/// Unit transported over the channel
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Expects exactly one `Reply` with the same id
    Request { id: u64, message: FlaggedMessage },
    /// Answer to the request with the same id
    Reply { id: u64, reply: Reply },
    /// Unsolicited notification, never answered
    Push(FlaggedMessage),
}

impl Frame {
    /// Short name of the frame kind, for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Frame::Request { .. } => "request",
            Frame::Reply { .. } => "reply",
            Frame::Push(_) => "push",
        }
    }

    /// Encode frame to bytes with length prefix
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(256);

        // Reserve space for length prefix (filled in at end)
        buf.put_u32(0);

        match self {
            Frame::Request { id, message } => {
                buf.put_u8(FRAME_REQUEST);
                buf.put_u64(*id);
                buf.put_u8(message.flag);
                encode_json(&message.payload, &mut buf)?;
            }
            Frame::Reply { id, reply } => {
                buf.put_u8(FRAME_REPLY);
                buf.put_u64(*id);
                match &reply.success {
                    Some(value) => {
                        buf.put_u8(1);
                        encode_json(value, &mut buf)?;
                    }
                    None => buf.put_u8(0),
                }
                match &reply.error {
                    Some(error) => {
                        buf.put_u8(1);
                        encode_string(error, &mut buf);
                    }
                    None => buf.put_u8(0),
                }
            }
            Frame::Push(message) => {
                buf.put_u8(FRAME_PUSH);
                buf.put_u8(message.flag);
                encode_json(&message.payload, &mut buf)?;
            }
        }

        let len = buf.len() - crate::LENGTH_PREFIX_SIZE;
        if len > crate::MAX_FRAME_SIZE {
            return Err(ProtocolError::too_large(len));
        }
        buf[0..4].copy_from_slice(&(len as u32).to_be_bytes());

        Ok(buf.freeze())
    }

    /// Decode frame from bytes (without length prefix)
    ///
    /// Expects the body after the length prefix has been read.
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        if buf.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }

        let kind = buf.get_u8();

        match kind {
            FRAME_REQUEST => {
                let id = decode_u64(&mut buf, "request id")?;
                let flag = decode_u8(&mut buf, "request flag")?;
                let payload = decode_json(&mut buf)?;
                Ok(Frame::Request {
                    id,
                    message: FlaggedMessage { flag, payload },
                })
            }
            FRAME_REPLY => {
                let id = decode_u64(&mut buf, "reply id")?;
                let success = match decode_u8(&mut buf, "reply success tag")? {
                    0 => None,
                    _ => Some(decode_json(&mut buf)?),
                };
                let error = match decode_u8(&mut buf, "reply error tag")? {
                    0 => None,
                    _ => Some(decode_string(&mut buf)?),
                };
                Ok(Frame::Reply {
                    id,
                    reply: Reply { success, error },
                })
            }
            FRAME_PUSH => {
                let flag = decode_u8(&mut buf, "push flag")?;
                let payload = decode_json(&mut buf)?;
                Ok(Frame::Push(FlaggedMessage { flag, payload }))
            }
            other => Err(ProtocolError::UnknownFrameKind(other)),
        }
    }
}

// ============================================================================
// Encoding helpers
// ============================================================================

fn encode_string(s: &str, buf: &mut BytesMut) {
    let bytes = s.as_bytes();
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn encode_json(value: &Value, buf: &mut BytesMut) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(&bytes);
    Ok(())
}

fn decode_u8(buf: &mut Bytes, what: &'static str) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(buf.get_u8())
}

fn decode_u64(buf: &mut Bytes, what: &'static str) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(buf.get_u64())
}

fn decode_bytes(buf: &mut Bytes) -> Result<Bytes> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::Truncated("length"));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated("body"));
    }
    Ok(buf.split_to(len))
}

fn decode_string(buf: &mut Bytes) -> Result<String> {
    let bytes = decode_bytes(buf)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn decode_json(buf: &mut Bytes) -> Result<Value> {
    let bytes = decode_bytes(buf)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Read exactly 4 bytes for length prefix
pub fn read_length_prefix(buf: &[u8]) -> Option<u32> {
    if buf.len() < 4 {
        return None;
    }
    Some(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}
