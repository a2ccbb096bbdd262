// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON envelope.
//!
//! The engine reads three fields and nothing else: the `"t"` discriminator, `"deviceId"`
//! and `"seq"`. Everything else belongs to the callbacks, which get the raw bytes.
//!
//! Replies are built from small `Serialize` structs so field order on the air is fixed:
//!
//! ```text
//! {"t":"hello_ack","ch":6}
//! {"t":"ack","deviceId":"dev1","seq":7}
//! {"t":"get"}
//! {"t":"get","deviceId":"dev1"}
//! ```

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::EnvelopeError;

/// Value of the `"t"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `hello`, satellite announcing itself
    Hello,
    /// `hello_ack`, hub answer to `hello`
    HelloAck,
    /// `state`, satellite state report
    State,
    /// `target`, satellite reporting its setpoints
    Target,
    /// `ack`, hub acknowledging a `state` with `seq`
    Ack,
    /// `get`, hub asking for a state report
    Get,
    /// `set`, hub pushing new setpoints
    Set,
    /// Any other string
    Other,
}

impl MessageKind {
    /// Classify a `"t"` value.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "hello" => Self::Hello,
            "hello_ack" => Self::HelloAck,
            "state" => Self::State,
            "target" => Self::Target,
            "ack" => Self::Ack,
            "get" => Self::Get,
            "set" => Self::Set,
            _ => Self::Other,
        }
    }

    /// Wire tag (`"other"` for unknown kinds).
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::HelloAck => "hello_ack",
            Self::State => "state",
            Self::Target => "target",
            Self::Ack => "ack",
            Self::Get => "get",
            Self::Set => "set",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Parsed envelope.
#[derive(Debug, Clone)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Parse the leading JSON object of `payload`.
    ///
    /// Bytes after the first complete value are ignored, so a satellite sending a
    /// NUL-terminated string or trailing padding is still understood.
    pub fn parse(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let first = serde_json::Deserializer::from_slice(payload)
            .into_iter::<Value>()
            .next()
            .ok_or(EnvelopeError::Empty)?;
        match first? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(EnvelopeError::NotAnObject),
        }
    }

    /// Raw `"t"` string, if present.
    pub fn tag(&self) -> Option<&str> {
        self.fields.get("t").and_then(Value::as_str)
    }

    /// Message kind; `None` when `"t"` is missing or not a string.
    pub fn kind(&self) -> Option<MessageKind> {
        self.tag().map(MessageKind::from_tag)
    }

    /// Non-empty `"deviceId"` string.
    pub fn device_id(&self) -> Option<&str> {
        self.fields
            .get("deviceId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// `"seq"` when it is any JSON number, truncated toward zero and saturated to the
    /// 32-bit range the satellites count in.
    pub fn seq(&self) -> Option<i32> {
        let Value::Number(n) = self.fields.get("seq")? else {
            return None;
        };
        let wide = match (n.as_i64(), n.as_u64()) {
            (Some(v), _) => v,
            (None, Some(_)) => i64::MAX,
            // Float to int casts saturate
            (None, None) => n.as_f64()?.trunc() as i64,
        };
        let clamped = wide.clamp(i64::from(i32::MIN), i64::from(i32::MAX));
        Some(i32::try_from(clamped).unwrap_or(i32::MAX))
    }

    /// Any other field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

// ============================================================================
// Replies
// ============================================================================

#[derive(Serialize)]
struct HelloAck {
    t: &'static str,
    ch: u8,
}

#[derive(Serialize)]
struct Ack<'a> {
    t: &'static str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    seq: i32,
}

#[derive(Serialize)]
struct Get<'a> {
    t: &'static str,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
}

/// `{"t":"hello_ack","ch":N}`
pub fn hello_ack(channel: u8) -> Result<Vec<u8>, EnvelopeError> {
    Ok(serde_json::to_vec(&HelloAck {
        t: "hello_ack",
        ch: channel,
    })?)
}

/// `{"t":"ack","deviceId":"...","seq":N}`
pub fn ack(device_id: &str, seq: i32) -> Result<Vec<u8>, EnvelopeError> {
    Ok(serde_json::to_vec(&Ack {
        t: "ack",
        device_id,
        seq,
    })?)
}

/// `{"t":"get"}`, or `{"t":"get","deviceId":"..."}` when addressed by id.
pub fn get(device_id: Option<&str>) -> Result<Vec<u8>, EnvelopeError> {
    Ok(serde_json::to_vec(&Get { t: "get", device_id })?)
}

// ============================================================================
// Set commands
// ============================================================================

/// Set command ready for the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCommand {
    /// Device the command was addressed to, lifted out of the document.
    pub device_id: Option<String>,
    /// Compact JSON with `"t":"set"` and without `"deviceId"`.
    pub payload: Vec<u8>,
}

/// Turn a target document into a set command.
///
/// Floats are rounded to two decimals everywhere in the tree, `"t"` becomes `"set"`
/// (kept in place, or appended), and a non-empty `"deviceId"` is removed. Key order is
/// otherwise preserved.
pub fn normalize_set(document: &[u8]) -> Result<SetCommand, EnvelopeError> {
    let Value::Object(mut fields) = serde_json::from_slice(document)? else {
        return Err(EnvelopeError::NotAnObject);
    };

    for value in fields.values_mut() {
        round_floats(value);
    }

    fields.insert("t".to_owned(), Value::String("set".to_owned()));

    let device_id = match fields.get("deviceId") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        _ => None,
    };
    if device_id.is_some() {
        fields.shift_remove("deviceId");
    }

    let payload = serde_json::to_vec(&Value::Object(fields))?;
    Ok(SetCommand { device_id, payload })
}

/// Round every float in `value` to two decimals.
pub fn round_floats(value: &mut Value) {
    match value {
        Value::Number(n) if n.is_f64() => {
            if let Some(rounded) = n
                .as_f64()
                .and_then(|v| Number::from_f64((v * 100.0).round() / 100.0))
            {
                *n = rounded;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(round_floats),
        Value::Object(fields) => fields.values_mut().for_each(round_floats),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let env = Envelope::parse(br#"{"t":"state","deviceId":"dev1","seq":7,"temp":21.5}"#)
            .expect("parse");
        assert_eq!(env.kind(), Some(MessageKind::State));
        assert_eq!(env.device_id(), Some("dev1"));
        assert_eq!(env.seq(), Some(7));
        assert_eq!(env.get("temp"), Some(&serde_json::json!(21.5)));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(Envelope::parse(b"{not json"), Err(EnvelopeError::Json(_))));
        assert!(matches!(Envelope::parse(b"[1,2]"), Err(EnvelopeError::NotAnObject)));
        assert!(matches!(Envelope::parse(b""), Err(EnvelopeError::Empty)));
        assert!(matches!(Envelope::parse(b" \n"), Err(EnvelopeError::Empty)));
        assert!(matches!(Envelope::parse(b"[1,2]{}"), Err(EnvelopeError::NotAnObject)));
    }

    #[test]
    fn test_parse_ignores_trailing_bytes() {
        let env = Envelope::parse(b"{\"t\":\"hello\",\"deviceId\":\"dev1\"}\0").expect("parse");
        assert_eq!(env.kind(), Some(MessageKind::Hello));
        assert_eq!(env.device_id(), Some("dev1"));

        let env = Envelope::parse(b"{\"t\":\"state\"}\0\0\0garbage").expect("parse");
        assert_eq!(env.kind(), Some(MessageKind::State));
    }

    #[test]
    fn test_missing_or_odd_fields() {
        let env = Envelope::parse(br#"{"t":5,"deviceId":"","seq":"7"}"#).expect("parse");
        assert_eq!(env.kind(), None);
        assert_eq!(env.device_id(), None);
        assert_eq!(env.seq(), None);

        let env = Envelope::parse(br#"{"t":"bogus"}"#).expect("parse");
        assert_eq!(env.kind(), Some(MessageKind::Other));
        assert_eq!(env.tag(), Some("bogus"));
    }

    #[test]
    fn test_seq_truncates_floats() {
        let env = Envelope::parse(br#"{"seq":7.9}"#).expect("parse");
        assert_eq!(env.seq(), Some(7));
        let env = Envelope::parse(br#"{"seq":-2.5}"#).expect("parse");
        assert_eq!(env.seq(), Some(-2));
    }

    #[test]
    fn test_seq_saturates_to_32_bits() {
        let env = Envelope::parse(br#"{"seq":3000000000}"#).expect("parse");
        assert_eq!(env.seq(), Some(i32::MAX));
        let env = Envelope::parse(br#"{"seq":-3e9}"#).expect("parse");
        assert_eq!(env.seq(), Some(i32::MIN));
        let env = Envelope::parse(br#"{"seq":18446744073709551615}"#).expect("parse");
        assert_eq!(env.seq(), Some(i32::MAX));
        let env = Envelope::parse(br#"{"seq":2147483647}"#).expect("parse");
        assert_eq!(env.seq(), Some(i32::MAX));
    }

    #[test]
    fn test_reply_field_order() {
        assert_eq!(hello_ack(6).expect("json"), br#"{"t":"hello_ack","ch":6}"#.to_vec());
        assert_eq!(
            ack("dev1", 7).expect("json"),
            br#"{"t":"ack","deviceId":"dev1","seq":7}"#.to_vec()
        );
        assert_eq!(get(None).expect("json"), br#"{"t":"get"}"#.to_vec());
        assert_eq!(
            get(Some("dev1")).expect("json"),
            br#"{"t":"get","deviceId":"dev1"}"#.to_vec()
        );
    }

    #[test]
    fn test_ack_escapes_device_id() {
        let bytes = ack("a\"b", 1).expect("json");
        let env = Envelope::parse(&bytes).expect("parse");
        assert_eq!(env.device_id(), Some("a\"b"));
    }

    #[test]
    fn test_normalize_set() {
        let cmd = normalize_set(
            br#"{"t":"target","deviceId":"dev1","temp":21.456,"fan":{"speed":0.333,"on":true},"modes":[1.005,2]}"#,
        )
        .expect("normalize");

        assert_eq!(cmd.device_id.as_deref(), Some("dev1"));
        assert_eq!(
            std::str::from_utf8(&cmd.payload).expect("utf8"),
            r#"{"t":"set","temp":21.46,"fan":{"speed":0.33,"on":true},"modes":[1.0,2]}"#
        );
    }

    #[test]
    fn test_normalize_set_appends_t_and_keeps_empty_id() {
        let cmd = normalize_set(br#"{"deviceId":"","power":false}"#).expect("normalize");
        assert_eq!(cmd.device_id, None);
        assert_eq!(
            std::str::from_utf8(&cmd.payload).expect("utf8"),
            r#"{"deviceId":"","power":false,"t":"set"}"#
        );
    }

    #[test]
    fn test_normalize_set_rejects_non_object() {
        assert!(matches!(normalize_set(b"42"), Err(EnvelopeError::NotAnObject)));
        assert!(matches!(normalize_set(b"{"), Err(EnvelopeError::Json(_))));
    }
}
