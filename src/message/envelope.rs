//! Wire envelope for group activity messages.
//!
//! Every payload travels as a JSON document:
//!
//! ```text
//! {
//!   "message_type": "net.cockleburr.sample.choose-color.message",
//!   "sender": "6f0c...-uuid",
//!   "sent_at": "2026-10-19T08:00:00Z",
//!   "payload": { ...application fields... }
//! }
//! ```
//!
//! The `message_type` tag is checked before the payload is materialised so a
//! channel carrying another message type is detected as a caller contract
//! violation rather than a decoding failure.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error_handling::types::EnvelopeError;
use crate::platform::types::ParticipantId;

/// An application payload that can be exchanged inside a group session.
pub trait GroupActivityMessage:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
    /// Tag written into every envelope carrying this payload.
    const MESSAGE_TYPE: &'static str;
}

/// One message on the wire. Built for a single send, or materialised from a
/// single receive, and then dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope<P> {
    pub message_type: String,
    pub sender: ParticipantId,
    pub sent_at: DateTime<Utc>,
    pub payload: P,
}

impl<P: GroupActivityMessage> MessageEnvelope<P> {
    pub fn new(sender: ParticipantId, payload: P) -> Self {
        Self {
            message_type: P::MESSAGE_TYPE.to_string(),
            sender,
            sent_at: Utc::now(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }

    /// Decodes raw bytes into an envelope for `P`.
    ///
    /// Returns [`EnvelopeError::TypeMismatch`] when the bytes are a valid
    /// envelope for another message type, and [`EnvelopeError::Malformed`]
    /// when they are not a valid envelope for `P` at all.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let raw: MessageEnvelope<serde_json::Value> =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        if raw.message_type != P::MESSAGE_TYPE {
            return Err(EnvelopeError::TypeMismatch {
                expected: P::MESSAGE_TYPE.to_string(),
                found: raw.message_type,
            });
        }

        let payload: P = serde_json::from_value(raw.payload)
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        Ok(Self {
            message_type: raw.message_type,
            sender: raw.sender,
            sent_at: raw.sent_at,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    impl GroupActivityMessage for Ping {
        const MESSAGE_TYPE: &'static str = "test.ping";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pong {
        seq: u32,
    }

    impl GroupActivityMessage for Pong {
        const MESSAGE_TYPE: &'static str = "test.pong";
    }

    #[test]
    fn envelope_is_tagged_with_the_message_type() {
        let sender = ParticipantId::new();
        let bytes = MessageEnvelope::new(sender, Ping { seq: 7 })
            .encode()
            .expect("encode");

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message_type"], "test.ping");
        assert_eq!(json["payload"]["seq"], 7);

        let decoded = MessageEnvelope::<Ping>::decode(&bytes).expect("decode");
        assert_eq!(decoded.sender, sender);
        assert_eq!(decoded.payload, Ping { seq: 7 });
    }

    #[test]
    fn foreign_message_type_is_a_type_mismatch() {
        let bytes = MessageEnvelope::new(ParticipantId::new(), Pong { seq: 1 })
            .encode()
            .unwrap();

        match MessageEnvelope::<Ping>::decode(&bytes) {
            Err(EnvelopeError::TypeMismatch { expected, found }) => {
                assert_eq!(expected, "test.ping");
                assert_eq!(found, "test.pong");
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        let result = MessageEnvelope::<Ping>::decode(b"\x00\x01not json");
        assert!(matches!(result, Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn matching_tag_with_wrong_payload_shape_is_malformed() {
        let sender = ParticipantId::new();
        let bytes = serde_json::to_vec(&serde_json::json!({
            "message_type": "test.ping",
            "sender": sender,
            "sent_at": Utc::now(),
            "payload": { "seq": "seven" }
        }))
        .unwrap();

        let result = MessageEnvelope::<Ping>::decode(&bytes);
        assert!(matches!(result, Err(EnvelopeError::Malformed(_))));
    }
}
