//! Wire messages exchanged with the authority.
//!
//! Everything is JSON with camelCase field names. Byte payloads are plain
//! arrays of integers; they are opaque to this crate and owned by the engine.
//!
//! ## Classification
//!
//! Inbound messages carry no tag. A payload with `world`, `frame` and
//! `localPlayerId` is a [`Baseline`]; anything else is an [`InputBatch`].

use std::collections::HashMap;

use lockstep_core::{Frame, PlayerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EncodeResult, MessageKind, ParseError, ParseResult};

/// Fields whose joint presence marks a Baseline.
pub const BASELINE_FIELDS: [&str; 3] = ["world", "frame", "localPlayerId"];

/// Authoritative snapshot that starts a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    /// Frame the snapshot was taken at.
    pub frame: Frame,
    /// Identity the authority assigned to this client.
    pub local_player_id: PlayerId,
    /// Engine-encoded world.
    pub world: Vec<u8>,
}

/// Roster changes and player inputs for one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBatch {
    /// Frame this batch advances the simulation to.
    pub frame: Frame,
    /// Players joining, in join order.
    pub new_players: Vec<PlayerId>,
    /// Players leaving, in leave order.
    pub removed_players: Vec<PlayerId>,
    /// Engine-encoded input per player.
    pub inputs: HashMap<PlayerId, Vec<u8>>,
}

impl InputBatch {
    /// Input owners in ascending id order.
    ///
    /// This is the only order inputs may be applied in; never iterate
    /// `inputs` directly.
    #[must_use]
    pub fn sorted_input_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.inputs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// A classified inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerMessage {
    /// Authoritative snapshot.
    Baseline(Baseline),
    /// Per-frame batch.
    Batch(InputBatch),
}

impl ServerMessage {
    /// Kind of this message.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Baseline(_) => MessageKind::Baseline,
            Self::Batch(_) => MessageKind::InputBatch,
        }
    }

    /// Serializes the message the way the authority sends it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EncodeError`] if serialization fails.
    pub fn encode(&self) -> EncodeResult<Vec<u8>> {
        let bytes = match self {
            Self::Baseline(baseline) => serde_json::to_vec(baseline)?,
            Self::Batch(batch) => serde_json::to_vec(batch)?,
        };
        Ok(bytes)
    }
}

impl From<Baseline> for ServerMessage {
    fn from(baseline: Baseline) -> Self {
        Self::Baseline(baseline)
    }
}

impl From<InputBatch> for ServerMessage {
    fn from(batch: InputBatch) -> Self {
        Self::Batch(batch)
    }
}

/// Local input addressed to the authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundInput {
    /// Frame the input is meant for.
    pub frame: Frame,
    /// Engine-encoded input.
    pub input: Vec<u8>,
}

impl OutboundInput {
    /// Serializes for the transport.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EncodeError`] if serialization fails.
    pub fn encode(&self) -> EncodeResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an outbound message, for authorities and test peers.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the bytes are not an outbound input.
    pub fn decode(bytes: &[u8]) -> ParseResult<Self> {
        serde_json::from_slice(bytes).map_err(ParseError::Json)
    }
}

/// Parses and classifies one inbound message.
///
/// # Errors
///
/// Returns [`ParseError`] if the bytes are not JSON, not an object, or are
/// missing a field their classification requires.
pub fn decode_server_message(bytes: &[u8]) -> ParseResult<ServerMessage> {
    let value: Value = serde_json::from_slice(bytes).map_err(ParseError::Json)?;
    let Value::Object(fields) = &value else {
        return Err(ParseError::NotAnObject {
            found: json_type(&value),
        });
    };

    let kind = if BASELINE_FIELDS.iter().all(|field| fields.contains_key(*field)) {
        MessageKind::Baseline
    } else {
        MessageKind::InputBatch
    };
    tracing::trace!(%kind, len = bytes.len(), "classified inbound message");

    if kind == MessageKind::Baseline {
        serde_json::from_value(value)
            .map(ServerMessage::Baseline)
            .map_err(|source| ParseError::Invalid {
                kind: MessageKind::Baseline,
                source,
            })
    } else {
        serde_json::from_value(value)
            .map(ServerMessage::Batch)
            .map_err(|source| ParseError::Invalid {
                kind: MessageKind::InputBatch,
                source,
            })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
