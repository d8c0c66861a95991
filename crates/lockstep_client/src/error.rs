//! # Client Error Types
//!
//! All errors that can occur between receiving bytes and committing a world.

use lockstep_core::{DecodeError, EngineFault, PlayerId};
use lockstep_shared::{EncodeError, ParseError};
use thiserror::Error;

use crate::transport::TransportError;

/// A batch could not be applied in full.
///
/// The stepper keeps whatever world the last successful engine call
/// produced; there is no rollback.
#[derive(Error, Debug)]
pub enum StepError {
    /// A player's input bytes were rejected by the engine.
    #[error("input from {player} could not be decoded")]
    Decode {
        /// Owner of the rejected input.
        player: PlayerId,
        /// Engine detail.
        #[source]
        source: DecodeError,
    },

    /// The engine refused a transition.
    #[error("engine fault while stepping: {0}")]
    Engine(#[from] EngineFault),

    /// A batch reached a session with no live world.
    #[error("batch delivered before any baseline was applied")]
    NotSynced,
}

/// An inbound message was dropped before reaching the stepper.
#[derive(Error, Debug)]
pub enum SequencerError {
    /// Malformed or incomplete JSON.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A second Baseline arrived on a synced connection under the
    /// reject policy.
    #[error("baseline for frame {frame} arrived after sync")]
    UnexpectedBaseline {
        /// Frame the rejected Baseline carried.
        frame: u64,
    },
}

/// Anything a session or client can surface to its caller.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Message dropped by the sequencer.
    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    /// The Baseline's world could not be decoded; the session was reset.
    #[error("baseline rejected: {0}")]
    Baseline(#[source] DecodeError),

    /// A batch failed part-way.
    #[error(transparent)]
    Step(#[from] StepError),

    /// Encoding local input for the authority failed.
    #[error("local input could not be prepared: {0}")]
    LocalInput(#[source] DecodeError),

    /// The engine refused to encode local input.
    #[error(transparent)]
    Engine(#[from] EngineFault),

    /// Outbound message could not be serialized.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The transport refused an outbound message.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for stepping.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
