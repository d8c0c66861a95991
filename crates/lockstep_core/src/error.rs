//! # Engine Error Types
//!
//! All errors that can cross the engine boundary.

use thiserror::Error;

use crate::handle::RawHandle;

/// Which kind of payload a decode was attempted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload {
    /// A serialized world snapshot.
    World,
    /// A serialized player input.
    Input,
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::World => f.write_str("world"),
            Self::Input => f.write_str("input"),
        }
    }
}

/// The engine refused or failed a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFault {
    /// The handle does not name a live engine resource.
    #[error("unknown handle {0:?}")]
    UnknownHandle(RawHandle),

    /// The handle names a resource of another kind.
    #[error("handle {handle:?} is not a {expected}")]
    WrongKind {
        /// Offending handle.
        handle: RawHandle,
        /// Kind the call required.
        expected: &'static str,
    },

    /// The bytes in a buffer could not be decoded.
    #[error("malformed {payload}: {reason}")]
    Malformed {
        /// What was being decoded.
        payload: Payload,
        /// Engine-provided detail.
        reason: String,
    },

    /// The engine trapped while executing the call.
    #[error("engine trapped in `{call}`: {reason}")]
    Trap {
        /// Name of the exported call.
        call: &'static str,
        /// Engine-provided detail.
        reason: String,
    },
}

/// World or input bytes could not be turned into an engine resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to decode {payload} ({len} bytes): {fault}")]
pub struct DecodeError {
    /// What was being decoded.
    pub payload: Payload,
    /// Size of the rejected payload.
    pub len: usize,
    /// Underlying engine fault.
    #[source]
    pub fault: EngineFault,
}

/// Result type for raw engine calls.
pub type EngineResult<T> = Result<T, EngineFault>;
