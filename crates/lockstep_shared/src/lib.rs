//! # LOCKSTEP Shared
//!
//! Wire protocol spoken between a lockstep client and its authority.
//!
//! ## CRITICAL RULE
//!
//! This crate decodes and encodes messages only. It must never call into an
//! engine; the client crate does that.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod protocol;

pub use error::{EncodeError, EncodeResult, MessageKind, ParseError, ParseResult};
pub use protocol::{decode_server_message, Baseline, InputBatch, OutboundInput, ServerMessage};
