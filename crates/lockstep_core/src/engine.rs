//! # Raw Engine ABI
//!
//! The capability set exported by a simulation engine, one method per export.
//! Every resource is named by an untyped [`RawHandle`]; nothing here enforces
//! ownership. Use [`crate::Engine`] instead of calling these directly.
//!
//! ## Ownership Contract
//!
//! ```text
//! call                       argument handles      returned handle
//! ─────────────────────────  ────────────────────  ─────────────────
//! allocate_buffer            -                     new buffer
//! decode_world / _input      borrowed (buffer)     new world / input
//! encode_world / _input      borrowed              new buffer
//! tick / add / remove        borrowed (world)      new world
//! apply_input                borrowed (world, in)  new world
//! release_handle             consumed              -
//! ```
//!
//! No call except `release_handle` frees its arguments. Every returned handle
//! must be released exactly once by the caller.

use crate::error::EngineResult;
use crate::handle::RawHandle;

/// Low-level engine exports.
///
/// Methods take `&self`: engines backed by a VM instance or a handle table use
/// interior mutability, and the owned handle types share the engine through an
/// `Rc`.
pub trait RawEngine {
    /// Allocates an engine-side byte buffer of exactly `size` bytes.
    fn allocate_buffer(&self, size: usize) -> EngineResult<RawHandle>;

    /// Copies `bytes` into the start of a buffer.
    fn write_buffer(&self, buffer: RawHandle, bytes: &[u8]) -> EngineResult<()>;

    /// Copies the full contents of a buffer out of the engine.
    fn read_buffer(&self, buffer: RawHandle) -> EngineResult<Vec<u8>>;

    /// Decodes a world snapshot from a buffer.
    fn decode_world(&self, buffer: RawHandle) -> EngineResult<RawHandle>;

    /// Serializes a world into a new buffer.
    fn encode_world(&self, world: RawHandle) -> EngineResult<RawHandle>;

    /// Decodes one player input from a buffer.
    fn decode_input(&self, buffer: RawHandle) -> EngineResult<RawHandle>;

    /// Serializes an input into a new buffer.
    fn encode_input(&self, input: RawHandle) -> EngineResult<RawHandle>;

    /// Advances the world by one simulation tick.
    fn tick_world(&self, world: RawHandle) -> EngineResult<RawHandle>;

    /// Returns a world with `player` joined.
    fn add_player(&self, world: RawHandle, player: u32) -> EngineResult<RawHandle>;

    /// Returns a world with `player` removed.
    fn remove_player(&self, world: RawHandle, player: u32) -> EngineResult<RawHandle>;

    /// Returns a world with `input` applied on behalf of `player`.
    fn apply_input(&self, world: RawHandle, player: u32, input: RawHandle) -> EngineResult<RawHandle>;

    /// Frees any handle previously returned by this engine.
    fn release_handle(&self, handle: RawHandle);
}
