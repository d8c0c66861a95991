//! # Engine Binding
//!
//! Typed façade over a [`RawEngine`]. Translates domain operations into
//! engine calls and moves bytes across the opaque boundary.
//!
//! ## Marshaling
//!
//! ```text
//! bytes ──► allocate_buffer(len) ──► write_buffer ──► decode_* ──► handle
//!                  │                                     │
//!                  └──────── released when the call returns, ok or not
//! ```

use std::rc::Rc;

use crate::engine::RawEngine;
use crate::error::{DecodeError, EngineResult, Payload};
use crate::handle::{Buffer, Input, RawHandle, World};
use crate::ids::PlayerId;

/// Typed engine binding.
///
/// Cheap to clone; clones share the same engine instance.
pub struct Engine<E: RawEngine> {
    raw: Rc<E>,
}

impl<E: RawEngine> Clone for Engine<E> {
    fn clone(&self) -> Self {
        Self {
            raw: Rc::clone(&self.raw),
        }
    }
}

impl<E: RawEngine> Engine<E> {
    /// Binds an engine instance.
    #[must_use]
    pub fn new(raw: E) -> Self {
        Self { raw: Rc::new(raw) }
    }

    /// Binds an engine instance that is also referenced elsewhere
    /// (e.g. by an instrumented test harness).
    #[must_use]
    pub fn from_shared(raw: Rc<E>) -> Self {
        Self { raw }
    }

    /// Returns the raw engine, for callers that need exports this binding
    /// does not wrap (rendering, diagnostics).
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &E {
        &self.raw
    }

    /// Decodes a world snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the engine rejects the bytes or fails to
    /// stage them.
    pub fn decode_world(&self, bytes: &[u8]) -> Result<World<E>, DecodeError> {
        let raw = self.decode_with(bytes, Payload::World, |engine, buffer| engine.decode_world(buffer))?;
        Ok(World::adopt(&self.raw, raw))
    }

    /// Decodes one player input.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the engine rejects the bytes or fails to
    /// stage them.
    pub fn decode_input(&self, bytes: &[u8]) -> Result<Input<E>, DecodeError> {
        let raw = self.decode_with(bytes, Payload::Input, |engine, buffer| engine.decode_input(buffer))?;
        Ok(Input::adopt(&self.raw, raw))
    }

    /// Serializes an input back to bytes.
    ///
    /// # Errors
    ///
    /// Returns the engine fault if encoding or reading the buffer fails.
    pub fn encode_input(&self, input: &Input<E>) -> EngineResult<Vec<u8>> {
        let buffer = self.raw.encode_input(input.raw())?;
        self.read_out(buffer)
    }

    /// Serializes a world snapshot to bytes.
    ///
    /// This is the only sanctioned way to hand world state to another thread.
    ///
    /// # Errors
    ///
    /// Returns the engine fault if encoding or reading the buffer fails.
    pub fn encode_world(&self, world: &World<E>) -> EngineResult<Vec<u8>> {
        let buffer = self.raw.encode_world(world.raw())?;
        self.read_out(buffer)
    }

    /// Advances `world` by one tick, releasing the superseded snapshot.
    ///
    /// # Errors
    ///
    /// On a fault `world` is left untouched.
    pub fn tick_world(&self, world: &mut World<E>) -> EngineResult<()> {
        let next = self.raw.tick_world(world.raw())?;
        world.supersede(next);
        Ok(())
    }

    /// Joins `player` into `world`, releasing the superseded snapshot.
    ///
    /// # Errors
    ///
    /// On a fault `world` is left untouched.
    pub fn add_player(&self, world: &mut World<E>, player: PlayerId) -> EngineResult<()> {
        let next = self.raw.add_player(world.raw(), player.to_u32())?;
        world.supersede(next);
        Ok(())
    }

    /// Removes `player` from `world`, releasing the superseded snapshot.
    ///
    /// # Errors
    ///
    /// On a fault `world` is left untouched.
    pub fn remove_player(&self, world: &mut World<E>, player: PlayerId) -> EngineResult<()> {
        let next = self.raw.remove_player(world.raw(), player.to_u32())?;
        world.supersede(next);
        Ok(())
    }

    /// Applies `input` for `player`, releasing the superseded snapshot.
    ///
    /// The input is only borrowed; releasing it stays with the caller.
    ///
    /// # Errors
    ///
    /// On a fault `world` is left untouched.
    pub fn apply_input(&self, world: &mut World<E>, player: PlayerId, input: &Input<E>) -> EngineResult<()> {
        let next = self.raw.apply_input(world.raw(), player.to_u32(), input.raw())?;
        world.supersede(next);
        Ok(())
    }

    /// Stages `bytes` in a fresh engine buffer and runs `decode` on it.
    /// The buffer is released before this returns on every path.
    fn decode_with<F>(&self, bytes: &[u8], payload: Payload, decode: F) -> Result<RawHandle, DecodeError>
    where
        F: FnOnce(&E, RawHandle) -> EngineResult<RawHandle>,
    {
        let staged = self.stage(bytes).and_then(|buffer| decode(&*self.raw, buffer.raw()));
        staged.map_err(|fault| {
            tracing::debug!(%payload, len = bytes.len(), %fault, "engine rejected payload");
            DecodeError {
                payload,
                len: bytes.len(),
                fault,
            }
        })
    }

    fn stage(&self, bytes: &[u8]) -> EngineResult<Buffer<E>> {
        let buffer = Buffer::adopt(&self.raw, self.raw.allocate_buffer(bytes.len())?);
        self.raw.write_buffer(buffer.raw(), bytes)?;
        Ok(buffer)
    }

    fn read_out(&self, buffer: RawHandle) -> EngineResult<Vec<u8>> {
        let buffer = Buffer::adopt(&self.raw, buffer);
        self.raw.read_buffer(buffer.raw())
    }
}
