//! # Instrumented Fake Engine
//!
//! [`RecordingEngine`] implements the raw ABI with a trivially inspectable
//! world model, logs every call, and tracks the live and released handle sets.
//! It never reuses ids, so a handle that shows up after its release is always
//! reported as a [`Violation`] rather than silently aliasing a new resource.
//!
//! Enabled for this crate's tests and, through the `test-support` feature, for
//! downstream crates.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::engine::RawEngine;
use crate::error::{EngineFault, EngineResult, Payload};
use crate::handle::RawHandle;

/// Input payloads starting with this byte are rejected as malformed.
pub const MALFORMED_MARKER: u8 = 0xFF;

/// The fake engine's world model. Serialized as JSON; an empty payload decodes
/// to [`FakeWorld::default`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeWorld {
    /// Number of ticks applied since the baseline.
    pub ticks: u64,
    /// Players currently joined.
    pub players: BTreeSet<u32>,
    /// Every applied input, in application order.
    pub applied: Vec<(u32, Vec<u8>)>,
}

impl FakeWorld {
    /// Serializes the world the way [`RecordingEngine`] expects it.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parses bytes produced by [`FakeWorld::to_bytes`] or `encode_world`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return Some(Self::default());
        }
        serde_json::from_slice(bytes).ok()
    }
}

/// One recorded engine call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
    /// `allocate_buffer(size)`
    AllocateBuffer(usize),
    /// `write_buffer(buffer, ..)`
    WriteBuffer(RawHandle),
    /// `read_buffer(buffer)`
    ReadBuffer(RawHandle),
    /// `decode_world(buffer)`
    DecodeWorld(RawHandle),
    /// `encode_world(world)`
    EncodeWorld(RawHandle),
    /// `decode_input(buffer)`
    DecodeInput(RawHandle),
    /// `encode_input(input)`
    EncodeInput(RawHandle),
    /// `tick_world(..)`
    TickWorld,
    /// `add_player(.., player)`
    AddPlayer(u32),
    /// `remove_player(.., player)`
    RemovePlayer(u32),
    /// `apply_input(.., player, input)` with the input's payload
    ApplyInput(u32, Vec<u8>),
    /// `release_handle(handle)`
    Release(RawHandle),
}

impl EngineCall {
    /// Whether this call produces a new world from an old one.
    #[must_use]
    pub fn is_world_transition(&self) -> bool {
        matches!(
            self,
            Self::TickWorld | Self::AddPlayer(_) | Self::RemovePlayer(_) | Self::ApplyInput(..)
        )
    }
}

/// An ownership-contract breach observed by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// A handle was released twice.
    DoubleRelease(RawHandle),
    /// A released handle was passed to a call.
    UseAfterRelease {
        /// The export that received it.
        call: &'static str,
        /// The stale handle.
        handle: RawHandle,
    },
    /// A handle this engine never issued.
    Unknown(RawHandle),
}

enum Object {
    Buffer(Vec<u8>),
    World(FakeWorld),
    Input(Vec<u8>),
}

#[derive(Default)]
struct State {
    next_id: u32,
    live: HashMap<RawHandle, Object>,
    releases: HashMap<RawHandle, usize>,
    calls: Vec<EngineCall>,
    violations: Vec<Violation>,
}

impl State {
    fn insert(&mut self, object: Object) -> RawHandle {
        let handle = RawHandle::new(self.next_id);
        self.next_id += 1;
        self.live.insert(handle, object);
        handle
    }

    fn lookup(&mut self, call: &'static str, handle: RawHandle) -> EngineResult<&mut Object> {
        if !self.live.contains_key(&handle) {
            let violation = if self.releases.contains_key(&handle) {
                Violation::UseAfterRelease { call, handle }
            } else {
                Violation::Unknown(handle)
            };
            self.violations.push(violation);
            return Err(EngineFault::UnknownHandle(handle));
        }
        self.live.get_mut(&handle).ok_or(EngineFault::UnknownHandle(handle))
    }

    fn world(&mut self, call: &'static str, handle: RawHandle) -> EngineResult<FakeWorld> {
        match self.lookup(call, handle)? {
            Object::World(world) => Ok(world.clone()),
            _ => Err(EngineFault::WrongKind { handle, expected: "world" }),
        }
    }

    fn input(&mut self, call: &'static str, handle: RawHandle) -> EngineResult<Vec<u8>> {
        match self.lookup(call, handle)? {
            Object::Input(bytes) => Ok(bytes.clone()),
            _ => Err(EngineFault::WrongKind { handle, expected: "input" }),
        }
    }

    fn buffer(&mut self, call: &'static str, handle: RawHandle) -> EngineResult<&mut Vec<u8>> {
        match self.lookup(call, handle)? {
            Object::Buffer(bytes) => Ok(bytes),
            _ => Err(EngineFault::WrongKind { handle, expected: "buffer" }),
        }
    }
}

/// Instrumented in-memory engine.
#[derive(Default)]
pub struct RecordingEngine {
    state: RefCell<State>,
    fail_next: Cell<bool>,
}

impl RecordingEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next fallible call trap.
    pub fn fail_next_call(&self) {
        self.fail_next.set(true);
    }

    /// Issues an empty world handle directly, bypassing the binding.
    pub fn mint_world(&self) -> RawHandle {
        self.state.borrow_mut().insert(Object::World(FakeWorld::default()))
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.borrow().calls.clone()
    }

    /// Only the world-producing calls, in order.
    #[must_use]
    pub fn world_transitions(&self) -> Vec<EngineCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| call.is_world_transition())
            .cloned()
            .collect()
    }

    /// Forgets the call log.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Number of handles issued and not yet released.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Number of live world handles.
    #[must_use]
    pub fn live_worlds(&self) -> usize {
        self.state
            .borrow()
            .live
            .values()
            .filter(|object| matches!(object, Object::World(_)))
            .count()
    }

    /// How many times `handle` was released.
    #[must_use]
    pub fn release_count(&self, handle: RawHandle) -> usize {
        self.state.borrow().releases.get(&handle).copied().unwrap_or(0)
    }

    /// Every contract breach observed so far.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        self.state.borrow().violations.clone()
    }

    /// Reads a live world without going through a buffer.
    #[must_use]
    pub fn peek_world(&self, handle: RawHandle) -> Option<FakeWorld> {
        match self.state.borrow().live.get(&handle) {
            Some(Object::World(world)) => Some(world.clone()),
            _ => None,
        }
    }

    fn enter(&self, call: EngineCall, name: &'static str) -> EngineResult<std::cell::RefMut<'_, State>> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if self.fail_next.replace(false) {
            return Err(EngineFault::Trap {
                call: name,
                reason: "injected failure".to_string(),
            });
        }
        Ok(state)
    }

    fn transition<F>(&self, call: EngineCall, name: &'static str, world: RawHandle, f: F) -> EngineResult<RawHandle>
    where
        F: FnOnce(&mut FakeWorld),
    {
        let mut state = self.enter(call, name)?;
        let mut next = state.world(name, world)?;
        f(&mut next);
        Ok(state.insert(Object::World(next)))
    }
}

impl RawEngine for RecordingEngine {
    fn allocate_buffer(&self, size: usize) -> EngineResult<RawHandle> {
        let mut state = self.enter(EngineCall::AllocateBuffer(size), "allocate_buffer")?;
        Ok(state.insert(Object::Buffer(vec![0; size])))
    }

    fn write_buffer(&self, buffer: RawHandle, bytes: &[u8]) -> EngineResult<()> {
        let mut state = self.enter(EngineCall::WriteBuffer(buffer), "write_buffer")?;
        let target = state.buffer("write_buffer", buffer)?;
        if bytes.len() > target.len() {
            return Err(EngineFault::Trap {
                call: "write_buffer",
                reason: format!("{} bytes into a {} byte buffer", bytes.len(), target.len()),
            });
        }
        target[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn read_buffer(&self, buffer: RawHandle) -> EngineResult<Vec<u8>> {
        let mut state = self.enter(EngineCall::ReadBuffer(buffer), "read_buffer")?;
        let bytes = state.buffer("read_buffer", buffer)?.clone();
        Ok(bytes)
    }

    fn decode_world(&self, buffer: RawHandle) -> EngineResult<RawHandle> {
        let mut state = self.enter(EngineCall::DecodeWorld(buffer), "decode_world")?;
        let bytes = state.buffer("decode_world", buffer)?.clone();
        let world = FakeWorld::from_bytes(&bytes).ok_or_else(|| EngineFault::Malformed {
            payload: Payload::World,
            reason: "not a fake world".to_string(),
        })?;
        Ok(state.insert(Object::World(world)))
    }

    fn encode_world(&self, world: RawHandle) -> EngineResult<RawHandle> {
        let mut state = self.enter(EngineCall::EncodeWorld(world), "encode_world")?;
        let bytes = state.world("encode_world", world)?.to_bytes();
        Ok(state.insert(Object::Buffer(bytes)))
    }

    fn decode_input(&self, buffer: RawHandle) -> EngineResult<RawHandle> {
        let mut state = self.enter(EngineCall::DecodeInput(buffer), "decode_input")?;
        let bytes = state.buffer("decode_input", buffer)?.clone();
        if bytes.first() == Some(&MALFORMED_MARKER) {
            return Err(EngineFault::Malformed {
                payload: Payload::Input,
                reason: "marker byte".to_string(),
            });
        }
        Ok(state.insert(Object::Input(bytes)))
    }

    fn encode_input(&self, input: RawHandle) -> EngineResult<RawHandle> {
        let mut state = self.enter(EngineCall::EncodeInput(input), "encode_input")?;
        let bytes = state.input("encode_input", input)?;
        Ok(state.insert(Object::Buffer(bytes)))
    }

    fn tick_world(&self, world: RawHandle) -> EngineResult<RawHandle> {
        self.transition(EngineCall::TickWorld, "tick_world", world, |w| w.ticks += 1)
    }

    fn add_player(&self, world: RawHandle, player: u32) -> EngineResult<RawHandle> {
        self.transition(EngineCall::AddPlayer(player), "add_player", world, |w| {
            w.players.insert(player);
        })
    }

    fn remove_player(&self, world: RawHandle, player: u32) -> EngineResult<RawHandle> {
        self.transition(EngineCall::RemovePlayer(player), "remove_player", world, |w| {
            w.players.remove(&player);
        })
    }

    fn apply_input(&self, world: RawHandle, player: u32, input: RawHandle) -> EngineResult<RawHandle> {
        let payload = self.state.borrow_mut().input("apply_input", input)?;
        let call = EngineCall::ApplyInput(player, payload.clone());
        self.transition(call, "apply_input", world, |w| w.applied.push((player, payload)))
    }

    fn release_handle(&self, handle: RawHandle) {
        let mut state = self.state.borrow_mut();
        state.calls.push(EngineCall::Release(handle));
        let previous = state.releases.get(&handle).copied().unwrap_or(0);
        if state.live.remove(&handle).is_some() {
            state.releases.insert(handle, previous + 1);
        } else if previous > 0 {
            state.releases.insert(handle, previous + 1);
            state.violations.push(Violation::DoubleRelease(handle));
        } else {
            state.violations.push(Violation::Unknown(handle));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_release_is_reported() {
        let engine = RecordingEngine::new();
        let world = engine.mint_world();
        engine.release_handle(world);
        engine.release_handle(world);

        assert_eq!(engine.violations(), vec![Violation::DoubleRelease(world)]);
        assert_eq!(engine.release_count(world), 2);
    }

    #[test]
    fn test_use_after_release_is_reported() {
        let engine = RecordingEngine::new();
        let world = engine.mint_world();
        engine.release_handle(world);

        assert!(engine.tick_world(world).is_err());
        assert_eq!(
            engine.violations(),
            vec![Violation::UseAfterRelease { call: "tick_world", handle: world }]
        );
    }

    #[test]
    fn test_ids_are_never_reused() {
        let engine = RecordingEngine::new();
        let first = engine.mint_world();
        engine.release_handle(first);
        let second = engine.mint_world();
        assert_ne!(first, second);
    }

    #[test]
    fn test_transitions_do_not_consume_arguments() {
        let engine = RecordingEngine::new();
        let world = engine.mint_world();
        let next = engine.add_player(world, 4).unwrap();

        assert_eq!(engine.live_worlds(), 2);
        assert!(engine.peek_world(world).unwrap().players.is_empty());
        assert!(engine.peek_world(next).unwrap().players.contains(&4));
    }
}
