//! # Native Engine Host
//!
//! Runs a plain Rust [`Simulation`] behind the raw handle ABI, so the client
//! can drive it exactly like an external module.
//!
//! ## Handle Table
//!
//! Resources live in a growable slot table with a free list. Handles are slot
//! indices and are reused after release.
//!
//! ```text
//! slots:     [ World | None | Input | Buffer | None ]
//! free_list: [4, 1]          (pop → next allocation)
//! ```

use std::cell::RefCell;

use crate::engine::RawEngine;
use crate::error::{EngineFault, EngineResult, Payload};
use crate::handle::RawHandle;
use crate::ids::PlayerId;

/// A deterministic simulation expressed as pure transitions.
///
/// Every transition returns a new world and leaves its argument untouched;
/// the host takes care of handles.
pub trait Simulation {
    /// World snapshot.
    type World;
    /// One player's command for one frame.
    type Input;

    /// Parses a world snapshot.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the bytes are malformed.
    fn decode_world(&self, bytes: &[u8]) -> Result<Self::World, String>;

    /// Serializes a world snapshot.
    fn encode_world(&self, world: &Self::World) -> Vec<u8>;

    /// Parses one input.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the bytes are malformed.
    fn decode_input(&self, bytes: &[u8]) -> Result<Self::Input, String>;

    /// Serializes one input.
    fn encode_input(&self, input: &Self::Input) -> Vec<u8>;

    /// Advances one tick.
    fn tick(&self, world: &Self::World) -> Self::World;

    /// Joins a player.
    fn add_player(&self, world: &Self::World, player: PlayerId) -> Self::World;

    /// Removes a player.
    fn remove_player(&self, world: &Self::World, player: PlayerId) -> Self::World;

    /// Applies a player's input.
    fn apply_input(&self, world: &Self::World, player: PlayerId, input: &Self::Input) -> Self::World;
}

enum Object<S: Simulation> {
    World(S::World),
    Input(S::Input),
    Buffer(Vec<u8>),
}

/// Growable slot table with a free list.
struct SlotTable<T> {
    slots: Vec<Option<T>>,
    free_list: Vec<usize>,
}

impl<T> SlotTable<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    fn insert(&mut self, value: T) -> EngineResult<RawHandle> {
        let index = if let Some(index) = self.free_list.pop() {
            self.slots[index] = Some(value);
            index
        } else {
            self.slots.push(Some(value));
            self.slots.len() - 1
        };
        let id = u32::try_from(index).map_err(|_| EngineFault::Trap {
            call: "insert",
            reason: "handle table exhausted".to_string(),
        })?;
        Ok(RawHandle::new(id))
    }

    fn get(&self, handle: RawHandle) -> EngineResult<&T> {
        self.slots
            .get(handle.id() as usize)
            .and_then(Option::as_ref)
            .ok_or(EngineFault::UnknownHandle(handle))
    }

    fn get_mut(&mut self, handle: RawHandle) -> EngineResult<&mut T> {
        self.slots
            .get_mut(handle.id() as usize)
            .and_then(Option::as_mut)
            .ok_or(EngineFault::UnknownHandle(handle))
    }

    fn remove(&mut self, handle: RawHandle) -> Option<T> {
        let index = handle.id() as usize;
        let value = self.slots.get_mut(index)?.take()?;
        self.free_list.push(index);
        Some(value)
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

/// Raw engine hosting a [`Simulation`] in-process.
pub struct NativeEngine<S: Simulation> {
    sim: S,
    objects: RefCell<SlotTable<Object<S>>>,
}

impl<S: Simulation> NativeEngine<S> {
    /// Hosts `sim` with an empty handle table.
    #[must_use]
    pub fn new(sim: S) -> Self {
        Self {
            sim,
            objects: RefCell::new(SlotTable::new()),
        }
    }

    /// Returns the hosted simulation.
    #[must_use]
    pub fn simulation(&self) -> &S {
        &self.sim
    }

    /// Number of live handles of any kind.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.objects.borrow().len()
    }

    /// Borrows a live world, e.g. for a render sink drawing it.
    ///
    /// # Errors
    ///
    /// Returns a fault if `world` is not a live world handle.
    pub fn with_world<R>(&self, world: RawHandle, f: impl FnOnce(&S::World) -> R) -> EngineResult<R> {
        let objects = self.objects.borrow();
        let Object::World(w) = objects.get(world)? else {
            return Err(EngineFault::WrongKind { handle: world, expected: "world" });
        };
        Ok(f(w))
    }

    fn insert(&self, object: Object<S>) -> EngineResult<RawHandle> {
        self.objects.borrow_mut().insert(object)
    }

    fn transition<F>(&self, world: RawHandle, f: F) -> EngineResult<RawHandle>
    where
        F: FnOnce(&S, &S::World) -> S::World,
    {
        let next = self.with_world(world, |w| f(&self.sim, w))?;
        self.insert(Object::World(next))
    }

    fn buffer_bytes(&self, buffer: RawHandle) -> EngineResult<Vec<u8>> {
        match self.objects.borrow().get(buffer)? {
            Object::Buffer(bytes) => Ok(bytes.clone()),
            _ => Err(EngineFault::WrongKind { handle: buffer, expected: "buffer" }),
        }
    }
}

impl<S: Simulation> RawEngine for NativeEngine<S> {
    fn allocate_buffer(&self, size: usize) -> EngineResult<RawHandle> {
        self.insert(Object::Buffer(vec![0; size]))
    }

    fn write_buffer(&self, buffer: RawHandle, bytes: &[u8]) -> EngineResult<()> {
        let mut objects = self.objects.borrow_mut();
        let Object::Buffer(target) = objects.get_mut(buffer)? else {
            return Err(EngineFault::WrongKind { handle: buffer, expected: "buffer" });
        };
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
        self.buffer_bytes(buffer)
    }

    fn decode_world(&self, buffer: RawHandle) -> EngineResult<RawHandle> {
        let bytes = self.buffer_bytes(buffer)?;
        let world = self
            .sim
            .decode_world(&bytes)
            .map_err(|reason| EngineFault::Malformed { payload: Payload::World, reason })?;
        self.insert(Object::World(world))
    }

    fn encode_world(&self, world: RawHandle) -> EngineResult<RawHandle> {
        let bytes = self.with_world(world, |w| self.sim.encode_world(w))?;
        self.insert(Object::Buffer(bytes))
    }

    fn decode_input(&self, buffer: RawHandle) -> EngineResult<RawHandle> {
        let bytes = self.buffer_bytes(buffer)?;
        let input = self
            .sim
            .decode_input(&bytes)
            .map_err(|reason| EngineFault::Malformed { payload: Payload::Input, reason })?;
        self.insert(Object::Input(input))
    }

    fn encode_input(&self, input: RawHandle) -> EngineResult<RawHandle> {
        let bytes = match self.objects.borrow().get(input)? {
            Object::Input(i) => self.sim.encode_input(i),
            _ => return Err(EngineFault::WrongKind { handle: input, expected: "input" }),
        };
        self.insert(Object::Buffer(bytes))
    }

    fn tick_world(&self, world: RawHandle) -> EngineResult<RawHandle> {
        self.transition(world, |sim, w| sim.tick(w))
    }

    fn add_player(&self, world: RawHandle, player: u32) -> EngineResult<RawHandle> {
        self.transition(world, |sim, w| sim.add_player(w, PlayerId::new(player)))
    }

    fn remove_player(&self, world: RawHandle, player: u32) -> EngineResult<RawHandle> {
        self.transition(world, |sim, w| sim.remove_player(w, PlayerId::new(player)))
    }

    fn apply_input(&self, world: RawHandle, player: u32, input: RawHandle) -> EngineResult<RawHandle> {
        let objects = self.objects.borrow();
        let Object::Input(command) = objects.get(input)? else {
            return Err(EngineFault::WrongKind { handle: input, expected: "input" });
        };
        let Object::World(current) = objects.get(world)? else {
            return Err(EngineFault::WrongKind { handle: world, expected: "world" });
        };
        let next = self.sim.apply_input(current, PlayerId::new(player), command);
        drop(objects);
        self.insert(Object::World(next))
    }

    fn release_handle(&self, handle: RawHandle) {
        let released = self.objects.borrow_mut().remove(handle);
        debug_assert!(released.is_some(), "release of dead handle {handle:?}");
        if released.is_none() {
            tracing::error!(?handle, "release of dead handle");
        }
    }
}
