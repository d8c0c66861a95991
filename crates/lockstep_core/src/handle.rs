//! # Owned Engine Handles
//!
//! Engine resources are named by plain integers. This module turns them into
//! move-only values so that the two classic handle bugs cannot be written:
//!
//! - **double release**: only `Drop` releases, and a value drops once
//! - **use after release**: a released value no longer exists to be used
//!
//! ## Construct, Replace, Release
//!
//! ```text
//!   world ──tick──► world' ──add──► world''
//!     │               │
//!   release         release        (each in the same call that made its successor)
//! ```
//!
//! [`World`] is superseded in place: the binding swaps the new raw handle into
//! the existing value and releases the old one before returning. Callers hold
//! the same `World` for the whole session and can never observe a stale id.

use std::fmt;
use std::rc::Rc;

use crate::engine::RawEngine;

/// Untyped engine resource id, exactly as the engine exported it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawHandle(u32);

impl RawHandle {
    /// Wraps an id returned by an engine.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

/// A single-owner engine resource, released on drop.
///
/// Not `Clone`, not `Copy`, and `!Send` (the engine is shared through an
/// `Rc`), so a handle can neither be duplicated nor escape the thread that
/// steps the simulation.
pub struct Owned<E: RawEngine> {
    raw: RawHandle,
    engine: Rc<E>,
}

impl<E: RawEngine> Owned<E> {
    /// Takes ownership of a handle freshly returned by `engine`.
    pub(crate) fn adopt(engine: &Rc<E>, raw: RawHandle) -> Self {
        Self {
            raw,
            engine: Rc::clone(engine),
        }
    }

    /// Returns the raw id. Valid only while `self` is borrowed.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Installs `next` as the owned id and releases the previous one.
    fn supersede(&mut self, next: RawHandle) {
        debug_assert_ne!(self.raw, next, "engine returned the handle it was given");
        let previous = std::mem::replace(&mut self.raw, next);
        tracing::trace!(?previous, ?next, "superseding handle");
        self.engine.release_handle(previous);
    }
}

impl<E: RawEngine> Drop for Owned<E> {
    fn drop(&mut self) {
        tracing::trace!(raw = ?self.raw, "releasing handle");
        self.engine.release_handle(self.raw);
    }
}

impl<E: RawEngine> fmt::Debug for Owned<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.raw).finish()
    }
}

/// Owned handle to a simulation snapshot.
///
/// Exactly one of these lives per session. Mutating engine calls replace its
/// contents; see [`crate::Engine::tick_world`].
pub struct World<E: RawEngine>(Owned<E>);

impl<E: RawEngine> World<E> {
    pub(crate) fn adopt(engine: &Rc<E>, raw: RawHandle) -> Self {
        Self(Owned::adopt(engine, raw))
    }

    pub(crate) fn supersede(&mut self, next: RawHandle) {
        self.0.supersede(next);
    }

    /// Returns the raw id, for render sinks that call into the engine
    /// themselves. Do not keep it past the borrow.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> RawHandle {
        self.0.raw()
    }
}

/// Owned handle to one player's decoded command for one frame.
pub struct Input<E: RawEngine>(Owned<E>);

impl<E: RawEngine> Input<E> {
    pub(crate) fn adopt(engine: &Rc<E>, raw: RawHandle) -> Self {
        Self(Owned::adopt(engine, raw))
    }

    /// Returns the raw id. Do not keep it past the borrow.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> RawHandle {
        self.0.raw()
    }
}

/// Transient engine-side byte buffer used while marshaling.
pub(crate) struct Buffer<E: RawEngine>(Owned<E>);

impl<E: RawEngine> Buffer<E> {
    pub(crate) fn adopt(engine: &Rc<E>, raw: RawHandle) -> Self {
        Self(Owned::adopt(engine, raw))
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.0.raw()
    }
}

impl<E: RawEngine> fmt::Debug for World<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("World").field(&self.raw()).finish()
    }
}

impl<E: RawEngine> fmt::Debug for Input<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.raw()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, RecordingEngine};

    #[test]
    fn test_drop_releases_exactly_once() {
        let engine = Rc::new(RecordingEngine::new());
        let raw = engine.mint_world();
        {
            let _world = World::adopt(&engine, raw);
            assert_eq!(engine.live_handles(), 1);
        }
        assert_eq!(engine.live_handles(), 0);
        assert_eq!(engine.release_count(raw), 1);
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn test_supersede_releases_previous_only() {
        let engine = Rc::new(RecordingEngine::new());
        let first = engine.mint_world();
        let second = engine.mint_world();

        let mut world = World::adopt(&engine, first);
        world.supersede(second);

        assert_eq!(world.raw(), second);
        assert_eq!(engine.release_count(first), 1);
        assert_eq!(engine.release_count(second), 0);
        assert!(engine.calls().contains(&EngineCall::Release(first)));

        drop(world);
        assert_eq!(engine.release_count(second), 1);
        assert!(engine.violations().is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "engine returned the handle it was given")]
    fn test_supersede_with_same_handle_panics() {
        let engine = Rc::new(RecordingEngine::new());
        let raw = engine.mint_world();
        let mut world = World::adopt(&engine, raw);
        world.supersede(raw);
    }
}
