//! # Render Sink Boundary
//!
//! Renderers only ever see a shared borrow of the current world, taken fresh
//! for each draw. The borrow cannot outlive the next step, and handles are
//! `!Send`, so a renderer on another thread has to go through
//! [`SnapshotSink`].

use crossbeam_channel::{Receiver, Sender, TrySendError};
use lockstep_core::{Engine, PlayerId, RawEngine, World};
use serde::{Deserialize, Serialize};

/// Drawable surface size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Read-only consumer of the latest committed world.
pub trait RenderSink<E: RawEngine> {
    /// Draws `world` for `local`. Must not keep `world` past the call.
    fn present(&mut self, engine: &Engine<E>, world: &World<E>, local: PlayerId, viewport: Viewport);
}

/// Serialized world handed to another thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Local player at the time of the draw.
    pub local_player: PlayerId,
    /// Target surface.
    pub viewport: Viewport,
    /// Engine-encoded world.
    pub world: Vec<u8>,
}

/// Render sink that encodes each world and ships it over a channel.
///
/// Bounded: when the consumer falls behind, new snapshots are dropped rather
/// than blocking the stepping thread.
pub struct SnapshotSink {
    sender: Sender<Snapshot>,
    dropped: u64,
}

impl SnapshotSink {
    /// Creates a sink and the receiver the render thread reads from.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<Snapshot>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self { sender, dropped: 0 }, receiver)
    }

    /// Snapshots not delivered because the channel was full, closed, or the
    /// world failed to encode.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<E: RawEngine> RenderSink<E> for SnapshotSink {
    fn present(&mut self, engine: &Engine<E>, world: &World<E>, local: PlayerId, viewport: Viewport) {
        let bytes = match engine.encode_world(world) {
            Ok(bytes) => bytes,
            Err(fault) => {
                tracing::warn!(%fault, "could not snapshot world for rendering");
                self.dropped += 1;
                return;
            }
        };
        let snapshot = Snapshot {
            local_player: local,
            viewport,
            world: bytes,
        };
        match self.sender.try_send(snapshot) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => self.dropped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use lockstep_core::testing::{FakeWorld, RecordingEngine};

    use super::*;

    #[test]
    fn test_snapshot_sink_crosses_threads() {
        let raw = Rc::new(RecordingEngine::new());
        let engine = Engine::from_shared(Rc::clone(&raw));
        let mut world = engine.decode_world(&[]).unwrap();
        engine.add_player(&mut world, PlayerId::new(5)).unwrap();

        let (mut sink, receiver) = SnapshotSink::bounded(1);
        sink.present(&engine, &world, PlayerId::new(5), Viewport::default());

        let snapshot = std::thread::spawn(move || receiver.recv().unwrap()).join().unwrap();
        let decoded = FakeWorld::from_bytes(&snapshot.world).unwrap();
        assert!(decoded.players.contains(&5));
        assert_eq!(snapshot.viewport, Viewport { width: 800, height: 600 });
        // The encode buffer is gone; only the world remains.
        assert_eq!(raw.live_handles(), 1);
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let engine = Engine::new(RecordingEngine::new());
        let world = engine.decode_world(&[]).unwrap();
        let (mut sink, _receiver) = SnapshotSink::bounded(1);

        for _ in 0..3 {
            sink.present(&engine, &world, PlayerId::new(1), Viewport::default());
        }
        assert_eq!(sink.dropped(), 2);
    }
}
