//! # Message Sequencer
//!
//! Turns transport arrival order into causal delivery order: no batch ever
//! reaches the stepper before the Baseline, even if it was on the wire first.
//!
//! ```text
//!                 batch ──► PendingQueue
//!                   │
//! ┌─────────────────┴──┐   baseline   ┌────────┐
//! │  AwaitingBaseline  │ ───────────► │ Synced │ ──► batch delivered at once
//! └────────────────────┘  emit, flush └────────┘
//!           ▲                              │
//!           └────────── reset() ───────────┘
//! ```

use lockstep_shared::{decode_server_message, Baseline, InputBatch, ServerMessage};
use serde::{Deserialize, Serialize};

use crate::error::SequencerError;

/// What to do with a Baseline that arrives after sync.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPolicy {
    /// Drop it and report [`SequencerError::UnexpectedBaseline`].
    #[default]
    Reject,
    /// Treat it as a checkpoint that replaces world, frame and identity.
    Replace,
}

/// Sequencer state for one connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequencerState {
    /// No Baseline yet; batches are held back.
    #[default]
    AwaitingBaseline,
    /// Baseline delivered; batches pass straight through.
    Synced,
}

/// Batches held back until the Baseline arrives.
#[derive(Debug, Default)]
pub struct PendingQueue {
    batches: Vec<InputBatch>,
}

impl PendingQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch behind everything already queued.
    pub fn push(&mut self, batch: InputBatch) {
        self.batches.push(batch);
    }

    /// Number of queued batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Removes and yields every batch in enqueue order.
    pub fn drain(&mut self) -> impl Iterator<Item = InputBatch> + '_ {
        self.batches.drain(..)
    }

    /// Discards every queued batch.
    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

/// An event delivered to the stepper, in the order it must be applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// First Baseline on this connection.
    Baseline(Baseline),
    /// A later Baseline accepted under [`ResyncPolicy::Replace`].
    Resync(Baseline),
    /// One frame's batch.
    Batch(InputBatch),
}

/// Two-state sequencer for one connection.
#[derive(Debug)]
pub struct MessageSequencer {
    state: SequencerState,
    pending: PendingQueue,
    resync: ResyncPolicy,
}

impl MessageSequencer {
    /// Creates a sequencer waiting for its Baseline.
    #[must_use]
    pub fn new(resync: ResyncPolicy) -> Self {
        Self {
            state: SequencerState::AwaitingBaseline,
            pending: PendingQueue::new(),
            resync,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Batches currently held back.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Parses raw bytes and sequences the result.
    ///
    /// # Errors
    ///
    /// Malformed messages are dropped with [`SequencerError::Parse`]; the
    /// state is not touched.
    pub fn on_message(&mut self, bytes: &[u8]) -> Result<Vec<SyncEvent>, SequencerError> {
        let message = decode_server_message(bytes).map_err(|err| {
            tracing::warn!(%err, len = bytes.len(), "dropping malformed message");
            err
        })?;
        self.on_server_message(message)
    }

    /// Sequences an already-parsed message.
    ///
    /// Returns the events to apply now, in order. Empty while buffering.
    ///
    /// # Errors
    ///
    /// [`SequencerError::UnexpectedBaseline`] if a Baseline arrives after
    /// sync under [`ResyncPolicy::Reject`].
    pub fn on_server_message(&mut self, message: ServerMessage) -> Result<Vec<SyncEvent>, SequencerError> {
        match (self.state, message) {
            (SequencerState::AwaitingBaseline, ServerMessage::Batch(batch)) => {
                tracing::debug!(frame = batch.frame.get(), queued = self.pending.len() + 1, "buffering batch until baseline");
                self.pending.push(batch);
                Ok(Vec::new())
            }
            (SequencerState::AwaitingBaseline, ServerMessage::Baseline(baseline)) => {
                let mut events = Vec::with_capacity(self.pending.len() + 1);
                events.push(SyncEvent::Baseline(baseline));
                events.extend(self.pending.drain().map(SyncEvent::Batch));
                tracing::debug!(flushed = events.len() - 1, "baseline received, flushing pending batches");
                self.state = SequencerState::Synced;
                Ok(events)
            }
            (SequencerState::Synced, ServerMessage::Batch(batch)) => Ok(vec![SyncEvent::Batch(batch)]),
            (SequencerState::Synced, ServerMessage::Baseline(baseline)) => match self.resync {
                ResyncPolicy::Reject => {
                    tracing::warn!(frame = baseline.frame.get(), "rejecting baseline on synced connection");
                    Err(SequencerError::UnexpectedBaseline {
                        frame: baseline.frame.get(),
                    })
                }
                ResyncPolicy::Replace => {
                    tracing::info!(frame = baseline.frame.get(), "resyncing to new baseline");
                    Ok(vec![SyncEvent::Resync(baseline)])
                }
            },
        }
    }

    /// Returns to [`SequencerState::AwaitingBaseline`] and discards anything
    /// still queued. Called on disconnect.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(discarded = self.pending.len(), "discarding pending batches");
        }
        self.pending.clear();
        self.state = SequencerState::AwaitingBaseline;
    }
}

impl Default for MessageSequencer {
    fn default() -> Self {
        Self::new(ResyncPolicy::default())
    }
}
