//! # Sync Session
//!
//! One connection's worth of sync state: the sequencer plus, once a Baseline
//! has been applied, the stepper. Constructed per connection; `disconnect`
//! tears it back down to waiting for a Baseline.

use lockstep_core::{Engine, Frame, PlayerId, RawEngine};

use crate::config::ClientConfig;
use crate::error::{SessionError, SessionResult, StepError};
use crate::render::{RenderSink, Viewport};
use crate::sequencer::{MessageSequencer, SequencerState, SyncEvent};
use crate::stepper::{DecodeFailurePolicy, StepReport, SyncStepper};

/// Something the session committed.
#[derive(Debug)]
pub enum Applied {
    /// A Baseline started (or restarted) the session.
    Baseline {
        /// Frame the session now stands at.
        frame: Frame,
        /// Local identity from the Baseline.
        local_player: PlayerId,
    },
    /// A batch was applied in full.
    Step(StepReport),
}

impl Applied {
    /// Frame the session stands at after this event.
    #[must_use]
    pub fn frame(&self) -> Frame {
        match self {
            Self::Baseline { frame, .. } => *frame,
            Self::Step(report) => report.frame,
        }
    }
}

/// Sync state for one connection.
pub struct SyncSession<E: RawEngine> {
    engine: Engine<E>,
    sequencer: MessageSequencer,
    stepper: Option<SyncStepper<E>>,
    on_decode_failure: DecodeFailurePolicy,
}

impl<E: RawEngine> SyncSession<E> {
    /// Creates a session waiting for its Baseline.
    #[must_use]
    pub fn new(engine: Engine<E>, config: &ClientConfig) -> Self {
        Self {
            engine,
            sequencer: MessageSequencer::new(config.resync_policy),
            stepper: None,
            on_decode_failure: config.decode_failure,
        }
    }

    /// Feeds one raw inbound message through sequencing and stepping.
    ///
    /// Returns one entry per event the message released, in application
    /// order. A buffered batch yields nothing; a malformed message yields a
    /// single error.
    pub fn handle_message(&mut self, bytes: &[u8]) -> Vec<SessionResult<Applied>> {
        match self.sequencer.on_message(bytes) {
            Ok(events) => events.into_iter().map(|event| self.apply(event)).collect(),
            Err(err) => vec![Err(err.into())],
        }
    }

    fn apply(&mut self, event: SyncEvent) -> SessionResult<Applied> {
        match event {
            SyncEvent::Baseline(baseline) => {
                let stepper = SyncStepper::from_baseline(self.engine.clone(), &baseline, self.on_decode_failure)
                    .map_err(|err| {
                        self.reset();
                        SessionError::Baseline(err)
                    })?;
                tracing::info!(frame = baseline.frame.get(), local = %baseline.local_player_id, "session synced");
                self.stepper = Some(stepper);
                Ok(Applied::Baseline {
                    frame: baseline.frame,
                    local_player: baseline.local_player_id,
                })
            }
            SyncEvent::Resync(baseline) => {
                // A failed resync keeps the current world and frame.
                let stepper = self.stepper.as_mut().ok_or(StepError::NotSynced)?;
                stepper.resync(&baseline).map_err(SessionError::Baseline)?;
                tracing::info!(frame = baseline.frame.get(), local = %baseline.local_player_id, "session resynced");
                Ok(Applied::Baseline {
                    frame: baseline.frame,
                    local_player: baseline.local_player_id,
                })
            }
            SyncEvent::Batch(batch) => {
                let stepper = self.stepper.as_mut().ok_or(StepError::NotSynced)?;
                Ok(Applied::Step(stepper.step(&batch)?))
            }
        }
    }

    /// Drops the world and waits for a fresh Baseline.
    pub fn disconnect(&mut self) {
        if self.stepper.is_some() {
            tracing::info!(frame = ?self.frame(), "session torn down");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.stepper = None;
        self.sequencer.reset();
    }

    /// Whether a world is live.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.stepper.is_some()
    }

    /// Sequencer state.
    #[must_use]
    pub fn sequencer_state(&self) -> SequencerState {
        self.sequencer.state()
    }

    /// Batches held back waiting for the Baseline.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.sequencer.pending_len()
    }

    /// Current frame, once synced.
    #[must_use]
    pub fn frame(&self) -> Option<Frame> {
        self.stepper.as_ref().map(SyncStepper::frame)
    }

    /// Local identity, once synced.
    #[must_use]
    pub fn local_player(&self) -> Option<PlayerId> {
        self.stepper.as_ref().map(SyncStepper::local_player)
    }

    /// The live stepper, once synced.
    #[must_use]
    pub fn stepper(&self) -> Option<&SyncStepper<E>> {
        self.stepper.as_ref()
    }

    /// The engine binding shared by every world this session creates.
    #[must_use]
    pub fn engine(&self) -> &Engine<E> {
        &self.engine
    }

    /// Presents the current world, if any. Returns whether anything was drawn.
    pub fn render<S: RenderSink<E>>(&self, sink: &mut S, viewport: Viewport) -> bool {
        let Some(stepper) = &self.stepper else {
            return false;
        };
        sink.present(stepper.engine(), stepper.world(), stepper.local_player(), viewport);
        true
    }
}
