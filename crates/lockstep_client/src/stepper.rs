//! # Sync Stepper
//!
//! Holds the session's single live world and applies one batch at a time.
//!
//! ## Phase Order
//!
//! ```text
//! removed_players ──► tick ──► inputs (ascending id) ──► new_players ──► frame := batch.frame
//!   (given order)    (once)                               (given order)
//! ```
//!
//! Every peer replays the same order, so it must never change. There is no
//! rollback: a failed engine call leaves the last successfully produced world
//! in place.

use lockstep_core::{DecodeError, Engine, Frame, PlayerId, RawEngine, World};
use lockstep_shared::{Baseline, InputBatch};
use serde::{Deserialize, Serialize};

use crate::error::{StepError, StepResult};

/// What to do when one player's input bytes fail to decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFailurePolicy {
    /// Stop the batch; the frame is not advanced.
    #[default]
    AbortBatch,
    /// Skip that player's input, continue, and advance the frame.
    SkipInput,
}

/// Outcome of a fully processed batch.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Frame the stepper now stands at.
    pub frame: Frame,
    /// Players removed.
    pub removed: usize,
    /// Inputs applied.
    pub applied: usize,
    /// Players added.
    pub added: usize,
    /// Inputs skipped under [`DecodeFailurePolicy::SkipInput`].
    pub skipped: Vec<(PlayerId, DecodeError)>,
}

/// Current world, frame and local identity for one synced connection.
pub struct SyncStepper<E: RawEngine> {
    engine: Engine<E>,
    world: World<E>,
    frame: Frame,
    local_player: PlayerId,
    on_decode_failure: DecodeFailurePolicy,
}

impl<E: RawEngine> SyncStepper<E> {
    /// Decodes the Baseline's world and starts at its frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the engine rejects the world bytes.
    pub fn from_baseline(
        engine: Engine<E>,
        baseline: &Baseline,
        on_decode_failure: DecodeFailurePolicy,
    ) -> Result<Self, DecodeError> {
        let world = engine.decode_world(&baseline.world)?;
        Ok(Self {
            engine,
            world,
            frame: baseline.frame,
            local_player: baseline.local_player_id,
            on_decode_failure,
        })
    }

    /// Replaces world, frame and local identity with a new Baseline's.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the engine rejects the world bytes. The
    /// current state is kept in that case.
    pub fn resync(&mut self, baseline: &Baseline) -> Result<(), DecodeError> {
        // Assignment drops, and so releases, the previous world.
        self.world = self.engine.decode_world(&baseline.world)?;
        self.frame = baseline.frame;
        self.local_player = baseline.local_player_id;
        Ok(())
    }

    /// Applies one batch in the fixed phase order.
    ///
    /// # Errors
    ///
    /// [`StepError::Engine`] on any engine fault and, under
    /// [`DecodeFailurePolicy::AbortBatch`], [`StepError::Decode`]. Either way
    /// the remaining phases are skipped and the frame is left unchanged.
    pub fn step(&mut self, batch: &InputBatch) -> StepResult<StepReport> {
        let mut report = StepReport::default();

        for &player in &batch.removed_players {
            self.engine.remove_player(&mut self.world, player)?;
            report.removed += 1;
        }

        self.engine.tick_world(&mut self.world)?;

        for player in batch.sorted_input_ids() {
            let Some(bytes) = batch.inputs.get(&player) else {
                continue;
            };
            let input = match self.engine.decode_input(bytes) {
                Ok(input) => input,
                Err(source) => match self.on_decode_failure {
                    DecodeFailurePolicy::AbortBatch => return Err(StepError::Decode { player, source }),
                    DecodeFailurePolicy::SkipInput => {
                        tracing::warn!(%player, frame = batch.frame.get(), %source, "skipping undecodable input");
                        report.skipped.push((player, source));
                        continue;
                    }
                },
            };
            self.engine.apply_input(&mut self.world, player, &input)?;
            report.applied += 1;
        }

        for &player in &batch.new_players {
            self.engine.add_player(&mut self.world, player)?;
            report.added += 1;
        }

        if batch.frame <= self.frame {
            tracing::debug!(from = self.frame.get(), to = batch.frame.get(), "authority moved frame backwards");
        }
        self.frame = batch.frame;
        report.frame = batch.frame;

        tracing::trace!(
            frame = report.frame.get(),
            removed = report.removed,
            applied = report.applied,
            added = report.added,
            "batch applied"
        );
        Ok(report)
    }

    /// The current world. Borrow it fresh for each draw.
    #[must_use]
    pub fn world(&self) -> &World<E> {
        &self.world
    }

    /// Frame of the last applied Baseline or batch.
    #[must_use]
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Identity the authority assigned to this client.
    #[must_use]
    pub fn local_player(&self) -> PlayerId {
        self.local_player
    }

    /// The engine binding this stepper drives.
    #[must_use]
    pub fn engine(&self) -> &Engine<E> {
        &self.engine
    }
}
