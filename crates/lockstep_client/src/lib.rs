//! # LOCKSTEP Client
//!
//! Deterministic lockstep synchronization against a remote authority.
//!
//! ## Pipeline
//!
//! ```text
//! Transport ──► MessageSequencer ──► SyncStepper ──► Engine ──► World
//!                (buffer until                                   │
//!                 Baseline)                         RenderSink ◄─┘ (borrow)
//! ```
//!
//! ## Determinism Rules
//!
//! 1. **Batches never overtake the Baseline** - they wait in the pending queue
//! 2. **Phase order is fixed** - removals, tick, inputs by ascending id, additions
//! 3. **Frames come from the authority** - never counted locally
//!
//! ## Example
//!
//! ```rust,ignore
//! use lockstep_client::{ChannelTransport, ClientConfig, Idle, SyncClient};
//! use lockstep_core::{Engine, NativeEngine};
//!
//! let (transport, authority) = ChannelTransport::pair();
//! let mut client = SyncClient::new(Engine::new(NativeEngine::new(sim)), transport, Idle, ClientConfig::default());
//! loop {
//!     client.pump();
//!     client.render(&mut sink);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod render;
pub mod sequencer;
pub mod session;
pub mod stepper;
pub mod transport;

pub use client::{Idle, InputSource, PumpReport, SyncClient};
pub use config::{ClientConfig, ConfigError, ConfigResult};
pub use error::{SequencerError, SessionError, SessionResult, StepError, StepResult};
pub use render::{RenderSink, Snapshot, SnapshotSink, Viewport};
pub use sequencer::{MessageSequencer, PendingQueue, ResyncPolicy, SequencerState, SyncEvent};
pub use session::{Applied, SyncSession};
pub use stepper::{DecodeFailurePolicy, StepReport, SyncStepper};
pub use transport::{AuthorityEnd, ChannelTransport, Transport, TransportError, TransportEvent, TransportStats};
