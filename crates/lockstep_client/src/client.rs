//! # Client Driver
//!
//! Glues a [`SyncSession`] to a [`Transport`] and a local [`InputSource`].
//!
//! ```text
//! transport.poll() ──► session.handle_message() ──► applied frame N
//!                                                      │
//!          transport.send() ◄── encode ◄── input for frame N + 1
//! ```
//!
//! Everything runs on the caller's thread, one event at a time.

use lockstep_core::{Engine, Frame, PlayerId, RawEngine};
use lockstep_shared::OutboundInput;

use crate::config::ClientConfig;
use crate::error::{SessionError, SessionResult};
use crate::render::RenderSink;
use crate::session::{Applied, SyncSession};
use crate::transport::{Transport, TransportEvent};

/// Supplies the local player's command for an upcoming frame.
pub trait InputSource {
    /// Raw command bytes for `frame`, or `None` to send nothing.
    fn sample(&mut self, frame: Frame, local: PlayerId) -> Option<Vec<u8>>;
}

/// Input source that never has anything to say.
#[derive(Clone, Copy, Debug, Default)]
pub struct Idle;

impl InputSource for Idle {
    fn sample(&mut self, _frame: Frame, _local: PlayerId) -> Option<Vec<u8>> {
        None
    }
}

/// What one [`SyncClient::pump`] call did.
#[derive(Debug, Default)]
pub struct PumpReport {
    /// Transport events consumed.
    pub events: usize,
    /// Everything committed, in order.
    pub applied: Vec<Applied>,
    /// Outbound inputs sent.
    pub inputs_sent: usize,
    /// Errors surfaced along the way. None of them corrupt the world.
    pub errors: Vec<SessionError>,
    /// Transport error events seen.
    pub transport_errors: usize,
    /// Whether the connection dropped during this pump.
    pub disconnected: bool,
}

/// Lockstep client over a transport.
pub struct SyncClient<E: RawEngine, T: Transport, I: InputSource> {
    session: SyncSession<E>,
    transport: T,
    input: I,
    config: ClientConfig,
}

impl<E: RawEngine, T: Transport, I: InputSource> SyncClient<E, T, I> {
    /// Creates a client waiting for its first Baseline.
    #[must_use]
    pub fn new(engine: Engine<E>, transport: T, input: I, config: ClientConfig) -> Self {
        Self {
            session: SyncSession::new(engine, &config),
            transport,
            input,
            config,
        }
    }

    /// Drains every pending transport event.
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();
        while let Some(event) = self.transport.poll() {
            report.events += 1;
            match event {
                TransportEvent::Connected => tracing::info!("connected to authority"),
                TransportEvent::Message(bytes) => self.on_message(&bytes, &mut report),
                TransportEvent::Disconnected => {
                    tracing::info!("disconnected from authority");
                    self.session.disconnect();
                    report.disconnected = true;
                }
                TransportEvent::Error(reason) => {
                    tracing::warn!(%reason, "transport error");
                    report.transport_errors += 1;
                }
            }
        }
        report
    }

    fn on_message(&mut self, bytes: &[u8], report: &mut PumpReport) {
        for result in self.session.handle_message(bytes) {
            match result {
                Ok(applied) => {
                    if self.config.send_inputs {
                        match self.send_local_input(applied.frame().following()) {
                            Ok(true) => report.inputs_sent += 1,
                            Ok(false) => {}
                            Err(err) => {
                                tracing::warn!(%err, "could not send local input");
                                report.errors.push(err);
                            }
                        }
                    }
                    report.applied.push(applied);
                }
                Err(err) => {
                    tracing::warn!(%err, "inbound message not applied");
                    report.errors.push(err);
                }
            }
        }
    }

    /// Samples, canonicalizes through the engine, and sends local input.
    fn send_local_input(&mut self, frame: Frame) -> SessionResult<bool> {
        let Some(local) = self.session.local_player() else {
            return Ok(false);
        };
        let Some(raw) = self.input.sample(frame, local) else {
            return Ok(false);
        };
        let engine = self.session.engine();
        let input = engine.decode_input(&raw).map_err(SessionError::LocalInput)?;
        let message = OutboundInput {
            frame,
            input: engine.encode_input(&input)?,
        };
        self.transport.send(&message.encode()?)?;
        tracing::trace!(frame = frame.get(), "sent local input");
        Ok(true)
    }

    /// Presents the current world to `sink` at the configured viewport.
    pub fn render<S: RenderSink<E>>(&self, sink: &mut S) -> bool {
        self.session.render(sink, self.config.viewport)
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &SyncSession<E> {
        &self.session
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
