//! # LOCKSTEP Core
//!
//! Ownership-safe access to a deterministic simulation engine:
//! - Authority-assigned identities ([`PlayerId`], [`Frame`])
//! - Move-only handles that release themselves ([`World`], [`Input`])
//! - A typed binding over the raw handle ABI ([`Engine`] over [`RawEngine`])
//!
//! ## Ownership Rules
//!
//! 1. **Every handle has one owner** - handles are neither `Clone` nor `Send`
//! 2. **Release happens on drop** - there is no public release call
//! 3. **Transitions supersede** - `tick`/`add`/`remove`/`apply` replace the
//!    caller's world and free the old one in the same call
//!
//! ## Example
//!
//! ```rust,ignore
//! use lockstep_core::{Engine, NativeEngine, PlayerId};
//!
//! let engine = Engine::new(NativeEngine::new(MySimulation));
//! let mut world = engine.decode_world(&snapshot)?;
//! engine.add_player(&mut world, PlayerId::new(1))?;
//! engine.tick_world(&mut world)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod binding;
pub mod engine;
pub mod error;
pub mod handle;
pub mod ids;
pub mod native;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use binding::Engine;
pub use engine::RawEngine;
pub use error::{DecodeError, EngineFault, EngineResult, Payload};
pub use handle::{Input, Owned, RawHandle, World};
pub use ids::{Frame, PlayerId};
pub use native::{NativeEngine, Simulation};
