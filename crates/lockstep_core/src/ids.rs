//! # Authority-Assigned Identities
//!
//! Both types are plain integers handed to us by the authority. This crate
//! never generates or increments them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable player identity assigned by the authority.
///
/// Serializes as a bare integer, which also lets it be used as a JSON object
/// key (`"3": [...]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id passed across the engine boundary.
    #[inline]
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for PlayerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Simulation frame number.
///
/// Always the value the authority last sent. There is intentionally no
/// `next()` or arithmetic beyond [`Frame::following`], which exists only to
/// address outbound input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(u64);

impl Frame {
    /// Wraps a raw frame number.
    #[inline]
    #[must_use]
    pub const fn new(frame: u64) -> Self {
        Self(frame)
    }

    /// Returns the raw frame number.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The frame the local player's next input is addressed to.
    #[inline]
    #[must_use]
    pub const fn following(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u64> for Frame {
    fn from(frame: u64) -> Self {
        Self(frame)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {}", self.0)
    }
}
