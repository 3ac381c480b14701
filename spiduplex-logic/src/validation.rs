//! Transaction Validation
//!
//! Judges one received buffer against the expected tag and the peer's
//! transmit buffer. The two checks carry different severities: a wrong tag
//! is reported and the loop continues, a wrong window ends the detecting
//! actor's loop.

use crate::sequencer::TransactionTag;
use crate::window::{first_difference, window, TAG_INDEX};
use thiserror::Error;

/// How a mismatch affects the detecting actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Reported; the loop continues with the next iteration.
    Soft,
    /// Reported with buffer dumps; the detecting actor stops. The peer is
    /// not affected.
    HardLocal,
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Byte 0 of the received buffer is not the tag of this iteration.
    Tag { expected: u8, observed: u8 },
    /// The received window differs from the peer's transmit window.
    Window {
        /// Buffer offset of the first differing byte.
        offset: usize,
        expected: u8,
        observed: u8,
        /// Number of differing window bytes.
        differing: usize,
    },
}

impl Mismatch {
    pub fn severity(&self) -> Severity {
        match self {
            Mismatch::Tag { .. } => Severity::Soft,
            Mismatch::Window { .. } => Severity::HardLocal,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("buffer length mismatch: received {received} bytes, peer transmitted {peer}")]
    LengthMismatch { received: usize, peer: usize },

    #[error("buffer is empty")]
    Empty,
}

/// Outcome of validating one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    pub tag: Option<Mismatch>,
    pub window: Option<Mismatch>,
}

impl Verdict {
    pub fn is_clean(&self) -> bool {
        self.tag.is_none() && self.window.is_none()
    }

    /// Whether the detecting actor must leave its loop.
    pub fn is_fatal_to_actor(&self) -> bool {
        self.mismatches()
            .any(|m| m.severity() == Severity::HardLocal)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &Mismatch> {
        self.tag.iter().chain(self.window.iter())
    }
}

/// Validate a received buffer.
///
/// `peer_tx` is the peer's transmit buffer as observed by the caller; both
/// buffers must have the same length for the whole run.
pub fn validate(
    rx: &[u8],
    expected: TransactionTag,
    peer_tx: &[u8],
) -> Result<Verdict, ValidationError> {
    if rx.is_empty() {
        return Err(ValidationError::Empty);
    }
    if rx.len() != peer_tx.len() {
        return Err(ValidationError::LengthMismatch {
            received: rx.len(),
            peer: peer_tx.len(),
        });
    }

    let observed = rx[TAG_INDEX];
    let tag = (observed != expected.value()).then_some(Mismatch::Tag {
        expected: expected.value(),
        observed,
    });

    let window = first_difference(peer_tx, rx).map(|offset| Mismatch::Window {
        offset,
        expected: peer_tx[offset],
        observed: rx[offset],
        differing: window(peer_tx)
            .iter()
            .zip(window(rx))
            .filter(|(a, b)| a != b)
            .count(),
    });

    Ok(Verdict { tag, window })
}

/// Running counts of mismatches seen by one actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MismatchTally {
    pub tag_mismatches: u64,
    pub window_mismatches: u64,
}

impl MismatchTally {
    pub fn record(&mut self, verdict: &Verdict) {
        if verdict.tag.is_some() {
            self.tag_mismatches += 1;
        }
        if verdict.window.is_some() {
            self.window_mismatches += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.tag_mismatches + self.window_mismatches
    }
}
