//! Transaction Sequencer
//!
//! Maps an iteration counter to the tag byte embedded at index 0 of each
//! transmit buffer. There is no request/response header on the bus, so the
//! tag is the only thing correlating a received buffer with an iteration.

use std::fmt;
use std::ops::Range;

/// Tags cycle through `1..=TAG_MODULUS`; zero is never produced.
pub const TAG_MODULUS: u64 = 255;

/// Tag carried in byte 0 of a transmit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionTag(u8);

impl TransactionTag {
    /// Tag for a 1-based iteration: `(iteration mod 255) + 1`.
    #[inline]
    pub fn for_iteration(iteration: u64) -> Self {
        // (x mod 255) + 1 is at most 255, so the narrowing is lossless
        Self(((iteration % TAG_MODULUS) + 1) as u8)
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<TransactionTag> for u8 {
    fn from(tag: TransactionTag) -> Self {
        tag.0
    }
}

impl fmt::Display for TransactionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Iteration plan for one actor.
///
/// A run of `N` transactions executes iterations `1..N`, so `N - 1`
/// exchanges per actor. Each actor owns its own sequencer; the two are never
/// shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequencer {
    transactions: u64,
}

impl Sequencer {
    pub fn new(transactions: u64) -> Self {
        Self { transactions }
    }

    /// Configured transaction count `N` (also the latency divisor).
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    /// Number of exchanges an actor performs when it runs to completion.
    pub fn planned_iterations(&self) -> u64 {
        self.transactions.saturating_sub(1)
    }

    pub fn range(&self) -> Range<u64> {
        1..self.transactions.max(1)
    }

    /// Iterations paired with their tags, in order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, TransactionTag)> {
        self.range()
            .map(|iteration| (iteration, TransactionTag::for_iteration(iteration)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_formula() {
        assert_eq!(TransactionTag::for_iteration(1).value(), 2);
        assert_eq!(TransactionTag::for_iteration(253).value(), 254);
        assert_eq!(TransactionTag::for_iteration(254).value(), 255);
        assert_eq!(TransactionTag::for_iteration(255).value(), 1);
    }

    #[test]
    fn test_tag_wraps_every_255_iterations() {
        assert_eq!(
            TransactionTag::for_iteration(254),
            TransactionTag::for_iteration(509)
        );
        assert_eq!(
            TransactionTag::for_iteration(10),
            TransactionTag::for_iteration(10 + TAG_MODULUS)
        );
    }

    #[test]
    fn test_tag_never_zero() {
        for iteration in 0..2_000u64 {
            let tag = TransactionTag::for_iteration(iteration).value();
            assert!(tag >= 1, "iteration {} produced tag 0", iteration);
        }
        assert_eq!(TransactionTag::for_iteration(u64::MAX).value(), 1);
    }

    #[test]
    fn test_sequencer_runs_one_to_n_minus_one() {
        let seq = Sequencer::new(300);
        let iterations: Vec<u64> = seq.iter().map(|(i, _)| i).collect();

        assert_eq!(iterations.first(), Some(&1));
        assert_eq!(iterations.last(), Some(&299));
        assert_eq!(iterations.len() as u64, seq.planned_iterations());
    }

    #[test]
    fn test_sequencer_degenerate_counts() {
        assert_eq!(Sequencer::new(0).iter().count(), 0);
        assert_eq!(Sequencer::new(1).iter().count(), 0);
        assert_eq!(Sequencer::new(0).planned_iterations(), 0);
        assert_eq!(Sequencer::new(2).iter().count(), 1);
    }

    #[test]
    fn test_two_sequencers_agree() {
        let master = Sequencer::new(600);
        let slave = Sequencer::new(600);
        assert!(master.iter().eq(slave.iter()));
    }
}
