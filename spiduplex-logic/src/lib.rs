//! spiduplex Logic - Transaction Sequencing and Validation
//!
//! Pure logic shared by both transfer actors:
//! - which tag a given iteration carries ([`TransactionTag`], [`Sequencer`])
//! - which bytes of a buffer are compared ([`window`])
//! - how a received buffer is judged against the peer's transmit buffer
//!   ([`validate`], [`Verdict`], [`Severity`])
//!
//! Nothing in this crate touches the bus or shares state between threads.

mod sequencer;
mod validation;
mod window;

pub use sequencer::{Sequencer, TransactionTag, TAG_MODULUS};
pub use validation::{
    validate, Mismatch, MismatchTally, Severity, ValidationError, Verdict,
};
pub use window::{first_difference, window, TAG_INDEX, WINDOW_START};
