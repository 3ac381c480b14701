//! spiduplex Core - Transfer Actors and Shared Run State
//!
//! Provides:
//! - The master and slave actors that drive one side of the bus each
//! - Payload buffers with an explicit unsynchronized peer view
//! - The master-owned latency accumulator
//! - The serialized mismatch reporter
//! - Pacing: gate poll strategies and the optional per-iteration rendezvous

mod actor;
mod buffer;
mod dump;
mod latency;
mod pacing;
mod reporter;

pub use actor::{
    ActorContext, ActorEvent, ActorOutcome, ActorState, FatalPolicy, MasterActor, MasterOutcome,
    RunError, RunSettings, SlaveActor,
};
pub use buffer::{ActorBuffers, BufferError, PayloadSet, PeerView, TxBuffer};
pub use dump::{DumpError, RxDump};
pub use latency::LatencyAccumulator;
pub use pacing::{Meeting, Pacing, Participant, PollStrategy, Rendezvous};
pub use reporter::{Dump, MemorySink, MismatchReporter};
