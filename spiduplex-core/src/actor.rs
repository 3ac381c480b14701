//! Master and Slave Transfer Actors
//!
//! Each actor is a small state machine:
//!
//! ```text
//! Seeding -> Running -> Completed
//!                    -> MismatchAborted   (window mismatch, local to this actor)
//!                    -> Failed            (transport or dump error)
//! ```
//!
//! The two actors never talk to each other directly. They share the payload
//! buffers (read through [`PeerView`](crate::PeerView)), the diagnostic
//! stream and, under [`Pacing::Rendezvous`](crate::Pacing), a per-iteration
//! meeting point.

use crate::buffer::ActorBuffers;
use crate::dump::{DumpError, RxDump};
use crate::latency::LatencyAccumulator;
use crate::pacing::{Meeting, Participant, PollStrategy};
use crate::reporter::{Dump, MismatchReporter};
use indicatif::ProgressBar;
use spiduplex_logic::{validate, Mismatch, MismatchTally, Sequencer, TransactionTag, ValidationError};
use spiduplex_report::{ActorRole, ActorStatus, ActorSummary};
use spiduplex_transport::{Readiness, ReadinessGate, TransferParams, Transport, TransportError};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{role} transfer failed at iteration {iteration}: {source}")]
    Transport {
        role: ActorRole,
        iteration: u64,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Dump(#[from] DumpError),

    #[error("{role} validation failed at iteration {iteration}: {source}")]
    Validation {
        role: ActorRole,
        iteration: u64,
        #[source]
        source: ValidationError,
    },
}

/// What an actor does when it hits a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Log and end the process with status 1 from the actor thread.
    #[default]
    Abort,
    /// Stop the actor in [`ActorState::Failed`] and hand the error back.
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Seeding,
    Running,
    Completed,
    MismatchAborted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorEvent {
    Start,
    Finished,
    WindowMismatch,
    Fatal,
}

impl ActorState {
    /// Next state, or `None` if the event is not valid here.
    pub fn on(self, event: ActorEvent) -> Option<ActorState> {
        use ActorEvent::*;
        use ActorState::*;

        match (self, event) {
            (Seeding, Start) => Some(Running),
            (Seeding, Fatal) => Some(Failed),
            (Running, Finished) => Some(Completed),
            (Running, WindowMismatch) => Some(MismatchAborted),
            (Running, Fatal) => Some(Failed),
            _ => None,
        }
    }

    pub fn status(self) -> Option<ActorStatus> {
        match self {
            ActorState::Completed => Some(ActorStatus::Completed),
            ActorState::MismatchAborted => Some(ActorStatus::MismatchAborted),
            ActorState::Failed => Some(ActorStatus::Failed),
            ActorState::Seeding | ActorState::Running => None,
        }
    }
}

/// Frozen per-run settings, shared read-only by both actors.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub sequencer: Sequencer,
    pub params: TransferParams,
    pub verbose: bool,
    pub poll: PollStrategy,
    pub fatal: FatalPolicy,
}

impl RunSettings {
    pub fn new(transactions: u64, params: TransferParams) -> Self {
        Self {
            sequencer: Sequencer::new(transactions),
            params,
            verbose: false,
            poll: PollStrategy::default(),
            fatal: FatalPolicy::default(),
        }
    }
}

/// Everything an actor shares with the rest of the run.
pub struct ActorContext {
    pub settings: Arc<RunSettings>,
    pub reporter: Arc<MismatchReporter>,
    pub dump: Option<Arc<RxDump>>,
    pub rendezvous: Option<Participant>,
}

impl ActorContext {
    pub fn new(settings: Arc<RunSettings>, reporter: Arc<MismatchReporter>) -> Self {
        Self {
            settings,
            reporter,
            dump: None,
            rendezvous: None,
        }
    }

    pub fn with_dump(mut self, dump: Arc<RxDump>) -> Self {
        self.dump = Some(dump);
        self
    }

    pub fn with_rendezvous(mut self, participant: Participant) -> Self {
        self.rendezvous = Some(participant);
        self
    }
}

/// Result of one actor's run.
#[derive(Debug)]
pub struct ActorOutcome {
    pub role: ActorRole,
    pub state: ActorState,
    pub completed_iterations: u64,
    pub planned_iterations: u64,
    pub tally: MismatchTally,
    pub window_mismatch_at: Option<u64>,
    pub error: Option<RunError>,
}

impl ActorOutcome {
    pub fn summary(&self) -> ActorSummary {
        ActorSummary {
            role: self.role,
            status: self.state.status().unwrap_or(ActorStatus::Failed),
            completed_iterations: self.completed_iterations,
            planned_iterations: self.planned_iterations,
            tag_mismatches: self.tally.tag_mismatches,
            window_mismatch_at: self.window_mismatch_at,
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Master outcome plus the latency it measured.
#[derive(Debug)]
pub struct MasterOutcome {
    pub actor: ActorOutcome,
    pub latency: LatencyAccumulator,
}

enum Step {
    Continue,
    Abort,
}

fn title(role: ActorRole) -> &'static str {
    match role {
        ActorRole::Master => "Master",
        ActorRole::Slave => "Slave",
    }
}

fn peer_of(role: ActorRole) -> ActorRole {
    match role {
        ActorRole::Master => ActorRole::Slave,
        ActorRole::Slave => ActorRole::Master,
    }
}

/// The per-iteration work both actors have in common.
struct Lane<T> {
    role: ActorRole,
    transport: T,
    buffers: ActorBuffers,
    ctx: ActorContext,
    state: ActorState,
    tally: MismatchTally,
    completed: u64,
    window_mismatch_at: Option<u64>,
    peer_snapshot: Vec<u8>,
}

impl<T: Transport> Lane<T> {
    fn new(role: ActorRole, transport: T, buffers: ActorBuffers, ctx: ActorContext) -> Self {
        let peer_snapshot = vec![0; buffers.peer_tx.len()];
        Self {
            role,
            transport,
            buffers,
            ctx,
            state: ActorState::Seeding,
            tally: MismatchTally::default(),
            completed: 0,
            window_mismatch_at: None,
            peer_snapshot,
        }
    }

    fn transition(&mut self, event: ActorEvent) {
        match self.state.on(event) {
            Some(next) => {
                debug!(role = %self.role, from = ?self.state, to = ?next, "actor state");
                self.state = next;
            }
            None => warn!(role = %self.role, state = ?self.state, ?event, "ignored actor event"),
        }
    }

    /// Meet the peer if pacing asks for it. Once the peer has left, later
    /// meetings are skipped.
    fn meet(&mut self) {
        let left = self
            .ctx
            .rendezvous
            .as_ref()
            .is_some_and(|p| p.wait() == Meeting::PeerLeft);
        if left {
            debug!(role = %self.role, "peer left the rendezvous");
            self.ctx.rendezvous = None;
        }
    }

    fn exchange(&mut self, iteration: u64) -> Result<(), RunError> {
        self.transport
            .exchange(
                self.buffers.tx.as_slice(),
                &mut self.buffers.rx,
                &self.ctx.settings.params,
            )
            .map_err(|source| RunError::Transport {
                role: self.role,
                iteration,
                source,
            })
    }

    /// Verbose dumps and the rx dump file.
    fn record_transfer(&self, iteration: u64) -> Result<(), DumpError> {
        debug!(
            role = %self.role,
            iteration,
            transport = self.transport.name(),
            "transfer done"
        );

        let verbose = self.ctx.settings.verbose;
        if verbose {
            let label = format!("{} TX", title(self.role));
            self.ctx
                .reporter
                .notice(None, &[Dump::new(&label, self.buffers.tx.as_slice())]);
        }
        if let Some(dump) = &self.ctx.dump {
            dump.append(&self.buffers.rx)?;
        }
        if verbose {
            let label = format!("{} RX", title(self.role));
            self.ctx
                .reporter
                .notice(None, &[Dump::new(&label, &self.buffers.rx)]);
        }
        Ok(())
    }

    fn check(&mut self, iteration: u64, tag: TransactionTag) -> Result<Step, RunError> {
        self.buffers
            .peer_tx
            .peek_unsynchronized(&mut self.peer_snapshot);

        let verdict = validate(&self.buffers.rx, tag, &self.peer_snapshot).map_err(|source| {
            RunError::Validation {
                role: self.role,
                iteration,
                source,
            }
        })?;
        self.tally.record(&verdict);
        if verdict.is_clean() {
            return Ok(Step::Continue);
        }

        let peer = peer_of(self.role);
        if let Some(Mismatch::Tag { observed, .. }) = verdict.tag {
            warn!(role = %self.role, iteration, observed, expected = tag.value(), "tag mismatch");
            self.ctx.reporter.report(
                &format!(
                    "{} RX data index with {} TX data [{}] != [{}]",
                    self.role, peer, observed, iteration
                ),
                &[],
            );
        }

        if let Some(Mismatch::Window {
            offset,
            expected,
            observed,
            differing,
        }) = verdict.window
        {
            warn!(role = %self.role, iteration, offset, differing, "window mismatch");
            let rx_label = format!("{} RX Data:", title(self.role));
            let tx_label = format!("{} TX Data:", title(peer));
            self.ctx.reporter.report(
                &format!(
                    "{} RX data mismatch with {} TX data at byte {} [{:#04x}] != [{:#04x}] ({} bytes differ), iter = {}",
                    self.role, peer, offset, observed, expected, differing, iteration
                ),
                &[
                    Dump::new(&rx_label, &self.buffers.rx),
                    Dump::new(&tx_label, &self.peer_snapshot),
                ],
            );
            self.window_mismatch_at = Some(iteration);
        }

        if verdict.is_fatal_to_actor() {
            return Ok(Step::Abort);
        }
        Ok(Step::Continue)
    }

    fn fail(&mut self, err: RunError) -> RunError {
        error!(role = %self.role, error = %err, "fatal error");
        if self.ctx.settings.fatal == FatalPolicy::Abort {
            std::process::exit(1);
        }
        self.transition(ActorEvent::Fatal);
        err
    }

    /// Leave the run and describe how it went.
    fn finish(mut self, error: Option<RunError>) -> ActorOutcome {
        self.ctx.rendezvous.take();
        info!(
            role = %self.role,
            state = ?self.state,
            completed = self.completed,
            tag_mismatches = self.tally.tag_mismatches,
            "actor finished"
        );
        ActorOutcome {
            role: self.role,
            state: self.state,
            completed_iterations: self.completed,
            planned_iterations: self.ctx.settings.sequencer.planned_iterations(),
            tally: self.tally,
            window_mismatch_at: self.window_mismatch_at,
            error,
        }
    }
}

/// Polls the readiness gate, times every exchange, validates against the
/// slave's transmit buffer.
pub struct MasterActor<T, G> {
    lane: Lane<T>,
    gate: G,
    latency: LatencyAccumulator,
    progress: Option<ProgressBar>,
    gate_reported: bool,
}

impl<T: Transport, G: ReadinessGate> MasterActor<T, G> {
    pub fn new(transport: T, gate: G, buffers: ActorBuffers, ctx: ActorContext) -> Self {
        let latency = LatencyAccumulator::new(ctx.settings.sequencer.transactions());
        Self {
            lane: Lane::new(ActorRole::Master, transport, buffers, ctx),
            gate,
            latency,
            progress: None,
            gate_reported: false,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run(mut self) -> MasterOutcome {
        let error = self.run_loop().err();
        MasterOutcome {
            actor: self.lane.finish(error),
            latency: self.latency,
        }
    }

    fn run_loop(&mut self) -> Result<(), RunError> {
        self.lane.transition(ActorEvent::Start);
        let sequencer = self.lane.ctx.settings.sequencer;

        for (iteration, tag) in sequencer.iter() {
            self.lane.buffers.tx.set_tag(tag);
            self.lane.meet();

            let start = Instant::now();
            self.wait_ready();
            if let Err(e) = self.lane.exchange(iteration) {
                return Err(self.lane.fail(e));
            }
            self.latency.add(start.elapsed());

            if let Err(e) = self.lane.record_transfer(iteration) {
                return Err(self.lane.fail(e.into()));
            }
            self.lane.completed += 1;
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }

            match self.lane.check(iteration, tag) {
                Ok(Step::Continue) => {}
                Ok(Step::Abort) => {
                    self.lane.transition(ActorEvent::WindowMismatch);
                    return Ok(());
                }
                Err(e) => return Err(self.lane.fail(e)),
            }
            self.lane.meet();
        }

        self.lane.transition(ActorEvent::Finished);
        Ok(())
    }

    /// Poll until the gate reports ready. An inaccessible gate counts as not
    /// ready and is reported once per run.
    fn wait_ready(&mut self) {
        let poll = self.lane.ctx.settings.poll;
        loop {
            match self.gate.poll() {
                Readiness::Ready => return,
                Readiness::NotReady => {}
                Readiness::Inaccessible(e) => {
                    if !self.gate_reported {
                        self.gate_reported = true;
                        warn!(error = %e, "slave ready indicator inaccessible, treating as not ready");
                        self.lane
                            .ctx
                            .reporter
                            .notice(Some(&format!("slave ready status unavailable: {}", e)), &[]);
                    }
                }
            }
            poll.pause();
        }
    }
}

/// Exchanges unconditionally every iteration and validates against the
/// master's transmit buffer.
pub struct SlaveActor<T> {
    lane: Lane<T>,
}

impl<T: Transport> SlaveActor<T> {
    pub fn new(transport: T, buffers: ActorBuffers, ctx: ActorContext) -> Self {
        Self {
            lane: Lane::new(ActorRole::Slave, transport, buffers, ctx),
        }
    }

    pub fn run(mut self) -> ActorOutcome {
        let error = self.run_loop().err();
        self.lane.finish(error)
    }

    fn run_loop(&mut self) -> Result<(), RunError> {
        self.lane.transition(ActorEvent::Start);
        let sequencer = self.lane.ctx.settings.sequencer;

        for (iteration, tag) in sequencer.iter() {
            self.lane.buffers.tx.set_tag(tag);
            self.lane.meet();

            if let Err(e) = self.lane.exchange(iteration) {
                return Err(self.lane.fail(e));
            }
            if let Err(e) = self.lane.record_transfer(iteration) {
                return Err(self.lane.fail(e.into()));
            }
            self.lane.completed += 1;

            match self.lane.check(iteration, tag) {
                Ok(Step::Continue) => {}
                Ok(Step::Abort) => {
                    self.lane.transition(ActorEvent::WindowMismatch);
                    return Ok(());
                }
                Err(e) => return Err(self.lane.fail(e)),
            }
            self.lane.meet();
        }

        self.lane.transition(ActorEvent::Finished);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PayloadSet;
    use crate::pacing::Rendezvous;
    use crate::reporter::MemorySink;
    use spiduplex_transport::{
        AlwaysReady, FaultyTransport, LoopbackTransport, SimulatedBus, SimulatedGate,
    };
    use std::thread;

    fn settings(transactions: u64) -> Arc<RunSettings> {
        let mut settings = RunSettings::new(transactions, TransferParams::default());
        settings.fatal = FatalPolicy::Propagate;
        Arc::new(settings)
    }

    fn loopback_payloads(len: usize) -> PayloadSet {
        let tx: Vec<u8> = (0..len).map(|i| (i % 255) as u8 + 1).collect();
        PayloadSet::new(tx.clone(), tx).unwrap()
    }

    fn reporter() -> (Arc<MismatchReporter>, MemorySink) {
        let sink = MemorySink::new();
        (Arc::new(MismatchReporter::new(Box::new(sink.clone()))), sink)
    }

    #[test]
    fn test_state_transitions() {
        use ActorEvent::*;
        use ActorState::*;

        assert_eq!(Seeding.on(Start), Some(Running));
        assert_eq!(Running.on(Finished), Some(Completed));
        assert_eq!(Running.on(WindowMismatch), Some(MismatchAborted));
        assert_eq!(Running.on(Fatal), Some(Failed));
        assert_eq!(Seeding.on(Finished), None);
        assert_eq!(Completed.on(WindowMismatch), None);
        assert_eq!(MismatchAborted.on(Start), None);
        assert_eq!(MismatchAborted.status(), Some(ActorStatus::MismatchAborted));
        assert_eq!(Running.status(), None);
    }

    #[test]
    fn test_loopback_run_is_clean() {
        let set = loopback_payloads(32);
        let (reporter, sink) = reporter();
        let settings = settings(10);

        let master = MasterActor::new(
            LoopbackTransport,
            AlwaysReady,
            set.master,
            ActorContext::new(settings.clone(), reporter.clone()),
        );
        let slave = SlaveActor::new(
            LoopbackTransport,
            set.slave,
            ActorContext::new(settings, reporter.clone()),
        );

        let slave = thread::spawn(move || slave.run());
        let master = master.run();
        let slave = slave.join().unwrap();

        assert_eq!(master.actor.state, ActorState::Completed);
        assert_eq!(master.actor.completed_iterations, 9);
        assert_eq!(master.latency.samples(), 9);
        assert_eq!(slave.state, ActorState::Completed);
        assert_eq!(slave.completed_iterations, 9);
        assert_eq!(reporter.mismatches(), 0);
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn test_window_mismatch_stops_only_detecting_actor() {
        let set = loopback_payloads(16);
        let (reporter, sink) = reporter();
        let settings = settings(10);

        let corrupted = FaultyTransport::new(LoopbackTransport).corrupt_exchange(4, 5);
        let master = MasterActor::new(
            corrupted,
            AlwaysReady,
            set.master,
            ActorContext::new(settings.clone(), reporter.clone()),
        );
        let slave = SlaveActor::new(
            LoopbackTransport,
            set.slave,
            ActorContext::new(settings, reporter.clone()),
        );

        let slave = thread::spawn(move || slave.run());
        let master = master.run();
        let slave = slave.join().unwrap();

        assert_eq!(master.actor.state, ActorState::MismatchAborted);
        assert_eq!(master.actor.window_mismatch_at, Some(4));
        assert_eq!(master.actor.completed_iterations, 4);
        assert_eq!(slave.state, ActorState::Completed);
        assert_eq!(slave.completed_iterations, 9);

        let out = sink.contents();
        assert!(out.contains("master RX data mismatch with slave TX data at byte 5"));
        assert!(out.contains("iter = 4"));
        assert!(out.contains("Master RX Data:"));
        assert!(out.contains("Slave TX Data:"));
        assert_eq!(master.actor.summary().status, ActorStatus::MismatchAborted);
    }

    #[test]
    fn test_tag_mismatch_is_reported_and_run_continues() {
        let set = loopback_payloads(8);
        let (reporter, sink) = reporter();
        let settings = settings(6);

        // Flipping byte 0 damages only the tag.
        let corrupted = FaultyTransport::new(LoopbackTransport).corrupt_exchange(2, 0);
        let slave = SlaveActor::new(
            corrupted,
            set.slave,
            ActorContext::new(settings, reporter.clone()),
        );

        let outcome = slave.run();
        assert_eq!(outcome.state, ActorState::Completed);
        assert_eq!(outcome.completed_iterations, 5);
        assert_eq!(outcome.tally.tag_mismatches, 1);
        assert_eq!(outcome.window_mismatch_at, None);

        let expected = format!("slave RX data index with master TX data [{}] != [2]", !3u8);
        assert!(sink.contents().contains(&expected));
        assert_eq!(reporter.mismatches(), 1);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let set = loopback_payloads(8);
        let (reporter, _sink) = reporter();

        let failing = FaultyTransport::new(LoopbackTransport).fail_exchange(3);
        let slave = SlaveActor::new(failing, set.slave, ActorContext::new(settings(10), reporter));

        let outcome = slave.run();
        assert_eq!(outcome.state, ActorState::Failed);
        assert_eq!(outcome.completed_iterations, 2);
        assert!(matches!(
            outcome.error,
            Some(RunError::Transport { iteration: 3, .. })
        ));
        assert!(outcome.summary().error.is_some());
    }

    #[test]
    fn test_inaccessible_gate_reported_once() {
        let set = loopback_payloads(8);
        let (reporter, sink) = reporter();
        let (gate, controller) = SimulatedGate::new(true);
        controller.set_inaccessible(true);

        let master = MasterActor::new(
            LoopbackTransport,
            gate,
            set.master,
            ActorContext::new(settings(4), reporter.clone()),
        );
        let handle = thread::spawn(move || master.run());

        while controller.polls() < 50 {
            thread::yield_now();
        }
        controller.set_inaccessible(false);
        let outcome = handle.join().unwrap();

        assert_eq!(outcome.actor.state, ActorState::Completed);
        assert_eq!(outcome.actor.completed_iterations, 3);
        assert_eq!(sink.contents().matches("slave ready status unavailable").count(), 1);
        assert_eq!(reporter.mismatches(), 0);
    }

    #[test]
    fn test_simulated_bus_with_rendezvous() {
        let tx: Vec<u8> = (0..24).map(|i| i as u8 + 1).collect();
        let set = PayloadSet::new(tx.clone(), tx.iter().rev().copied().collect()).unwrap();
        let (reporter, _sink) = reporter();
        let settings = settings(300);
        let (bus_master, bus_slave) = SimulatedBus::pair();
        let (meet_master, meet_slave) = Rendezvous::pair();

        let master = MasterActor::new(
            bus_master,
            AlwaysReady,
            set.master,
            ActorContext::new(settings.clone(), reporter.clone()).with_rendezvous(meet_master),
        );
        let slave = SlaveActor::new(
            bus_slave,
            set.slave,
            ActorContext::new(settings, reporter.clone()).with_rendezvous(meet_slave),
        );

        let slave = thread::spawn(move || slave.run());
        let master = master.run();
        let slave = slave.join().unwrap();

        assert_eq!(master.actor.state, ActorState::Completed);
        assert_eq!(slave.state, ActorState::Completed);
        assert_eq!(master.actor.completed_iterations, 299);
        assert_eq!(master.actor.tally.total() + slave.tally.total(), 0);
    }

    #[test]
    fn test_rx_dump_and_verbose_transfers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.bin");
        let dump = Arc::new(RxDump::create(&path).unwrap());

        let set = loopback_payloads(4);
        let (reporter, sink) = reporter();
        let mut settings = RunSettings::new(3, TransferParams::default());
        settings.verbose = true;
        settings.fatal = FatalPolicy::Propagate;

        let slave = SlaveActor::new(
            LoopbackTransport,
            set.slave,
            ActorContext::new(Arc::new(settings), reporter).with_dump(dump),
        );
        let outcome = slave.run();
        assert_eq!(outcome.state, ActorState::Completed);

        assert_eq!(std::fs::read(&path).unwrap(), vec![2, 2, 3, 4, 3, 2, 3, 4]);
        let out = sink.contents();
        assert_eq!(out.matches("Slave TX | ").count(), 2);
        assert_eq!(out.matches("Slave RX | ").count(), 2);
    }
}
