//! Run Orchestration
//!
//! Seeds the payload buffers, opens the bus backends, starts both actors
//! through the supervisor and turns their outcomes into a [`RunReport`].

use crate::config::{Backend, RunConfig};
use crate::supervisor::{run_actors, SupervisorError};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spiduplex_core::{
    ActorContext, ActorOutcome, BufferError, Dump, DumpError, FatalPolicy, MasterActor,
    MasterOutcome, MismatchReporter, Pacing, PayloadSet, Rendezvous, RunSettings, RxDump,
    SlaveActor,
};
use spiduplex_logic::WINDOW_START;
use spiduplex_report::{ReportConfig, ReportMeta, RunReport};
use spiduplex_transport::{
    AlwaysReady, GateError, LoopbackTransport, ReadinessGate, SimulatedBus, Transport,
    TransportError,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("slave ready indicator unusable: {0}")]
    Gate(#[from] GateError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Dump(#[from] DumpError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("the spidev backend is only available on Linux")]
    Unsupported,
}

/// The collaborators both actors run against.
pub struct Backends {
    pub master: Box<dyn Transport>,
    pub slave: Box<dyn Transport>,
    pub gate: Box<dyn ReadinessGate>,
}

/// Open the configured backend. The readiness gate is probed once here;
/// an inaccessible indicator at startup is fatal.
pub fn open_backends(config: &RunConfig) -> Result<Backends, OrchestratorError> {
    let mut backends = match config.backend {
        Backend::Spidev => open_spidev(config)?,
        Backend::Sim if config.loopback() => Backends {
            master: Box::new(LoopbackTransport),
            slave: Box::new(LoopbackTransport),
            gate: Box::new(AlwaysReady),
        },
        Backend::Sim => {
            let (master, slave) = SimulatedBus::pair();
            Backends {
                master: Box::new(master),
                slave: Box::new(slave),
                gate: Box::new(AlwaysReady),
            }
        }
    };

    backends.gate.probe()?;
    Ok(backends)
}

#[cfg(target_os = "linux")]
fn open_spidev(config: &RunConfig) -> Result<Backends, OrchestratorError> {
    use spiduplex_transport::{SpidevTransport, SysfsGate};

    let master = SpidevTransport::open(&config.master_device, &config.params)?;
    let slave = SpidevTransport::open(&config.slave_device, &config.params)?;
    for device in [&master, &slave] {
        let settings = device.settings();
        info!(
            device = %device.path().display(),
            mode = settings.mode.bits(),
            bits_per_word = settings.bits_per_word,
            speed_hz = settings.speed_hz,
            "spi device configured"
        );
    }

    Ok(Backends {
        master: Box::new(master),
        slave: Box::new(slave),
        gate: Box::new(SysfsGate::new(&config.ready_path)),
    })
}

#[cfg(not(target_os = "linux"))]
fn open_spidev(_config: &RunConfig) -> Result<Backends, OrchestratorError> {
    Err(OrchestratorError::Unsupported)
}

/// Seed both transmit buffers with bytes in `1..=255`.
///
/// In loopback each actor receives its own transmission, so the slave
/// buffer is a copy of the master buffer to keep the two windows equal. A
/// payload override lands in both windows from index 1 onwards.
pub fn seed_payloads(config: &RunConfig) -> (Vec<u8>, Vec<u8>) {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let len = config.transfer_size;

    let mut master: Vec<u8> = (0..len).map(|_| rng.gen_range(1..=255)).collect();
    let mut slave: Vec<u8> = if config.loopback() {
        master.clone()
    } else {
        (0..len).map(|_| rng.gen_range(1..=255)).collect()
    };

    if let Some(payload) = &config.payload {
        for buf in [&mut master, &mut slave] {
            let window = &mut buf[WINDOW_START..];
            let n = payload.len().min(window.len());
            window[..n].copy_from_slice(&payload[..n]);
        }
    }

    (master, slave)
}

/// Run with the configured backend.
pub fn execute(
    config: &RunConfig,
    fatal: FatalPolicy,
    diagnostics: Box<dyn Write + Send>,
) -> Result<RunReport, OrchestratorError> {
    let backends = open_backends(config)?;
    execute_on(config, fatal, diagnostics, backends)
}

/// Run against the given backends.
pub fn execute_on(
    config: &RunConfig,
    fatal: FatalPolicy,
    diagnostics: Box<dyn Write + Send>,
    backends: Backends,
) -> Result<RunReport, OrchestratorError> {
    let (master_tx, slave_tx) = seed_payloads(config);
    let payloads = PayloadSet::new(master_tx, slave_tx)?;

    let settings = Arc::new(RunSettings {
        verbose: config.verbose,
        poll: config.poll,
        fatal,
        ..RunSettings::new(config.transactions, config.params)
    });

    let progress = config.progress.then(|| {
        let pb = ProgressBar::new(settings.sequencer.planned_iterations());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    let mut reporter = MismatchReporter::new(diagnostics);
    if let Some(pb) = &progress {
        reporter = reporter.with_progress(pb.clone());
    }
    let reporter = Arc::new(reporter);

    if config.verbose {
        reporter.notice(
            None,
            &[
                Dump::new("MASTER TX", payloads.master.tx.as_slice()),
                Dump::new("SLAVE TX", payloads.slave.tx.as_slice()),
            ],
        );
    }

    let dump = config.output.as_ref().map(RxDump::create).transpose()?.map(Arc::new);

    let mut master_ctx = ActorContext::new(settings.clone(), reporter.clone());
    let mut slave_ctx = ActorContext::new(settings.clone(), reporter.clone());
    if let Some(dump) = dump {
        info!(path = %dump.path().display(), "appending received data");
        master_ctx = master_ctx.with_dump(dump.clone());
        slave_ctx = slave_ctx.with_dump(dump);
    }
    if config.pacing == Pacing::Rendezvous {
        let (a, b) = Rendezvous::pair();
        master_ctx = master_ctx.with_rendezvous(a);
        slave_ctx = slave_ctx.with_rendezvous(b);
    }

    info!(
        backend = %config.backend,
        transactions = config.transactions,
        transfer_size = config.transfer_size,
        pacing = %config.pacing,
        poll = %config.poll,
        "starting run"
    );

    let Backends {
        master: master_bus,
        slave: slave_bus,
        gate,
    } = backends;
    let mut master = MasterActor::new(master_bus, gate, payloads.master, master_ctx);
    if let Some(pb) = &progress {
        master = master.with_progress(pb.clone());
    }
    let slave = SlaveActor::new(slave_bus, payloads.slave, slave_ctx);

    let start = Instant::now();
    let (master, slave) = run_actors(master, slave)?;
    let total_duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    Ok(build_report(config, &master, &slave, total_duration_ms))
}

pub fn build_report(
    config: &RunConfig,
    master: &MasterOutcome,
    slave: &ActorOutcome,
    total_duration_ms: f64,
) -> RunReport {
    RunReport {
        meta: ReportMeta {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            backend: config.backend.to_string(),
        },
        config: ReportConfig {
            transactions: config.transactions,
            transfer_size: config.transfer_size,
            speed_hz: config.params.speed_hz,
            delay_us: config.params.delay_us,
            bits_per_word: config.params.bits_per_word,
            mode_bits: config.params.mode.bits(),
            pacing: config.pacing.to_string(),
            loopback: config.loopback(),
        },
        latency: master.latency.summary(),
        master: master.actor.summary(),
        slave: slave.summary(),
        total_duration_ms,
    }
}
