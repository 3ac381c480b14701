//! spiduplex CLI Library
//!
//! Runs a master and a slave SPI actor against each other and reports
//! mismatches and average transaction latency. `spiduplex_cli::run()` is the
//! whole program; the pieces are public so tests can drive a run over the
//! simulated backend.

mod config;
mod orchestrator;
mod supervisor;

pub use config::{unescape, Backend, ConfigError, RunConfig};
pub use orchestrator::{
    build_report, execute, execute_on, open_backends, seed_payloads, Backends, OrchestratorError,
};
pub use supervisor::{run_actors, SupervisorError};

use clap::Parser;
use spiduplex_core::FatalPolicy;
use spiduplex_report::render;
use spiduplex_transport::{
    SpiMode, DEFAULT_MASTER_DEVICE, DEFAULT_READY_PATH, DEFAULT_SLAVE_DEVICE,
};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// spiduplex CLI arguments
#[derive(Parser, Debug)]
#[command(name = "spiduplex")]
#[command(author, version, about = "Full-duplex SPI master/slave stress test")]
pub struct Cli {
    /// Master device to use
    #[arg(short = 'D', long, default_value = DEFAULT_MASTER_DEVICE)]
    pub device: PathBuf,

    /// Slave device to use
    #[arg(long, default_value = DEFAULT_SLAVE_DEVICE)]
    pub slave_device: PathBuf,

    /// Slave-ready indicator polled by the master
    #[arg(long, default_value = DEFAULT_READY_PATH)]
    pub ready_path: PathBuf,

    /// Max speed (Hz)
    #[arg(short, long, default_value = "24000000")]
    pub speed: u32,

    /// Transfer size in bytes
    #[arg(short = 'S', long, default_value = "32")]
    pub size: usize,

    /// Number of transactions
    #[arg(short = 'n', long, visible_alias = "numtransactions", default_value = "10")]
    pub transactions: u64,

    /// Delay after each transfer (usec)
    #[arg(short, long, default_value = "0")]
    pub delay: u16,

    /// Bits per word
    #[arg(short, long, default_value = "32")]
    pub bpw: u8,

    /// Input data from a file (e.g. "test.bin")
    #[arg(short, long, conflicts_with = "payload")]
    pub input: Option<PathBuf>,

    /// Output received data to a file (e.g. "results.bin")
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Loopback
    #[arg(short = 'l', long = "loop")]
    pub loopback: bool,

    /// Clock phase
    #[arg(short = 'H', long)]
    pub cpha: bool,

    /// Clock polarity
    #[arg(short = 'O', long)]
    pub cpol: bool,

    /// Least significant bit first
    #[arg(short = 'L', long)]
    pub lsb: bool,

    /// Chip select active high
    #[arg(short = 'C', long)]
    pub cs_high: bool,

    /// SI/SO signals shared
    #[arg(short = '3', long = "3wire")]
    pub three_wire: bool,

    /// No chip select
    #[arg(short = 'N', long)]
    pub no_cs: bool,

    /// Slave pulls low to pause
    #[arg(short = 'R', long)]
    pub ready: bool,

    /// Dual transfer
    #[arg(short = '2', long)]
    pub dual: bool,

    /// Quad transfer
    #[arg(short = '4', long)]
    pub quad: bool,

    /// Verbose (dump every transfer)
    #[arg(short, long)]
    pub verbose: bool,

    /// Send data (e.g. "1234\xde\xad")
    #[arg(short, long)]
    pub payload: Option<String>,

    /// Bus backend
    #[arg(long, value_enum, default_value = "spidev")]
    pub backend: Backend,

    /// Actor pacing: best-effort, rendezvous
    #[arg(long, default_value = "best-effort")]
    pub pacing: String,

    /// Wait between slave-ready polls: spin, yield, or a sleep in microseconds
    #[arg(long, alias = "poll-interval-us", default_value = "spin")]
    pub poll: String,

    /// Seed for the payload generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format: human, json
    #[arg(long, default_value = "human")]
    pub format: String,

    /// Write the run report to a file (stdout if not specified)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// Wire-mode flags as given on the command line.
    pub fn mode(&self) -> SpiMode {
        let flags = [
            (self.loopback, SpiMode::LOOP),
            (self.cpha, SpiMode::CPHA),
            (self.cpol, SpiMode::CPOL),
            (self.lsb, SpiMode::LSB_FIRST),
            (self.cs_high, SpiMode::CS_HIGH),
            (self.three_wire, SpiMode::THREE_WIRE),
            (self.no_cs, SpiMode::NO_CS),
            (self.ready, SpiMode::READY),
            (self.dual, SpiMode::TX_DUAL),
            (self.quad, SpiMode::TX_QUAD),
        ];

        flags
            .into_iter()
            .filter(|(set, _)| *set)
            .fold(SpiMode::empty(), |mode, (_, flag)| mode | flag)
    }
}

/// Run the spiduplex CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the spiduplex CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let default_filter = if cli.verbose {
        "spiduplex=debug"
    } else {
        "spiduplex=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = RunConfig::from_cli(&cli)?;
    let report = execute(&config, FatalPolicy::Abort, Box::new(std::io::stdout()))?;
    let output = render(&report, config.format)?;

    if let Some(ref path) = config.report_path {
        let mut file = std::fs::File::create(path)?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    if report.has_fatal_error() {
        std::process::exit(1);
    }

    Ok(())
}
