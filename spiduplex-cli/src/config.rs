//! Run configuration, resolved once from the command line before any actor
//! starts.

use crate::Cli;
use spiduplex_core::{Pacing, PollStrategy};
use spiduplex_report::OutputFormat;
use spiduplex_transport::{SpiMode, TransferParams, MAX_TRANSFER_SIZE};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("transfer size must be at least 2 bytes, got {0}")]
    TransferTooSmall(usize),

    #[error("transfer size must be at most {max} bytes, got {size}")]
    TransferTooLarge { size: usize, max: usize },

    #[error("transaction count must be at least 1")]
    NoTransactions,

    #[error("bits per word must be in 1..=32, got {0}")]
    BitsPerWord(u8),

    #[error("{0}")]
    Format(String),

    #[error("{0}")]
    Pacing(String),

    #[error("{0}")]
    Poll(String),

    #[error("invalid payload escape at byte {offset}: {reason}")]
    Payload { offset: usize, reason: &'static str },

    #[error("can't read input file {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which bus the actors drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Linux spidev device nodes.
    Spidev,
    /// In-memory bus (loopback when `--loop` is set).
    Sim,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Spidev => f.write_str("spidev"),
            Backend::Sim => f.write_str("sim"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub backend: Backend,
    pub master_device: PathBuf,
    pub slave_device: PathBuf,
    pub ready_path: PathBuf,
    pub transactions: u64,
    pub transfer_size: usize,
    pub params: TransferParams,
    pub verbose: bool,
    /// Bytes copied into both transmit windows after seeding.
    pub payload: Option<Vec<u8>>,
    pub output: Option<PathBuf>,
    pub pacing: Pacing,
    pub poll: PollStrategy,
    pub seed: Option<u64>,
    pub format: OutputFormat,
    pub report_path: Option<PathBuf>,
    pub progress: bool,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if cli.size < 2 {
            return Err(ConfigError::TransferTooSmall(cli.size));
        }
        if cli.size > MAX_TRANSFER_SIZE {
            return Err(ConfigError::TransferTooLarge {
                size: cli.size,
                max: MAX_TRANSFER_SIZE,
            });
        }
        if cli.transactions < 1 {
            return Err(ConfigError::NoTransactions);
        }
        if !(1..=32).contains(&cli.bpw) {
            return Err(ConfigError::BitsPerWord(cli.bpw));
        }

        let format: OutputFormat = cli.format.parse().map_err(ConfigError::Format)?;
        let pacing: Pacing = cli.pacing.parse().map_err(ConfigError::Pacing)?;
        let poll: PollStrategy = cli.poll.parse().map_err(ConfigError::Poll)?;

        let payload = match (&cli.payload, &cli.input) {
            (Some(text), _) => Some(unescape(text)?),
            (None, Some(path)) => Some(std::fs::read(path).map_err(|source| ConfigError::Input {
                path: path.clone(),
                source,
            })?),
            (None, None) => None,
        };

        let params = TransferParams {
            speed_hz: cli.speed,
            delay_us: cli.delay,
            bits_per_word: cli.bpw,
            mode: cli.mode().with_loopback_lanes(),
        };

        Ok(Self {
            backend: cli.backend,
            master_device: cli.device.clone(),
            slave_device: cli.slave_device.clone(),
            ready_path: cli.ready_path.clone(),
            transactions: cli.transactions,
            transfer_size: cli.size,
            params,
            verbose: cli.verbose,
            payload,
            output: cli.output.clone(),
            pacing,
            poll,
            seed: cli.seed,
            format,
            report_path: cli.report.clone(),
            progress: !cli.no_progress && !cli.verbose && format == OutputFormat::Human,
        })
    }

    pub fn loopback(&self) -> bool {
        self.params.mode.contains(SpiMode::LOOP)
    }
}

/// Decode a payload string with C escapes: `\xHH`, `\n`, `\r`, `\t`, `\0`,
/// `\\`, `\"` and octal `\NNN`.
pub fn unescape(text: &str) -> Result<Vec<u8>, ConfigError> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let at = i;
        let Some(&kind) = bytes.get(i + 1) else {
            return Err(ConfigError::Payload {
                offset: at,
                reason: "trailing backslash",
            });
        };
        i += 2;

        match kind {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'\\' => out.push(b'\\'),
            b'"' => out.push(b'"'),
            b'x' => {
                let digits = take_digits(&bytes[i..], 2, |b| b.is_ascii_hexdigit());
                if digits == 0 {
                    return Err(ConfigError::Payload {
                        offset: at,
                        reason: "\\x without hex digits",
                    });
                }
                out.push(parse_radix(&bytes[i..i + digits], 16, at)?);
                i += digits;
            }
            b'0'..=b'7' => {
                // The first digit is already consumed as `kind`.
                let start = i - 1;
                let digits = 1 + take_digits(&bytes[i..], 2, |b| (b'0'..=b'7').contains(&b));
                out.push(parse_radix(&bytes[start..start + digits], 8, at)?);
                i = start + digits;
            }
            _ => {
                return Err(ConfigError::Payload {
                    offset: at,
                    reason: "unknown escape",
                })
            }
        }
    }

    Ok(out)
}

fn take_digits(bytes: &[u8], max: usize, accept: impl Fn(u8) -> bool) -> usize {
    bytes.iter().take(max).take_while(|&&b| accept(b)).count()
}

fn parse_radix(digits: &[u8], radix: u32, offset: usize) -> Result<u8, ConfigError> {
    let text = std::str::from_utf8(digits).map_err(|_| ConfigError::Payload {
        offset,
        reason: "non-ascii digits",
    })?;
    u8::from_str_radix(text, radix).map_err(|_| ConfigError::Payload {
        offset,
        reason: "escape value does not fit in a byte",
    })
}
