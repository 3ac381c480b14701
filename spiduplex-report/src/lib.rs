//! spiduplex Report - Run Reports and Diagnostics Formatting
//!
//! Output formats:
//! - Human-readable terminal summary, ending with the one-line latency summary
//! - JSON (machine-readable)
//!
//! Also home to the hex dump used by mismatch reports and verbose transfers.

mod hexdump;
mod human;
mod json;
mod report;

pub use hexdump::{hex_dump, DEFAULT_LINE_SIZE};
pub use human::{format_human_output, summary_line};
pub use json::generate_json_report;
pub use report::{
    ActorRole, ActorStatus, ActorSummary, LatencySummary, ReportConfig, ReportMeta, RunReport,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable terminal output
    Human,
    /// JSON with the full report
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Render a report in the requested format.
pub fn render(report: &RunReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Human => Ok(format_human_output(report)),
        OutputFormat::Json => generate_json_report(report),
    }
}
