//! Human-readable output

use crate::report::{ActorStatus, ActorSummary, RunReport};

/// The one-line summary printed at the end of every run.
pub fn summary_line(report: &RunReport) -> String {
    format!(
        "Average time taken per transaction (averaged over {} transactions of size {} bytes @ {:.6} MHz) is {:.6} us",
        report.config.transactions,
        report.config.transfer_size,
        report.config.speed_hz as f64 / 1_000_000.0,
        report.latency.average_us,
    )
}

/// Format output for human-readable display
pub fn format_human_output(report: &RunReport) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("spiduplex Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    output.push_str(&format!(
        "Backend: {}  Pacing: {}  Mode: {:#x}{}\n",
        report.meta.backend,
        report.config.pacing,
        report.config.mode_bits,
        if report.config.loopback { " (loopback)" } else { "" }
    ));
    output.push_str(&format!(
        "Bits per word: {}  Delay: {} us\n\n",
        report.config.bits_per_word, report.config.delay_us
    ));

    for actor in [&report.master, &report.slave] {
        push_actor(&mut output, actor);
    }

    output.push_str("Summary\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  Mismatches: {}  Duration: {:.2} ms\n",
        report.mismatches(),
        report.total_duration_ms
    ));
    output.push_str(&summary_line(report));
    output.push('\n');

    output
}

fn push_actor(output: &mut String, actor: &ActorSummary) {
    let status_icon = match actor.status {
        ActorStatus::Completed => "✓",
        ActorStatus::MismatchAborted => "✗",
        ActorStatus::Failed => "💥",
    };

    output.push_str(&format!("  {} {}\n", status_icon, actor.role));
    output.push_str(&format!(
        "      iterations: {}/{}  tag mismatches: {}\n",
        actor.completed_iterations, actor.planned_iterations, actor.tag_mismatches
    ));
    if let Some(iteration) = actor.window_mismatch_at {
        output.push_str(&format!(
            "      window mismatch at iteration {}\n",
            iteration
        ));
    }
    if let Some(error) = &actor.error {
        output.push_str(&format!("      error: {}\n", error));
    }
    output.push('\n');
}
