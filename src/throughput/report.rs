//! Human-readable throughput result formatting for the CLI.

use super::orchestrator::TestResult;

/// Format a throughput result as a one-line summary.
pub fn format_summary(result: &TestResult) -> String {
    let metrics = &result.results;
    let speed = if metrics.megabits_per_second >= 1000.0 {
        format!("{:.2} Gbps", metrics.gigabits_per_second)
    } else {
        format!("{:.1} Mbps", metrics.megabits_per_second)
    };

    let mut summary = format!(
        "{} {} test: {} ({} bytes in {:.2}s, configured {}s)",
        result.server.name,
        result.test_config.direction,
        speed,
        metrics.bytes_transferred,
        metrics.runtime_seconds,
        result.test_config.duration,
    );

    if metrics.retransmits > 0 {
        summary.push_str(&format!(", retransmits: {}", metrics.retransmits));
    }

    summary
}
