//! JSON Output

use crate::report::RunReport;

/// Generate JSON report
pub fn generate_json_report(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
