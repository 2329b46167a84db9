//! Text summary builder for headless output.

use crate::model::RunOutcome;
use std::time::Duration;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(
    outcome: &RunOutcome,
    elapsed: Duration,
    output_lines: usize,
    progress: f64,
) -> TextSummary {
    let mut lines = Vec::new();
    let status = match outcome {
        RunOutcome::Succeeded => "succeeded".to_string(),
        RunOutcome::Failed { code: Some(c), .. } => format!("failed (exit code {c})"),
        RunOutcome::Failed { code: None, .. } => "failed (terminated by signal)".to_string(),
        RunOutcome::ToolNotFound { .. } => "could not start compiler".to_string(),
    };
    lines.push(format!("Result: {status}"));
    // Whole seconds keep the output readable.
    let secs = Duration::from_secs(elapsed.as_secs());
    lines.push(format!("Elapsed: {}", humantime::format_duration(secs)));
    lines.push(format!("Output lines: {output_lines}"));
    lines.push(format!("Progress: {progress:.0}%"));
    TextSummary { lines }
}
