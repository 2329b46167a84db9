mod process;
mod progress;

pub use progress::{ProgressTracker, DEFAULT_MARKER, DEFAULT_TOTAL_STEPS, SUCCESS_PHRASE};

use crate::command::{Command, Invocation};
use crate::model::{CompileEvent, RunConfig, RunOutcome};
use std::time::Instant;
use tokio::sync::mpsc;

pub const FAILURE_LINE: &str = "Compilation failed.";

/// Runs one compilation and streams its output.
pub struct CompileEngine {
    cfg: RunConfig,
    command: Command,
}

impl CompileEngine {
    pub fn new(cfg: RunConfig, command: Command) -> Self {
        Self { cfg, command }
    }

    /// Run to completion. `Finished` is always the last event sent, after
    /// every line the child produced.
    pub async fn run(self, event_tx: mpsc::UnboundedSender<CompileEvent>) -> RunOutcome {
        let started = Instant::now();
        let rendered = self.command.render();
        tracing::info!(command = %rendered, "starting compilation");
        let _ = event_tx.send(CompileEvent::Started {
            command: rendered.clone(),
        });
        let _ = event_tx.send(CompileEvent::Line(format!("Executing command: {rendered}")));

        let mut tracker =
            match ProgressTracker::with_marker(self.cfg.total_steps, &self.cfg.progress_marker) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid progress marker, using default");
                    ProgressTracker::new(self.cfg.total_steps)
                }
            };

        let outcome = self.execute(&event_tx, &mut tracker).await;
        let elapsed = started.elapsed();
        tracing::info!(
            ?outcome,
            elapsed = %humantime::format_duration(elapsed),
            "compilation finished"
        );

        let _ = event_tx.send(CompileEvent::Finished {
            outcome: outcome.clone(),
            elapsed,
        });
        outcome
    }

    async fn execute(
        &self,
        event_tx: &mpsc::UnboundedSender<CompileEvent>,
        tracker: &mut ProgressTracker,
    ) -> RunOutcome {
        let mut child = match process::spawn_piped(&self.command) {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    program = %self.command.program,
                    "failed to launch compiler"
                );
                let message = not_found_message(&self.cfg.invocation);
                let _ = event_tx.send(CompileEvent::Line(message.clone()));
                return RunOutcome::ToolNotFound { message };
            }
        };

        let missing_module = format!("No module named {}", self.cfg.invocation.tool_module);
        let mut module_missing = false;
        let mut lines = 0usize;
        let mut line_rx = process::merged_lines(&mut child);
        while let Some(line) = line_rx.recv().await {
            lines += 1;
            if line.trim_end().ends_with(&missing_module) {
                module_missing = true;
            }
            emit_line(event_tx, tracker, line);
        }

        match child.wait().await {
            Ok(status) if status.success() => {
                emit_line(event_tx, tracker, SUCCESS_PHRASE.to_string());
                tracing::debug!(
                    lines,
                    percent = tracker.percent(),
                    done = tracker.is_finished(),
                    "compiler exited cleanly"
                );
                RunOutcome::Succeeded
            }
            Ok(_) if module_missing => {
                let message = not_found_message(&self.cfg.invocation);
                let _ = event_tx.send(CompileEvent::Line(message.clone()));
                RunOutcome::ToolNotFound { message }
            }
            Ok(status) => {
                emit_line(event_tx, tracker, FAILURE_LINE.to_string());
                RunOutcome::Failed {
                    code: status.code(),
                    lines,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "waiting for compiler failed");
                let _ = event_tx.send(CompileEvent::Line(format!(
                    "Error waiting for compiler: {e}"
                )));
                emit_line(event_tx, tracker, FAILURE_LINE.to_string());
                RunOutcome::Failed { code: None, lines }
            }
        }
    }
}

fn emit_line(
    event_tx: &mpsc::UnboundedSender<CompileEvent>,
    tracker: &mut ProgressTracker,
    line: String,
) {
    let progress = tracker.observe(&line);
    let _ = event_tx.send(CompileEvent::Line(line));
    if let Some(percent) = progress {
        let _ = event_tx.send(CompileEvent::Progress { percent });
    }
}

fn not_found_message(inv: &Invocation) -> String {
    format!(
        "Error: {} or {} not found. Please ensure they are installed and in your system PATH.",
        inv.interpreter, inv.tool_module
    )
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        Command {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }

    async fn run_script(script: &str) -> (RunOutcome, Vec<CompileEvent>) {
        run_command(RunConfig::default(), sh(script)).await
    }

    async fn run_command(cfg: RunConfig, command: Command) -> (RunOutcome, Vec<CompileEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = CompileEngine::new(cfg, command).run(tx).await;
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        (outcome, events)
    }

    fn lines(events: &[CompileEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                CompileEvent::Line(l) => Some(l.as_str()),
                _ => None,
            })
            .collect()
    }

    fn progress(events: &[CompileEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                CompileEvent::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn success_reaches_full_progress() {
        let (outcome, events) = run_script(
            "echo 'Nuitka-Options: Used command line options:'; \
             echo 'Nuitka: Starting Python compilation with:'; \
             echo 'gcc output' 1>&2; \
             echo 'Nuitka: Successfully created:'",
        )
        .await;

        assert_eq!(outcome, RunOutcome::Succeeded);
        let values = progress(&events);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|v| *v <= 100.0));
        assert_eq!(values.last().copied(), Some(100.0));

        let out = lines(&events);
        assert!(out[0].starts_with("Executing command: sh -c"));
        assert!(out.contains(&"gcc output"));
        assert_eq!(out.last().copied(), Some(SUCCESS_PHRASE));
    }

    #[tokio::test]
    async fn finished_is_last_and_after_all_output() {
        let (outcome, events) =
            run_script("i=0; while [ $i -lt 500 ]; do echo line$i; i=$((i+1)); done").await;
        assert_eq!(outcome, RunOutcome::Succeeded);
        assert!(matches!(events.first(), Some(CompileEvent::Started { .. })));
        assert!(matches!(
            events.last(),
            Some(CompileEvent::Finished { outcome: RunOutcome::Succeeded, .. })
        ));
        let finished = events
            .iter()
            .filter(|e| matches!(e, CompileEvent::Finished { .. }))
            .count();
        assert_eq!(finished, 1);
        let out = lines(&events);
        assert!(out.contains(&"line0"));
        assert!(out.contains(&"line499"));
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_output() {
        let (outcome, events) = run_script("echo one; echo two 1>&2; exit 3").await;
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                code: Some(3),
                lines: 2
            }
        );
        let out = lines(&events);
        assert!(out.contains(&"one"));
        assert!(out.contains(&"two"));
        assert_eq!(out.last().copied(), Some(FAILURE_LINE));
        assert!(progress(&events).iter().all(|v| *v < 100.0));
    }

    #[tokio::test]
    async fn missing_program_is_tool_not_found() {
        let cfg = RunConfig {
            invocation: Invocation {
                interpreter: "nuitka-launcher-no-such-python".into(),
                tool_module: "nuitka".into(),
            },
            ..Default::default()
        };
        let command = Command {
            program: "nuitka-launcher-no-such-python".into(),
            args: vec!["-m".into(), "nuitka".into()],
        };
        let (outcome, events) = run_command(cfg, command).await;
        match outcome {
            RunOutcome::ToolNotFound { message } => {
                assert!(message.contains("nuitka-launcher-no-such-python"));
                assert!(lines(&events).contains(&message.as_str()));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(
            events.last(),
            Some(CompileEvent::Finished { outcome: RunOutcome::ToolNotFound { .. }, .. })
        ));
    }

    #[tokio::test]
    async fn missing_module_is_tool_not_found() {
        let (outcome, _) =
            run_script("echo '/usr/bin/python3: No module named nuitka' 1>&2; exit 1").await;
        assert!(matches!(outcome, RunOutcome::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn other_missing_module_is_plain_failure() {
        let (outcome, _) = run_script(
            "echo \"ModuleNotFoundError: No module named nuitka_plugins\" 1>&2; \
             echo 'No module named nuitka.extra here'; exit 1",
        )
        .await;
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                code: Some(1),
                lines: 2
            }
        );
    }
}
