//! Run lifecycle controller.
//!
//! Owns the single in-flight compilation and forwards its events to presentation layers.

use crate::command::Command;
use crate::engine::CompileEngine;
use crate::model::{CompileEvent, RunConfig, RunOutcome};
use anyhow::Result;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Start a compilation with an already validated command.
    Start(Command),
    Quit,
}

/// The live compilation. Its events pass through the controller so the slot
/// is free before any consumer sees `Finished`.
struct ActiveRun {
    events: UnboundedReceiver<CompileEvent>,
    task: JoinHandle<RunOutcome>,
    started: Instant,
}

/// Spawn a compilation task feeding a private channel.
fn start_run(cfg: &RunConfig, command: Command) -> ActiveRun {
    let (run_tx, events) = mpsc::unbounded_channel();
    let engine = CompileEngine::new(cfg.clone(), command);
    ActiveRun {
        events,
        task: tokio::spawn(async move { engine.run(run_tx).await }),
        started: Instant::now(),
    }
}

/// Accept UI commands and run at most one compilation at a time.
pub(crate) async fn run_controller(
    cfg: &RunConfig,
    event_tx: UnboundedSender<CompileEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut running: Option<ActiveRun> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start(command)) => {
                        if running.is_some() {
                            tracing::debug!("start rejected, compilation in progress");
                            let _ = event_tx.send(CompileEvent::Rejected(
                                "A compilation is already running.".into(),
                            ));
                        } else {
                            running = Some(start_run(cfg, command));
                        }
                    }
                    // No cancellation: a running child is left to finish on its own.
                    Some(UiCommand::Quit) | None => break,
                }
            }
            ev = async {
                match running.as_mut() {
                    Some(run) => run.events.recv().await,
                    None => futures::future::pending().await,
                }
            } => {
                match ev {
                    Some(ev @ CompileEvent::Finished { .. }) => {
                        running = None;
                        let _ = event_tx.send(ev);
                    }
                    Some(ev) => {
                        let _ = event_tx.send(ev);
                    }
                    // The engine dropped its sender without finishing.
                    None => {
                        if let Some(run) = running.take() {
                            let elapsed = run.started.elapsed();
                            if let Err(e) = run.task.await {
                                tracing::error!(error = %e, "compilation task failed");
                                let _ = event_tx.send(CompileEvent::Info(format!(
                                    "Compilation task failed: {e}"
                                )));
                            }
                            let _ = event_tx.send(CompileEvent::Finished {
                                outcome: RunOutcome::Failed { code: None, lines: 0 },
                                elapsed,
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
