use crate::command::{default_interpreter, Invocation};
use crate::engine::{CompileEngine, DEFAULT_MARKER, DEFAULT_TOTAL_STEPS};
use crate::error::LauncherError;
use crate::model::{CompileEvent, ProjectState, RunConfig};
use crate::options::{find_spec, OptionKind};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "nuitka-launcher",
    version,
    about = "Build and run Nuitka compile commands with live output"
)]
pub struct Cli {
    /// Python source file to compile
    #[arg(long)]
    pub source: Option<String>,

    /// Directory that receives the build output
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Settings file to load at startup (also the TUI save/load target)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Python interpreter used to run the compiler
    #[arg(long, default_value = default_interpreter())]
    pub python: String,

    /// Compiler module passed to `-m`
    #[arg(long, default_value = "nuitka")]
    pub tool: String,

    /// Enable a flag option, e.g. --enable standalone (repeatable)
    #[arg(long = "enable", value_name = "OPTION", allow_hyphen_values = true)]
    pub enable: Vec<String>,

    /// Set a value option, e.g. --set jobs=4 (repeatable)
    #[arg(long = "set", value_name = "OPTION=VALUE", allow_hyphen_values = true)]
    pub set: Vec<String>,

    /// Number of compiler stage announcements that make up 100% progress
    #[arg(long, default_value_t = DEFAULT_TOTAL_STEPS)]
    pub total_steps: u32,

    /// Regex matching the compiler's stage announcement lines
    #[arg(long, default_value = DEFAULT_MARKER)]
    pub progress_marker: String,

    /// Print the command that would run and exit
    #[arg(long)]
    pub print_command: bool,

    /// Compile without the TUI, streaming output to stdout
    #[arg(long)]
    pub text: bool,

    /// Write the resulting settings to this file and exit
    #[arg(long)]
    pub save_settings: Option<PathBuf>,
}

impl Cli {
    /// Whether this invocation opens the terminal UI.
    pub fn is_interactive(&self) -> bool {
        cfg!(feature = "tui") && !self.text && !self.print_command && self.save_settings.is_none()
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let Startup {
        project,
        settings_error,
    } = build_project(&args)?;

    if let Some(path) = args.save_settings.as_deref() {
        crate::storage::save_settings(path, &project.to_settings())?;
        eprintln!("Saved: {}", path.display());
        return Ok(());
    }

    if args.print_command {
        let command = project.build_command(&cfg.invocation)?;
        println!("{}", command.render());
        return Ok(());
    }

    if !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, cfg, project, settings_error).await;
        }
    }

    run_text(cfg, project).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    regex::Regex::new(&args.progress_marker)
        .with_context(|| format!("invalid --progress-marker {:?}", args.progress_marker))?;
    Ok(RunConfig {
        invocation: Invocation {
            interpreter: args.python.clone(),
            tool_module: args.tool.clone(),
        },
        total_steps: args.total_steps.max(1),
        progress_marker: args.progress_marker.clone(),
    })
}

/// Initial form state, plus a settings problem the TUI reports once it is up.
#[derive(Debug)]
pub struct Startup {
    pub project: ProjectState,
    pub settings_error: Option<String>,
}

/// Start from the settings file (if any), then apply command-line overrides.
///
/// A settings file that cannot be loaded is fatal in headless modes. The TUI
/// starts from an empty form instead and shows the error.
pub fn build_project(args: &Cli) -> Result<Startup> {
    let mut project = ProjectState::default();
    let mut settings_error = None;
    if let Some(path) = args.settings.as_deref() {
        if path.exists() || args.text || args.print_command {
            match crate::storage::load_settings(path) {
                Ok(settings) => {
                    for token in project.apply_settings(&settings) {
                        tracing::warn!(option = %token, "settings file entry ignored");
                    }
                }
                Err(e) if args.is_interactive() => {
                    tracing::warn!(error = %e, "starting with an empty form");
                    settings_error = Some(e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    if let Some(source) = args.source.as_ref() {
        project.source = source.clone();
    }
    if let Some(dir) = args.output_dir.as_ref() {
        project.output_dir = dir.clone();
    }
    for token in &args.enable {
        project.options.set_flag(&qualify(token), true)?;
    }
    for assignment in &args.set {
        apply_assignment(&mut project, assignment)?;
    }
    Ok(Startup {
        project,
        settings_error,
    })
}

/// Accept `standalone` as well as `--standalone`.
fn qualify(token: &str) -> String {
    if token.starts_with("--") {
        token.to_string()
    } else {
        format!("--{token}")
    }
}

fn apply_assignment(project: &mut ProjectState, assignment: &str) -> Result<(), LauncherError> {
    let (token, value) = assignment
        .split_once('=')
        .ok_or_else(|| LauncherError::UnknownOption(assignment.to_string()))?;
    let token = qualify(token);
    let (_, spec) =
        find_spec(&token).ok_or_else(|| LauncherError::UnknownOption(token.clone()))?;
    match spec.kind {
        OptionKind::Flag => {
            let on = match value {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    return Err(LauncherError::OptionKindMismatch {
                        token,
                        expected: "boolean",
                    })
                }
            };
            project.options.set_flag(&token, on)
        }
        OptionKind::Text | OptionKind::Path => project.options.set_text(&token, value),
    }
}

async fn run_text(cfg: RunConfig, project: ProjectState) -> Result<()> {
    let command = project.build_command(&cfg.invocation)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<CompileEvent>();

    let engine = CompileEngine::new(cfg, command);
    let handle = tokio::spawn(async move { engine.run(evt_tx).await });

    let mut line_count = 0usize;
    let mut progress = 0.0;
    let mut elapsed = std::time::Duration::ZERO;
    while let Some(ev) = evt_rx.recv().await {
        match ev {
            CompileEvent::Started { .. } => {}
            CompileEvent::Line(line) => {
                line_count += 1;
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
            CompileEvent::Progress { percent } => {
                progress = percent;
                let _ = out_tx.send(OutputLine::Stderr(format!("[{percent:>3.0}%]")));
            }
            CompileEvent::Info(msg) | CompileEvent::Rejected(msg) => {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
            CompileEvent::Finished { elapsed: e, .. } => elapsed = e,
        }
    }

    let outcome = handle.await.context("compilation task failed")?;
    let summary = crate::text_summary::build_text_summary(&outcome, elapsed, line_count, progress);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stderr(line));
    }
    drop(out_tx);
    let _ = out_handle.await;

    match outcome.into_error() {
        None => Ok(()),
        Some(e) => Err(e.into()),
    }
}
