//! Command assembly for the external compiler.
//!
//! `build_command` validates the two mandatory paths and then projects the
//! option state onto an ordered token list. It has no side effects, so the
//! preview and the run always see the same tokens for the same state.

use crate::error::LauncherError;
use crate::options::OptionSet;
use std::path::{Component, Path, PathBuf};

/// How the compiler is reached: `<interpreter> -m <tool_module>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub interpreter: String,
    pub tool_module: String,
}

impl Default for Invocation {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter().to_string(),
            tool_module: "nuitka".to_string(),
        }
    }
}

pub fn default_interpreter() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// A fully assembled command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }

    /// Space-joined rendering for display. Values are not quoted.
    pub fn render(&self) -> String {
        self.tokens().collect::<Vec<_>>().join(" ")
    }

    /// Assemble tokens from already-validated paths.
    pub fn assemble(
        invocation: &Invocation,
        options: &OptionSet,
        source: &Path,
        output_dir: &Path,
    ) -> Self {
        let mut args = vec!["-m".to_string(), invocation.tool_module.clone()];
        args.extend(options.contributions());
        args.push(format!("--output-dir={}", output_dir.display()));
        args.push(source.display().to_string());
        Self {
            program: invocation.interpreter.clone(),
            args,
        }
    }
}

/// Make a path absolute against the current directory and drop `.`/`..`
/// components lexically. Symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn resolve_source(raw: &str) -> Result<PathBuf, LauncherError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidSourcePath(PathBuf::new()));
    }
    let path = normalize_path(Path::new(trimmed));
    if path.is_file() {
        Ok(path)
    } else {
        Err(LauncherError::InvalidSourcePath(path))
    }
}

pub fn resolve_output_dir(raw: &str) -> Result<PathBuf, LauncherError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidOutputDir(PathBuf::new()));
    }
    let path = normalize_path(Path::new(trimmed));
    if path.is_dir() {
        Ok(path)
    } else {
        Err(LauncherError::InvalidOutputDir(path))
    }
}

/// Validate both paths, then assemble. Nothing is returned on a failed check.
pub fn build_command(
    invocation: &Invocation,
    options: &OptionSet,
    source: &str,
    output_dir: &str,
) -> Result<Command, LauncherError> {
    let source = resolve_source(source)?;
    let output_dir = resolve_output_dir(output_dir)?;
    Ok(Command::assemble(invocation, options, &source, &output_dir))
}
