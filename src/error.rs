use std::path::PathBuf;
use thiserror::Error;

/// User-facing failures. None of these end the application; each one leaves
/// the form usable for another attempt.
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Invalid Python file path: {}", .0.display())]
    InvalidSourcePath(PathBuf),

    #[error("Invalid output directory: {}", .0.display())]
    InvalidOutputDir(PathBuf),

    #[error("{message}")]
    LaunchFailure { message: String },

    #[error("Compilation failed (exit code {}, {lines} line(s) of output)", fmt_code(.code))]
    NonZeroExit { code: Option<i32>, lines: usize },

    #[error("Settings file {}: {source}", .path.display())]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Option {token} expects a {expected} value")]
    OptionKindMismatch {
        token: String,
        expected: &'static str,
    },
}

impl LauncherError {
    pub fn settings_io(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        LauncherError::SettingsIo {
            path: path.into(),
            source: source.into(),
        }
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none".into(),
    }
}
