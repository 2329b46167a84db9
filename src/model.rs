use crate::command::{build_command, Command, Invocation};
use crate::error::LauncherError;
use crate::options::OptionSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Per-process settings shared by every run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub invocation: Invocation,
    pub total_steps: u32,
    pub progress_marker: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            invocation: Invocation::default(),
            total_steps: crate::engine::DEFAULT_TOTAL_STEPS,
            progress_marker: crate::engine::DEFAULT_MARKER.to_string(),
        }
    }
}

/// Everything the form holds: the two mandatory paths and every option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectState {
    pub source: String,
    pub output_dir: String,
    pub options: OptionSet,
}

impl ProjectState {
    pub fn build_command(&self, invocation: &Invocation) -> Result<Command, LauncherError> {
        build_command(invocation, &self.options, &self.source, &self.output_dir)
    }

    pub fn to_settings(&self) -> Settings {
        Settings {
            file_path: self.source.clone(),
            output_dir: self.output_dir.clone(),
            options: self.options.to_map(),
        }
    }

    /// Replace paths and apply saved option values. Returns the tokens that
    /// were skipped as unknown or mismatched.
    pub fn apply_settings(&mut self, settings: &Settings) -> Vec<String> {
        self.source = settings.file_path.clone();
        self.output_dir = settings.output_dir.clone();
        self.options.apply_map(&settings.options)
    }
}

/// On-disk settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default)]
    pub options: BTreeMap<String, crate::options::OptionValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed { code: Option<i32>, lines: usize },
    ToolNotFound { message: String },
}

impl RunOutcome {
    pub fn state(&self) -> RunState {
        match self {
            RunOutcome::Succeeded => RunState::Succeeded,
            RunOutcome::Failed { .. } => RunState::Failed,
            RunOutcome::ToolNotFound { .. } => RunState::ToolNotFound,
        }
    }

    pub fn into_error(self) -> Option<LauncherError> {
        match self {
            RunOutcome::Succeeded => None,
            RunOutcome::Failed { code, lines } => Some(LauncherError::NonZeroExit { code, lines }),
            RunOutcome::ToolNotFound { message } => Some(LauncherError::LaunchFailure { message }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
    ToolNotFound,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::ToolNotFound
        )
    }

    /// A new run may start from idle or from any terminal state.
    pub fn can_start(self) -> bool {
        self == RunState::Idle || self.is_terminal()
    }

    pub fn label(self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Running => "Compiling",
            RunState::Succeeded => "Succeeded",
            RunState::Failed => "Failed",
            RunState::ToolNotFound => "Tool not found",
        }
    }
}

/// Events streamed from a run to whoever displays it.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileEvent {
    Started {
        command: String,
    },
    Line(String),
    Progress {
        percent: f64,
    },
    Info(String),
    /// A start request refused because another run is still live.
    Rejected(String),
    /// Always the last event of a run.
    Finished {
        outcome: RunOutcome,
        elapsed: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionValue;

    #[test]
    fn settings_json_shape() {
        let mut state = ProjectState {
            source: "/a/b.py".into(),
            output_dir: "/out".into(),
            ..Default::default()
        };
        state.options.set_flag("--standalone", true).unwrap();
        state.options.set_text("--jobs", "4").unwrap();

        let v = serde_json::to_value(state.to_settings()).unwrap();
        assert_eq!(v["file_path"], "/a/b.py");
        assert_eq!(v["output_dir"], "/out");
        assert_eq!(v["options"]["--standalone"], true);
        assert_eq!(v["options"]["--jobs"], "4");
        assert_eq!(v["options"]["--onefile"], false);
    }

    #[test]
    fn apply_settings_restores_state() {
        let mut options = BTreeMap::new();
        options.insert("--standalone".to_string(), OptionValue::Flag(true));
        options.insert("--jobs".to_string(), OptionValue::Text("4".into()));
        let settings = Settings {
            file_path: "/a/b.py".into(),
            output_dir: "/out".into(),
            options,
        };

        let mut state = ProjectState::default();
        assert!(state.apply_settings(&settings).is_empty());
        assert_eq!(state.source, "/a/b.py");
        assert_eq!(state.output_dir, "/out");
        assert_eq!(state.options.get("--standalone"), Some(&OptionValue::Flag(true)));
        assert_eq!(state.options.get("--jobs"), Some(&OptionValue::Text("4".into())));
    }

    #[test]
    fn missing_keys_default() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn run_state_gates_start() {
        assert!(RunState::Idle.can_start());
        assert!(!RunState::Running.can_start());
        for s in [RunState::Succeeded, RunState::Failed, RunState::ToolNotFound] {
            assert!(s.is_terminal());
            assert!(s.can_start());
        }
        assert!(!RunState::Idle.is_terminal());
    }

    #[test]
    fn outcome_maps_to_error() {
        assert!(RunOutcome::Succeeded.into_error().is_none());
        assert!(matches!(
            RunOutcome::Failed { code: Some(2), lines: 3 }.into_error(),
            Some(LauncherError::NonZeroExit { code: Some(2), lines: 3 })
        ));
        assert!(matches!(
            RunOutcome::ToolNotFound { message: "x".into() }.into_error(),
            Some(LauncherError::LaunchFailure { .. })
        ));
    }
}
