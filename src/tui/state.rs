use crate::command::{Command, Invocation};
use crate::model::{CompileEvent, ProjectState, RunOutcome, RunState};
use crate::options::{OptionKind, OptionSpec, OptionValue, CATALOG};
use std::path::PathBuf;

pub const CANCELLED_LINE: &str = "Compilation cancelled by user.";

/// A selectable line of the options form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Source,
    OutputDir,
    Option(usize),
}

impl Row {
    pub fn spec(self) -> Option<&'static OptionSpec> {
        match self {
            Row::Option(i) => CATALOG.get(i),
            _ => None,
        }
    }
}

/// Form rows in display order: the two paths, then every catalog option.
pub fn form_rows() -> Vec<Row> {
    let mut rows = vec![Row::Source, Row::OutputDir];
    rows.extend((0..CATALOG.len()).map(Row::Option));
    rows
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    pub row: Row,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Popup {
    #[default]
    None,
    Preview {
        command: String,
    },
    Confirm {
        command: Command,
    },
    Error(String),
}

pub struct UiState {
    pub tab: usize,
    pub project: ProjectState,
    pub rows: Vec<Row>,
    pub selected: usize,
    pub editing: Option<EditBuffer>,
    pub popup: Popup,

    pub run_state: RunState,
    /// State to return to if the controller refuses a confirmed start.
    pub resume_state: RunState,
    pub progress: f64,
    pub output: Vec<String>,
    /// First visible output line; `None` follows the tail.
    pub output_scroll: Option<usize>,

    pub info: String,
    pub settings_path: PathBuf,
    pub invocation: Invocation,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            project: ProjectState::default(),
            rows: form_rows(),
            selected: 0,
            editing: None,
            popup: Popup::None,
            run_state: RunState::Idle,
            resume_state: RunState::Idle,
            progress: 0.0,
            output: Vec::new(),
            output_scroll: None,
            info: String::new(),
            settings_path: crate::storage::default_settings_path(),
            invocation: Invocation::default(),
        }
    }
}

impl UiState {
    pub fn selected_row(&self) -> Row {
        self.rows[self.selected.min(self.rows.len() - 1)]
    }

    pub fn move_selection(&mut self, delta: isize) {
        let last = self.rows.len().saturating_sub(1) as isize;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }

    /// Current text of a row, or `None` for flags.
    pub fn row_text(&self, row: Row) -> Option<&str> {
        match row {
            Row::Source => Some(&self.project.source),
            Row::OutputDir => Some(&self.project.output_dir),
            Row::Option(i) => match self.project.options.value_at(i) {
                Some(OptionValue::Text(t)) => Some(t),
                _ => None,
            },
        }
    }

    /// Act on the selected row: toggle a flag, step a choice list, or open a
    /// text editor for everything else.
    pub fn activate(&mut self) {
        let row = self.selected_row();
        match row.spec() {
            Some(spec) if spec.kind == OptionKind::Flag => {
                if let Row::Option(i) = row {
                    self.project.options.toggle_at(i);
                }
            }
            Some(spec) if !spec.choices.is_empty() => self.cycle_choice(true),
            _ => {
                let text = self.row_text(row).unwrap_or_default().to_string();
                self.editing = Some(EditBuffer { row, text });
            }
        }
    }

    pub fn cycle_choice(&mut self, forward: bool) {
        if let Row::Option(i) = self.selected_row() {
            self.project.options.cycle_choice_at(i, forward);
        }
    }

    /// Clear the selected text field or switch a flag off.
    pub fn clear_selected(&mut self) {
        match self.selected_row() {
            Row::Source => self.project.source.clear(),
            Row::OutputDir => self.project.output_dir.clear(),
            Row::Option(i) => match self.project.options.value_at(i) {
                Some(OptionValue::Flag(true)) => self.project.options.toggle_at(i),
                Some(OptionValue::Text(_)) => self.project.options.set_text_at(i, String::new()),
                _ => {}
            },
        }
    }

    pub fn edit_input(&mut self, c: char) {
        if let Some(edit) = self.editing.as_mut() {
            let numeric = edit.row.spec().map(|s| s.numeric).unwrap_or(false);
            if numeric && !c.is_ascii_digit() {
                return;
            }
            edit.text.push(c);
        }
    }

    pub fn edit_backspace(&mut self) {
        if let Some(edit) = self.editing.as_mut() {
            edit.text.pop();
        }
    }

    pub fn commit_edit(&mut self) {
        if let Some(edit) = self.editing.take() {
            match edit.row {
                Row::Source => self.project.source = edit.text,
                Row::OutputDir => self.project.output_dir = edit.text,
                Row::Option(i) => self.project.options.set_text_at(i, edit.text),
            }
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Validate and build the command; on success ask for confirmation.
    pub fn request_compile(&mut self) {
        if !self.run_state.can_start() {
            self.info = "Compilation already in progress.".into();
            return;
        }
        match self.project.build_command(&self.invocation) {
            Ok(command) => self.popup = Popup::Confirm { command },
            Err(e) => {
                tracing::info!(error = %e, "compile refused");
                self.info = e.to_string();
                self.popup = Popup::Error(e.to_string());
            }
        }
    }

    /// Accept the pending confirmation. Returns the command to start.
    pub fn confirm_compile(&mut self) -> Option<Command> {
        if !self.run_state.can_start() {
            return None;
        }
        match std::mem::take(&mut self.popup) {
            Popup::Confirm { command } => {
                self.resume_state = self.run_state;
                self.run_state = RunState::Running;
                self.progress = 0.0;
                self.output.clear();
                self.output_scroll = None;
                self.info = "Compiling, please wait…".into();
                self.tab = 1;
                Some(command)
            }
            other => {
                self.popup = other;
                None
            }
        }
    }

    pub fn decline_compile(&mut self) {
        if matches!(self.popup, Popup::Confirm { .. }) {
            self.popup = Popup::None;
            self.output.push(CANCELLED_LINE.to_string());
            self.info = CANCELLED_LINE.to_string();
        }
    }

    pub fn preview(&mut self) {
        match self.project.build_command(&self.invocation) {
            Ok(command) => {
                self.popup = Popup::Preview {
                    command: command.render(),
                }
            }
            Err(e) => {
                self.info = e.to_string();
                self.popup = Popup::Error(e.to_string());
            }
        }
    }

    pub fn apply_event(&mut self, ev: CompileEvent) {
        match ev {
            CompileEvent::Started { .. } => {
                self.run_state = RunState::Running;
            }
            CompileEvent::Line(line) => self.output.push(line),
            CompileEvent::Progress { percent } => {
                self.progress = percent.clamp(self.progress, 100.0);
            }
            CompileEvent::Info(msg) => self.info = msg,
            CompileEvent::Rejected(msg) => {
                if self.run_state == RunState::Running {
                    self.run_state = self.resume_state;
                }
                self.info = msg;
            }
            CompileEvent::Finished { outcome, elapsed } => {
                self.run_state = outcome.state();
                let took = humantime::format_duration(std::time::Duration::from_secs(
                    elapsed.as_secs(),
                ));
                self.info = match outcome {
                    RunOutcome::Succeeded => {
                        self.progress = 100.0;
                        format!("Compilation successful ({took}).")
                    }
                    RunOutcome::Failed { code: Some(c), .. } => {
                        format!("Compilation failed with exit code {c} ({took}).")
                    }
                    RunOutcome::Failed { code: None, .. } => {
                        format!("Compilation failed ({took}).")
                    }
                    RunOutcome::ToolNotFound { message } => message,
                };
            }
        }
    }

    pub fn scroll_output(&mut self, delta: isize, visible: usize) {
        let max_start = self.output.len().saturating_sub(visible);
        let current = self.output_scroll.unwrap_or(max_start);
        let next = (current as isize + delta).clamp(0, max_start as isize) as usize;
        self.output_scroll = if next >= max_start { None } else { Some(next) };
    }

    /// First output line to draw for a panel `visible` lines tall.
    pub fn output_start(&self, visible: usize) -> usize {
        let max_start = self.output.len().saturating_sub(visible);
        self.output_scroll.map(|s| s.min(max_start)).unwrap_or(max_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::find_spec;
    use std::time::Duration;

    fn select_option(state: &mut UiState, token: &str) {
        let (i, _) = find_spec(token).unwrap();
        state.selected = state.rows.iter().position(|r| *r == Row::Option(i)).unwrap();
    }

    fn ready_state() -> (UiState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("m.py");
        std::fs::write(&src, "").unwrap();
        let mut state = UiState::default();
        state.project.source = src.display().to_string();
        state.project.output_dir = dir.path().display().to_string();
        (state, dir)
    }

    #[test]
    fn activate_toggles_flag() {
        let mut state = UiState::default();
        select_option(&mut state, "--standalone");
        state.activate();
        assert_eq!(
            state.project.options.get("--standalone"),
            Some(&OptionValue::Flag(true))
        );
        state.clear_selected();
        assert_eq!(
            state.project.options.get("--standalone"),
            Some(&OptionValue::Flag(false))
        );
    }

    #[test]
    fn numeric_edit_ignores_letters() {
        let mut state = UiState::default();
        select_option(&mut state, "--jobs");
        state.activate();
        for c in "4a2".chars() {
            state.edit_input(c);
        }
        state.commit_edit();
        assert_eq!(
            state.project.options.get("--jobs"),
            Some(&OptionValue::Text("42".into()))
        );
    }

    #[test]
    fn cancel_edit_keeps_old_value() {
        let mut state = UiState::default();
        state.project.source = "a.py".into();
        state.activate();
        state.edit_backspace();
        state.edit_input('x');
        state.cancel_edit();
        assert_eq!(state.project.source, "a.py");
        assert!(state.editing.is_none());
    }

    #[test]
    fn invalid_paths_block_compile() {
        let mut state = UiState::default();
        state.project.source = "/definitely/not/here.py".into();
        state.request_compile();
        assert!(matches!(state.popup, Popup::Error(_)));
        assert!(state.confirm_compile().is_none());
        assert_eq!(state.run_state, RunState::Idle);
    }

    #[test]
    fn confirm_starts_run_and_blocks_reentry() {
        let (mut state, _dir) = ready_state();
        state.output.push("old".into());
        state.request_compile();
        let cmd = state.confirm_compile().expect("command");
        assert_eq!(cmd.args[0], "-m");
        assert_eq!(state.run_state, RunState::Running);
        assert!(state.output.is_empty());

        state.request_compile();
        assert_eq!(state.popup, Popup::None);
        assert!(state.info.contains("already in progress"));
    }

    #[test]
    fn decline_logs_cancellation() {
        let (mut state, _dir) = ready_state();
        state.request_compile();
        state.decline_compile();
        assert_eq!(state.popup, Popup::None);
        assert_eq!(state.output.last().map(String::as_str), Some(CANCELLED_LINE));
        assert_eq!(state.run_state, RunState::Idle);
    }

    #[test]
    fn events_drive_terminal_state() {
        let mut state = UiState {
            run_state: RunState::Running,
            ..Default::default()
        };
        state.apply_event(CompileEvent::Line("Nuitka: x:".into()));
        state.apply_event(CompileEvent::Progress { percent: 30.0 });
        state.apply_event(CompileEvent::Progress { percent: 10.0 });
        assert_eq!(state.progress, 30.0);
        state.apply_event(CompileEvent::Finished {
            outcome: RunOutcome::Failed {
                code: Some(1),
                lines: 1,
            },
            elapsed: Duration::from_secs(3),
        });
        assert_eq!(state.run_state, RunState::Failed);
        assert_eq!(state.output, vec!["Nuitka: x:".to_string()]);
        assert!(state.run_state.can_start());

        state.apply_event(CompileEvent::Finished {
            outcome: RunOutcome::Succeeded,
            elapsed: Duration::from_secs(1),
        });
        assert_eq!(state.progress, 100.0);
        assert_eq!(state.run_state, RunState::Succeeded);
    }

    #[test]
    fn rejected_start_restores_previous_state() {
        let (mut state, _dir) = ready_state();
        state.run_state = RunState::Failed;
        state.request_compile();
        assert!(state.confirm_compile().is_some());
        assert_eq!(state.run_state, RunState::Running);

        state.apply_event(CompileEvent::Rejected("A compilation is already running.".into()));
        assert_eq!(state.run_state, RunState::Failed);
        assert!(state.run_state.can_start());
        assert!(state.info.contains("already running"));

        state.request_compile();
        assert!(matches!(state.popup, Popup::Confirm { .. }));
    }

    #[test]
    fn output_scroll_follows_tail() {
        let mut state = UiState::default();
        state.output = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(state.output_start(10), 40);
        state.scroll_output(-5, 10);
        assert_eq!(state.output_start(10), 35);
        state.output.push("new".into());
        assert_eq!(state.output_start(10), 35);
        state.scroll_output(100, 10);
        assert_eq!(state.output_scroll, None);
        assert_eq!(state.output_start(10), 41);
    }

    #[test]
    fn selection_is_clamped() {
        let mut state = UiState::default();
        state.move_selection(-3);
        assert_eq!(state.selected_row(), Row::Source);
        state.move_selection(10_000);
        assert_eq!(state.selected_row(), Row::Option(CATALOG.len() - 1));
    }
}
