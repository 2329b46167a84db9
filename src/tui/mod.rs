mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::command::Command;
use crate::model::{CompileEvent, ProjectState, RunConfig, RunState};
use crate::options::{OptionKind, OptionValue, CATALOG};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Tabs, Wrap},
    Terminal,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use export::{copy_to_clipboard, load_settings_and_report, save_settings_and_report};
use help::draw_help;
use state::{Popup, Row, UiState};

/// Rows taken by everything except the output text: tabs, status, gauge, borders.
const OUTPUT_CHROME_ROWS: u16 = 11;

pub async fn run(
    args: Cli,
    cfg: RunConfig,
    project: ProjectState,
    settings_error: Option<String>,
) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<CompileEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(crate::storage::default_settings_path);
    let mut state = UiState {
        project,
        invocation: cfg.invocation.clone(),
        info: format!(
            "Settings file: {} · press ? for help",
            settings_path.display()
        ),
        settings_path,
        ..Default::default()
    };
    if let Some(msg) = settings_error {
        state.info = format!("Load failed: {msg}");
        state.popup = Popup::Error(msg);
    }

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(state, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// What the event loop should do after a key press.
enum KeyAction {
    None,
    Quit,
    Start(Command),
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<CompileEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain without blocking; the engine never waits on the UI.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                let output_height = terminal
                    .size()
                    .map(|s| s.height.saturating_sub(OUTPUT_CHROME_ROWS) as usize)
                    .unwrap_or(10)
                    .max(1);
                match handle_key(&mut state, k, output_height) {
                    KeyAction::None => {}
                    KeyAction::Quit => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    KeyAction::Start(command) => {
                        if cmd_tx.send(UiCommand::Start(command)).is_err() {
                            state.run_state = RunState::Idle;
                            state.info = "Run controller stopped; restart the application.".into();
                        }
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn handle_key(state: &mut UiState, k: KeyEvent, output_height: usize) -> KeyAction {
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }

    if state.editing.is_some() {
        match k.code {
            KeyCode::Enter => state.commit_edit(),
            KeyCode::Esc => state.cancel_edit(),
            KeyCode::Backspace => state.edit_backspace(),
            KeyCode::Char(c) => state.edit_input(c),
            _ => {}
        }
        return KeyAction::None;
    }

    match &state.popup {
        Popup::Confirm { .. } => {
            match k.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    if let Some(command) = state.confirm_compile() {
                        return KeyAction::Start(command);
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => state.decline_compile(),
                _ => {}
            }
            return KeyAction::None;
        }
        Popup::Preview { command } => {
            match k.code {
                KeyCode::Char('y') => {
                    state.info = match copy_to_clipboard(command) {
                        Ok(()) => "✓ Command copied to clipboard".into(),
                        Err(e) => format!("Clipboard copy failed: {e:#}"),
                    };
                }
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('v') => {
                    state.popup = Popup::None;
                }
                _ => {}
            }
            return KeyAction::None;
        }
        Popup::Error(_) => {
            state.popup = Popup::None;
            return KeyAction::None;
        }
        Popup::None => {}
    }

    match k.code {
        KeyCode::Char('q') => return KeyAction::Quit,
        KeyCode::Tab => state.tab = (state.tab + 1) % 3,
        KeyCode::Char('?') => state.tab = 2,
        KeyCode::Char('c') => state.request_compile(),
        KeyCode::Char('v') => state.preview(),
        KeyCode::Char('s') => save_settings_and_report(state),
        KeyCode::Char('l') => load_settings_and_report(state),
        code if state.tab == 0 => match code {
            KeyCode::Up | KeyCode::Char('k') => state.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => state.move_selection(1),
            KeyCode::PageUp => state.move_selection(-10),
            KeyCode::PageDown => state.move_selection(10),
            KeyCode::Enter | KeyCode::Char(' ') => state.activate(),
            KeyCode::Left => state.cycle_choice(false),
            KeyCode::Right => state.cycle_choice(true),
            KeyCode::Delete | KeyCode::Backspace => state.clear_selected(),
            _ => {}
        },
        code if state.tab == 1 => {
            let page = output_height as isize;
            match code {
                KeyCode::Up | KeyCode::Char('k') => state.scroll_output(-1, output_height),
                KeyCode::Down | KeyCode::Char('j') => state.scroll_output(1, output_height),
                KeyCode::PageUp => state.scroll_output(-page, output_height),
                KeyCode::PageDown => state.scroll_output(page, output_height),
                KeyCode::Home => state.output_scroll = Some(0),
                KeyCode::End => state.output_scroll = None,
                _ => {}
            }
        }
        _ => {}
    }
    KeyAction::None
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Options"),
        Line::from("Output"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("nuitka-launcher"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_options(chunks[1], f, state),
        1 => draw_output(chunks[1], f, state),
        _ => draw_help(chunks[1], f),
    }

    draw_status(chunks[2], f, state);

    if state.popup != Popup::None {
        draw_popup(area, f, state);
    }
}

fn state_color(run_state: RunState) -> Color {
    match run_state {
        RunState::Idle => Color::Gray,
        RunState::Running => Color::Yellow,
        RunState::Succeeded => Color::Green,
        RunState::Failed | RunState::ToolNotFound => Color::Red,
    }
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let line = Line::from(vec![
        Span::styled(
            format!("[{}]", state.run_state.label()),
            Style::default().fg(state_color(state.run_state)),
        ),
        Span::raw(" "),
        Span::raw(state.info.clone()),
    ]);
    f.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Status")),
        area,
    );
}

fn draw_gauge(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let ratio = (state.progress / 100.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(state_color(state.run_state)))
        .ratio(ratio)
        .label(format!("{:.0}%", state.progress));
    f.render_widget(gauge, area);
}

fn value_span(text: &str, editing: bool) -> Span<'static> {
    if editing {
        Span::styled(
            format!("{text}▏"),
            Style::default().fg(Color::Black).bg(Color::Cyan),
        )
    } else if text.is_empty() {
        Span::styled("(empty)", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(text.to_string(), Style::default().fg(Color::Cyan))
    }
}

fn form_line(state: &UiState, row: Row) -> Line<'static> {
    let editing = state
        .editing
        .as_ref()
        .filter(|e| e.row == row)
        .map(|e| e.text.as_str());

    match row {
        Row::Source | Row::OutputDir => {
            let label = if row == Row::Source {
                "Source (.py) file: "
            } else {
                "Output directory:  "
            };
            let text = editing.unwrap_or_else(|| state.row_text(row).unwrap_or_default());
            Line::from(vec![Span::raw(label), value_span(text, editing.is_some())])
        }
        Row::Option(i) => {
            let spec = &CATALOG[i];
            let desc = Span::styled(
                format!("  {}", spec.description),
                Style::default().fg(Color::DarkGray),
            );
            match (spec.kind, state.project.options.value_at(i)) {
                (OptionKind::Flag, Some(OptionValue::Flag(on))) => Line::from(vec![
                    Span::styled(
                        if *on { "[x] " } else { "[ ] " },
                        Style::default().fg(if *on { Color::Green } else { Color::Gray }),
                    ),
                    Span::raw(spec.token),
                    desc,
                ]),
                (_, value) => {
                    let current = match value {
                        Some(OptionValue::Text(t)) => t.as_str(),
                        _ => "",
                    };
                    let text = editing.unwrap_or(current);
                    let mut spans = vec![
                        Span::raw("    "),
                        Span::raw(spec.token),
                        Span::raw(" = "),
                        value_span(text, editing.is_some()),
                    ];
                    if !spec.choices.is_empty() {
                        spans.push(Span::styled(" ◂▸", Style::default().fg(Color::Magenta)));
                    }
                    spans.push(desc);
                    Line::from(spans)
                }
            }
        }
    }
}

fn draw_options(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let heading = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = vec![Line::styled("Source File & Output Directory", heading)];
    let mut selected_line = 0usize;
    let mut last_group = "";
    let selected = state.selected_row();
    for &row in &state.rows {
        if let Some(spec) = row.spec() {
            if spec.group != last_group {
                lines.push(Line::from(""));
                lines.push(Line::styled(spec.group, heading));
                last_group = spec.group;
            }
        }
        if row == selected {
            selected_line = lines.len();
            let highlight = Style::default().add_modifier(Modifier::REVERSED);
            lines.push(form_line(state, row).style(highlight));
        } else {
            lines.push(form_line(state, row));
        }
    }

    let visible = parts[0].height.saturating_sub(2) as usize;
    let offset = if visible > 0 && selected_line >= visible {
        selected_line + 1 - visible
    } else {
        0
    };

    let p = Paragraph::new(lines)
        .scroll((offset as u16, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Options (enter edit · c compile · v show command)"),
        );
    f.render_widget(p, parts[0]);
    draw_gauge(parts[1], f, state);
}

fn draw_output(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);
    draw_gauge(parts[0], f, state);

    let visible = parts[1].height.saturating_sub(2) as usize;
    let start = state.output_start(visible);
    let lines: Vec<Line> = state
        .output
        .iter()
        .skip(start)
        .take(visible)
        .map(|l| Line::raw(l.as_str()))
        .collect();
    let title = if state.output_scroll.is_some() {
        format!("Compiler Output ({} lines, scrolled)", state.output.len())
    } else {
        format!("Compiler Output ({} lines)", state.output.len())
    };
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        parts[1],
    );
}

/// Centered rectangle taking the given percentages of `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

fn draw_popup(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let hint = Style::default().fg(Color::Magenta);
    let (title, lines, border) = match &state.popup {
        Popup::None => return,
        Popup::Confirm { command } => (
            "Confirm Compilation",
            vec![
                Line::from("Do you want to execute the following command?"),
                Line::from(""),
                Line::styled(command.render(), Style::default().fg(Color::Cyan)),
                Line::from(""),
                Line::styled("y / enter: proceed    n / esc: abort", hint),
            ],
            Color::Yellow,
        ),
        Popup::Preview { command } => (
            "Command String",
            vec![
                Line::styled(command.clone(), Style::default().fg(Color::Cyan)),
                Line::from(""),
                Line::styled("y: copy to clipboard    esc: close", hint),
            ],
            Color::Cyan,
        ),
        Popup::Error(msg) => (
            "Error",
            vec![
                Line::from(msg.clone()),
                Line::from(""),
                Line::styled("press any key", hint),
            ],
            Color::Red,
        ),
    };

    let rect = centered_rect(70, 40, area);
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(title),
        ),
        rect,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(state: &mut UiState, code: KeyCode) -> KeyAction {
        handle_key(state, KeyEvent::new(code, KeyModifiers::NONE), 20)
    }

    #[test]
    fn typing_q_while_editing_does_not_quit() {
        let mut state = UiState::default();
        press(&mut state, KeyCode::Enter);
        assert!(state.editing.is_some());
        assert!(matches!(press(&mut state, KeyCode::Char('q')), KeyAction::None));
        press(&mut state, KeyCode::Enter);
        assert_eq!(state.project.source, "q");
        assert!(matches!(press(&mut state, KeyCode::Char('q')), KeyAction::Quit));
    }

    #[test]
    fn compile_flow_through_keys() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("m.py");
        std::fs::write(&src, "").unwrap();
        let mut state = UiState::default();
        state.project.source = src.display().to_string();
        state.project.output_dir = dir.path().display().to_string();

        press(&mut state, KeyCode::Char('c'));
        assert!(matches!(state.popup, Popup::Confirm { .. }));
        match press(&mut state, KeyCode::Char('y')) {
            KeyAction::Start(cmd) => assert_eq!(cmd.args.last(), Some(&src.display().to_string())),
            _ => panic!("expected start"),
        }
        assert_eq!(state.run_state, RunState::Running);

        // Start control is disabled while running.
        press(&mut state, KeyCode::Char('c'));
        assert_eq!(state.popup, Popup::None);
    }

    #[test]
    fn ctrl_c_always_quits() {
        let mut state = UiState::default();
        press(&mut state, KeyCode::Enter);
        let action = handle_key(
            &mut state,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            20,
        );
        assert!(matches!(action, KeyAction::Quit));
    }

    #[test]
    fn error_popup_closes_on_any_key() {
        let mut state = UiState::default();
        press(&mut state, KeyCode::Char('v'));
        assert!(matches!(state.popup, Popup::Error(_)));
        press(&mut state, KeyCode::Char('x'));
        assert_eq!(state.popup, Popup::None);
    }
}
