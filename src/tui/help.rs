use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn key(k: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(k, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

/// Application name, version, description and project link.
fn about_lines() -> Vec<String> {
    vec![
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        env!("CARGO_PKG_DESCRIPTION").to_string(),
        "Nuitka project: https://nuitka.net".to_string(),
    ]
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![
        Line::from("Keybinds:"),
        key("q / Ctrl-C", 2, "Quit"),
        key("tab", 9, "Switch tabs"),
        key("c", 11, "Compile (asks for confirmation)"),
        key("v", 11, "Show command (y copies it to the clipboard)"),
        key("s", 11, "Save settings"),
        key("l", 11, "Load settings"),
        key("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Options tab:"),
        key("↑/↓ j/k", 5, "Navigate"),
        key("enter/space", 1, "Toggle flag, step a choice, or edit a field"),
        key("←/→", 9, "Step through choices"),
        key("del", 9, "Clear field"),
        key("esc", 9, "Cancel editing"),
        Line::from(""),
        Line::from("Output tab:"),
        key("↑/↓ PgUp/PgDn", 0, " Scroll"),
        key("end", 9, "Follow new output"),
        Line::from(""),
        Line::from("Usage:"),
        Line::from("  1. Enter the Python file to compile and an output directory."),
        Line::from("  2. Set the desired Nuitka options."),
        Line::from("  3. Press c to compile; progress is estimated from Nuitka's stage messages."),
        Line::from("  See the Nuitka documentation for details on each option."),
        Line::from(""),
        Line::from("About:"),
    ];
    lines.extend(about_lines().into_iter().map(|l| Line::from(format!("  {l}"))));

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
