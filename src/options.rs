//! Option catalog and the current value of every option.
//!
//! The catalog order is the order in which options contribute tokens to the
//! command line, and the order in which the form lists them.

use crate::error::LauncherError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Contributes its bare token when enabled.
    Flag,
    /// Contributes `token=value`, value embedded verbatim.
    Text,
    /// Contributes `token=value`, value normalized to an absolute path.
    Path,
}

#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub token: &'static str,
    pub kind: OptionKind,
    pub group: &'static str,
    pub description: &'static str,
    /// Fixed values the form cycles through. Empty means free text.
    pub choices: &'static [&'static str],
    /// Free-text entry accepts digits only.
    pub numeric: bool,
}

const fn flag(group: &'static str, token: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        token,
        kind: OptionKind::Flag,
        group,
        description,
        choices: &[],
        numeric: false,
    }
}

const fn text(group: &'static str, token: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        token,
        kind: OptionKind::Text,
        group,
        description,
        choices: &[],
        numeric: false,
    }
}

const GENERAL: &str = "General Options";
const BASIC: &str = "Basic Options";
const CONTROL: &str = "Control Options";
const OPTIMIZATION: &str = "Optimization Options";
const WINDOWS: &str = "Windows Specific";

pub static CATALOG: &[OptionSpec] = &[
    flag(GENERAL, "--show-memory", "Output memory information"),
    flag(GENERAL, "--remove-output", "Remove output directory before compilation"),
    flag(
        GENERAL,
        "--enable-plugin=tk-inter",
        "Enable Tkinter plugin (recommended for Tkinter applications)",
    ),
    text(BASIC, "--output-filename", "Specify output filename"),
    flag(BASIC, "--module", "Create an extension module"),
    flag(BASIC, "--standalone", "Create a standalone executable"),
    flag(BASIC, "--onefile", "Create a onefile executable"),
    OptionSpec {
        numeric: true,
        ..text(CONTROL, "--jobs", "Specify number of parallel jobs")
    },
    OptionSpec {
        choices: &["off", "auto", "full"],
        ..text(CONTROL, "--lto", "Use link time optimizations (off/auto/full)")
    },
    text(CONTROL, "--python-flag", "Python flags to use"),
    flag(CONTROL, "--python-debug", "Use debug version of Python"),
    text(CONTROL, "--experimental", "Use experimental features"),
    flag(OPTIMIZATION, "--run", "Run immediately"),
    flag(OPTIMIZATION, "--debugger", "Run in debugger"),
    flag(OPTIMIZATION, "--trace-execution", "Trace execution"),
    flag(OPTIMIZATION, "--profile", "Profile execution"),
    flag(OPTIMIZATION, "--unstripped", "Keep debug info in result"),
    flag(OPTIMIZATION, "--static-libpython", "Use static link library for Python"),
    OptionSpec {
        choices: &["disable", "attach", "force"],
        ..text(WINDOWS, "--windows-console-mode", "Set console mode (disable/attach/force)")
    },
    OptionSpec {
        kind: OptionKind::Path,
        ..text(WINDOWS, "--windows-icon-from-ico", "Use this icon file")
    },
    flag(
        WINDOWS,
        "--windows-uac-admin",
        "Request Windows User Account Control elevation",
    ),
    flag(
        WINDOWS,
        "--windows-uac-uiaccess",
        "Request Windows User Account Control UI Access",
    ),
];

/// Look up a catalog entry by its token.
pub fn find_spec(token: &str) -> Option<(usize, &'static OptionSpec)> {
    CATALOG.iter().enumerate().find(|(_, s)| s.token == token)
}

/// Value of a single option, stored in settings files as a bare JSON bool or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Text(String),
}

impl OptionValue {
    fn default_for(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Flag => OptionValue::Flag(false),
            OptionKind::Text | OptionKind::Path => OptionValue::Text(String::new()),
        }
    }

    fn fits(&self, kind: OptionKind) -> bool {
        matches!(
            (self, kind),
            (OptionValue::Flag(_), OptionKind::Flag)
                | (OptionValue::Text(_), OptionKind::Text | OptionKind::Path)
        )
    }
}

/// Current value of every catalog option, index-aligned with [`CATALOG`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSet {
    values: Vec<OptionValue>,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self {
            values: CATALOG
                .iter()
                .map(|s| OptionValue::default_for(s.kind))
                .collect(),
        }
    }
}

impl OptionSet {
    pub fn iter(&self) -> impl Iterator<Item = (&'static OptionSpec, &OptionValue)> {
        CATALOG.iter().zip(self.values.iter())
    }

    pub fn get(&self, token: &str) -> Option<&OptionValue> {
        find_spec(token).map(|(i, _)| &self.values[i])
    }

    pub fn value_at(&self, index: usize) -> Option<&OptionValue> {
        self.values.get(index)
    }

    /// Set an option, refusing unknown tokens and values of the wrong kind.
    pub fn set(&mut self, token: &str, value: OptionValue) -> Result<(), LauncherError> {
        let (i, spec) =
            find_spec(token).ok_or_else(|| LauncherError::UnknownOption(token.to_string()))?;
        if !value.fits(spec.kind) {
            return Err(LauncherError::OptionKindMismatch {
                token: token.to_string(),
                expected: if spec.kind == OptionKind::Flag {
                    "boolean"
                } else {
                    "string"
                },
            });
        }
        self.values[i] = value;
        Ok(())
    }

    pub fn set_flag(&mut self, token: &str, on: bool) -> Result<(), LauncherError> {
        self.set(token, OptionValue::Flag(on))
    }

    pub fn set_text(&mut self, token: &str, text: impl Into<String>) -> Result<(), LauncherError> {
        self.set(token, OptionValue::Text(text.into()))
    }

    pub fn toggle_at(&mut self, index: usize) {
        if let Some(OptionValue::Flag(on)) = self.values.get_mut(index) {
            *on = !*on;
        }
    }

    pub fn set_text_at(&mut self, index: usize, text: String) {
        if let Some(OptionValue::Text(v)) = self.values.get_mut(index) {
            *v = text;
        }
    }

    /// Step a choice option to its next (or previous) allowed value.
    /// An empty value sits before the first choice.
    pub fn cycle_choice_at(&mut self, index: usize, forward: bool) {
        let Some(spec) = CATALOG.get(index) else {
            return;
        };
        if spec.choices.is_empty() {
            return;
        }
        if let Some(OptionValue::Text(v)) = self.values.get_mut(index) {
            let n = spec.choices.len() + 1;
            let pos = spec
                .choices
                .iter()
                .position(|c| *c == v.as_str())
                .map(|p| p + 1)
                .unwrap_or(0);
            let next = if forward { (pos + 1) % n } else { (pos + n - 1) % n };
            *v = if next == 0 {
                String::new()
            } else {
                spec.choices[next - 1].to_string()
            };
        }
    }

    /// Tokens contributed by every option, in catalog order.
    pub fn contributions(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (spec, value) in self.iter() {
            match (spec.kind, value) {
                (OptionKind::Flag, OptionValue::Flag(true)) => out.push(spec.token.to_string()),
                (OptionKind::Text, OptionValue::Text(v)) if !v.is_empty() => {
                    out.push(format!("{}={}", spec.token, v));
                }
                (OptionKind::Path, OptionValue::Text(v)) if !v.trim().is_empty() => {
                    let abs = crate::command::normalize_path(Path::new(v.trim()));
                    out.push(format!("{}={}", spec.token, abs.display()));
                }
                _ => {}
            }
        }
        out
    }

    /// Snapshot every option for a settings file.
    pub fn to_map(&self) -> BTreeMap<String, OptionValue> {
        self.iter()
            .map(|(spec, v)| (spec.token.to_string(), v.clone()))
            .collect()
    }

    /// Apply saved values. Unknown tokens and kind mismatches are skipped and
    /// returned so the caller can report them.
    pub fn apply_map(&mut self, map: &BTreeMap<String, OptionValue>) -> Vec<String> {
        let mut skipped = Vec::new();
        for (token, value) in map {
            if self.set(token, value.clone()).is_err() {
                tracing::warn!(option = %token, "ignoring saved option");
                skipped.push(token.clone());
            }
        }
        skipped
    }
}
