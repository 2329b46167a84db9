use anyhow::Result;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

use super::state::UiState;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Save the form to the settings file and report the result in the status line.
pub fn save_settings_and_report(state: &mut UiState) {
    let settings = state.project.to_settings();
    match crate::storage::save_settings(&state.settings_path, &settings) {
        Ok(()) => state.info = format!("Settings saved: {}", state.settings_path.display()),
        Err(e) => {
            tracing::warn!(error = %e, "saving settings failed");
            state.info = format!("Save failed: {e}");
        }
    }
}

/// Load the settings file into the form. A failed load leaves the form untouched.
pub fn load_settings_and_report(state: &mut UiState) {
    match crate::storage::load_settings(&state.settings_path) {
        Ok(settings) => {
            let skipped = state.project.apply_settings(&settings);
            state.info = if skipped.is_empty() {
                format!("Settings loaded: {}", state.settings_path.display())
            } else {
                format!("Settings loaded, ignored: {}", skipped.join(", "))
            };
        }
        Err(e) => {
            tracing::warn!(error = %e, "loading settings failed");
            state.info = format!("Load failed: {e}");
        }
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// Each clipboard instance is kept alive for a moment so clipboard managers
/// on Linux can read the contents before it is dropped.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Copy text to clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionValue;

    #[test]
    fn save_then_load_through_ui() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = UiState {
            settings_path: dir.path().join("project-settings.json"),
            ..Default::default()
        };
        state.project.source = "/a/b.py".into();
        state.project.options.set_flag("--onefile", true).unwrap();
        save_settings_and_report(&mut state);
        assert!(state.info.starts_with("Settings saved"));

        let mut fresh = UiState {
            settings_path: state.settings_path.clone(),
            ..Default::default()
        };
        load_settings_and_report(&mut fresh);
        assert!(fresh.info.starts_with("Settings loaded"));
        assert_eq!(fresh.project, state.project);
        assert_eq!(
            fresh.project.options.get("--onefile"),
            Some(&OptionValue::Flag(true))
        );
    }

    #[test]
    fn failed_load_keeps_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = UiState {
            settings_path: dir.path().join("missing.json"),
            ..Default::default()
        };
        state.project.source = "keep.py".into();
        load_settings_and_report(&mut state);
        assert!(state.info.starts_with("Load failed"));
        assert_eq!(state.project.source, "keep.py");
    }
}
