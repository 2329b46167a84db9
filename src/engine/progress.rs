use regex::Regex;

pub const DEFAULT_TOTAL_STEPS: u32 = 20;
pub const SUCCESS_PHRASE: &str = "Compilation successful.";
pub const DEFAULT_MARKER: &str = r"Nuitka.*:";

/// Coarse progress estimate driven by the compiler's stage announcements
/// (`Nuitka-Options: ...`, `Nuitka: ...`). One matching line is one step.
pub struct ProgressTracker {
    marker: Regex,
    step: u32,
    total: u32,
    percent: f64,
    finished: bool,
}

impl ProgressTracker {
    pub fn new(total: u32) -> Self {
        Self::with_marker(total, DEFAULT_MARKER).expect("default progress marker is a valid regex")
    }

    /// Tracker counting lines that match `pattern` instead of the default marker.
    pub fn with_marker(total: u32, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            marker: Regex::new(pattern)?,
            step: 0,
            total: total.max(1),
            percent: 0.0,
            finished: false,
        })
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one output line. Returns the new value when it changed.
    pub fn observe(&mut self, line: &str) -> Option<f64> {
        let next = if self.marker.is_match(line) {
            self.step = (self.step + 1).min(self.total);
            f64::from(self.step) / f64::from(self.total) * 100.0
        } else if line.contains(SUCCESS_PHRASE) {
            self.finished = true;
            100.0
        } else {
            return None;
        };

        let next = next.clamp(self.percent, 100.0);
        if next > self.percent {
            self.percent = next;
            Some(next)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_advance_and_cap() {
        let mut t = ProgressTracker::new(4);
        let mut last = 0.0;
        for _ in 0..10 {
            t.observe("Nuitka: Starting C compilation:");
            assert!(t.percent() >= last);
            assert!(t.percent() <= 100.0);
            last = t.percent();
        }
        assert_eq!(t.percent(), 100.0);
        assert!(!t.is_finished());
    }

    #[test]
    fn unrelated_lines_do_not_move() {
        let mut t = ProgressTracker::new(DEFAULT_TOTAL_STEPS);
        assert_eq!(t.observe("gcc -O2 module.c"), None);
        assert_eq!(t.percent(), 0.0);
    }

    #[test]
    fn success_phrase_forces_full() {
        let mut t = ProgressTracker::new(DEFAULT_TOTAL_STEPS);
        t.observe("Nuitka-Options: Used command line options:");
        assert!(t.percent() > 0.0 && t.percent() < 100.0);
        assert_eq!(t.observe(SUCCESS_PHRASE), Some(100.0));
        assert!(t.is_finished());
        assert_eq!(t.observe("Nuitka: more:"), None);
        assert_eq!(t.percent(), 100.0);
    }

    #[test]
    fn custom_marker() {
        let mut t = ProgressTracker::with_marker(2, r"^\[stage\]").unwrap();
        assert_eq!(t.observe("Nuitka: ignored:"), None);
        assert_eq!(t.observe("[stage] one"), Some(50.0));
        assert!(ProgressTracker::with_marker(2, "(").is_err());
    }
}
