//! Embedding progress reporting.
//!
//! Reports batch-by-batch progress during `tarix embed` so long full-table
//! runs show how much is left. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use std::io::Write;

/// Reports indexing progress. Implementations write to stderr (human or JSON).
pub trait EmbedProgressReporter: Send + Sync {
    /// Called after each embedded batch with records done and the total.
    fn report(&self, done: u64, total: u64);
}

/// Human-friendly progress on stderr: `embed  1,234 / 12,000 records`.
pub struct StderrProgress;

impl EmbedProgressReporter for StderrProgress {
    fn report(&self, done: u64, total: u64) {
        let line = format!(
            "embed  {} / {} records\n",
            format_number(done),
            format_number(total)
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl EmbedProgressReporter for JsonProgress {
    fn report(&self, done: u64, total: u64) {
        let obj = serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "done": done,
            "total": total
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl EmbedProgressReporter for NoProgress {
    fn report(&self, _done: u64, _total: u64) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse the `--progress` CLI value.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            None => Self::default_for_tty(),
            Some("human") => ProgressMode::Human,
            Some("json") => ProgressMode::Json,
            _ => ProgressMode::Off,
        }
    }

    pub fn reporter(&self) -> Box<dyn EmbedProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
