use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptLogEntry {
    pub text: String,
    pub timestamp: String,
}

/// Client-side history of prompts returned by the relay, in arrival order.
/// Entries are never merged or dropped.
#[derive(Debug, Clone, Default)]
pub struct PromptLog {
    entries: Vec<PromptLogEntry>,
}

impl PromptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>) -> &PromptLogEntry {
        self.push_at(text, Utc::now())
    }

    pub fn push_at(&mut self, text: impl Into<String>, at: DateTime<Utc>) -> &PromptLogEntry {
        self.entries.push(PromptLogEntry {
            text: text.into(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[PromptLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends every entry as one JSON line.
    pub fn append_jsonl(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for entry in &self.entries {
            let line = serde_json::to_string(entry)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn entries_keep_insertion_order_and_duplicates() {
        let mut log = PromptLog::new();
        assert!(log.is_empty());
        log.push("first");
        log.push("second");
        log.push("first");
        let texts: Vec<&str> = log.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "first"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let mut log = PromptLog::new();
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        let entry = log.push_at("prompt", at);
        assert_eq!(entry.timestamp, "2026-10-17T09:30:00.000Z");
    }

    #[test]
    fn append_jsonl_writes_one_line_per_entry() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("prompts.jsonl");
        let mut log = PromptLog::new();
        log.push("one");
        log.push("two");
        log.append_jsonl(&path)?;
        log.append_jsonl(&path)?;

        let content = fs::read_to_string(&path)?;
        let rows: Vec<PromptLogEntry> = content
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].text, "two");
        assert_eq!(rows[2].text, "one");
        Ok(())
    }
}
