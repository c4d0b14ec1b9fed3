use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// What happened on the relay. Prompts are never logged, only their sha256,
/// because a profile with an embedded logo makes a multi-megabyte prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    ConnectionOpened {
        connection_id: String,
    },
    ConnectionClosed {
        connection_id: String,
        requests: usize,
    },
    GenerationStarted {
        connection_id: String,
        prompt_sha256: String,
        prompt_chars: usize,
    },
    GenerationCompleted {
        connection_id: String,
        prompt_sha256: String,
        html_chars: usize,
        elapsed_ms: u64,
    },
    GenerationFailed {
        connection_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt_sha256: Option<String>,
        error: String,
        elapsed_ms: u64,
    },
    EnhanceFailed {
        field: String,
        error: String,
    },
}

/// One line of the relay's `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEventRecord {
    #[serde(flatten)]
    pub event: RelayEvent,
    pub server_id: String,
    pub ts: String,
}

/// Append-only JSONL audit log shared by every connection of one relay
/// process. Clones write through the same file handle.
#[derive(Debug, Clone)]
pub struct RelayEventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    server_id: String,
    file: Mutex<File>,
}

impl RelayEventLog {
    pub fn open(path: &Path, server_id: impl Into<String>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed opening event log {}", path.display()))?;
        Ok(Self {
            inner: Arc::new(EventLogInner {
                server_id: server_id.into(),
                file: Mutex::new(file),
            }),
        })
    }

    pub fn record(&self, event: RelayEvent) -> Result<RelayEventRecord> {
        let record = RelayEventRecord {
            event,
            server_id: self.inner.server_id.clone(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        let mut file = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        file.write_all(&line).context("failed appending relay event")?;
        Ok(record)
    }
}
