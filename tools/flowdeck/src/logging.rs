use crate::errors::FlowdeckError;
use crate::graph::Measurement;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// One structured record on the logging side channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<Measurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

pub trait Logger: Send + Sync {
    fn log(&self, record: &LogRecord) -> Result<(), FlowdeckError>;
}

/// Appends one JSON line per record. Metadata larger than the payload
/// ceiling is flattened to a truncated string so a noisy engine cannot blow
/// up the log file.
#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_metadata_bytes: usize,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_metadata_bytes: 4096,
        }
    }
}

impl Logger for JsonlLogger {
    fn log(&self, record: &LogRecord) -> Result<(), FlowdeckError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| FlowdeckError::Io(e.to_string()))?;
        }

        let truncated = LogRecord {
            metadata: record
                .metadata
                .clone()
                .map(|value| truncate_json(value, self.max_metadata_bytes)),
            ..record.clone()
        };
        let line = serde_json::to_string(&truncated)
            .map_err(|e| FlowdeckError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| FlowdeckError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| FlowdeckError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| FlowdeckError::Io(e.to_string()))?;
        Ok(())
    }
}

/// In-memory logger for tests.
#[derive(Default, Clone)]
pub struct MemoryLogger {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, record: &LogRecord) -> Result<(), FlowdeckError> {
        self.records
            .lock()
            .expect("records lock")
            .push(record.clone());
        Ok(())
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    // The cut point must not split a multi-byte character.
    let mut cut = max_bytes.saturating_sub(3).min(rendered.len());
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut truncated = rendered;
    truncated.truncate(cut);
    Value::String(format!("{truncated}..."))
}
