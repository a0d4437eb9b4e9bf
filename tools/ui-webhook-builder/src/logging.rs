use crate::config::LoggingConfig;
use crate::errors::BuilderError;
use crate::log_retention::enforce_total_budget;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    pub fn from_config(cfg: &LoggingConfig, base_dir: &Path) -> Option<Self> {
        if !cfg.enabled {
            return None;
        }
        let path = PathBuf::from(&cfg.path);
        let path = if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        };
        Some(Self {
            path,
            max_payload_bytes: cfg.max_payload_bytes,
            budget_bytes: cfg.budget_bytes,
        })
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), BuilderError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuilderError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| BuilderError::Serialize(e.to_string()))?;

        self.roll_if_over_budget(line.len() as u64 + 1)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BuilderError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| BuilderError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| BuilderError::Io(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            let _ = enforce_total_budget(parent, self.budget_bytes, &self.path)?;
        }

        Ok(())
    }

    /// Path the active log moves to once it would outgrow the budget.
    pub fn rolled_path(&self) -> PathBuf {
        self.path.with_extension("1.jsonl")
    }

    // The active file is exempt from retention, so it is capped here instead.
    fn roll_if_over_budget(&self, incoming: u64) -> Result<(), BuilderError> {
        let current = fs::metadata(&self.path).map(|meta| meta.len()).unwrap_or(0);
        if current == 0 || current + incoming <= self.budget_bytes {
            return Ok(());
        }
        fs::rename(&self.path, self.rolled_path()).map_err(|e| BuilderError::Io(e.to_string()))
    }
}

fn run_log() -> &'static Mutex<Option<JsonlLogger>> {
    static RUN_LOG: OnceLock<Mutex<Option<JsonlLogger>>> = OnceLock::new();
    RUN_LOG.get_or_init(|| Mutex::new(None))
}

/// Installs the process-wide run log. `None` turns logging off.
pub fn init_run_log(logger: Option<JsonlLogger>) {
    if let Ok(mut slot) = run_log().lock() {
        *slot = logger;
    }
}

/// Best-effort: a failing log write never fails the run.
pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    let Ok(slot) = run_log().lock() else {
        return;
    };
    if let Some(logger) = slot.as_ref() {
        let _ = logger.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}
