use crate::errors::BuilderError;
use crate::fields::{Field, FieldMapping};
use crate::logging::append_run_log;
use crate::recording::{Recording, Step};
use crate::runtime::FileSystem;
use crate::step_identity::same_selectors;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

pub const PLACEHOLDER_VALUE: &str = "PLACEHOLDER_VALUE";

/// Initial payload handed to the rotation engine.
///
/// `password` is the recorded value of the new-password field: the secret the
/// *next* rotation will log in with. The current password is deliberately
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RotationPayload<'a> {
    pub username: String,
    pub password: String,
    pub recording: &'a Recording,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSummary {
    pub username: String,
    pub old_password: String,
    pub new_password: String,
}

/// Value of the first recorded `change` step whose selectors equal the first
/// mapped step's selectors.
pub fn extract_value(mapped: &[Step], recording_steps: &[Step]) -> String {
    let Some(first) = mapped.first() else {
        return PLACEHOLDER_VALUE.to_string();
    };
    recording_steps
        .iter()
        .filter(|step| step.is_change())
        .find(|step| same_selectors(step.selectors(), first.selectors()))
        .and_then(|step| step.value.clone())
        .unwrap_or_else(|| PLACEHOLDER_VALUE.to_string())
}

pub fn summarize(mapping: &FieldMapping, recording: &Recording) -> CredentialSummary {
    let value_for = |field| extract_value(mapping.steps_for(field), &recording.steps);
    CredentialSummary {
        username: value_for(Field::InputUsername),
        old_password: value_for(Field::InputPassword),
        new_password: value_for(Field::NewPassword),
    }
}

pub fn assemble<'a>(summary: &CredentialSummary, recording: &'a Recording) -> RotationPayload<'a> {
    RotationPayload {
        username: summary.username.clone(),
        password: summary.new_password.clone(),
        recording,
    }
}

pub fn render_payload(payload: &RotationPayload<'_>) -> Result<String, BuilderError> {
    serde_json::to_string_pretty(payload).map_err(|e| BuilderError::Serialize(e.to_string()))
}

pub fn write_payload(fs: &dyn FileSystem, path: &Path, contents: &str) -> Result<(), BuilderError> {
    if let Some(parent) = path.parent() {
        fs.create_dir_all(parent)?;
    }
    fs.write_string(path, contents)?;
    append_run_log(
        "info",
        "payload.written",
        json!({ "path": path.display().to_string(), "bytes": contents.len() }),
    );
    Ok(())
}
