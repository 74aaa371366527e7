/// Output file handling.
///
/// Documents are written pretty-printed, creating parent directories as
/// needed. The climate-day label of the file already on disk tells the
/// pipeline when the day has rolled over and the previous day's document
/// must be rebuilt.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::payload::PayloadDocument;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to serialize payload document")]
    Json(#[from] serde_json::Error),
}

/// Climate-day label of an existing output file, if it has one.
pub fn existing_label(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&contents).ok()?;
    value
        .get("meta")?
        .get("climateDayLabel")?
        .as_str()
        .map(str::to_string)
}

/// True when the file at `path` was written for a different climate day.
/// A missing, unreadable or meta-less file never counts as a rollover.
pub fn day_rolled_over(path: &Path, new_label: &str) -> bool {
    existing_label(path).is_some_and(|label| label != new_label)
}

/// Serializes the document exactly as it is written to disk.
pub fn render_document(doc: &PayloadDocument) -> Result<String, OutputError> {
    let mut rendered = serde_json::to_string_pretty(doc)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Writes `doc` to `path`, replacing any previous file.
pub fn write_document(doc: &PayloadDocument, path: &Path) -> Result<(), OutputError> {
    let rendered = render_document(doc)?;
    create_parent(path)?;
    fs::write(path, rendered).map_err(|e| OutputError::Io(path.to_path_buf(), e))?;
    debug!(
        path = %path.display(),
        climate_day = %doc.meta.climate_day_label,
        stations = doc.data.len(),
        "payload document written"
    );
    Ok(())
}

pub(crate) fn create_parent(path: &Path) -> Result<(), OutputError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| OutputError::Io(parent.to_path_buf(), e)),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
