//! Enumeration of raw input device nodes.

use std::path::Path;

use tracing::debug;

use crate::error::InputError;

/// Default directory holding kernel input device nodes.
pub const DEFAULT_INPUT_DIR: &str = "/dev/input";

/// List event device nodes (`event*`) under `dir`, sorted by path.
///
/// Everything that is not an event node (`mouseN`, `js0`, `by-id/`, ...) is
/// skipped. The caller decides which of the returned nodes it can actually
/// open; enumeration itself never touches the devices.
pub fn list_event_devices(dir: &Path) -> Result<Vec<String>, InputError> {
    let entries = std::fs::read_dir(dir).map_err(|source| InputError::ScanDirectory {
        path: dir.display().to_string(),
        source,
    })?;

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| InputError::ScanDirectory {
            path: dir.display().to_string(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with("event") {
            continue;
        }
        devices.push(entry.path().display().to_string());
    }
    devices.sort();

    debug!("Found {} event devices under {}", devices.len(), dir.display());
    Ok(devices)
}
