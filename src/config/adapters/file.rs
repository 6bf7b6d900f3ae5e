//! Runtime settings loaded from a JSON file.

use crate::config::domain::{RuntimeSettings, SettingsError};
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io;

/// Loads runtime settings from `path`.
///
/// A missing file yields [`RuntimeSettings::default`]; every other read
/// failure is reported.
///
/// # Errors
///
/// Returns [`SettingsError::Read`] when the file exists but cannot be read,
/// and the errors of [`RuntimeSettings::from_json_str`] for its contents.
pub fn load_settings(path: &Utf8Path) -> Result<RuntimeSettings, SettingsError> {
    match read_settings_file(path) {
        Ok(text) => RuntimeSettings::from_json_str(&text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(%path, "settings file absent, using defaults");
            Ok(RuntimeSettings::default())
        }
        Err(source) => Err(SettingsError::Read {
            path: path.to_string(),
            source,
        }),
    }
}

fn read_settings_file(path: &Utf8Path) -> io::Result<String> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "settings path has no file name"))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read_to_string(file_name)
}
