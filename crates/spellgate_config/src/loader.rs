//! Configuration file loading.
//!
//! Files are JSON or JSONC. `import` entries are resolved relative to the
//! importing file and merged underneath it.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use jsonc_parser::ParseOptions;
use tracing::{debug, trace};

use crate::{ConfigError, Settings};

/// Configuration file names searched for in each workspace folder.
pub const CONFIG_FILES: &[&str] = &[
    "spellgate.json",
    ".spellgate.json",
    "spellgate.jsonc",
    ".spellgate.jsonc",
];

impl Settings {
    /// Parses settings from a JSON or JSONC string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value = jsonc_parser::parse_to_serde_value(json, &ParseOptions::default())
            .map_err(|e| ConfigError::parse(format!("Invalid JSON: {}", e)))?
            .unwrap_or(serde_json::Value::Object(Default::default()));

        serde_json::from_value(value).map_err(|e| ConfigError::parse(e.to_string()))
    }

    /// Loads settings from a single file without following imports.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::read(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }
}

/// Candidate configuration files for a folder, in lookup order.
pub fn config_candidates(dir: &Path) -> Vec<PathBuf> {
    CONFIG_FILES.iter().map(|name| dir.join(name)).collect()
}

/// Returns true when `path` has one of the configuration file names.
pub fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| CONFIG_FILES.contains(&name))
}

/// Reads and merges the given files in order, later files taking priority.
///
/// Missing files are skipped silently; unreadable or invalid files are
/// skipped with a debug log.
pub fn load_settings_files(paths: &[PathBuf]) -> Settings {
    let mut visited = HashSet::new();
    let mut merged = Settings::new();

    for path in paths {
        match load_with_imports(path, &mut visited) {
            Ok(Some(settings)) => merged = merged.merge(&settings),
            Ok(None) => trace!("Config file not found: {}", path.display()),
            Err(e) => debug!("Skipping config file {}: {}", path.display(), e),
        }
    }

    merged
}

/// Loads one file and everything it imports.
///
/// Returns `Ok(None)` when the file does not exist or was already visited.
pub fn load_with_imports(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<Option<Settings>, ConfigError> {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(key) {
        return Ok(None);
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::read(format!("{}: {}", path.display(), e))),
    };

    let settings = Settings::from_json(&content)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut imported = Settings::new();
    for entry in &settings.import {
        let import_path = base_dir.join(entry);
        match load_with_imports(&import_path, visited) {
            Ok(Some(s)) => imported = imported.merge(&s),
            Ok(None) => trace!("Import not loaded: {}", import_path.display()),
            Err(e) => debug!("Skipping import {}: {}", import_path.display(), e),
        }
    }

    Ok(Some(imported.merge(&settings)))
}
