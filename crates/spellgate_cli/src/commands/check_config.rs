//! Check-config command implementation

use std::collections::HashSet;
use std::path::Path;

use miette::{IntoDiagnostic, Result};
use tracing::debug;

use spellgate_config::{PathExcluder, Settings, load_with_imports};

/// Loads `path` with its imports and prints the merged settings as JSON.
pub fn run_check_config(path: &Path, with_defaults: bool) -> Result<()> {
    let settings = load_checked(path, with_defaults)?;
    let json = serde_json::to_string_pretty(&settings).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

fn load_checked(path: &Path, with_defaults: bool) -> Result<Settings> {
    let mut visited = HashSet::new();
    let settings = load_with_imports(path, &mut visited)
        .into_diagnostic()?
        .ok_or_else(|| miette::miette!("Config file not found: {}", path.display()))?;
    debug!("Loaded {} config files", visited.len());

    // Surface invalid ignore globs instead of silently dropping them.
    PathExcluder::new(&settings.ignore_paths).into_diagnostic()?;

    Ok(if with_defaults {
        Settings::defaults().merge(&settings)
    } else {
        settings
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::tempdir;

    #[test]
    fn test_follows_imports() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("base.json"), r#"{ "words": ["tokio"] }"#).unwrap();
        let main = dir.path().join("spellgate.jsonc");
        fs::write(
            &main,
            r#"{
                // shared words first
                "import": ["base.json"],
                "words": ["serde"]
            }"#,
        )
        .unwrap();

        let settings = load_checked(&main, false).unwrap();
        assert_eq!(settings.words, vec!["tokio", "serde"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_checked(&dir.path().join("nope.json"), false).is_err());
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spellgate.json");
        fs::write(&path, r#"{ "ignorePaths": ["a/[b"] }"#).unwrap();

        assert!(load_checked(&path, false).is_err());
    }

    #[test]
    fn test_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("spellgate.json");
        fs::write(&path, r#"{ "checkLimit": 8 }"#).unwrap();

        let settings = load_checked(&path, true).unwrap();
        assert_eq!(settings.check_limit, Some(8));
        assert_eq!(
            settings.spell_check_delay_ms,
            Some(spellgate_config::DEFAULT_SPELL_CHECK_DELAY_MS)
        );
    }
}
