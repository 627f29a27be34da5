//! Effective settings model and merge rules.

use std::path::Path;
use std::time::Duration;

use globset::{Glob, GlobSetBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Default debounce applied to document changes, in milliseconds.
pub const DEFAULT_SPELL_CHECK_DELAY_MS: u64 = 50;

/// Default amount of text analysed per document, in KiB.
pub const DEFAULT_CHECK_LIMIT_KB: u32 = 500;

/// URI schemes validated when no `allowedSchemas` are configured.
pub const DEFAULT_ALLOWED_SCHEMAS: &[&str] = &["file", "untitled"];

/// Language ids enabled out of the box.
pub const DEFAULT_LANGUAGE_IDS: &[&str] = &[
    "asciidoc",
    "c",
    "cpp",
    "csharp",
    "css",
    "git-commit",
    "go",
    "html",
    "java",
    "javascript",
    "json",
    "jsonc",
    "latex",
    "markdown",
    "php",
    "plaintext",
    "python",
    "restructuredtext",
    "rust",
    "scss",
    "text",
    "toml",
    "typescript",
    "yaml",
];

/// Settings merged from defaults, imported files, folder files and the host.
///
/// Every field is optional so that "unset" can be told apart from an explicit
/// value while merging. Scalars are overridden by later sources; lists are
/// unioned in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Whether validation runs at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Maximum amount of text analysed per document, in KiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_limit: Option<u32>,

    /// Debounce applied to document changes, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spell_check_delay_ms: Option<u64>,

    /// Language ids that are validated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_language_ids: Vec<String>,

    /// URI schemes that are validated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_schemas: Vec<String>,

    /// Glob patterns of paths that are never validated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_paths: Vec<String>,

    /// Words accepted by the analyzer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<String>,

    /// Words the analyzer always reports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flag_words: Vec<String>,

    /// Further configuration files to merge underneath this one.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub import: Vec<String>,

    /// Per-file rules applied on top of the merged result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<OverrideSettings>,
}

/// Settings scoped to files whose path matches one of `filename`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideSettings {
    /// Glob patterns selecting the files this override applies to.
    #[serde(default, deserialize_with = "one_or_many")]
    pub filename: Vec<String>,

    #[serde(flatten)]
    pub settings: Settings,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

impl Settings {
    /// Creates an empty settings value (every field unset).
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults used as the lowest-priority source.
    pub fn defaults() -> Self {
        Self {
            enabled: Some(true),
            check_limit: Some(DEFAULT_CHECK_LIMIT_KB),
            spell_check_delay_ms: Some(DEFAULT_SPELL_CHECK_DELAY_MS),
            enabled_language_ids: DEFAULT_LANGUAGE_IDS.iter().map(|s| s.to_string()).collect(),
            allowed_schemas: DEFAULT_ALLOWED_SCHEMAS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Returns a new value with `over` merged on top of `self`.
    pub fn merge(&self, over: &Settings) -> Settings {
        Settings {
            enabled: over.enabled.or(self.enabled),
            check_limit: over.check_limit.or(self.check_limit),
            spell_check_delay_ms: over.spell_check_delay_ms.or(self.spell_check_delay_ms),
            enabled_language_ids: union(&self.enabled_language_ids, &over.enabled_language_ids),
            allowed_schemas: union(&self.allowed_schemas, &over.allowed_schemas),
            ignore_paths: union(&self.ignore_paths, &over.ignore_paths),
            words: union(&self.words, &over.words),
            flag_words: union(&self.flag_words, &over.flag_words),
            import: union(&self.import, &over.import),
            overrides: union(&self.overrides, &over.overrides),
        }
    }

    /// Merges a sequence of sources, later entries taking priority.
    pub fn merge_all<'a>(sources: impl IntoIterator<Item = &'a Settings>) -> Settings {
        sources
            .into_iter()
            .fold(Settings::new(), |acc, next| acc.merge(next))
    }

    /// Applies every override whose `filename` globs match `path`, in order.
    ///
    /// Overrides with invalid patterns are skipped with a warning.
    pub fn apply_overrides(&self, path: &Path) -> Settings {
        let mut result = self.clone();
        for rule in &self.overrides {
            if override_matches(rule, path) {
                result = result.merge(&rule.settings);
            }
        }
        result
    }

    /// Whether validation is enabled (defaults to true when unset).
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Debounce delay for document changes.
    pub fn spell_check_delay(&self) -> Duration {
        Duration::from_millis(
            self.spell_check_delay_ms
                .unwrap_or(DEFAULT_SPELL_CHECK_DELAY_MS),
        )
    }

    /// Maximum number of bytes handed to the analyzer.
    pub fn check_limit_bytes(&self) -> usize {
        self.check_limit.unwrap_or(DEFAULT_CHECK_LIMIT_KB) as usize * 1024
    }

    /// Whether `language_id` is in `enabledLanguageIds`.
    pub fn is_language_enabled(&self, language_id: &str) -> bool {
        self.enabled_language_ids.iter().any(|id| id == language_id)
    }

    /// The configured scheme allow-list, or the default one when empty.
    pub fn allowed_schemas(&self) -> Vec<&str> {
        if self.allowed_schemas.is_empty() {
            DEFAULT_ALLOWED_SCHEMAS.to_vec()
        } else {
            self.allowed_schemas.iter().map(String::as_str).collect()
        }
    }
}

fn union<T: Clone + PartialEq>(base: &[T], over: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(base.len() + over.len());
    for item in base.iter().chain(over) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

fn override_matches(rule: &OverrideSettings, path: &Path) -> bool {
    if rule.filename.is_empty() {
        return false;
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in &rule.filename {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => {
                warn!("Skipping override pattern '{}': {}", pattern, e);
            }
        }
    }

    match builder.build() {
        Ok(set) => set.is_match(path),
        Err(e) => {
            warn!("Failed to build override globset: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_merge_priority() {
        let defaults = Settings {
            enabled: Some(false),
            check_limit: Some(500),
            ..Settings::default()
        };
        let imported = Settings {
            check_limit: Some(1000),
            ..Settings::default()
        };
        let folder = Settings {
            enabled: Some(true),
            ..Settings::default()
        };

        let merged = Settings::merge_all([&defaults, &imported, &folder]);

        assert_eq!(
            merged,
            Settings {
                enabled: Some(true),
                check_limit: Some(1000),
                ..Settings::default()
            }
        );
    }

    #[test]
    fn test_merge_unions_lists() {
        let base = Settings {
            ignore_paths: vec!["target/**".into(), "dist/**".into()],
            enabled_language_ids: vec!["markdown".into()],
            ..Settings::default()
        };
        let over = Settings {
            ignore_paths: vec!["dist/**".into(), "vendor/**".into()],
            enabled_language_ids: vec!["rust".into()],
            ..Settings::default()
        };

        let merged = base.merge(&over);

        assert_eq!(
            merged.ignore_paths,
            vec!["target/**", "dist/**", "vendor/**"]
        );
        assert_eq!(merged.enabled_language_ids, vec!["markdown", "rust"]);
    }

    #[test]
    fn test_merge_keeps_base_when_unset() {
        let base = Settings::defaults();
        let merged = base.merge(&Settings::new());
        assert_eq!(merged, base);
    }

    #[test]
    fn test_defaults_accessors() {
        let settings = Settings::new();
        assert!(settings.is_enabled());
        assert_eq!(settings.spell_check_delay(), Duration::from_millis(50));
        assert_eq!(settings.check_limit_bytes(), 500 * 1024);
        assert_eq!(settings.allowed_schemas(), vec!["file", "untitled"]);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "enabled": false,
            "checkLimit": 20,
            "spellCheckDelayMs": 120,
            "enabledLanguageIds": ["markdown"],
            "ignorePaths": ["build/**"],
            "overrides": [
                { "filename": "**/*.md", "flagWords": ["teh"] },
                { "filename": ["*.txt", "*.rst"], "enabled": true }
            ]
        }"#;

        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.enabled, Some(false));
        assert_eq!(settings.check_limit, Some(20));
        assert_eq!(settings.spell_check_delay_ms, Some(120));
        assert_eq!(settings.overrides.len(), 2);
        assert_eq!(settings.overrides[0].filename, vec!["**/*.md"]);
        assert_eq!(settings.overrides[0].settings.flag_words, vec!["teh"]);
        assert_eq!(settings.overrides[1].filename, vec!["*.txt", "*.rst"]);
    }

    #[test]
    fn test_import_accepts_single_path() {
        let settings: Settings = serde_json::from_str(r#"{ "import": "team.json" }"#).unwrap();
        assert_eq!(settings.import, vec!["team.json"]);
    }

    #[rstest]
    #[case::matching_extension("docs/guide.md", Some(false))]
    #[case::nested_glob("notes/deep/todo.md", Some(false))]
    #[case::other_extension("src/main.rs", Some(true))]
    fn test_apply_overrides(#[case] path: &str, #[case] expected: Option<bool>) {
        let settings = Settings {
            enabled: Some(true),
            overrides: vec![OverrideSettings {
                filename: vec!["*.md".into()],
                settings: Settings {
                    enabled: Some(false),
                    ..Settings::default()
                },
            }],
            ..Settings::default()
        };

        let applied = settings.apply_overrides(Path::new(path));
        assert_eq!(applied.enabled, expected);
    }

    #[test]
    fn test_apply_overrides_in_declaration_order() {
        let settings = Settings {
            overrides: vec![
                OverrideSettings {
                    filename: vec!["**/*.md".into()],
                    settings: Settings {
                        check_limit: Some(10),
                        ..Settings::default()
                    },
                },
                OverrideSettings {
                    filename: vec!["docs/**".into()],
                    settings: Settings {
                        check_limit: Some(20),
                        ..Settings::default()
                    },
                },
            ],
            ..Settings::default()
        };

        let applied = settings.apply_overrides(Path::new("docs/readme.md"));
        assert_eq!(applied.check_limit, Some(20));
    }

    #[test]
    fn test_invalid_override_pattern_is_skipped() {
        let settings = Settings {
            overrides: vec![OverrideSettings {
                filename: vec!["[unclosed".into()],
                settings: Settings {
                    enabled: Some(false),
                    ..Settings::default()
                },
            }],
            ..Settings::default()
        };

        let applied = settings.apply_overrides(Path::new("[unclosed"));
        assert_eq!(applied.enabled, None);
    }
}
