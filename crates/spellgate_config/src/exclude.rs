//! Path exclusion matcher built from `ignorePaths`.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::{ConfigError, Settings};

/// Paths that are never validated, regardless of user settings.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/.hg/**",
    "**/.svn/**",
    "**/.vscode/**",
    "**/package-lock.json",
    "**/Cargo.lock",
    "**/*.min.js",
];

/// Compiled exclusion globs for one workspace folder.
#[derive(Debug, Clone)]
pub struct PathExcluder {
    globs: GlobSet,
    patterns: Vec<String>,
}

impl PathExcluder {
    /// Compiles the given patterns. Fails on the first invalid pattern.
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| ConfigError::glob(format!("'{}': {}", pattern, e)))?;
            builder.add(glob);
        }

        let globs = builder
            .build()
            .map_err(|e| ConfigError::glob(format!("Failed to build globset: {}", e)))?;

        Ok(Self {
            globs,
            patterns: patterns.to_vec(),
        })
    }

    /// Builds the matcher from [`DEFAULT_EXCLUDES`] plus `settings.ignore_paths`.
    ///
    /// Invalid user patterns are dropped with a warning instead of disabling
    /// the whole matcher.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut patterns = Vec::new();

        let candidates = DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(settings.ignore_paths.iter().cloned());

        for pattern in candidates {
            match Glob::new(&pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    patterns.push(pattern);
                }
                Err(e) => warn!("Ignoring invalid ignorePaths entry '{}': {}", pattern, e),
            }
        }

        let globs = builder.build().unwrap_or_else(|e| {
            warn!("Failed to build exclusion globset: {}", e);
            GlobSet::empty()
        });

        Self { globs, patterns }
    }

    /// Checks whether `path` matches any exclusion pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.globs.is_match(path)
    }

    /// Patterns compiled into this matcher.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for PathExcluder {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::node_modules("/work/app/node_modules/pkg/index.js", true)]
    #[case::git_dir("/work/app/.git/COMMIT_EDITMSG", true)]
    #[case::lock_file("crates/Cargo.lock", true)]
    #[case::plain_source("/work/app/src/main.rs", false)]
    fn test_default_excludes(#[case] path: &str, #[case] excluded: bool) {
        let excluder = PathExcluder::default();
        assert_eq!(excluder.is_excluded(Path::new(path)), excluded);
    }

    #[test]
    fn test_ignore_paths_are_added() {
        let settings = Settings {
            ignore_paths: vec!["build/**".into(), "*.snap".into()],
            ..Settings::default()
        };
        let excluder = PathExcluder::from_settings(&settings);

        assert!(excluder.is_excluded(Path::new("build/out.txt")));
        assert!(excluder.is_excluded(Path::new("tests/snapshots/a.snap")));
        assert!(!excluder.is_excluded(Path::new("src/build.rs")));
        assert_eq!(
            excluder.patterns().len(),
            DEFAULT_EXCLUDES.len() + settings.ignore_paths.len()
        );
    }

    #[test]
    fn test_invalid_ignore_path_is_dropped() {
        let settings = Settings {
            ignore_paths: vec!["[bad".into(), "docs/**".into()],
            ..Settings::default()
        };
        let excluder = PathExcluder::from_settings(&settings);

        assert!(excluder.is_excluded(Path::new("docs/a.md")));
        assert!(!excluder.patterns().iter().any(|p| p == "[bad"));
    }

    #[test]
    fn test_new_rejects_invalid_pattern() {
        let err = PathExcluder::new(&["[bad".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Invalid glob pattern"));
    }
}
