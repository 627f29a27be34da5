//! # spellgate_config
//!
//! Settings model and configuration caching for SpellGate.
//!
//! This crate provides:
//! - The [`Settings`] value and its merge rules
//! - Configuration file loading (JSON/JSONC with `import`)
//! - The [`PathExcluder`] built from `ignorePaths`
//! - The [`CacheRegistry`] that owns every settings cache and the epoch
//!
//! ## Example
//!
//! ```rust,ignore
//! use spellgate_config::{Settings, load_settings_files};
//!
//! let files = load_settings_files(&[".spellgate.json".into()]);
//! let effective = Settings::defaults().merge(&files);
//! assert!(effective.is_enabled());
//! ```

pub mod cache;
mod error;
mod exclude;
mod loader;
mod settings;

pub use cache::{AsyncCache, CacheRegistry, Clear, LazyValue};
pub use error::ConfigError;
pub use exclude::{DEFAULT_EXCLUDES, PathExcluder};
pub use loader::{
    CONFIG_FILES, config_candidates, is_config_file, load_settings_files, load_with_imports,
};
pub use settings::{
    DEFAULT_ALLOWED_SCHEMAS, DEFAULT_CHECK_LIMIT_KB, DEFAULT_LANGUAGE_IDS,
    DEFAULT_SPELL_CHECK_DELAY_MS, OverrideSettings, Settings,
};
