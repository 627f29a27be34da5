//! Decides whether a document is exempt from validation.

use tower_lsp::lsp_types::Url;

use spellgate_config::Settings;

use crate::document::DocumentSnapshot;
use crate::resolver::FolderSettings;

/// Schemes of editor-internal documents that never enter a pipeline.
pub const BLOCKED_SCHEMES: &[&str] = &["git", "output", "debug", "vscode"];

/// True iff the scheme of `uri` is in `allowlist`.
pub fn is_scheme_allowed(uri: &Url, allowlist: &[&str]) -> bool {
    allowlist.contains(&uri.scheme())
}

/// True iff the scheme of `uri` is one of [`BLOCKED_SCHEMES`].
pub fn is_scheme_blacklisted(uri: &Url) -> bool {
    BLOCKED_SCHEMES.contains(&uri.scheme())
}

pub fn is_language_enabled(doc: &DocumentSnapshot, settings: &Settings) -> bool {
    settings.is_language_enabled(&doc.language_id)
}

/// True iff the document path matches the folder's exclusion globs.
pub fn is_path_excluded(uri: &Url, folder: &FolderSettings) -> bool {
    folder.is_excluded(uri)
}

/// Combined check run before every analyzer call.
pub fn should_validate(doc: &DocumentSnapshot, settings: &Settings, folder: &FolderSettings) -> bool {
    settings.is_enabled()
        && is_language_enabled(doc, settings)
        && !is_path_excluded(&doc.uri, folder)
        && is_scheme_allowed(&doc.uri, &settings.allowed_schemas())
}
