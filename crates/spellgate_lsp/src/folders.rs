//! Workspace folder lookup for document URIs.

use std::path::PathBuf;
use std::sync::Arc;

use tower_lsp::lsp_types::{Url, WorkspaceFolder};
use tracing::debug;

use spellgate_config::{CacheRegistry, LazyValue};

use crate::host::WorkspaceHost;

/// Name given to folders synthesized from a URI root.
pub const ROOT_FOLDER_NAME: &str = "root";

/// Maps document URIs to their owning workspace folder.
pub struct FolderResolver {
    host: Arc<dyn WorkspaceHost>,
    folders: Arc<LazyValue<Arc<Vec<WorkspaceFolder>>>>,
}

impl FolderResolver {
    /// Creates a resolver whose folder list is cached in `registry`.
    pub fn new(host: Arc<dyn WorkspaceHost>, registry: &CacheRegistry) -> Self {
        Self {
            host,
            folders: registry.lazy("workspace-folders"),
        }
    }

    /// Current folder list, fetched once per cache epoch.
    pub async fn folders(&self) -> Arc<Vec<WorkspaceFolder>> {
        self.folders
            .force(|| async {
                match self.host.workspace_folders().await {
                    Ok(folders) => Arc::new(folders),
                    Err(e) => {
                        debug!("Failed to fetch workspace folders: {}", e);
                        Arc::new(Vec::new())
                    }
                }
            })
            .await
    }

    /// Folders containing `uri`, most specific first.
    pub async fn folders_for_uri(&self, uri: &Url) -> Vec<WorkspaceFolder> {
        matching_folders(&self.folders().await, uri)
    }

    /// The most specific folder containing `uri`.
    ///
    /// Falls back to the first configured folder, then to a folder
    /// synthesized from the URI root.
    pub async fn find_matching_folder(&self, uri: &Url) -> WorkspaceFolder {
        let folders = self.folders().await;
        matching_folders(&folders, uri)
            .into_iter()
            .next()
            .or_else(|| folders.first().cloned())
            .unwrap_or_else(|| root_folder_for(uri))
    }
}

/// Filters `folders` to those whose URI prefixes `uri`, longest first.
pub fn matching_folders(folders: &[WorkspaceFolder], uri: &Url) -> Vec<WorkspaceFolder> {
    let mut matches: Vec<WorkspaceFolder> = folders
        .iter()
        .filter(|f| uri.as_str().starts_with(f.uri.as_str()))
        .cloned()
        .collect();
    matches.sort_by_key(|f| f.uri.as_str().len());
    matches.reverse();
    matches
}

/// Folder made of the URI's scheme and an empty path.
pub fn root_folder_for(uri: &Url) -> WorkspaceFolder {
    let root = if uri.cannot_be_a_base() {
        Url::parse(&format!("{}:", uri.scheme())).unwrap_or_else(|_| uri.clone())
    } else {
        let mut root = uri.clone();
        root.set_path("");
        root.set_query(None);
        root.set_fragment(None);
        root
    };

    WorkspaceFolder {
        uri: root,
        name: ROOT_FOLDER_NAME.to_string(),
    }
}

/// Path used for glob matching: relative to the folder when the document is
/// inside it, otherwise the document's own path.
pub fn document_path(uri: &Url, folder_uri: &Url) -> PathBuf {
    let Ok(path) = uri.to_file_path() else {
        return PathBuf::from(uri.path());
    };

    folder_uri
        .to_file_path()
        .ok()
        .and_then(|root| path.strip_prefix(root).ok().map(|p| p.to_path_buf()))
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn folder(uri: &str, name: &str) -> WorkspaceFolder {
        WorkspaceFolder {
            uri: Url::parse(uri).unwrap(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_matching_folders_most_specific_first() {
        let folders = vec![
            folder("file:///work", "work"),
            folder("file:///work/app/docs", "docs"),
            folder("file:///other", "other"),
            folder("file:///work/app", "app"),
        ];
        let uri = Url::parse("file:///work/app/docs/guide.md").unwrap();

        let names: Vec<_> = matching_folders(&folders, &uri)
            .into_iter()
            .map(|f| f.name)
            .collect();

        assert_eq!(names, vec!["docs", "app", "work"]);
    }

    #[test]
    fn test_matching_folders_empty() {
        let uri = Url::parse("file:///work/a.md").unwrap();
        assert!(matching_folders(&[], &uri).is_empty());
    }

    #[test]
    fn test_root_folder_for_file_uri() {
        let uri = Url::parse("file:///work/app/readme.md?x=1#top").unwrap();
        let root = root_folder_for(&uri);
        assert_eq!(root.uri.as_str(), "file:///");
        assert_eq!(root.name, ROOT_FOLDER_NAME);
    }

    #[test]
    fn test_root_folder_for_untitled_uri() {
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        let root = root_folder_for(&uri);
        assert_eq!(root.uri.scheme(), "untitled");
        assert_eq!(root.uri.path(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_document_path_relative_to_folder() {
        let uri = Url::parse("file:///work/app/docs/a.md").unwrap();
        let folder = Url::parse("file:///work/app").unwrap();
        assert_eq!(document_path(&uri, &folder), PathBuf::from("docs/a.md"));

        let outside = Url::parse("file:///elsewhere/b.md").unwrap();
        assert_eq!(
            document_path(&outside, &folder),
            PathBuf::from("/elsewhere/b.md")
        );
    }

    #[test]
    fn test_document_path_non_file_uri() {
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        let folder = root_folder_for(&uri);
        assert_eq!(document_path(&uri, &folder.uri), PathBuf::from("Untitled-1"));
    }
}
