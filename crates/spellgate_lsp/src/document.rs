//! Open document tracking.

use std::collections::HashMap;

use parking_lot::RwLock;
use tower_lsp::lsp_types::Url;

/// Content of one open document at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub uri: Url,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl DocumentSnapshot {
    pub fn new(uri: Url, language_id: impl Into<String>, version: i32, text: impl Into<String>) -> Self {
        Self {
            uri,
            language_id: language_id.into(),
            version,
            text: text.into(),
        }
    }

    /// Returns a copy whose text is cut to at most `limit` bytes.
    ///
    /// The cut never splits a UTF-8 character.
    pub fn truncated(&self, limit: usize) -> DocumentSnapshot {
        if self.text.len() <= limit {
            return self.clone();
        }

        let mut end = limit;
        while !self.text.is_char_boundary(end) {
            end -= 1;
        }

        DocumentSnapshot {
            text: self.text[..end].to_string(),
            ..self.clone()
        }
    }
}

/// Document contents cache, keyed by URI.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<Url, DocumentSnapshot>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly opened document.
    pub fn open(&self, document: DocumentSnapshot) {
        self.documents.write().insert(document.uri.clone(), document);
    }

    /// Replaces the text of a tracked document.
    ///
    /// Returns the updated snapshot, or `None` if the document is not open.
    pub fn update(&self, uri: &Url, version: i32, text: String) -> Option<DocumentSnapshot> {
        let mut docs = self.documents.write();
        let doc = docs.get_mut(uri)?;
        doc.version = version;
        doc.text = text;
        Some(doc.clone())
    }

    pub fn close(&self, uri: &Url) -> Option<DocumentSnapshot> {
        self.documents.write().remove(uri)
    }

    pub fn get(&self, uri: &Url) -> Option<DocumentSnapshot> {
        self.documents.read().get(uri).cloned()
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.documents.read().contains_key(uri)
    }

    /// Snapshots of every open document.
    pub fn all(&self) -> Vec<DocumentSnapshot> {
        self.documents.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Url {
        Url::parse("file:///tmp/notes.md").unwrap()
    }

    #[test]
    fn test_truncated_respects_char_boundaries() {
        // 'あ' is 3 bytes in UTF-8
        let doc = DocumentSnapshot::new(uri(), "markdown", 1, "aあいう");
        assert_eq!(doc.truncated(2).text, "a");
        assert_eq!(doc.truncated(4).text, "aあ");
        assert_eq!(doc.truncated(100).text, "aあいう");
    }

    #[test]
    fn test_store_update_keeps_language_id() {
        let store = DocumentStore::new();
        store.open(DocumentSnapshot::new(uri(), "markdown", 1, "one"));

        let updated = store.update(&uri(), 2, "two".to_string()).unwrap();

        assert_eq!(updated.language_id, "markdown");
        assert_eq!(updated.version, 2);
        assert_eq!(store.get(&uri()).unwrap().text, "two");
    }

    #[test]
    fn test_update_unknown_document() {
        let store = DocumentStore::new();
        assert!(store.update(&uri(), 1, String::new()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_close_removes_document() {
        let store = DocumentStore::new();
        store.open(DocumentSnapshot::new(uri(), "markdown", 1, "text"));
        assert_eq!(store.len(), 1);

        assert!(store.close(&uri()).is_some());
        assert!(store.get(&uri()).is_none());
        assert!(!store.contains(&uri()));
        assert!(store.all().is_empty());
    }
}
