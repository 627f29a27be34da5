//! Document lifecycle handlers (open, change, save, close).

use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::document::DocumentSnapshot;
use crate::state::BackendState;

/// Handles the `textDocument/didOpen` notification.
pub async fn handle_did_open(state: &BackendState, params: DidOpenTextDocumentParams) {
    let item = params.text_document;
    debug!("Document opened: {}", item.uri);

    let document = DocumentSnapshot::new(item.uri, item.language_id, item.version, item.text);
    state.documents.open(document.clone());
    state.scheduler.enqueue(document);
}

/// Handles the `textDocument/didChange` notification.
///
/// With FULL sync the last change carries the whole text.
pub async fn handle_did_change(state: &BackendState, params: DidChangeTextDocumentParams) {
    let uri = params.text_document.uri;
    debug!("Document changed: {}", uri);

    let Some(change) = params.content_changes.into_iter().last() else {
        return;
    };

    match state
        .documents
        .update(&uri, params.text_document.version, change.text)
    {
        Some(document) => state.scheduler.enqueue_if_open(document, &state.documents),
        None => debug!("Change for unknown document ignored: {}", uri),
    }
}

/// Handles the `textDocument/willSave` notification.
pub async fn handle_will_save(state: &BackendState, params: WillSaveTextDocumentParams) {
    let uri = params.text_document.uri;
    if let Some(document) = state.documents.get(&uri) {
        state.scheduler.block(uri, document.version);
    }
}

/// Handles the `textDocument/didSave` notification.
///
/// Ends the save blackout and revalidates if a change was held back.
pub async fn handle_did_save(state: &BackendState, params: DidSaveTextDocumentParams) {
    let uri = params.text_document.uri;
    debug!("Document saved: {}", uri);

    let Some(document) = state.documents.get(&uri) else {
        return;
    };

    if state.scheduler.unblock(&uri, document.version) {
        debug!("Revalidating {} after save", uri);
        state.scheduler.enqueue_if_open(document, &state.documents);
    }
}

/// Handles the `textDocument/didClose` notification.
pub async fn handle_did_close(state: &BackendState, params: DidCloseTextDocumentParams) {
    let uri = params.text_document.uri;
    debug!("Document closed: {}", uri);

    state.documents.close(&uri);
    state.scheduler.close(&uri).await;
}
