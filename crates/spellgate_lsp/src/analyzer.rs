//! Analyzer contract and the built-in flag-word analyzer.

use std::collections::HashSet;

use thiserror::Error;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};

use spellgate_config::Settings;

use crate::document::DocumentSnapshot;

/// Source name attached to published diagnostics.
pub const DIAGNOSTIC_SOURCE: &str = "spellgate";

/// Errors raised by an analyzer.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Analysis failed: {0}")]
    Failed(String),
}

/// Text analysis run by the scheduler.
///
/// Implementations are expected to fail only on bugs; every error is turned
/// into an empty diagnostics list by the caller.
#[tower_lsp::async_trait]
pub trait Analyzer: Send + Sync + 'static {
    async fn analyze(
        &self,
        document: &DocumentSnapshot,
        settings: &Settings,
    ) -> Result<Vec<Diagnostic>, AnalyzeError>;
}

/// Reports every occurrence of a configured `flagWords` entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlagWordsAnalyzer;

#[tower_lsp::async_trait]
impl Analyzer for FlagWordsAnalyzer {
    async fn analyze(
        &self,
        document: &DocumentSnapshot,
        settings: &Settings,
    ) -> Result<Vec<Diagnostic>, AnalyzeError> {
        if settings.flag_words.is_empty() {
            return Ok(Vec::new());
        }

        let text = document.text.clone();
        let flag_words = settings.flag_words.clone();

        tokio::task::spawn_blocking(move || find_flagged_words(&text, &flag_words))
            .await
            .map_err(|e| AnalyzeError::Failed(e.to_string()))
    }
}

/// Scans `text` word by word and reports words found in `flag_words`.
///
/// Matching is case-insensitive. Positions are in UTF-16 code units.
pub fn find_flagged_words(text: &str, flag_words: &[String]) -> Vec<Diagnostic> {
    let flagged: HashSet<String> = flag_words.iter().map(|w| w.to_lowercase()).collect();
    let mut diagnostics = Vec::new();

    let mut line = 0u32;
    let mut col = 0u32;
    let mut word = String::new();
    let mut word_start = Position::new(0, 0);

    let mut flush = |word: &mut String, start: Position, end: Position| {
        if !word.is_empty() && flagged.contains(&word.to_lowercase()) {
            diagnostics.push(Diagnostic {
                range: Range::new(start, end),
                severity: Some(DiagnosticSeverity::WARNING),
                code: Some(NumberOrString::String("flag-word".to_string())),
                source: Some(DIAGNOSTIC_SOURCE.to_string()),
                message: format!("\"{}\" is a forbidden word.", word),
                ..Default::default()
            });
        }
        word.clear();
    };

    for ch in text.chars() {
        if ch.is_alphanumeric() || (ch == '\'' && !word.is_empty()) {
            if word.is_empty() {
                word_start = Position::new(line, col);
            }
            word.push(ch);
        } else {
            flush(&mut word, word_start, Position::new(line, col));
        }

        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += ch.len_utf16() as u32;
        }
    }
    flush(&mut word, word_start, Position::new(line, col));

    diagnostics
}
