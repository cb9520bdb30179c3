//! Passage files for the in-memory backend.
//!
//! A corpus file is either a JSON array of passages or JSON Lines with one
//! passage per line. Each passage needs `content` (or `page_content`) and
//! a `metadata` object carrying `semester`, `subject` and `unit`.

use std::path::Path;
use syllabot_core::error::RetrievalError;
use syllabot_core::retrieval::Passage;

/// Read and parse a corpus file.
pub async fn load_corpus(path: &Path) -> Result<Vec<Passage>, RetrievalError> {
    let corpus_error = |reason: String| RetrievalError::Corpus {
        path: path.display().to_string(),
        reason,
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| corpus_error(e.to_string()))?;
    parse_corpus(&text).map_err(corpus_error)
}

/// Parse corpus text in either supported layout.
pub fn parse_corpus(text: &str) -> Result<Vec<Passage>, String> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).map_err(|e| e.to_string());
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<Passage>(line).map_err(|e| format!("line {}: {e}", i + 1))
        })
        .collect()
}
