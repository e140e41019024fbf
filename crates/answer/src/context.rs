//! Rendering of the context set for the answer prompt.

use crate::types::Document;

/// Render documents as a numbered list, one line per document.
///
/// Numbers start at 1 and match the `[n]` citations the answer prompt asks
/// for. Line breaks inside a document collapse to spaces.
pub fn format_context(documents: &[Document]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("{}. {}", i + 1, single_line(&doc.content)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn single_line(content: &str) -> String {
    if content.contains(['\n', '\r']) {
        content.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        content.to_string()
    }
}
