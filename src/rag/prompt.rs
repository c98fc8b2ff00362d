//! Prompt assembly: retrieved passages + bounded history → model input.

use super::store::SearchHit;
use crate::llm::types::ChatMessage;

/// Only the most recent turns are forwarded to the model; older turns
/// are dropped, never summarized.
pub const HISTORY_WINDOW: usize = 10;

/// Render hits into a context block, numbered in the order received
/// (descending relevance).
pub fn build_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[source {}] document: \"{}\"\n{}",
                i + 1,
                hit.doc_name,
                hit.content
            )
        })
        .collect();

    parts.join("\n\n---\n\n")
}

/// Pick the system prompt: grounded when there is context, bare
/// fallback otherwise. `scope_name` narrows the stated retrieval scope
/// to one document.
pub fn build_system_prompt(context: &str, scope_name: Option<&str>) -> String {
    let scope = match scope_name {
        Some(name) => format!("the document \"{}\"", name),
        None => "the knowledge base".to_string(),
    };

    if !context.is_empty() {
        format!(
            "You are a knowledge-base assistant. Answer the user's question based on \
the following passages retrieved from {}.\n\n\
## Reference passages\n{}\n\n\
## Guidelines\n\
- Prefer the provided passages; add your own knowledge only where needed\n\
- If the passages contain nothing relevant, say so explicitly\n\
- Be accurate and concise, and cite the sources you used\n\
- Answer in the language of the question",
            scope, context
        )
    } else {
        format!(
            "You are a knowledge-base assistant. Answer the user's question. The \
current retrieval scope is {}; if it contains nothing relevant, say so directly.",
            scope
        )
    }
}

/// The most recent `HISTORY_WINDOW` turns.
pub fn bounded_history(messages: &[ChatMessage]) -> &[ChatMessage] {
    let start = messages.len().saturating_sub(HISTORY_WINDOW);
    &messages[start..]
}
