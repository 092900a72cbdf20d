use common::{storage::types::hit::Hit, utils::text::collapse_whitespace};

use crate::config::RetrievalTuning;

const SHORTEN_PLACEHOLDER: &str = " …";
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";
const UNTITLED: &str = "Untitled";

/// Collapses whitespace and, when the result exceeds `width` characters, cuts it
/// back to whole words followed by a placeholder so the total still fits `width`.
pub fn shorten(text: &str, width: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(SHORTEN_PLACEHOLDER.chars().count());
    let mut out = String::new();
    let mut used = 0usize;
    for word in collapsed.split(' ') {
        let word_len = word.chars().count();
        let needed = if out.is_empty() {
            word_len
        } else {
            word_len.saturating_add(1)
        };
        if used.saturating_add(needed) > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        used = used.saturating_add(needed);
    }

    // A single word longer than the budget is cut mid-word.
    if out.is_empty() {
        out = collapsed.chars().take(budget).collect();
    }
    out.push_str(SHORTEN_PLACEHOLDER);
    out
}

fn block_header(index: usize, hit: &Hit) -> String {
    let title = hit
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED);
    match hit.page {
        Some(page) => format!("[{index}] {title} — p.{page}"),
        None => format!("[{index}] {title}"),
    }
}

fn block_body(hit: &Hit, snippet_chars: usize) -> String {
    let caption = hit.caption.as_deref().map(str::trim).unwrap_or_default();
    let text = shorten(&hit.text, snippet_chars);

    let body = if !caption.is_empty() && !text.is_empty() {
        format!("{caption}\n{text}")
    } else if caption.is_empty() {
        text
    } else {
        caption.to_string()
    };
    body.trim().to_string()
}

/// Renders hits as numbered context blocks for the prompt.
///
/// Block `i` (1-based) corresponds to `hits[i - 1]`, which keeps `[n]` markers in
/// the generated answer aligned with the sources list. Blocks are added until the
/// next one would push the running total past the character budget; the first
/// block is always kept.
pub fn build_context(hits: &[Hit], tuning: &RetrievalTuning) -> String {
    let mut blocks: Vec<String> = Vec::with_capacity(hits.len());
    let mut total = 0usize;

    for (offset, hit) in hits.iter().enumerate() {
        let index = offset.saturating_add(1);
        let block = format!(
            "{}\n{}",
            block_header(index, hit),
            block_body(hit, tuning.snippet_chars)
        );
        let block_len = block.chars().count();
        if total.saturating_add(block_len) > tuning.context_char_budget && !blocks.is_empty() {
            break;
        }
        total = total.saturating_add(block_len);
        blocks.push(block);
    }

    blocks.join(BLOCK_SEPARATOR)
}
