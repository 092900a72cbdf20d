use common::utils::text::collapse_whitespace;

/// Split `text` into overlapping windows of at most `size` characters.
///
/// Whitespace is collapsed first. Consecutive windows share `overlap` characters;
/// the last window ends exactly at the end of the text. Every window advances the
/// start by at least one character, so `overlap >= size` still terminates.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let normalized = collapse_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    let total = chars.len();
    let size = size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < total {
        let end = start.saturating_add(size).min(total);
        if let Some(window) = chars.get(start..end) {
            chunks.push(window.iter().collect::<String>());
        }
        if end == total {
            break;
        }
        start = end.saturating_sub(overlap).max(start.saturating_add(1));
    }

    chunks
}
