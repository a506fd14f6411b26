//! Lossless text splitting.
//!
//! Spans are contiguous slices of the input, so joining them yields the
//! original text. Every span holds at most `budget` characters.

/// Splits `text` into spans of at most `budget` characters.
///
/// Paragraphs (separated by a blank line) are packed greedily. A paragraph
/// longer than the budget is cut at the last sentence end found within
/// `window` characters before the budget, or hard at the budget otherwise.
pub(crate) fn split_text(text: &str, budget: usize, window: usize) -> Vec<&str> {
    let budget = budget.max(1);
    let mut spans = Vec::new();
    let mut start = 0;
    let mut end = 0;
    let mut len = 0;

    for paragraph in text.split_inclusive("\n\n") {
        let chars = paragraph.chars().count();
        if len + chars <= budget {
            end += paragraph.len();
            len += chars;
            continue;
        }
        if end > start {
            spans.push(&text[start..end]);
        }
        start = end;
        if chars <= budget {
            end += paragraph.len();
            len = chars;
            continue;
        }
        spans.extend(split_long(paragraph, budget, window));
        end += paragraph.len();
        start = end;
        len = 0;
    }
    if end > start {
        spans.push(&text[start..end]);
    }
    spans
}

fn split_long(mut piece: &str, budget: usize, window: usize) -> Vec<&str> {
    let mut spans = Vec::new();
    while piece.chars().count() > budget {
        let cut = sentence_cut(piece, budget, window);
        let (head, tail) = piece.split_at(cut);
        spans.push(head);
        piece = tail;
    }
    if !piece.is_empty() {
        spans.push(piece);
    }
    spans
}

/// Byte offset to cut at. `piece` must hold more than `budget` characters.
fn sentence_cut(piece: &str, budget: usize, window: usize) -> usize {
    let hard = byte_offset(piece, budget);
    let floor = byte_offset(piece, budget.saturating_sub(window));

    let mut best = None;
    let mut prev = None;
    for (offset, ch) in piece[floor..hard].char_indices() {
        if ch.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            best = Some(floor + offset + ch.len_utf8());
        }
        prev = Some(ch);
    }
    best.unwrap_or(hard)
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Cuts `text` to at most `limit` characters.
pub(crate) fn truncate(text: &str, limit: usize) -> &str {
    &text[..byte_offset(text, limit)]
}
