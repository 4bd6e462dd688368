use codeforge_budget::{estimate_tokens, max_bytes_within};

/// Trailing context window of `text`: its last `max_lines` lines, shortened
/// from the front until the estimate fits `max_tokens`.
///
/// Trailing newlines are ignored when counting lines. Returns an empty slice
/// when either bound is zero.
#[must_use]
pub fn trailing_window(
    text: &str,
    max_lines: usize,
    max_tokens: usize,
    chars_per_token: usize,
) -> &str {
    let body = text.trim_end_matches(['\n', '\r']);
    if body.is_empty() || max_lines == 0 || max_tokens == 0 {
        return "";
    }

    let mut start = 0;
    let mut seen = 0;
    for (idx, _) in body.rmatch_indices('\n') {
        seen += 1;
        if seen == max_lines {
            start = idx + 1;
            break;
        }
    }
    let window = &body[start..];
    if estimate_tokens(window, chars_per_token) <= max_tokens {
        return window;
    }

    // Longest suffix that fits, searched over char boundaries
    let cuts: Vec<usize> = window.char_indices().map(|(idx, _)| idx).collect();
    let first_fit = cuts
        .partition_point(|&cut| estimate_tokens(&window[cut..], chars_per_token) > max_tokens);
    if let Some(&cut) = cuts.get(first_fit) {
        let suffix = &window[cut..];
        if estimate_tokens(suffix, chars_per_token) <= max_tokens {
            return suffix;
        }
    }

    // Byte bound that fits whatever the encoder does with the text
    let mut cut = window.len().saturating_sub(max_bytes_within(max_tokens));
    while !window.is_char_boundary(cut) {
        cut += 1;
    }
    &window[cut..]
}
