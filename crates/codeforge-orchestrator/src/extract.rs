use once_cell::sync::Lazy;
use regex::Regex;

use codeforge_utils::Language;

/// A closed fence: tag line, then body up to the next fence
static FENCED_BLOCK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+#.-]*)[^\n]*\n(.*?)```").ok());

/// An opening fence whose closing fence was cut off
static OPEN_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[^\n]*\n(.*)$").ok());

/// Reduce a model response to code.
///
/// Prefers the first block fenced with the language's tag or an alias, then
/// the first fenced block of any tag, then the whole trimmed response. A
/// response truncated inside its only fence keeps the fenced text.
#[must_use]
pub fn extract_code(response: &str, language: &Language) -> String {
    let Some(fence) = FENCED_BLOCK.as_ref() else {
        return response.trim().to_string();
    };

    let blocks: Vec<(String, &str)> = fence
        .captures_iter(response)
        .filter_map(|caps| {
            let tag = caps.get(1)?.as_str().to_ascii_lowercase();
            Some((tag, caps.get(2)?.as_str()))
        })
        .collect();

    let matches_language = |tag: &str| {
        tag == language.as_str() || language.fence_aliases().iter().any(|alias| *alias == tag)
    };

    if let Some((_, body)) = blocks.iter().find(|(tag, _)| matches_language(tag)) {
        return trim_block(body);
    }
    if let Some((_, body)) = blocks.first() {
        return trim_block(body);
    }

    if let Some(body) = OPEN_FENCE
        .as_ref()
        .and_then(|re| re.captures(response))
        .and_then(|caps| caps.get(1))
    {
        return trim_block(body.as_str());
    }

    response.trim().to_string()
}

/// Drop blank lines around a block while keeping its indentation
fn trim_block(body: &str) -> String {
    body.trim_matches(['\n', '\r']).trim_end().to_string()
}
