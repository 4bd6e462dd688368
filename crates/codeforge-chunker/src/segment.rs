//! Splitting input text into atomic units.
//!
//! Every function here returns byte ranges that tile the input exactly:
//! concatenating the slices reproduces the original text.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use codeforge_utils::Language;

/// Broad shape of the planning input, which decides where units may end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Split before top-level statements
    Code,
    /// Split at paragraph breaks
    Prose,
}

static CODE_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^\s*(def |async def |class |import |from \S+ import|function\b|const |let |var |fn |pub |use |impl |struct |enum |return\b|if\s*\(|for\s*\(|while\s*\(|#include|@\w|</?[a-zA-Z!][^>]*>|[}{])",
    )
    .ok()
});

impl ContentKind {
    /// Classify text as code when at least 30% of its non-blank lines look like code
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let mut total = 0usize;
        let mut code = 0usize;
        for line in text.lines() {
            let trimmed = line.trim_end();
            if trimmed.trim_start().is_empty() {
                continue;
            }
            total += 1;
            let pattern_hit = CODE_LINE
                .as_ref()
                .is_some_and(|re| re.is_match(trimmed));
            let tail_hit = trimmed.ends_with('{')
                || trimmed.ends_with('}')
                || trimmed.ends_with(';')
                || trimmed.ends_with("):")
                || trimmed.ends_with("=>");
            if pattern_hit || tail_hit {
                code += 1;
            }
        }

        if total > 0 && code * 10 >= total * 3 {
            Self::Code
        } else {
            Self::Prose
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Prose => "prose",
        }
    }
}

/// Lexical rules the bracket scanner needs to skip strings and comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyntaxHints {
    hash_comments: bool,
    slash_comments: bool,
    block_comments: bool,
    quotes: bool,
    triple_quotes: bool,
    backticks: bool,
    rust_chars: bool,
}

impl SyntaxHints {
    #[must_use]
    pub fn for_language(language: &Language) -> Self {
        match language {
            Language::Python => Self {
                hash_comments: true,
                quotes: true,
                triple_quotes: true,
                ..Self::default()
            },
            Language::JavaScript | Language::TypeScript => Self {
                slash_comments: true,
                block_comments: true,
                quotes: true,
                backticks: true,
                ..Self::default()
            },
            Language::Rust => Self {
                slash_comments: true,
                block_comments: true,
                quotes: true,
                rust_chars: true,
                ..Self::default()
            },
            Language::Css => Self {
                block_comments: true,
                quotes: true,
                ..Self::default()
            },
            Language::Html | Language::Other(_) => Self::default(),
        }
    }
}

/// Tracks bracket depth across lines, ignoring brackets in strings and comments
#[derive(Debug)]
struct Scanner {
    hints: SyntaxHints,
    depth: usize,
    in_block_comment: bool,
    in_triple: Option<char>,
    in_backtick: bool,
}

impl Scanner {
    const fn new(hints: SyntaxHints) -> Self {
        Self {
            hints,
            depth: 0,
            in_block_comment: false,
            in_triple: None,
            in_backtick: false,
        }
    }

    const fn at_top_level(&self) -> bool {
        self.depth == 0 && !self.in_block_comment && self.in_triple.is_none() && !self.in_backtick
    }

    fn scan_line(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if self.in_block_comment {
                if c == '*' && next == Some('/') {
                    self.in_block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            if let Some(delim) = self.in_triple {
                if c == '\\' {
                    i += 2;
                } else if c == delim && next == Some(delim) && chars.get(i + 2) == Some(&delim) {
                    self.in_triple = None;
                    i += 3;
                } else {
                    i += 1;
                }
                continue;
            }

            if self.in_backtick {
                if c == '\\' {
                    i += 2;
                } else {
                    if c == '`' {
                        self.in_backtick = false;
                    }
                    i += 1;
                }
                continue;
            }

            if let Some(delim) = quote {
                if c == '\\' {
                    i += 2;
                } else {
                    if c == delim {
                        quote = None;
                    }
                    i += 1;
                }
                continue;
            }

            match c {
                '#' if self.hints.hash_comments => break,
                '/' if self.hints.slash_comments && next == Some('/') => break,
                '/' if self.hints.block_comments && next == Some('*') => {
                    self.in_block_comment = true;
                    i += 2;
                    continue;
                }
                '"' | '\'' if self.hints.triple_quotes
                    && next == Some(c)
                    && chars.get(i + 2) == Some(&c) =>
                {
                    self.in_triple = Some(c);
                    i += 3;
                    continue;
                }
                '`' if self.hints.backticks => self.in_backtick = true,
                '\'' if self.hints.rust_chars => {
                    // Lifetimes and labels have no closing quote
                    if next == Some('\\') || chars.get(i + 2) == Some(&'\'') {
                        quote = Some('\'');
                    }
                }
                '"' | '\'' if self.hints.quotes => quote = Some(c),
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
    }
}

const CONTINUATION_KEYWORDS: &[&str] = &["else", "elif", "except", "finally", "catch"];

fn starts_statement(line: &str) -> bool {
    let Some(first) = line.chars().next() else {
        return false;
    };
    if first.is_whitespace() || matches!(first, ')' | ']' | '}' | '.') {
        return false;
    }
    let word: String = line
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    !CONTINUATION_KEYWORDS.contains(&word.as_str())
}

/// Decorators, attributes and comments belong to the statement after them
fn is_prefix_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('@')
        || trimmed.starts_with('#')
        || trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.ends_with("*/")
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Byte ranges of each line, newline included
pub(crate) fn line_ranges(text: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = range.start;
    for line in text[range.clone()].split_inclusive('\n') {
        let end = start + line.len();
        out.push(start..end);
        start = end;
    }
    out
}

fn ranges_from_boundaries(boundaries: &[usize], end: usize) -> Vec<Range<usize>> {
    let mut out = Vec::with_capacity(boundaries.len());
    for (i, &start) in boundaries.iter().enumerate() {
        let stop = boundaries.get(i + 1).copied().unwrap_or(end);
        if stop > start {
            out.push(start..stop);
        }
    }
    out
}

/// Split `text` into atomic units.
///
/// Code units start at top-level statements; blank lines and trailing comments
/// stay with the unit before them. Prose units are paragraphs.
pub(crate) fn units(text: &str, kind: ContentKind, hints: SyntaxHints) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut boundaries = vec![0];
    match kind {
        ContentKind::Code => {
            let mut scanner = Scanner::new(hints);
            let mut prev_nonblank: Option<&str> = None;
            for range in line_ranges(text, 0..text.len()) {
                let line = &text[range.clone()];
                if range.start > 0
                    && scanner.at_top_level()
                    && starts_statement(line)
                    && !prev_nonblank.is_some_and(is_prefix_line)
                {
                    boundaries.push(range.start);
                }
                scanner.scan_line(line);
                if !is_blank(line) {
                    prev_nonblank = Some(line);
                }
            }
        }
        ContentKind::Prose => {
            let mut prev_blank = false;
            for range in line_ranges(text, 0..text.len()) {
                let line = &text[range.clone()];
                let blank = is_blank(line);
                if range.start > 0 && prev_blank && !blank {
                    boundaries.push(range.start);
                }
                prev_blank = blank;
            }
        }
    }

    ranges_from_boundaries(&boundaries, text.len())
}

/// Split after sentence-ending punctuation, keeping the following whitespace
pub(crate) fn sentence_ranges(text: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    let mut boundaries = vec![range.start];
    let mut after_stop = false;
    let mut in_gap = false;

    for (offset, c) in slice.char_indices() {
        if c.is_whitespace() {
            if after_stop {
                in_gap = true;
            }
            after_stop = false;
            continue;
        }
        if in_gap && offset > 0 {
            boundaries.push(range.start + offset);
        }
        in_gap = false;
        after_stop = matches!(c, '.' | '!' | '?' | ';');
    }

    ranges_from_boundaries(&boundaries, range.end)
}

/// Split after every whitespace run
pub(crate) fn word_ranges(text: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    let mut boundaries = vec![range.start];
    let mut prev_ws = false;

    for (offset, c) in slice.char_indices() {
        let ws = c.is_whitespace();
        if prev_ws && !ws && offset > 0 {
            boundaries.push(range.start + offset);
        }
        prev_ws = ws;
    }

    ranges_from_boundaries(&boundaries, range.end)
}

/// Split at char boundaries into pieces of at most `max_bytes`.
///
/// A single char wider than `max_bytes` becomes its own piece.
pub(crate) fn forced_ranges(text: &str, range: Range<usize>, max_bytes: usize) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = range.start;
    let mut end = range.start;

    for (offset, c) in text[range.clone()].char_indices() {
        let at = range.start + offset;
        let width = c.len_utf8();
        if at + width - start > max_bytes && end > start {
            out.push(start..end);
            start = at;
        }
        end = at + width;
    }
    if end > start {
        out.push(start..end);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces<'a>(text: &'a str, ranges: &[Range<usize>]) -> Vec<&'a str> {
        ranges.iter().map(|r| &text[r.clone()]).collect()
    }

    fn python() -> SyntaxHints {
        SyntaxHints::for_language(&Language::Python)
    }

    #[test]
    fn test_classify() {
        let code = "import os\n\ndef main():\n    print(os.getcwd())\n";
        assert_eq!(ContentKind::classify(code), ContentKind::Code);

        let prose = "Write a program that greets the user.\n\nIt should be friendly and short.\n";
        assert_eq!(ContentKind::classify(prose), ContentKind::Prose);
        assert_eq!(ContentKind::classify(""), ContentKind::Prose);
    }

    #[test]
    fn test_python_units_split_at_top_level_defs() {
        let text = "import os\n\n@cache\ndef a():\n    return 1\n\nclass B:\n    pass\n";
        let units = units(text, ContentKind::Code, python());
        assert_eq!(
            pieces(text, &units),
            vec![
                "import os\n\n",
                "@cache\ndef a():\n    return 1\n\n",
                "class B:\n    pass\n"
            ]
        );
    }

    #[test]
    fn test_no_split_inside_brackets_or_strings() {
        let text = "x = foo(\nbar,\n)\ny = \"\"\"\ndoc ( \nz\n\"\"\"\nw = 1\n";
        let units = units(text, ContentKind::Code, python());
        assert_eq!(
            pieces(text, &units),
            vec!["x = foo(\nbar,\n)\n", "y = \"\"\"\ndoc ( \nz\n\"\"\"\n", "w = 1\n"]
        );
    }

    #[test]
    fn test_continuation_keywords_stay_attached() {
        let text = "try:\n    a()\nexcept E:\n    b()\nfinally:\n    c()\nd()\n";
        let units = units(text, ContentKind::Code, python());
        assert_eq!(
            pieces(text, &units),
            vec!["try:\n    a()\nexcept E:\n    b()\nfinally:\n    c()\n", "d()\n"]
        );
    }

    #[test]
    fn test_js_braces_and_comments() {
        let hints = SyntaxHints::for_language(&Language::JavaScript);
        let text = "// helper\nfunction a() {\n  if (x) {\n  }\n}\nconst s = `{\n`;\nlet b = 2; // }\n";
        let units = units(text, ContentKind::Code, hints);
        assert_eq!(
            pieces(text, &units),
            vec![
                "// helper\nfunction a() {\n  if (x) {\n  }\n}\n",
                "const s = `{\n`;\n",
                "let b = 2; // }\n"
            ]
        );
    }

    #[test]
    fn test_rust_lifetimes_do_not_open_strings() {
        let hints = SyntaxHints::for_language(&Language::Rust);
        let text = "#[inline]\nfn f<'a>(x: &'a str) -> char {\n    '{'\n}\nfn g() {}\n";
        let units = units(text, ContentKind::Code, hints);
        assert_eq!(
            pieces(text, &units),
            vec!["#[inline]\nfn f<'a>(x: &'a str) -> char {\n    '{'\n}\n", "fn g() {}\n"]
        );
    }

    #[test]
    fn test_prose_paragraphs() {
        let text = "First para\nstill first.\n\n\nSecond.\nThird line\n";
        let units = units(text, ContentKind::Prose, SyntaxHints::default());
        assert_eq!(
            pieces(text, &units),
            vec!["First para\nstill first.\n\n\n", "Second.\nThird line\n"]
        );
    }

    #[test]
    fn test_sentence_and_word_ranges() {
        let text = "One two. Three!  Four";
        let sentences = sentence_ranges(text, 0..text.len());
        assert_eq!(pieces(text, &sentences), vec!["One two. ", "Three!  ", "Four"]);

        let words = word_ranges(text, 0..8);
        assert_eq!(pieces(text, &words), vec!["One ", "two."]);
    }

    #[test]
    fn test_forced_ranges_respect_char_boundaries() {
        let text = "aé€b";
        let forced = forced_ranges(text, 0..text.len(), 3);
        assert_eq!(pieces(text, &forced), vec!["aé", "€", "b"]);

        let wide = forced_ranges("€", 0..3, 1);
        assert_eq!(wide, vec![0..3]);
    }

    #[test]
    fn test_units_tile_input() {
        let text = "a\n\n  b\n}\nc";
        for kind in [ContentKind::Code, ContentKind::Prose] {
            let joined: String = units(text, kind, python())
                .into_iter()
                .map(|r| &text[r])
                .collect();
            assert_eq!(joined, text);
        }
    }
}
