//! Bracket and literal balance checking

use codeforge_utils::Language;

use crate::report::Diagnostic;

/// Comment and string syntax for one language family
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Lexicon {
    hash_comments: bool,
    slash_comments: bool,
    block_comments: bool,
    single_quotes: bool,
    triple_quotes: bool,
    backticks: bool,
    /// `"..."` may contain raw newlines
    multiline_strings: bool,
    /// `'x'` is a char literal and `'a` a lifetime
    char_literals: bool,
}

impl Lexicon {
    /// `None` for languages without bracket structure worth checking
    pub(crate) fn for_language(language: &Language) -> Option<Self> {
        let lexicon = match language {
            Language::Python => Self {
                hash_comments: true,
                single_quotes: true,
                triple_quotes: true,
                ..Self::default()
            },
            Language::JavaScript | Language::TypeScript => Self {
                slash_comments: true,
                block_comments: true,
                single_quotes: true,
                backticks: true,
                ..Self::default()
            },
            Language::Rust => Self {
                slash_comments: true,
                block_comments: true,
                multiline_strings: true,
                char_literals: true,
                ..Self::default()
            },
            Language::Css => Self {
                block_comments: true,
                single_quotes: true,
                ..Self::default()
            },
            Language::Html | Language::Other(_) => return None,
        };
        Some(lexicon)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DelimiterIssue {
    Unexpected {
        found: char,
        line: usize,
    },
    Mismatched {
        found: char,
        expected: char,
        line: usize,
        open_line: usize,
    },
    Unclosed {
        open: char,
        line: usize,
    },
    UnterminatedString {
        line: usize,
    },
    UnterminatedComment {
        line: usize,
    },
}

impl DelimiterIssue {
    pub(crate) const fn line(&self) -> usize {
        match self {
            Self::Unexpected { line, .. }
            | Self::Mismatched { line, .. }
            | Self::Unclosed { line, .. }
            | Self::UnterminatedString { line }
            | Self::UnterminatedComment { line } => *line,
        }
    }

    pub(crate) fn message(&self) -> String {
        match self {
            Self::Unexpected { found, line } => format!("Unexpected '{found}' at line {line}"),
            Self::Mismatched {
                found,
                expected,
                line,
                open_line,
            } => format!(
                "Mismatched '{found}' at line {line}: expected '{expected}' to close the bracket opened at line {open_line}"
            ),
            Self::Unclosed { open, line } => format!("Unclosed '{open}' opened at line {line}"),
            Self::UnterminatedString { line } => {
                format!("Unterminated string literal starting at line {line}")
            }
            Self::UnterminatedComment { line } => {
                format!("Unterminated block comment starting at line {line}")
            }
        }
    }
}

impl From<DelimiterIssue> for Diagnostic {
    fn from(issue: DelimiterIssue) -> Self {
        Self::syntax(issue.message()).at_line(issue.line())
    }
}

const fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

struct Cursor<'a> {
    chars: &'a [char],
    pos: usize,
    line: usize,
}

impl Cursor<'_> {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if self.peek(0) == Some('\n') {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn skip_to_eol(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Consume through `*/`; false if the input ends first
    fn skip_block_comment(&mut self) -> bool {
        self.pos += 2;
        while let Some(c) = self.peek(0) {
            if c == '*' && self.peek(1) == Some('/') {
                self.pos += 2;
                return true;
            }
            self.bump();
        }
        false
    }

    /// Consume a string opened by `quote`; false if it is never closed
    fn skip_string(&mut self, quote: char, multiline: bool) -> bool {
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' if !multiline => return false,
                c if c == quote => {
                    self.pos += 1;
                    return true;
                }
                _ => self.bump(),
            }
        }
        false
    }

    fn skip_triple_string(&mut self, quote: char) -> bool {
        self.pos += 3;
        while let Some(c) = self.peek(0) {
            if c == '\\' {
                self.bump();
                self.bump();
            } else if c == quote && self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                self.pos += 3;
                return true;
            } else {
                self.bump();
            }
        }
        false
    }

    /// Skip a char literal, or just the quote of a lifetime
    fn skip_char_literal(&mut self) {
        if self.peek(1) == Some('\\') {
            for offset in 3..12 {
                match self.peek(offset) {
                    Some('\'') => {
                        self.pos += offset + 1;
                        return;
                    }
                    Some('\n') | None => break,
                    _ => {}
                }
            }
        } else if self.peek(2) == Some('\'') && self.peek(1) != Some('\n') {
            self.pos += 3;
            return;
        }
        self.pos += 1;
    }
}

/// First structural problem in `code`, ignoring brackets inside comments and strings
pub(crate) fn check_delimiters(code: &str, lexicon: Lexicon) -> Option<DelimiterIssue> {
    let chars: Vec<char> = code.chars().collect();
    let mut cursor = Cursor {
        chars: &chars,
        pos: 0,
        line: 1,
    };
    let mut stack: Vec<(char, usize)> = Vec::new();

    while let Some(c) = cursor.peek(0) {
        let next = cursor.peek(1);
        let start_line = cursor.line;
        match c {
            '#' if lexicon.hash_comments => cursor.skip_to_eol(),
            '/' if lexicon.slash_comments && next == Some('/') => cursor.skip_to_eol(),
            '/' if lexicon.block_comments && next == Some('*') => {
                if !cursor.skip_block_comment() {
                    return Some(DelimiterIssue::UnterminatedComment { line: start_line });
                }
            }
            '\'' if lexicon.char_literals => cursor.skip_char_literal(),
            '"' | '\'' if c == '"' || lexicon.single_quotes => {
                let closed = if lexicon.triple_quotes && next == Some(c) && cursor.peek(2) == Some(c)
                {
                    cursor.skip_triple_string(c)
                } else {
                    cursor.skip_string(c, lexicon.multiline_strings)
                };
                if !closed {
                    return Some(DelimiterIssue::UnterminatedString { line: start_line });
                }
            }
            '`' if lexicon.backticks => {
                if !cursor.skip_string('`', true) {
                    return Some(DelimiterIssue::UnterminatedString { line: start_line });
                }
            }
            '(' | '[' | '{' => {
                stack.push((c, start_line));
                cursor.bump();
            }
            ')' | ']' | '}' => {
                match stack.pop() {
                    None => {
                        return Some(DelimiterIssue::Unexpected {
                            found: c,
                            line: start_line,
                        });
                    }
                    Some((open, open_line)) if closer_for(open) != c => {
                        return Some(DelimiterIssue::Mismatched {
                            found: c,
                            expected: closer_for(open),
                            line: start_line,
                            open_line,
                        });
                    }
                    Some(_) => {}
                }
                cursor.bump();
            }
            _ => cursor.bump(),
        }
    }

    stack
        .last()
        .map(|&(open, line)| DelimiterIssue::Unclosed { open, line })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(code: &str, language: Language) -> Option<DelimiterIssue> {
        check_delimiters(code, Lexicon::for_language(&language).unwrap())
    }

    #[test]
    fn test_balanced_code_passes() {
        let js = "function f(a) {\n  // not a brace: }\n  const s = \"{[(\";\n  return `${a}`;\n}\n";
        assert_eq!(check(js, Language::JavaScript), None);

        let py = "def f(x):\n    # ) ignored\n    return '''\n)\n''' + \"]\"\n";
        assert_eq!(check(py, Language::Python), None);

        let rs = "fn f<'a>(s: &'a str) -> char {\n    let _ = '{';\n    let _ = '\\'';\n    s.chars().next().unwrap_or('}')\n}\n";
        assert_eq!(check(rs, Language::Rust), None);
    }

    #[test]
    fn test_unclosed_and_unexpected() {
        assert_eq!(
            check("def f(:\n    pass\n", Language::Python),
            Some(DelimiterIssue::Unclosed { open: '(', line: 1 })
        );
        assert_eq!(
            check("a { color: red; }\n}\n", Language::Css),
            Some(DelimiterIssue::Unexpected { found: '}', line: 2 })
        );
    }

    #[test]
    fn test_mismatched_reports_both_lines() {
        let issue = check("const a = [\n  1,\n);\n", Language::JavaScript).unwrap();
        assert_eq!(
            issue,
            DelimiterIssue::Mismatched {
                found: ')',
                expected: ']',
                line: 3,
                open_line: 1
            }
        );
        let diag = Diagnostic::from(issue);
        assert_eq!(diag.line, Some(3));
        assert!(diag.message.contains("opened at line 1"));
    }

    #[test]
    fn test_unterminated_literals() {
        assert_eq!(
            check("x = 'abc\ny = 1\n", Language::Python),
            Some(DelimiterIssue::UnterminatedString { line: 1 })
        );
        assert_eq!(
            check("fn main() {}\n/* open\n", Language::Rust),
            Some(DelimiterIssue::UnterminatedComment { line: 2 })
        );
        assert_eq!(
            check("let s = \"line one\nline two\";\n", Language::Rust),
            None
        );
    }

    #[test]
    fn test_markup_has_no_lexicon() {
        assert!(Lexicon::for_language(&Language::Html).is_none());
    }
}
