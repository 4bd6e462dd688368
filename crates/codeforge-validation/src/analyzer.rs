//! Classification of interpreter and compiler error output

use once_cell::sync::Lazy;
use regex::Regex;

use crate::report::{Diagnostic, IssueKind};

/// `line 12`, `Line 12`
static LINE_WORD: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)\bline (\d+)").ok());

/// `file.js:12:5` or `file.py:12:`
static LINE_COLON: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r":(\d+):").ok());

static MISSING_MODULE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)(?:no module named|cannot find module) ['"]([^'"]+)['"]"#).ok());

const SYNTAX_MARKERS: &[&str] = &[
    "syntaxerror",
    "indentationerror",
    "taberror",
    "syntax error",
    "unexpected token",
    "unexpected end of input",
];
const DEPENDENCY_MARKERS: &[&str] = &[
    "modulenotfounderror",
    "importerror",
    "no module named",
    "cannot find module",
    "err_module_not_found",
];
const RESOURCE_MARKERS: &[&str] = &["timeout", "timed out", "memoryerror", "out of memory", "resource"];
const LOGIC_MARKERS: &[&str] = &[
    "attributeerror",
    "nameerror",
    "typeerror",
    "referenceerror",
    "is not defined",
    "is not a function",
];

/// Stateless helpers turning raw error text into [`Diagnostic`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorAnalyzer;

impl ErrorAnalyzer {
    #[must_use]
    pub fn classify(message: &str) -> IssueKind {
        let lower = message.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if has(SYNTAX_MARKERS) {
            IssueKind::Syntax
        } else if has(DEPENDENCY_MARKERS) {
            IssueKind::Dependency
        } else if has(RESOURCE_MARKERS) {
            IssueKind::Resource
        } else if has(LOGIC_MARKERS) {
            IssueKind::Logic
        } else if lower.trim().is_empty() {
            IssueKind::Unknown
        } else {
            IssueKind::Runtime
        }
    }

    /// Last line number mentioned in `message`; tracebacks list the failing frame last
    #[must_use]
    pub fn extract_line(message: &str) -> Option<usize> {
        let last_match = |pattern: &Lazy<Option<Regex>>| {
            pattern.as_ref().and_then(|re| {
                re.captures_iter(message)
                    .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
                    .last()
            })
        };
        last_match(&LINE_WORD).or_else(|| last_match(&LINE_COLON))
    }

    /// Reduce interpreter stderr to one diagnostic
    #[must_use]
    pub fn diagnose(stderr: &str) -> Diagnostic {
        let kind = Self::classify(stderr);
        let summary = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("process failed without output");

        let diagnostic = Diagnostic::new(kind, summary);
        match Self::extract_line(stderr) {
            Some(line) => diagnostic.at_line(line),
            None => diagnostic,
        }
    }

    /// Fix hints for a diagnostic
    #[must_use]
    pub fn suggestions(diagnostic: &Diagnostic) -> Vec<String> {
        let lower = diagnostic.message.to_lowercase();
        let mut hints = Vec::new();

        match diagnostic.kind {
            IssueKind::Syntax => {
                if lower.contains("indent") {
                    hints.push("Check indentation levels".to_string());
                }
                if lower.contains("unexpected eof")
                    || lower.contains("unclosed")
                    || lower.contains("end of input")
                {
                    hints.push("Check for missing closing brackets or parentheses".to_string());
                }
                if lower.contains("invalid syntax") {
                    hints.push("Check for typos in keywords or operators".to_string());
                }
            }
            IssueKind::Dependency => {
                if let Some(module) = MISSING_MODULE
                    .as_ref()
                    .and_then(|re| re.captures(&diagnostic.message))
                    .and_then(|caps| caps.get(1))
                {
                    hints.push(format!(
                        "Install or remove the missing module '{}'",
                        module.as_str()
                    ));
                }
            }
            IssueKind::Logic => {
                if lower.contains("attributeerror") {
                    hints.push("Check if the object has the specified attribute".to_string());
                }
                if lower.contains("nameerror") || lower.contains("is not defined") {
                    hints.push("Check if the variable is defined before use".to_string());
                }
            }
            IssueKind::Resource => {
                hints.push("Avoid unbounded loops and blocking calls at module level".to_string());
            }
            IssueKind::Runtime | IssueKind::Unknown => {}
        }

        hints
    }

    /// Up to two lines either side of `line`, with the failing line marked
    #[must_use]
    pub fn code_context(code: &str, line: usize) -> Option<String> {
        let lines: Vec<&str> = code.lines().collect();
        if line == 0 || line > lines.len() {
            return None;
        }

        let start = line.saturating_sub(3);
        let end = (line + 2).min(lines.len());
        let rendered: Vec<String> = (start..end)
            .map(|i| {
                let marker = if i + 1 == line { " -> " } else { "    " };
                format!("{:3}{marker}{}", i + 1, lines[i])
            })
            .collect();
        Some(rendered.join("\n"))
    }
}
