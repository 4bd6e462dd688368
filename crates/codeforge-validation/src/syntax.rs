//! In-process syntax and lint checks
//!
//! Python, JavaScript, TypeScript and Rust are parsed with tree-sitter; CSS
//! gets a bracket balance check and HTML a structural one. Security and
//! style findings are warnings or suggestions and never fail a report.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use codeforge_utils::Language;

use crate::Validator;
use crate::delimiters::{Lexicon, check_delimiters};
use crate::grammar::parse_errors;
use crate::report::{Diagnostic, ValidationReport};

static PY_FUNCTION: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\bdef\s+\w+\s*\(").ok());

static HTML_OPEN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)<html[\s>]").ok());
static HTML_DOCTYPE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)<!DOCTYPE\s+html>").ok());
static HTML_HEAD: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?is)<head[\s>].*</head>").ok());
static HTML_BODY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?is)<body[\s>].*</body>").ok());
static HTML_JS_URL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)javascript:").ok());
static HTML_INLINE_HANDLER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)<[^>]+\son[a-z]+\s*="#).ok());
static HTML_IMG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").ok());

fn matches(pattern: &Lazy<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

/// Validator that needs no external tools
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxValidator;

impl SyntaxValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Synchronous entry point shared by the trait impl and offline callers
    #[must_use]
    pub fn check(&self, code: &str, language: &Language) -> ValidationReport {
        if code.trim().is_empty() {
            return ValidationReport::failed(Diagnostic::syntax("No code was generated"));
        }

        let report = match language {
            Language::Python => check_python(code),
            Language::JavaScript | Language::TypeScript => check_javascript(code, language),
            Language::Rust => check_rust(code),
            Language::Html => check_html(code),
            Language::Css => check_css(code),
            Language::Other(name) => ValidationReport::passed()
                .with_warning(format!("No validator available for language: {name}")),
        };

        debug!(
            language = %language,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Syntax check complete"
        );
        report
    }
}

#[async_trait]
impl Validator for SyntaxValidator {
    async fn validate(&self, code: &str, language: &Language) -> ValidationReport {
        self.check(code, language)
    }
}

fn delimiter_errors(code: &str, language: &Language) -> Vec<Diagnostic> {
    Lexicon::for_language(language)
        .and_then(|lexicon| check_delimiters(code, lexicon))
        .map(Diagnostic::from)
        .into_iter()
        .collect()
}

/// Grammar errors decide validity. When there are any, a bracket diagnostic
/// leads because it names both ends of the imbalance.
fn structural_errors(code: &str, language: &Language) -> Vec<Diagnostic> {
    let Some(parsed) = parse_errors(code, language) else {
        return delimiter_errors(code, language);
    };
    if parsed.is_empty() {
        return parsed;
    }
    let mut errors = delimiter_errors(code, language);
    errors.extend(parsed);
    errors
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn check_python(code: &str) -> ValidationReport {
    let errors = structural_errors(code, &Language::Python);

    let mut warnings = Vec::new();
    if code.contains("os.system") {
        warnings.push("Consider using subprocess instead of os.system for security".to_string());
    }
    if code.contains("eval(") {
        warnings.push("Avoid using eval() for security reasons".to_string());
    }
    if code.contains("exec(") {
        warnings.push("Avoid using exec() for security reasons".to_string());
    }
    let indents: Vec<&str> = code
        .lines()
        .map(|l| &l[..indent_width(l)])
        .filter(|indent| !indent.is_empty())
        .collect();
    if indents.iter().any(|i| i.contains('\t')) && indents.iter().any(|i| i.contains(' ')) {
        warnings.push("Inconsistent use of tabs and spaces in indentation".to_string());
    }

    let mut suggestions = Vec::new();
    if !matches(&PY_FUNCTION, code) && code.lines().count() > 5 {
        suggestions.push("Consider organizing code into functions".to_string());
    }

    ValidationReport::new(errors, warnings, suggestions)
}

fn check_javascript(code: &str, language: &Language) -> ValidationReport {
    let errors = structural_errors(code, language);

    let mut warnings = Vec::new();
    if code.contains("eval(") {
        warnings.push("Avoid using eval() for security reasons".to_string());
    }
    if code.contains("innerHTML") {
        warnings
            .push("Consider using textContent or proper sanitization with innerHTML".to_string());
    }

    let mut suggestions = Vec::new();
    if code.lines().any(|l| l.trim_start().starts_with("var ")) {
        suggestions.push("Consider using 'let' or 'const' instead of 'var'".to_string());
    }

    ValidationReport::new(errors, warnings, suggestions)
}

fn check_rust(code: &str) -> ValidationReport {
    let errors = structural_errors(code, &Language::Rust);

    let mut warnings = Vec::new();
    if code.contains("unsafe ") || code.contains("unsafe{") {
        warnings.push("Review unsafe blocks for soundness".to_string());
    }

    let mut suggestions = Vec::new();
    if code.contains(".unwrap()") {
        suggestions.push("Consider propagating errors with ? instead of unwrap()".to_string());
    }

    ValidationReport::new(errors, warnings, suggestions)
}

fn check_html(code: &str) -> ValidationReport {
    let mut errors = Vec::new();
    if !matches(&HTML_OPEN, code) {
        errors.push(Diagnostic::syntax("Missing <html> tag"));
    }

    let mut warnings = Vec::new();
    if !matches(&HTML_DOCTYPE, code) {
        warnings.push("Missing DOCTYPE declaration".to_string());
    }
    if !matches(&HTML_HEAD, code) {
        warnings.push("Missing <head> section".to_string());
    }
    if !matches(&HTML_BODY, code) {
        warnings.push("Missing <body> section".to_string());
    }
    if matches(&HTML_JS_URL, code) {
        warnings.push("Avoid inline javascript: URLs for security".to_string());
    }
    if matches(&HTML_INLINE_HANDLER, code) {
        warnings.push("Consider using event listeners instead of inline event handlers".to_string());
    }

    let mut suggestions = Vec::new();
    let img_without_alt = HTML_IMG.as_ref().is_some_and(|re| {
        re.find_iter(code)
            .any(|tag| !tag.as_str().to_ascii_lowercase().contains("alt="))
    });
    if img_without_alt {
        suggestions.push("Add alt attributes to images for accessibility".to_string());
    }

    ValidationReport::new(errors, warnings, suggestions)
}

fn check_css(code: &str) -> ValidationReport {
    let errors = delimiter_errors(code, &Language::Css);

    let mut warnings = Vec::new();
    let mut in_comment = false;
    for (idx, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("/*") {
            in_comment = !trimmed.contains("*/");
            continue;
        }
        if in_comment {
            in_comment = !trimmed.contains("*/");
            continue;
        }
        let is_declaration = trimmed.contains(':')
            && !trimmed.ends_with(';')
            && !trimmed.ends_with('{')
            && !trimmed.ends_with('}')
            && !trimmed.ends_with(',');
        if is_declaration {
            warnings.push(format!("Missing semicolon at line {}", idx + 1));
        }
    }

    let mut suggestions = Vec::new();
    if code.contains("!important") {
        suggestions.push("Avoid using !important when possible".to_string());
    }

    ValidationReport::new(errors, warnings, suggestions)
}
