//! Tree-sitter parsing for the languages with a bundled grammar
//!
//! A parse tree containing `ERROR` or `MISSING` nodes is a syntax error.
//! Only the outermost node of an error subtree is reported.

use tracing::warn;
use tree_sitter::{Language as Grammar, Node, Parser};

use codeforge_utils::Language;

use crate::report::Diagnostic;

/// Errors reported for one parse
const MAX_REPORTED: usize = 5;

/// Longest source excerpt quoted in a diagnostic
const MAX_EXCERPT: usize = 40;

fn grammar_for(language: &Language) -> Option<Grammar> {
    let grammar = match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Html | Language::Css | Language::Other(_) => return None,
    };
    Some(grammar)
}

/// Syntax errors in `code`, or `None` when no grammar is bundled for `language`
pub(crate) fn parse_errors(code: &str, language: &Language) -> Option<Vec<Diagnostic>> {
    let grammar = grammar_for(language)?;
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        warn!(language = %language, error = %e, "Grammar rejected by tree-sitter");
        return None;
    }
    let Some(tree) = parser.parse(code, None) else {
        return Some(vec![Diagnostic::syntax("Parser gave up on the input")]);
    };

    let root = tree.root_node();
    if !root.has_error() {
        return Some(Vec::new());
    }
    let mut errors = Vec::new();
    collect(root, code, &mut errors);
    if errors.is_empty() {
        // has_error() without a visible node: report the root span
        errors.push(Diagnostic::syntax("Invalid syntax").at_line(root.start_position().row + 1));
    }
    Some(errors)
}

fn collect(node: Node<'_>, code: &str, errors: &mut Vec<Diagnostic>) {
    if errors.len() >= MAX_REPORTED {
        return;
    }
    if node.is_missing() || node.is_error() {
        errors.push(describe(node, code));
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, code, errors);
    }
}

fn describe(node: Node<'_>, code: &str) -> Diagnostic {
    let line = node.start_position().row + 1;
    if node.is_missing() {
        return Diagnostic::syntax(format!("Expected '{}' at line {line}", node.kind()))
            .at_line(line);
    }
    let excerpt = code
        .get(node.byte_range())
        .and_then(|text| text.lines().find(|l| !l.trim().is_empty()))
        .map(str::trim)
        .unwrap_or_default();
    let message = if excerpt.is_empty() {
        format!("Invalid syntax at line {line}")
    } else {
        let mut end = excerpt.len().min(MAX_EXCERPT);
        while !excerpt.is_char_boundary(end) {
            end -= 1;
        }
        format!("Invalid syntax at line {line}: `{}`", &excerpt[..end])
    };
    Diagnostic::syntax(message).at_line(line)
}
