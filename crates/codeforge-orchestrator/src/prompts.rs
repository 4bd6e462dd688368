//! Prompt text sent to models

use codeforge_budget::TokenBudgetEstimator;
use codeforge_utils::Language;
use codeforge_validation::{ErrorAnalyzer, ValidationReport};

use crate::templates::Template;

fn language_guidelines(language: &Language) -> &'static [&'static str] {
    match language {
        Language::Python => &[
            "Follow PEP 8 style guidelines.",
            "Use type hints where appropriate.",
            "Include docstrings for functions and classes.",
        ],
        Language::JavaScript => &[
            "Use modern JavaScript (ES6+) features.",
            "Include JSDoc comments for functions.",
            "Handle async operations properly.",
        ],
        Language::TypeScript => &[
            "Use strict, explicit types and avoid any.",
            "Include TSDoc comments for exported functions.",
            "Handle async operations properly.",
        ],
        Language::Html => &[
            "Use semantic HTML elements.",
            "Include proper accessibility attributes.",
            "Produce a complete document with doctype, head and body.",
        ],
        Language::Css => &[
            "Group rules by component and keep selectors shallow.",
            "Use custom properties for repeated values.",
            "Avoid !important.",
        ],
        Language::Rust => &[
            "Write idiomatic Rust that compiles on stable.",
            "Return Result and propagate errors with ? instead of panicking.",
            "Include doc comments for public items.",
        ],
        Language::Other(_) => &[],
    }
}

/// System message sent with every generation call
#[must_use]
pub fn system_prompt(language: &Language, template: Option<&Template>) -> String {
    let mut lines = vec![
        format!("Generate {language} code."),
        format!("Follow {language} best practices and coding standards."),
        "Include proper error handling and documentation.".to_string(),
        "Make the code production-ready and maintainable.".to_string(),
    ];
    if let Some(template) = template {
        lines.push(format!(
            "Use this template structure, replacing each {{placeholder}}:\n{}",
            template.body
        ));
    }
    lines.extend(language_guidelines(language).iter().map(|s| (*s).to_string()));
    lines.push(format!(
        "Return only the code in a single ```{language} fenced block, without explanations."
    ));
    lines.join("\n")
}

/// User message for chunk `index` of `total`.
///
/// `carried` is the trailing window of the previous chunk's output.
#[must_use]
pub fn chunk_prompt(
    language: &Language,
    chunk_text: &str,
    index: usize,
    total: usize,
    carried: Option<&str>,
) -> String {
    let mut prompt = String::new();
    if total > 1 {
        prompt.push_str(&format!(
            "This is part {} of {total} of a larger request. Generate only the code for this part; \
             the parts are joined in order.\n\n",
            index + 1
        ));
    }
    if let Some(carried) = carried.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!(
            "The previous part ended with:\n```{language}\n{carried}\n```\nContinue from there without repeating it.\n\n"
        ));
    }
    prompt.push_str(chunk_text);
    prompt
}

/// Planning input for a fix iteration: the failing code plus its diagnostics
#[must_use]
pub fn fix_prompt(language: &Language, code: &str, report: &ValidationReport) -> String {
    let mut parts = vec![format!("Fix the following {language} code error:")];

    if let Some(primary) = report.primary_error() {
        parts.push(format!("Error Type: {}", primary.kind.title()));
        parts.push(format!("Error Message: {}", primary.message));
        if let Some(line) = primary.line {
            parts.push(format!("Error Line: {line}"));
            if let Some(context) = ErrorAnalyzer::code_context(code, line) {
                parts.push(format!("Error Context:\n{context}"));
            }
        }
    }
    if report.errors.len() > 1 {
        parts.push("Other Errors:".to_string());
        parts.extend(report.errors.iter().skip(1).map(|e| format!("- {e}")));
    }
    if !report.suggestions.is_empty() {
        parts.push(format!("Suggestions: {}", report.suggestions.join(", ")));
    }

    parts.push(String::new());
    parts.push("Original Code:".to_string());
    parts.push(code.to_string());
    parts.push(String::new());
    parts.push(
        "Provide the corrected code with the fix applied. Only return the corrected code, no explanations."
            .to_string(),
    );
    parts.join("\n")
}

/// Placeholder window used to measure the carried-context wrapper; a blank
/// window would drop the wrapper from the measurement
const WINDOW_PLACEHOLDER: &str = "x";

/// Tokens of fixed scaffolding around every chunk, reserved by the planner.
///
/// Covers the system prompt, the multi-part framing and the wrapper around
/// a carried window. The window itself is reserved separately by the planner;
/// the placeholder's own token is left in.
#[must_use]
pub fn scaffold_tokens(
    language: &Language,
    template: Option<&Template>,
    estimator: &TokenBudgetEstimator,
) -> usize {
    let framing = chunk_prompt(language, "", 999, 999, Some(WINDOW_PLACEHOLDER));
    estimator.estimate_conservative(&system_prompt(language, template))
        + estimator.estimate_conservative(&framing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeforge_config::Config;
    use codeforge_validation::Diagnostic;

    use crate::templates::find_template;

    #[test]
    fn test_system_prompt_has_language_guidelines() {
        let prompt = system_prompt(&Language::Python, None);
        assert!(prompt.starts_with("Generate python code."));
        assert!(prompt.contains("PEP 8"));
        assert!(prompt.contains("```python"));
        assert!(!prompt.contains("template structure"));

        let other = system_prompt(&Language::Other("sql".to_string()), None);
        assert!(!other.contains("PEP 8"));
    }

    #[test]
    fn test_system_prompt_embeds_template() {
        let template = find_template(&Language::JavaScript, "async_function");
        let prompt = system_prompt(&Language::JavaScript, template);
        assert!(prompt.contains("Use this template structure, replacing each {placeholder}:\n"));
        assert!(prompt.contains("async function {function_name}({parameters}) {"));
        // Template sits before the language guidelines
        let at_template = prompt.find("template structure").unwrap();
        assert!(at_template < prompt.find("ES6+").unwrap());
    }

    #[test]
    fn test_single_chunk_prompt_is_the_text() {
        assert_eq!(
            chunk_prompt(&Language::Python, "write fizzbuzz", 0, 1, None),
            "write fizzbuzz"
        );
    }

    #[test]
    fn test_multi_part_framing_and_carried_window() {
        let prompt = chunk_prompt(&Language::Rust, "part two", 1, 3, Some("fn a() {}"));
        assert!(prompt.starts_with("This is part 2 of 3"));
        assert!(prompt.contains("```rust\nfn a() {}\n```"));
        assert!(prompt.ends_with("part two"));

        let blank = chunk_prompt(&Language::Rust, "x", 1, 3, Some("  "));
        assert!(!blank.contains("previous part"));
    }

    #[test]
    fn test_fix_prompt_shape() {
        let report = ValidationReport::new(
            vec![
                Diagnostic::syntax("Expected ':' at line 2").at_line(2),
                Diagnostic::syntax("Unclosed '(' opened at line 3").at_line(3),
            ],
            vec!["ignored warning".to_string()],
            vec!["Check indentation levels".to_string()],
        );
        let code = "x = 1\ndef f()\n    return (x\n";
        let prompt = fix_prompt(&Language::Python, code, &report);

        assert!(prompt.starts_with("Fix the following python code error:\nError Type: Syntax error\n"));
        assert!(prompt.contains("Error Message: Expected ':' at line 2"));
        assert!(prompt.contains("Error Line: 2"));
        assert!(prompt.contains("  2 -> def f()"));
        assert!(prompt.contains("- Syntax error: Unclosed '(' opened at line 3"));
        assert!(prompt.contains("Suggestions: Check indentation levels"));
        assert!(prompt.contains("Original Code:\nx = 1\ndef f()"));
        assert!(prompt.ends_with("Only return the corrected code, no explanations."));
        assert!(!prompt.contains("ignored warning"));
    }

    #[test]
    fn test_scaffold_tokens_cover_prompts() {
        let config = Config::minimal_for_testing();
        let estimator = TokenBudgetEstimator::from_config(&config).unwrap();
        let language = Language::JavaScript;
        let overhead = scaffold_tokens(&language, None, &estimator);
        assert!(overhead < 300);

        // A real carried-context chunk: everything but the window and the text
        let window = "const total = items.reduce((a, b) => a + b, 0);\nexport default total;";
        let framing = chunk_prompt(&language, "", 1, 12, Some(window));
        assert!(framing.contains("The previous part ended with:"));
        let system = estimator.estimate_conservative(&system_prompt(&language, None));
        let wrapper = estimator
            .estimate_conservative(&framing)
            .saturating_sub(estimator.estimate_conservative(window));
        assert!(
            overhead >= system + wrapper,
            "scaffold {overhead} < system {system} + framing {wrapper}"
        );

        let template = find_template(&language, "class");
        assert!(scaffold_tokens(&language, template, &estimator) > overhead);
    }
}
