//! Built-in code templates
//!
//! A template is a structural skeleton with `{placeholder}` slots. It is
//! shown to the model as the shape to follow, never filled in locally.

use codeforge_utils::Language;

/// One named skeleton for a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub body: &'static str,
}

const PYTHON: &[Template] = &[
    Template {
        name: "function",
        body: r#"def {function_name}({parameters}):
    """
    {description}

    Args:
        {args_doc}

    Returns:
        {return_doc}
    """
    {body}
    return {return_value}"#,
    },
    Template {
        name: "class",
        body: r#"class {class_name}:
    """
    {description}
    """

    def __init__(self{init_params}):
        {init_body}

    {methods}"#,
    },
    Template {
        name: "api_endpoint",
        body: r#"@app.{method}("/{endpoint}")
async def {function_name}({parameters}):
    """
    {description}
    """
    try:
        {body}
        return {"status": "success", "data": result}
    except Exception as e:
        raise HTTPException(status_code=500, detail=str(e))"#,
    },
];

const JAVASCRIPT: &[Template] = &[
    Template {
        name: "function",
        body: "function {function_name}({parameters}) {
    /**
     * {description}
     * @param {{param_types}} {parameters}
     * @returns {{return_type}}
     */
    {body}
}",
    },
    Template {
        name: "class",
        body: "class {class_name} {
    /**
     * {description}
     */
    constructor({constructor_params}) {
        {constructor_body}
    }

    {methods}
}",
    },
    Template {
        name: "async_function",
        body: "async function {function_name}({parameters}) {
    /**
     * {description}
     * @param {{param_types}} {parameters}
     * @returns {Promise<{return_type}>}
     */
    try {
        {body}
    } catch (error) {
        console.error('Error in {function_name}:', error);
        throw error;
    }
}",
    },
];

const HTML: &[Template] = &[
    Template {
        name: "page",
        body: r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    {additional_head}
</head>
<body>
    {body}
    {scripts}
</body>
</html>"#,
    },
    Template {
        name: "component",
        body: r#"<div class="{classes}">
    <h2>{title}</h2>
    {content}
</div>"#,
    },
    Template {
        name: "form",
        body: r#"<form onsubmit="{onsubmit}">
    {fields}
    <button type="submit">
        {submit_text}
    </button>
</form>"#,
    },
];

const CSS: &[Template] = &[
    Template {
        name: "utility_class",
        body: ".{class_name} {
    {properties}
}",
    },
    Template {
        name: "component",
        body: ".{component_name} {
    {base_styles}
}

.{component_name}:hover {
    {hover_styles}
}

.{component_name}:focus {
    {focus_styles}
}",
    },
    Template {
        name: "responsive",
        body: "/* Mobile */
@media (max-width: 768px) {
    .{class_name} {
        {mobile_styles}
    }
}

/* Tablet */
@media (min-width: 769px) and (max-width: 1024px) {
    .{class_name} {
        {tablet_styles}
    }
}

/* Desktop */
@media (min-width: 1025px) {
    .{class_name} {
        {desktop_styles}
    }
}",
    },
];

const RUST: &[Template] = &[Template {
    name: "function",
    body: "/// {description}
///
/// # Errors
///
/// {errors_doc}
pub fn {function_name}({parameters}) -> Result<{return_type}, {error_type}> {
    {body}
}",
}];

/// Every template shipped for `language`
#[must_use]
pub fn templates_for(language: &Language) -> &'static [Template] {
    match language {
        Language::Python => PYTHON,
        Language::JavaScript | Language::TypeScript => JAVASCRIPT,
        Language::Html => HTML,
        Language::Css => CSS,
        Language::Rust => RUST,
        Language::Other(_) => &[],
    }
}

/// Look up a template by name; names are matched case-insensitively
#[must_use]
pub fn find_template(language: &Language, name: &str) -> Option<&'static Template> {
    templates_for(language)
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_language_and_name() {
        let t = find_template(&Language::Python, "Class").unwrap();
        assert_eq!(t.name, "class");
        assert!(t.body.starts_with("class {class_name}:"));

        assert!(find_template(&Language::Css, "responsive").is_some());
        assert!(find_template(&Language::Python, "form").is_none());
        assert!(find_template(&Language::Other("sql".into()), "function").is_none());
    }

    #[test]
    fn test_typescript_shares_javascript_templates() {
        assert_eq!(
            templates_for(&Language::TypeScript),
            templates_for(&Language::JavaScript)
        );
    }

    #[test]
    fn test_names_are_unique_per_language() {
        for language in [
            Language::Python,
            Language::JavaScript,
            Language::Html,
            Language::Css,
            Language::Rust,
        ] {
            let mut names: Vec<&str> = templates_for(&language).iter().map(|t| t.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), templates_for(&language).len());
        }
    }
}
