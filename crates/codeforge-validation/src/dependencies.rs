use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use codeforge_utils::Language;

static ES_IMPORT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*import\s+(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#).ok());

static REQUIRE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).ok());

/// External modules referenced by `code`, sorted and de-duplicated.
///
/// Python yields top-level package names; JavaScript and TypeScript yield
/// module specifiers as written. Relative Python imports are skipped.
#[must_use]
pub fn extract_dependencies(code: &str, language: &Language) -> Vec<String> {
    let found = match language {
        Language::Python => python_imports(code),
        Language::JavaScript | Language::TypeScript => javascript_imports(code),
        _ => BTreeSet::new(),
    };
    found.into_iter().collect()
}

fn python_imports(code: &str) -> BTreeSet<String> {
    let root = |module: &str| module.split('.').next().unwrap_or(module).trim().to_string();
    let mut found = BTreeSet::new();

    for line in code.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("import ") {
            for item in rest.split(',') {
                let module = item.split_whitespace().next().unwrap_or("");
                if !module.is_empty() {
                    found.insert(root(module));
                }
            }
        } else if let Some(rest) = line.strip_prefix("from ") {
            let module = rest.split_whitespace().next().unwrap_or("");
            if !module.is_empty() && !module.starts_with('.') && module != "__future__" {
                found.insert(root(module));
            }
        }
    }

    found
}

fn javascript_imports(code: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for pattern in [&ES_IMPORT, &REQUIRE] {
        if let Some(re) = pattern.as_ref() {
            found.extend(
                re.captures_iter(code)
                    .filter_map(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string()),
            );
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_roots() {
        let code = "from __future__ import annotations\nimport os.path, sys as system\nfrom collections.abc import Mapping\nfrom . import sibling\nimport requests\nimport os\n";
        assert_eq!(
            extract_dependencies(code, &Language::Python),
            vec!["collections", "os", "requests", "sys"]
        );
    }

    #[test]
    fn test_javascript_specifiers() {
        let code = "import React from 'react';\nimport { readFile } from \"node:fs/promises\";\nimport './side-effect.css';\nconst express = require('express');\n";
        assert_eq!(
            extract_dependencies(code, &Language::JavaScript),
            vec!["./side-effect.css", "express", "node:fs/promises", "react"]
        );
    }

    #[test]
    fn test_other_languages_have_none() {
        assert!(extract_dependencies("use std::io;", &Language::Rust).is_empty());
    }
}
