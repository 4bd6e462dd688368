use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target language of a generation request.
///
/// Parsing is case-insensitive and accepts common aliases (`py`, `js`, `ts`, `rs`).
/// Anything unrecognised is kept verbatim as [`Language::Other`] so that callers can
/// still generate code for it; validators treat such languages as best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Html,
    Css,
    Rust,
    Other(String),
}

impl Language {
    /// Canonical lowercase name, also used as the code fence tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Html => "html",
            Self::Css => "css",
            Self::Rust => "rust",
            Self::Other(name) => name,
        }
    }

    /// Fence tags a model may use for this language
    #[must_use]
    pub fn fence_aliases(&self) -> &[&'static str] {
        match self {
            Self::Python => &["python", "py", "python3"],
            Self::JavaScript => &["javascript", "js", "jsx", "node"],
            Self::TypeScript => &["typescript", "ts", "tsx"],
            Self::Html => &["html", "htm"],
            Self::Css => &["css"],
            Self::Rust => &["rust", "rs"],
            Self::Other(_) => &[],
        }
    }

    /// Languages written as statements and blocks rather than markup
    #[must_use]
    pub const fn is_programming(&self) -> bool {
        matches!(
            self,
            Self::Python | Self::JavaScript | Self::TypeScript | Self::Rust
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "python" | "py" | "python3" => Self::Python,
            "javascript" | "js" | "node" | "jsx" => Self::JavaScript,
            "typescript" | "ts" | "tsx" => Self::TypeScript,
            "html" | "htm" => Self::Html,
            "css" => Self::Css,
            "rust" | "rs" => Self::Rust,
            _ => Self::Other(normalized),
        })
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(lang) => lang,
            Err(never) => match never {},
        }
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("PY".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("js".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!(" Rust ".parse::<Language>().unwrap(), Language::Rust);
        assert_eq!(
            "Kotlin".parse::<Language>().unwrap(),
            Language::Other("kotlin".to_string())
        );
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&Language::TypeScript).unwrap();
        assert_eq!(json, "\"typescript\"");

        let lang: Language = serde_json::from_str("\"htm\"").unwrap();
        assert_eq!(lang, Language::Html);
    }

    #[test]
    fn test_programming_languages() {
        assert!(Language::Python.is_programming());
        assert!(!Language::Html.is_programming());
        assert!(!Language::Other("sql".to_string()).is_programming());
    }
}
