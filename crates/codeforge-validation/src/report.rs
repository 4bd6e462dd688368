use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a validation error, used to pick fix guidance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Syntax,
    Runtime,
    Dependency,
    Logic,
    Resource,
    Unknown,
}

/// How urgently an issue should be fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl IssueKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Runtime => "runtime",
            Self::Dependency => "dependency",
            Self::Logic => "logic",
            Self::Resource => "resource",
            Self::Unknown => "unknown",
        }
    }

    /// Label used in fix prompts, e.g. "Syntax error"
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Syntax => "Syntax error",
            Self::Runtime => "Runtime error",
            Self::Dependency => "Dependency error",
            Self::Logic => "Logic error",
            Self::Resource => "Resource error",
            Self::Unknown => "Error",
        }
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Syntax | Self::Runtime => Severity::High,
            Self::Dependency | Self::Logic | Self::Unknown => Severity::Medium,
            Self::Resource => Severity::Low,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: IssueKind,
    pub message: String,
    /// 1-based line in the validated code, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(IssueKind::Syntax, message)
    }

    #[must_use]
    pub const fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.title(), self.message)
    }
}

/// Outcome of one validation call. Built fresh per call and never mutated
/// by consumers; `is_valid` holds exactly when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::passed()
    }
}

impl ValidationReport {
    /// A report with no findings
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    #[must_use]
    pub fn new(errors: Vec<Diagnostic>, warnings: Vec<String>, suggestions: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }

    /// A failing report with a single error
    #[must_use]
    pub fn failed(error: Diagnostic) -> Self {
        Self::new(vec![error], Vec::new(), Vec::new())
    }

    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// First error, which fix prompts are built around
    #[must_use]
    pub fn primary_error(&self) -> Option<&Diagnostic> {
        self.errors.first()
    }

    /// Combine two reports, keeping findings in order and dropping repeats
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        fn extend_unique<T: PartialEq>(into: &mut Vec<T>, from: Vec<T>) {
            for item in from {
                if !into.contains(&item) {
                    into.push(item);
                }
            }
        }

        let mut errors = self.errors;
        let mut warnings = self.warnings;
        let mut suggestions = self.suggestions;
        extend_unique(&mut errors, other.errors);
        extend_unique(&mut warnings, other.warnings);
        extend_unique(&mut suggestions, other.suggestions);
        Self::new(errors, warnings, suggestions)
    }
}
