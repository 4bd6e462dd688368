use std::collections::HashSet;

use tracing::debug;

use codeforge_config::ChunkingConfig;
use codeforge_utils::Language;

use crate::trailing_window;

/// Merges per-chunk model outputs into one artifact.
#[derive(Debug, Clone)]
pub struct OutputAssembler {
    language: Language,
    context_lines: usize,
    context_tokens: usize,
    chars_per_token: usize,
}

impl OutputAssembler {
    #[must_use]
    pub fn new(language: Language, chunking: &ChunkingConfig, chars_per_token: usize) -> Self {
        Self {
            language,
            context_lines: chunking.context_lines,
            context_tokens: chunking.context_tokens,
            chars_per_token,
        }
    }

    /// Context window carried from `previous_output` into the next chunk's prompt
    #[must_use]
    pub fn carried_context<'a>(&self, previous_output: &'a str) -> &'a str {
        trailing_window(
            previous_output,
            self.context_lines,
            self.context_tokens,
            self.chars_per_token,
        )
    }

    /// Drop a repeat of the carried window from the start of `output`
    #[must_use]
    pub fn strip_carried_prefix<'a>(&self, previous_output: &str, output: &'a str) -> &'a str {
        let window = self.carried_context(previous_output);
        if window.trim().is_empty() {
            return output;
        }
        let body = output.trim_start_matches(['\n', '\r']);
        match body.strip_prefix(window) {
            Some(rest) => rest.strip_prefix('\n').unwrap_or(rest),
            None => output,
        }
    }

    /// Join outputs in order, removing carried-window repeats.
    ///
    /// Multi-part Python output additionally gets its imports hoisted to the
    /// top and de-duplicated.
    #[must_use]
    pub fn assemble(&self, outputs: &[String]) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(outputs.len());
        for (i, output) in outputs.iter().enumerate() {
            let part = match i.checked_sub(1).and_then(|prev| outputs.get(prev)) {
                Some(previous) => self.strip_carried_prefix(previous, output),
                None => output.as_str(),
            };
            let part = part.trim_end_matches(['\n', '\r']);
            if !part.trim().is_empty() {
                parts.push(part);
            }
        }

        let joined = parts.join("\n");
        let merged = if self.language == Language::Python && parts.len() > 1 {
            hoist_python_imports(&joined)
        } else {
            joined
        };

        debug!(parts = parts.len(), bytes = merged.len(), "Assembled chunk outputs");

        if merged.is_empty() {
            merged
        } else {
            format!("{merged}\n")
        }
    }
}

fn is_import_line(line: &str) -> bool {
    line.starts_with("import ") || (line.starts_with("from ") && line.contains(" import "))
}

/// Move top-level imports ahead of all other code, keeping first-seen order
fn hoist_python_imports(code: &str) -> String {
    let mut imports: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut body: Vec<&str> = Vec::new();
    let mut lines = code.lines();

    while let Some(line) = lines.next() {
        if !is_import_line(line) {
            body.push(line);
            continue;
        }

        let mut statement = line.trim_end().to_string();
        if line.contains('(') && !line.contains(')') {
            for continuation in lines.by_ref() {
                statement.push('\n');
                statement.push_str(continuation.trim_end());
                if continuation.contains(')') {
                    break;
                }
            }
        }
        if seen.insert(statement.clone()) {
            imports.push(statement);
        }
    }

    if imports.is_empty() {
        return code.to_string();
    }

    // `from __future__` imports must stay first
    imports.sort_by_key(|stmt| !stmt.starts_with("from __future__"));

    let body = body.join("\n");
    let body = body.trim_start_matches('\n');
    if body.is_empty() {
        imports.join("\n")
    } else {
        format!("{}\n\n{}", imports.join("\n"), body)
    }
}
