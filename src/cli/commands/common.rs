//! Helpers shared by the command implementations

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

use crate::{ExitCode, Language};

/// The command already printed its outcome; only the exit code remains.
#[derive(Debug)]
pub struct AlreadyReported(pub ExitCode);

impl std::fmt::Display for AlreadyReported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "command failed with exit code {}", self.0.as_i32())
    }
}

impl std::error::Error for AlreadyReported {}

/// Contents of `path`, or all of stdin when no path is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read from stdin")?;
            Ok(input)
        }
    }
}

pub fn parse_language(name: &str) -> Language {
    Language::from(name.to_string())
}

/// Pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON output")?;
    println!("{json}");
    Ok(())
}

/// Write `code` to `output`, or to stdout when no path is given
pub fn write_code(code: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let mut contents = code.to_string();
            if !contents.ends_with('\n') {
                contents.push('\n');
            }
            std::fs::write(path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            println!("{code}");
            Ok(())
        }
    }
}

/// First `max` characters of `text` on one line
pub fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    }
}
