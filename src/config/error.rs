//! Config errors, printed cargo-style with the offending file and a typo hint.

use std::fmt;
use std::path::PathBuf;
use strsim::jaro_winkler;
use thiserror::Error;

const SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error: cannot read config file\n  --> {}\n  |\n  = {source}\n", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "error: {message}\n  --> {}\n  |\n{}",
        path.display(),
        suggestion.as_ref().map(|s| format!("  = help: did you mean `{s}`?\n")).unwrap_or_default()
    )]
    Parse {
        path: PathBuf,
        message: String,
        suggestion: Option<String>,
    },

    #[error("error: {message}\n  --> {}\n  |\n", path.display())]
    Validation { path: PathBuf, message: String },
}

impl ConfigError {
    /// Wrap a YAML error, suggesting a known key when the error names an
    /// unknown one.
    pub fn from_yaml_error(path: PathBuf, error: impl fmt::Display, known: &[&str]) -> Self {
        let message = error.to_string();
        let suggestion = unknown_field(&message).and_then(|field| suggest(field, known));
        ConfigError::Parse {
            path,
            message,
            suggestion,
        }
    }
}

/// Extract `foo` from serde's "unknown field `foo`, expected ..." wording.
fn unknown_field(message: &str) -> Option<&str> {
    let rest = message.split_once("unknown field `")?.1;
    rest.split_once('`').map(|(field, _)| field)
}

/// Closest known key to `name`, if any is similar enough.
pub fn suggest(name: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|&candidate| (candidate, jaro_winkler(name, candidate)))
        .filter(|(_, score)| *score >= SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, _)| candidate.to_string())
}
