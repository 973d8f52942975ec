// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of Figment errors into miette diagnostics.
//!
//! Unknown keys get a "did you mean" suggestion (Jaro-Winkler) and, when the
//! offending file is available, a labelled source span.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a key suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(rapport::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path of the unrecognized key, e.g. `timing.gap_mx_secs`.
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for `{key}`: found {found}")]
    #[diagnostic(code(rapport::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(rapport::config::missing_key),
        help("add `{key} = <value>` to rapport.toml")
    )]
    MissingKey { key: String },

    /// A value that deserialized but is out of range or inconsistent.
    #[error("invalid value for `{field}`: {message}")]
    #[diagnostic(code(rapport::config::validation))]
    Validation { field: String, message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(rapport::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? valid keys here: {valid_keys}"),
        None => format!("valid keys here: {valid_keys}"),
    }
}

/// Converts every error carried by a `figment::Error` into a `ConfigError`.
///
/// `sources` pairs a file name (as Figment reports it) with its contents; it
/// is only used to attach spans to unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let suggestion = suggest_key(field, expected);
                    let (span, src) = match source_for(&error, sources) {
                        Some((name, content)) => locate_key(content, &section, field)
                            .map(|offset| {
                                (
                                    Some(SourceSpan::new(offset.into(), field.len())),
                                    Some(NamedSource::new(name, content.to_string())),
                                )
                            })
                            .unwrap_or((None, None)),
                        None => (None, None),
                    };
                    ConfigError::UnknownKey {
                        key: dotted(&section, field),
                        suggestion,
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(&section, field),
                },
                Kind::InvalidType(found, expected) => ConfigError::InvalidType {
                    key: section.join("."),
                    found: found.to_string(),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn dotted(section: &[String], field: &str) -> String {
    if section.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", section.join("."))
    }
}

fn source_for<'a>(
    error: &figment::Error,
    sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let reported = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .map(|s| match s {
            figment::Source::File(path) => path.display().to_string(),
            _ => "<inline>".to_string(),
        })?;
    sources
        .iter()
        .find(|(name, _)| *name == reported)
        .map(|(name, content)| (name.as_str(), content.as_str()))
}

/// Byte offset of `field` inside the `[section]` table of `content`.
///
/// Tracks table headers line by line, so nested tables like
/// `[timing.late_night]` are matched exactly rather than by prefix.
pub fn locate_key(content: &str, section: &[String], field: &str) -> Option<usize> {
    let wanted = section.join(".");
    let mut current = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(header) = trimmed.strip_prefix('[') {
            if let Some(end) = header.find(']') {
                current = header[..end].trim().to_string();
            }
        } else if current == wanted
            && let Some(after) = trimmed.strip_prefix(field)
            && matches!(after.trim_start().chars().next(), Some('='))
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }

    None
}

/// Closest valid key above the similarity threshold, if any.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Renders diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_typo() {
        let valid = &["gap_min_secs", "gap_max_secs", "typing_base_ms"];
        assert_eq!(
            suggest_key("gap_mx_secs", valid),
            Some("gap_max_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_unrelated_key() {
        let valid = &["probability", "max_attempts"];
        assert_eq!(suggest_key("zzzz", valid), None);
    }

    #[test]
    fn locates_key_in_nested_table_only() {
        let content = "[timing]\nenabled = 1\n\n[timing.late_night]\nenabld = true\n";
        let section = vec!["timing".to_string(), "late_night".to_string()];
        let offset = locate_key(content, &section, "enabld").unwrap();
        assert_eq!(&content[offset..offset + 6], "enabld");

        let outer = vec!["timing".to_string()];
        assert_eq!(locate_key(content, &outer, "enabld"), None);
    }

    #[test]
    fn locates_top_level_key() {
        let content = "bogus = 1\n[agent]\nname = \"x\"\n";
        assert_eq!(locate_key(content, &[], "bogus"), Some(0));
    }
}
