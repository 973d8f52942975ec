// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort parsers for summary and sentiment output.

use std::sync::LazyLock;

use regex::Regex;
use rapport_core::error::RapportError;

static SIGNED_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+\u{2212}]?(?:\d+(?:\.\d+)?|\.\d+)").expect("static regex is valid")
});

static SUMMARY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?summary(?:\*\*)?\s*:\s*(?:\*\*)?").expect("static regex is valid")
});

/// First signed decimal number in `raw`, clamped to `[-max_abs, max_abs]`.
pub fn parse_sentiment(raw: &str, max_abs: f64) -> Result<f64, RapportError> {
    let parse_err = || RapportError::Parse {
        what: "sentiment".to_string(),
        raw: raw.to_string(),
    };
    let found = SIGNED_DECIMAL.find(raw).ok_or_else(parse_err)?;
    let value: f64 = found
        .as_str()
        .replace('\u{2212}', "-")
        .parse()
        .map_err(|_| parse_err())?;
    if !value.is_finite() {
        return Err(parse_err());
    }
    Ok(value.clamp(-max_abs, max_abs))
}

/// Summary text with an optional leading `Summary:` label removed, limited
/// to `max_chars` characters.
pub fn parse_summary(raw: &str, max_chars: usize) -> Result<String, RapportError> {
    let text = SUMMARY_LABEL.replace(raw, "");
    let text = text.trim();
    if text.is_empty() {
        return Err(RapportError::Parse {
            what: "summary".to_string(),
            raw: raw.to_string(),
        });
    }
    Ok(truncate_chars(text, max_chars))
}

/// Cuts at the last whitespace before `max_chars` when there is one.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(i) if i > 0 => cut[..i].trim_end().to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_takes_first_signed_number() {
        assert_eq!(parse_sentiment("0.1", 0.2).unwrap(), 0.1);
        assert_eq!(parse_sentiment("-0.15", 0.2).unwrap(), -0.15);
        assert_eq!(parse_sentiment("Score: +0.05 (warm)", 0.2).unwrap(), 0.05);
        assert_eq!(parse_sentiment("-.1 then 0.2", 0.2).unwrap(), -0.1);
    }

    #[test]
    fn sentiment_is_clamped() {
        assert_eq!(parse_sentiment("0.9", 0.2).unwrap(), 0.2);
        assert_eq!(parse_sentiment("-3", 0.2).unwrap(), -0.2);
    }

    #[test]
    fn sentiment_without_number_is_parse_error() {
        let err = parse_sentiment("pretty positive overall", 0.2).unwrap_err();
        assert!(matches!(err, RapportError::Parse { ref what, .. } if what == "sentiment"));
        assert!(err.is_generation_failure());
    }

    #[test]
    fn unicode_minus_is_accepted() {
        assert_eq!(parse_sentiment("\u{2212}0.1", 0.2).unwrap(), -0.1);
    }

    #[test]
    fn summary_label_is_stripped() {
        assert_eq!(
            parse_summary("Summary: They bonded over hiking.", 100).unwrap(),
            "They bonded over hiking."
        );
        assert_eq!(
            parse_summary("**SUMMARY:** Talked about dogs.", 100).unwrap(),
            "Talked about dogs."
        );
        assert_eq!(
            parse_summary("No label here.", 100).unwrap(),
            "No label here."
        );
    }

    #[test]
    fn empty_summary_is_parse_error() {
        assert!(parse_summary("Summary:   ", 100).is_err());
        assert!(parse_summary("", 100).is_err());
    }

    #[test]
    fn summary_is_bounded() {
        let long = "word ".repeat(200);
        let summary = parse_summary(&long, 50).unwrap();
        assert!(summary.chars().count() <= 50);
        assert!(summary.ends_with("word"));
    }
}
