// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splits generated text into discrete chat messages.

/// Opening and closing quote characters stripped when they wrap a whole part.
const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('\u{201C}', '\u{201D}'),
    ('\u{2018}', '\u{2019}'),
    ('\u{00AB}', '\u{00BB}'),
];

/// Markdown markers removed wherever they appear.
const INLINE_MARKERS: &[&str] = &["~~", "__", "*", "`"];

/// Splits a generated blob on a reserved delimiter and cleans each part.
#[derive(Debug, Clone)]
pub struct Segmenter {
    delimiter: String,
}

impl Segmenter {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Ordered, non-empty, sanitized parts of `blob`.
    ///
    /// An empty result means there is nothing to send.
    pub fn segment(&self, blob: &str) -> Vec<String> {
        if self.delimiter.is_empty() {
            return self.clean(blob).into_iter().collect();
        }
        blob.split(self.delimiter.as_str())
            .filter_map(|part| self.clean(part))
            .collect()
    }

    fn clean(&self, part: &str) -> Option<String> {
        let part = self.strip_fragments(part.trim());
        let part = strip_markdown(part);
        let part = strip_quotes(part.trim()).trim();
        (!part.is_empty()).then(|| part.to_string())
    }

    /// Removes leftover pieces of a malformed delimiter: a proper prefix of
    /// it at the end of the part, or a proper suffix at the start.
    fn strip_fragments<'a>(&self, mut part: &'a str) -> &'a str {
        let delim = self.delimiter.as_str();
        let boundaries: Vec<usize> = delim
            .char_indices()
            .map(|(i, _)| i)
            .filter(|i| *i > 0)
            .collect();

        loop {
            let before = part;
            for &i in boundaries.iter().rev() {
                if let Some(rest) = part.strip_suffix(&delim[..i]) {
                    part = rest.trim_end();
                    break;
                }
            }
            for &i in &boundaries {
                if let Some(rest) = part.strip_prefix(&delim[i..]) {
                    part = rest.trim_start();
                    break;
                }
            }
            if part == before {
                return part;
            }
        }
    }
}

fn strip_markdown(part: &str) -> String {
    let mut out = part
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') {
                trimmed.trim_start_matches('#').trim_start()
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    for marker in INLINE_MARKERS {
        out = out.replace(marker, "");
    }
    out
}

fn strip_quotes(part: &str) -> &str {
    let mut chars = part.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return part;
    };
    if QUOTE_PAIRS.contains(&(first, last)) {
        &part[first.len_utf8()..part.len() - last.len_utf8()]
    } else {
        part
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg() -> Segmenter {
        Segmenter::new("|||")
    }

    #[test]
    fn trailing_whitespace_part_is_dropped() {
        assert_eq!(seg().segment("A|||B|||  "), vec!["A", "B"]);
    }

    #[test]
    fn no_delimiter_yields_trimmed_input() {
        assert_eq!(
            seg().segment("  just one message  "),
            vec!["just one message"]
        );
    }

    #[test]
    fn only_delimiters_yields_nothing() {
        assert!(seg().segment("||| |||   |||").is_empty());
        assert!(seg().segment("").is_empty());
    }

    #[test]
    fn matching_quotes_are_stripped() {
        assert_eq!(
            seg().segment("\"hey there\"|||\u{201C}what's up\u{201D}|||'ok'"),
            vec!["hey there", "what's up", "ok"]
        );
    }

    #[test]
    fn unmatched_quotes_are_kept() {
        assert_eq!(seg().segment("\"hello"), vec!["\"hello"]);
        assert_eq!(seg().segment("it's fine"), vec!["it's fine"]);
    }

    #[test]
    fn markdown_is_removed() {
        assert_eq!(
            seg().segment("**so** excited|||# Big news|||`code` and ~~old~~ __bold__"),
            vec!["so excited", "Big news", "code and old bold"]
        );
    }

    #[test]
    fn single_underscores_survive() {
        assert_eq!(seg().segment("my_handle"), vec!["my_handle"]);
    }

    #[test]
    fn partial_delimiter_fragments_are_removed() {
        assert_eq!(seg().segment("Hi ||"), vec!["Hi"]);
        assert_eq!(seg().segment("|| there"), vec!["there"]);
        assert_eq!(seg().segment("Hi|||| there"), vec!["Hi", "there"]);
    }

    #[test]
    fn custom_delimiter_is_honored() {
        let seg = Segmenter::new("<br>");
        assert_eq!(seg.segment("one<br>two<b"), vec!["one", "two"]);
    }

    #[test]
    fn non_ascii_content_is_preserved() {
        assert_eq!(
            seg().segment("caf\u{e9} \u{1F60A}|||\u{AB}d'accord\u{BB}"),
            vec!["caf\u{e9} \u{1F60A}", "d'accord"]
        );
    }
}
