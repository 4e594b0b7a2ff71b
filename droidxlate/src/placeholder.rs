//! Printf-style placeholder parsing and comparison.
//!
//! Android string resources use `java.util.Formatter` syntax: `%s`, `%d`,
//! positional `%1$s`, with optional flags, width and precision (`%02d`,
//! `%.2f`). `%%` and `%n` consume no argument and are ignored.

use std::{collections::BTreeMap, ops::Range};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    pub index: Option<usize>,
    pub kind: char, // canonical kind: s, d, f, etc.
}

impl PlaceholderToken {
    pub fn to_signature(&self) -> String {
        match self.index {
            Some(i) => format!("{}${}", i, self.kind),
            None => format!("{}", self.kind),
        }
    }
}

const CONVERSIONS: &[u8] = b"bBhHsScCdoxXeEfgGaAtT";
const FLAGS: &[u8] = b"-#+0,(";

/// A `%` sequence recognized as a format specifier, with its byte range.
/// `token` is `None` for `%%` and `%n`, which consume no argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpecifier {
    pub range: Range<usize>,
    pub token: Option<PlaceholderToken>,
}

/// Extracts placeholder tokens from a string and returns them in occurrence order.
pub fn extract_placeholders(input: &str) -> Vec<PlaceholderToken> {
    format_specifiers(input)
        .into_iter()
        .filter_map(|s| s.token)
        .collect()
}

/// Every format specifier in `input`, including `%%` and `%n`.
pub fn format_specifiers(input: &str) -> Vec<FormatSpecifier> {
    let bytes = input.as_bytes();
    let mut i = 0;
    let mut out = Vec::new();

    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        // Escaped percent and line separator
        if i + 1 < bytes.len() && (bytes[i + 1] == b'%' || bytes[i + 1] == b'n') {
            out.push(FormatSpecifier {
                range: i..i + 2,
                token: None,
            });
            i += 2;
            continue;
        }

        let mut j = i + 1;

        // Optional positional index: digits followed by '$'
        let mut index: Option<usize> = None;
        let start_digits = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j < bytes.len() && j > start_digits && bytes[j] == b'$' {
            index = input[start_digits..j].parse::<usize>().ok();
            j += 1;
        } else {
            j = i + 1;
        }

        while j < bytes.len() && FLAGS.contains(&bytes[j]) {
            j += 1;
        }
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j + 1 < bytes.len() && bytes[j] == b'.' && bytes[j + 1].is_ascii_digit() {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
        }

        // Optional length modifiers (l/ll)
        if j < bytes.len() && bytes[j] == b'l' {
            j += 1;
            if j < bytes.len() && bytes[j] == b'l' {
                j += 1;
            }
        }

        if j < bytes.len() && CONVERSIONS.contains(&bytes[j]) {
            let ch = bytes[j] as char;
            // Date/time conversions carry one suffix character.
            let end = if matches!(ch, 't' | 'T') { j + 2 } else { j + 1 };
            let end = end.min(bytes.len());
            out.push(FormatSpecifier {
                range: i..end,
                token: Some(PlaceholderToken {
                    index,
                    kind: canonical_kind_char(ch),
                }),
            });
            i = end;
            continue;
        }

        // Not a recognized placeholder; skip this '%'
        i += 1;
    }

    out
}

/// Build a signature (sequence of tokens) for display and comparison.
pub fn signature(input: &str) -> Vec<String> {
    extract_placeholders(input)
        .into_iter()
        .map(|t| t.to_signature())
        .collect()
}

/// Placeholders of a string split the way they are compared: positional ones
/// as a multiset, the rest as an ordered sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderSet {
    pub positional: BTreeMap<String, usize>,
    pub sequential: Vec<String>,
}

impl PlaceholderSet {
    pub fn of(input: &str) -> Self {
        let mut set = PlaceholderSet::default();
        for token in extract_placeholders(input) {
            let sig = token.to_signature();
            if token.index.is_some() {
                *set.positional.entry(sig).or_insert(0) += 1;
            } else {
                set.sequential.push(sig);
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.sequential.is_empty()
    }
}

/// Compare the placeholders of `source` and `translation`.
///
/// Returns a human-readable reason on mismatch.
pub fn compare(source: &str, translation: &str) -> Result<(), String> {
    let expected = PlaceholderSet::of(source);
    let actual = PlaceholderSet::of(translation);

    if expected.positional != actual.positional {
        return Err(format!(
            "positional placeholders differ: expected [{}], got [{}]",
            format_multiset(&expected.positional),
            format_multiset(&actual.positional)
        ));
    }
    if expected.sequential != actual.sequential {
        return Err(format!(
            "placeholders differ: expected [{}], got [{}]",
            expected.sequential.join(", "),
            actual.sequential.join(", ")
        ));
    }
    Ok(())
}

fn format_multiset(set: &BTreeMap<String, usize>) -> String {
    set.iter()
        .flat_map(|(sig, n)| std::iter::repeat_n(format!("%{}", sig), *n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn canonical_kind_char(ch: char) -> char {
    // Upper-case conversions only change letter case of the output
    ch.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_specifier_ranges() {
        let specs = format_specifiers("50% off, %1$s and %% or %n");
        let starts: Vec<usize> = specs.iter().map(|s| s.range.start).collect();
        assert_eq!(starts, vec![9, 19, 24]);
        assert_eq!(specs[0].range, 9..13);
        assert!(specs[0].token.is_some());
        assert!(specs[1].token.is_none());
    }

    #[test]
    fn test_extract_android() {
        let s = "Hello %1$s, you have %2$d items and %s extra";
        let sig = signature(s);
        assert_eq!(sig, vec!["1$s", "2$d", "s"]);
    }

    #[test]
    fn test_flags_width_precision() {
        assert_eq!(signature("%02d:%02d"), vec!["d", "d"]);
        assert_eq!(signature("Total %1$.2f €"), vec!["1$f"]);
        assert_eq!(signature("%-10s|%,d"), vec!["s", "d"]);
        assert_eq!(signature("%ld items"), vec!["d"]);
    }

    #[test]
    fn test_ignore_escaped_percent_and_prose() {
        assert_eq!(signature("Discount: 50%% and value %d"), vec!["d"]);
        assert!(signature("50% off").is_empty());
        assert!(signature("Line%nbreak").is_empty());
        assert!(signature("100 %").is_empty());
    }

    #[test]
    fn test_positional_reordering_is_allowed() {
        assert!(compare("%1$s sent %2$d files", "%2$d Dateien von %1$s").is_ok());
    }

    #[test]
    fn test_missing_positional_is_rejected() {
        let err = compare("Welcome, %1$s!", "¡Bienvenido!").unwrap_err();
        assert!(err.contains("%1$s"), "{err}");
    }

    #[test]
    fn test_sequential_order_matters() {
        assert!(compare("%s has %d", "%s tiene %d").is_ok());
        assert!(compare("%s has %d", "%d tiene %s").is_err());
        assert!(compare("%s", "%s %s").is_err());
    }

    #[test]
    fn test_uppercase_conversion_matches() {
        assert!(compare("%S", "%s").is_ok());
        assert!(PlaceholderSet::of("no args").is_empty());
    }
}
