//! Android resource escaping for machine-translated text.
//!
//! `aapt` treats an unescaped `'` as an error, strips unescaped `"`, reads a
//! value starting with `@` or `?` as a reference and a stray `%` as a broken
//! format specifier, so accepted translations are escaped before they are
//! merged. Markup and CDATA segments are left alone.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    markup::{Segment, tokenize},
    placeholder::format_specifiers,
};

lazy_static! {
    static ref SINGLE_QUOTED_ATTR: Regex = Regex::new(r"(\s+[\w:-]+)='([^']*)'").unwrap();
    static ref REDUNDANT_QUOTE_BACKSLASHES: Regex = Regex::new(r#"\\{2,}(["'])"#).unwrap();
}

/// Characters that form an escape sequence when preceded by backslashes.
const SEQUENCE_TARGETS: &[char] = &['n', 'r', 't', 'b', 'f', '"', '\'', 'd', 's', 'D', 'S'];

/// Escape `text` for a `strings.xml` value.
///
/// Apostrophes, double quotes and `%` signs that do not start a format
/// specifier get a backslash unless already escaped, as does a leading `@` or
/// `?`. Raw line breaks become `\n`. When `reference` is given,
/// backslash runs in front of escape sequences are aligned with the ones the
/// reference text uses for the same sequence.
pub fn escape_android(text: &str, reference: Option<&str>) -> String {
    if text.is_empty() {
        return String::new();
    }
    let normalized = normalize_line_breaks(text);
    let mut value = String::with_capacity(normalized.len() + 8);
    for (idx, segment) in tokenize(&normalized).into_iter().enumerate() {
        match segment {
            Segment::Text(t) => {
                let escaped = escape_percent(&escape_char(&escape_char(t, '\''), '"'));
                if idx == 0 {
                    value.push_str(&escape_leading_reference(&escaped));
                } else {
                    value.push_str(&escaped);
                }
            }
            Segment::Tag { raw, .. } => {
                value.push_str(&SINGLE_QUOTED_ATTR.replace_all(raw, "$1=\"$2\""))
            }
            other => value.push_str(other.raw()),
        }
    }
    if let Some(reference) = reference {
        value = align_with_reference(&value, reference);
    }
    REDUNDANT_QUOTE_BACKSLASHES
        .replace_all(&value, "\\$1")
        .into_owned()
}

fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\\n")
}

/// Escape occurrences of `target` preceded by an even number of backslashes.
fn escape_char(text: &str, target: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut backslashes = 0usize;
    for ch in text.chars() {
        if ch == '\\' {
            backslashes += 1;
            out.push(ch);
            continue;
        }
        if ch == target && backslashes % 2 == 0 {
            out.push('\\');
        }
        out.push(ch);
        backslashes = 0;
    }
    out
}

/// Escape `%` signs that are not part of a format specifier.
fn escape_percent(text: &str) -> String {
    let specifiers: Vec<usize> = format_specifiers(text)
        .into_iter()
        .map(|s| s.range.start)
        .collect();
    let mut out = String::with_capacity(text.len());
    let mut backslashes = 0usize;
    for (i, ch) in text.char_indices() {
        if ch == '%' && backslashes % 2 == 0 && specifiers.binary_search(&i).is_err() {
            out.push('\\');
        }
        backslashes = if ch == '\\' { backslashes + 1 } else { 0 };
        out.push(ch);
    }
    out
}

/// A value whose first character is `@` or `?` would be read as a resource reference.
fn escape_leading_reference(text: &str) -> String {
    let trimmed = text.trim_start();
    if trimmed.starts_with('@') || trimmed.starts_with('?') {
        let lead = text.len() - trimmed.len();
        format!("{}\\{}", &text[..lead], trimmed)
    } else {
        text.to_string()
    }
}

/// `(follower, backslash count)` for every backslash run that precedes a sequence target.
fn backslash_sequences(text: &str) -> Vec<(char, usize)> {
    let mut out = Vec::new();
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '\\' {
            run += 1;
            continue;
        }
        if run > 0 && SEQUENCE_TARGETS.contains(&ch) {
            out.push((ch, run));
        }
        run = 0;
    }
    out
}

fn align_with_reference(text: &str, reference: &str) -> String {
    let reference = reference.replace("\r\n", "\n").replace('\r', "\n");
    let wanted = backslash_sequences(&reference);
    if wanted.is_empty() {
        return text.to_string();
    }

    let mut next = 0usize;
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '\\' {
            run += 1;
            continue;
        }
        if run > 0 {
            let count = if SEQUENCE_TARGETS.contains(&ch) {
                match wanted[next..].iter().position(|(c, _)| *c == ch) {
                    Some(pos) => {
                        let count = wanted[next + pos].1;
                        next += pos + 1;
                        count
                    }
                    None => run,
                }
            } else {
                run
            };
            out.extend(std::iter::repeat_n('\\', count));
            run = 0;
        }
        out.push(ch);
    }
    out.extend(std::iter::repeat_n('\\', run));
    out
}
