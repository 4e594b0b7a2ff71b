//! Inline markup inside string values.
//!
//! A value's *display form* keeps inline elements (`<b>`, `<xliff:g>`), CDATA
//! sections and comments verbatim while plain-text runs have their entity
//! references decoded. [`decode`] turns the raw XML content of an element into
//! that form and [`encode_value`] turns it back into XML content that parses.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use quick_xml::escape::{partial_escape, unescape};
use regex::Regex;

lazy_static! {
    static ref TAG: Regex = Regex::new(
        r#"^<(/?)([A-Za-z_][\w.:-]*)((?:\s+[A-Za-z_][\w.:-]*\s*=\s*(?:"[^"<]*"|'[^'<]*'))*)\s*(/?)>"#
    )
    .unwrap();
    static ref ENTITY: Regex =
        Regex::new(r"^&(?:amp|lt|gt|quot|apos|#[0-9]+|#x[0-9A-Fa-f]+);").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClosing,
}

/// One piece of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Tag {
        raw: &'a str,
        name: &'a str,
        kind: TagKind,
    },
    CData(&'a str),
    Comment(&'a str),
    Instruction(&'a str),
}

impl<'a> Segment<'a> {
    pub fn raw(&self) -> &'a str {
        match self {
            Segment::Text(s)
            | Segment::CData(s)
            | Segment::Comment(s)
            | Segment::Instruction(s) => s,
            Segment::Tag { raw, .. } => raw,
        }
    }
}

/// Split a value into text and markup segments.
///
/// A `<` that does not open a syntactically valid tag, CDATA section,
/// comment or processing instruction stays part of the surrounding text.
pub fn tokenize(input: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while let Some(offset) = input[i..].find('<') {
        let at = i + offset;
        let rest = &input[at..];
        let markup = if rest.starts_with("<![CDATA[") {
            rest.find("]]>").map(|end| Segment::CData(&rest[..end + 3]))
        } else if rest.starts_with("<!--") {
            rest[4..].find("-->").map(|end| Segment::Comment(&rest[..end + 7]))
        } else if rest.starts_with("<?") {
            rest.find("?>").map(|end| Segment::Instruction(&rest[..end + 2]))
        } else {
            TAG.captures(rest).map(|caps| {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                let name = caps.get(2).map_or("", |m| m.as_str());
                let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
                let self_closing = caps.get(4).is_some_and(|m| !m.as_str().is_empty());
                let kind = match (closing, self_closing) {
                    (true, _) => TagKind::Close,
                    (false, true) => TagKind::SelfClosing,
                    (false, false) => TagKind::Open,
                };
                Segment::Tag {
                    raw: &rest[..whole.len()],
                    name,
                    kind,
                }
            })
        };

        match markup {
            Some(segment) => {
                if text_start < at {
                    out.push(Segment::Text(&input[text_start..at]));
                }
                i = at + segment.raw().len();
                text_start = i;
                out.push(segment);
            }
            None => i = at + 1,
        }
    }
    if text_start < input.len() {
        out.push(Segment::Text(&input[text_start..]));
    }
    out
}

/// Indices of tag segments that have no matching partner.
fn unbalanced_tags(segments: &[Segment<'_>]) -> Vec<usize> {
    let mut stack: Vec<(usize, &str)> = Vec::new();
    let mut bad = Vec::new();
    for (idx, segment) in segments.iter().enumerate() {
        let Segment::Tag { name, kind, .. } = segment else {
            continue;
        };
        match kind {
            TagKind::Open => stack.push((idx, name)),
            TagKind::SelfClosing => {}
            TagKind::Close => match stack.iter().rposition(|(_, open)| open == name) {
                Some(pos) => {
                    // Anything opened after the match is left unclosed.
                    bad.extend(stack.drain(pos..).skip(1).map(|(i, _)| i));
                }
                None => bad.push(idx),
            },
        }
    }
    bad.extend(stack.into_iter().map(|(i, _)| i));
    bad.sort_unstable();
    bad
}

/// Decode raw XML element content into display form.
///
/// Entities whose decoded text would read as markup (`&lt;b&gt;`) stay
/// encoded, so escaped tags remain text in the display form.
pub fn decode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for segment in tokenize(raw) {
        match segment {
            Segment::Text(text) => match unescape(text) {
                Ok(decoded) => push_decoded_text(&decoded, &mut out),
                Err(_) => out.push_str(text),
            },
            other => out.push_str(other.raw()),
        }
    }
    out
}

fn push_decoded_text(decoded: &str, out: &mut String) {
    for segment in tokenize(decoded) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            other => out.push_str(&partial_escape(other.raw())),
        }
    }
}

/// Encode a display-form value as XML element content.
///
/// Well-formed, balanced markup is copied through. A stray `<`, or one that
/// starts an unbalanced tag, becomes `&lt;`; a `&` that does not start an XML
/// entity becomes `&amp;`.
pub fn encode_value(display: &str) -> String {
    let segments = tokenize(display);
    let unbalanced = unbalanced_tags(&segments);
    let mut out = String::with_capacity(display.len() + 8);
    for (idx, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Text(text) => escape_text(text, &mut out),
            Segment::Tag { raw, .. } if unbalanced.binary_search(&idx).is_ok() => {
                escape_text(raw, &mut out)
            }
            other => out.push_str(other.raw()),
        }
    }
    out
}

fn escape_text(text: &str, out: &mut String) {
    for (i, ch) in text.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '&' if !ENTITY.is_match(&text[i..]) => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
}

/// Markup structure of a value, compared between source and translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupSummary {
    /// Element names (open or self-closing tags) with their counts.
    pub elements: BTreeMap<String, usize>,
    pub cdata_sections: usize,
    pub balanced: bool,
}

impl MarkupSummary {
    pub fn of(display: &str) -> Self {
        let segments = tokenize(display);
        let mut summary = MarkupSummary {
            balanced: unbalanced_tags(&segments).is_empty(),
            ..Default::default()
        };
        for segment in &segments {
            match segment {
                Segment::Tag {
                    name,
                    kind: TagKind::Open | TagKind::SelfClosing,
                    ..
                } => *summary.elements.entry(name.to_string()).or_insert(0) += 1,
                Segment::CData(_) => summary.cdata_sections += 1,
                _ => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed_content() {
        let segments = tokenize("Hi <b>you</b> <![CDATA[<i>]]> & <!-- note --> <br/>");
        assert_eq!(
            segments,
            vec![
                Segment::Text("Hi "),
                Segment::Tag { raw: "<b>", name: "b", kind: TagKind::Open },
                Segment::Text("you"),
                Segment::Tag { raw: "</b>", name: "b", kind: TagKind::Close },
                Segment::Text(" "),
                Segment::CData("<![CDATA[<i>]]>"),
                Segment::Text(" & "),
                Segment::Comment("<!-- note -->"),
                Segment::Text(" "),
                Segment::Tag { raw: "<br/>", name: "br", kind: TagKind::SelfClosing },
            ]
        );
    }

    #[test]
    fn test_tokenize_attributes_and_namespaces() {
        let segments = tokenize(r#"<xliff:g id="count" example='3'>%d</xliff:g>"#);
        assert!(matches!(
            segments[0],
            Segment::Tag { name: "xliff:g", kind: TagKind::Open, .. }
        ));
        assert_eq!(segments.len(), 3);
    }

    #[test]
    fn test_decode_keeps_markup_and_unescapes_text() {
        assert_eq!(decode("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode("a &lt; b"), "a < b");
        assert_eq!(decode("<b>&amp;</b>"), "<b>&</b>");
        assert_eq!(decode("<![CDATA[&amp;]]>"), "<![CDATA[&amp;]]>");
        assert_eq!(decode("&#169; 2024"), "© 2024");
    }

    #[test]
    fn test_decode_keeps_escaped_tags_as_text() {
        assert_eq!(decode("Use &lt;b&gt; to bold"), "Use &lt;b&gt; to bold");
        assert_eq!(decode("&lt;b&gt;x&lt;/b&gt; &amp; <i>y</i>"), "&lt;b&gt;x&lt;/b&gt; & <i>y</i>");
        assert_eq!(decode("&lt;!-- x --&gt;"), "&lt;!-- x --&gt;");
        assert!(MarkupSummary::of(&decode("Use &lt;b&gt; to bold")).elements.is_empty());
        assert_eq!(encode_value(&decode("Use &lt;b&gt; to bold")), "Use &lt;b&gt; to bold");
    }

    #[test]
    fn test_encode_value_escapes_stray_characters() {
        assert_eq!(encode_value("R&D"), "R&amp;D");
        assert_eq!(encode_value("a < b"), "a &lt; b");
        assert_eq!(encode_value("&amp; stays"), "&amp; stays");
        assert_eq!(encode_value("<b>bold</b> & co"), "<b>bold</b> &amp; co");
        assert_eq!(encode_value("<b>unclosed"), "&lt;b>unclosed");
        assert_eq!(encode_value("</i> stray"), "&lt;/i> stray");
    }

    #[test]
    fn test_encode_then_decode_restores_display() {
        for display in [
            "Hello, %1$s!",
            "5 < 6 & 7 > 3",
            "<b>Hi</b> <i>there</i>",
            "<![CDATA[<u>raw</u>]]> done",
            "Don\\'t \"quote\"",
        ] {
            assert_eq!(decode(&encode_value(display)), display);
        }
    }

    #[test]
    fn test_markup_summary() {
        let summary = MarkupSummary::of("<b>x</b><b>y</b><br/><![CDATA[z]]>");
        assert!(summary.balanced);
        assert_eq!(summary.elements.get("b"), Some(&2));
        assert_eq!(summary.elements.get("br"), Some(&1));
        assert_eq!(summary.cdata_sections, 1);

        assert!(!MarkupSummary::of("<b><i>x</b></i>").balanced);
        assert!(!MarkupSummary::of("<b>x").balanced);
    }
}
