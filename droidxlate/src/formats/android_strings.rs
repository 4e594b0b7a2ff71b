//! Lossless support for Android `strings.xml`.
//!
//! [`Document`] keeps the decoded file text together with the byte spans of
//! the `<resources>` root and of every top-level element, so the merge engine
//! can splice new content in and copy everything else through unchanged.
//! `<string>` and `<plurals>` are interpreted; every other node is opaque.

use std::{
    collections::{BTreeMap, HashSet},
    io::{BufRead, Write},
    ops::Range,
    path::PathBuf,
    str::FromStr,
};

use encoding_rs::{Encoding, UTF_8};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::{
    error::Error,
    markup,
    traits::Parser,
    types::{Entry, EntryKind, PluralCategory, PluralFamily, SimpleEntry},
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Spans of the `<resources>` root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcesSpan {
    pub start_tag: Range<usize>,
    /// `None` when the root is written as `<resources/>`.
    pub end_tag: Option<Range<usize>>,
}

/// A direct child element of `<resources>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name: `string`, `plurals`, `string-array`, `dimen`, ...
    pub tag: String,
    /// Value of the `name` attribute.
    pub key: Option<String>,
    pub translatable: bool,
    pub span: Range<usize>,
    pub start_tag: Range<usize>,
    /// Content between the tags; `None` for a self-closing element.
    pub content: Option<Range<usize>>,
    /// `<item>` children of a `<plurals>` element.
    pub items: Vec<Item>,
}

impl Element {
    pub fn kind(&self) -> Option<EntryKind> {
        match self.tag.as_str() {
            "string" => Some(EntryKind::Simple),
            "plurals" => Some(EntryKind::Plural),
            _ => None,
        }
    }
}

/// An `<item quantity="...">` inside `<plurals>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub category: PluralCategory,
    pub span: Range<usize>,
    pub content: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    bom: bool,
    resources: Option<ResourcesSpan>,
    elements: Vec<Element>,
}

impl Parser for Document {
    fn from_reader<R: BufRead>(mut reader: R) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse_bytes(&bytes)
    }

    fn to_writer<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        writer.write_all(&self.encode(&self.text))?;
        Ok(())
    }
}

impl Document {
    /// Decode raw file bytes. UTF-8, with or without a BOM, is the only
    /// accepted encoding.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (body, bom) = match Encoding::for_bom(bytes) {
            Some((encoding, len)) if encoding == UTF_8 => (&bytes[len..], true),
            Some((encoding, _)) => {
                return Err(Error::parse(
                    PathBuf::new(),
                    format!("unsupported encoding {}", encoding.name()),
                ));
            }
            None => (bytes, false),
        };
        let text = UTF_8
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or_else(|| Error::parse(PathBuf::new(), "file is not valid UTF-8"))?;
        Self::parse_text(text.into_owned(), bom)
    }

    fn parse_text(text: String, bom: bool) -> Result<Self, Error> {
        let (resources, elements) = scan_structure(&text)?;
        Ok(Self {
            text,
            bom,
            resources,
            elements,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_bom(&self) -> bool {
        self.bom
    }

    pub fn resources(&self) -> Option<&ResourcesSpan> {
        self.resources.as_ref()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Line ending used by the file (`\r\n` if any line uses it).
    pub fn line_ending(&self) -> &'static str {
        if self.text.contains("\r\n") { "\r\n" } else { "\n" }
    }

    /// Re-encode `text` the way this document was stored.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() + UTF8_BOM.len());
        if self.bom {
            out.extend_from_slice(UTF8_BOM);
        }
        out.extend_from_slice(text.as_bytes());
        out
    }

    /// First element with the given kind and key.
    pub fn element(&self, kind: EntryKind, key: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.kind() == Some(kind) && e.key.as_deref() == Some(key))
    }

    pub fn is_duplicated(&self, kind: EntryKind, key: &str) -> bool {
        self.elements
            .iter()
            .filter(|e| e.kind() == Some(kind) && e.key.as_deref() == Some(key))
            .count()
            > 1
    }

    /// Keys that occur more than once for their kind, in file order.
    pub fn duplicates(&self) -> Vec<(EntryKind, String)> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut out = Vec::new();
        for element in &self.elements {
            let (Some(kind), Some(key)) = (element.kind(), element.key.as_ref()) else {
                continue;
            };
            if !seen.insert((kind, key.as_str())) && reported.insert((kind, key.as_str())) {
                out.push((kind, key.clone()));
            }
        }
        out
    }

    /// Display value of a content range.
    pub fn value_of(&self, content: &Option<Range<usize>>) -> String {
        content
            .as_ref()
            .map(|r| markup::decode(&self.text[r.clone()]))
            .unwrap_or_default()
    }

    /// Entries in file order. For duplicated keys the first occurrence wins.
    pub fn entries(&self) -> Vec<Entry> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for element in &self.elements {
            let (Some(kind), Some(key)) = (element.kind(), element.key.as_ref()) else {
                continue;
            };
            if !seen.insert((kind, key.clone())) {
                continue;
            }
            let entry = match kind {
                EntryKind::Simple => Entry::Simple(SimpleEntry {
                    key: key.clone(),
                    value: self.value_of(&element.content),
                    translatable: element.translatable,
                }),
                EntryKind::Plural => {
                    let mut forms = BTreeMap::new();
                    for item in &element.items {
                        forms
                            .entry(item.category)
                            .or_insert_with(|| self.value_of(&item.content));
                    }
                    Entry::Plural(PluralFamily {
                        key: key.clone(),
                        forms,
                        translatable: element.translatable,
                    })
                }
            };
            out.push(entry);
        }
        out
    }
}

struct Attributes {
    name: Option<String>,
    translatable: bool,
    quantity: Option<String>,
}

fn read_attributes(e: &BytesStart) -> Result<Attributes, Error> {
    let mut attrs = Attributes {
        name: None,
        translatable: true,
        quantity: None,
    };
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| Error::parse(PathBuf::new(), e.to_string()))?;
        match attr.key.as_ref() {
            b"name" => attrs.name = Some(attr.unescape_value()?.to_string()),
            b"translatable" => attrs.translatable = attr.unescape_value()?.trim() != "false",
            b"quantity" => attrs.quantity = Some(attr.unescape_value()?.to_string()),
            _ => {}
        }
    }
    Ok(attrs)
}

fn pos(reader: &Reader<&[u8]>) -> usize {
    reader.buffer_position() as usize
}

fn span(r: Range<u64>) -> Range<usize> {
    r.start as usize..r.end as usize
}

fn scan_structure(text: &str) -> Result<(Option<ResourcesSpan>, Vec<Element>), Error> {
    let mut reader = Reader::from_str(text);
    let mut resources: Option<ResourcesSpan> = None;
    let mut elements = Vec::new();
    let mut inside = false;

    loop {
        let start = pos(&reader);
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if !inside && resources.is_some() => {
                return Err(Error::parse(
                    PathBuf::new(),
                    format!(
                        "unexpected element <{}> after </resources>",
                        String::from_utf8_lossy(e.name().as_ref())
                    ),
                ));
            }
            Event::Start(e) if !inside => {
                expect_resources(&e)?;
                resources = Some(ResourcesSpan {
                    start_tag: start..pos(&reader),
                    end_tag: None,
                });
                inside = true;
            }
            Event::Empty(e) if !inside => {
                expect_resources(&e)?;
                resources = Some(ResourcesSpan {
                    start_tag: start..pos(&reader),
                    end_tag: None,
                });
            }
            Event::Start(e) => {
                let start_tag = start..pos(&reader);
                elements.push(read_element(&mut reader, &e, start_tag, true)?);
            }
            Event::Empty(e) => {
                let start_tag = start..pos(&reader);
                elements.push(read_element(&mut reader, &e, start_tag, false)?);
            }
            Event::End(_) if inside => {
                if let Some(res) = resources.as_mut() {
                    res.end_tag = Some(start..pos(&reader));
                }
                inside = false;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if inside {
        return Err(Error::parse(PathBuf::new(), "unclosed <resources> element"));
    }
    Ok((resources, elements))
}

fn expect_resources(e: &BytesStart) -> Result<(), Error> {
    if e.name().as_ref() == b"resources" {
        Ok(())
    } else {
        Err(Error::parse(
            PathBuf::new(),
            format!(
                "root element must be <resources>, found <{}>",
                String::from_utf8_lossy(e.name().as_ref())
            ),
        ))
    }
}

fn read_element(
    reader: &mut Reader<&[u8]>,
    e: &BytesStart,
    start_tag: Range<usize>,
    has_content: bool,
) -> Result<Element, Error> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let attrs = read_attributes(e)?;
    let interpreted = tag == "string" || tag == "plurals";
    if interpreted && attrs.name.is_none() {
        return Err(Error::parse(
            PathBuf::new(),
            format!("<{}> element missing 'name' attribute", tag),
        ));
    }

    let mut element = Element {
        tag,
        key: attrs.name,
        translatable: attrs.translatable,
        span: start_tag.clone(),
        start_tag,
        content: None,
        items: Vec::new(),
    };
    if !has_content {
        return Ok(element);
    }

    if element.tag == "plurals" {
        let content_start = element.start_tag.end;
        loop {
            let start = pos(reader);
            match reader.read_event()? {
                Event::Start(item) if item.name().as_ref() == b"item" => {
                    let category = item_category(&item, &element)?;
                    let content = span(reader.read_to_end(item.name())?);
                    element.items.push(Item {
                        category,
                        span: start..pos(reader),
                        content: Some(content),
                    });
                }
                Event::Empty(item) if item.name().as_ref() == b"item" => {
                    let category = item_category(&item, &element)?;
                    element.items.push(Item {
                        category,
                        span: start..pos(reader),
                        content: None,
                    });
                }
                Event::Start(other) => {
                    reader.read_to_end(other.name())?;
                }
                Event::End(_) => {
                    element.content = Some(content_start..start);
                    break;
                }
                Event::Eof => {
                    return Err(Error::parse(PathBuf::new(), "unexpected end of file in <plurals>"));
                }
                _ => {}
            }
        }
    } else {
        element.content = Some(span(reader.read_to_end(e.name())?));
    }
    element.span.end = pos(reader);
    Ok(element)
}

fn item_category(item: &BytesStart, family: &Element) -> Result<PluralCategory, Error> {
    let key = family.key.as_deref().unwrap_or_default();
    let quantity = read_attributes(item)?.quantity.ok_or_else(|| {
        Error::parse(
            PathBuf::new(),
            format!("<item> in plurals '{}' missing 'quantity' attribute", key),
        )
    })?;
    PluralCategory::from_str(&quantity).map_err(|_| {
        Error::parse(
            PathBuf::new(),
            format!("unknown plural quantity '{}' in plurals '{}'", quantity, key),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const SAMPLE: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <!-- App strings -->
        <resources xmlns:tools="http://schemas.android.com/tools">
            <string name="hello">Hello &amp; welcome</string>
            <string name="bye" translatable="false">Goodbye</string>
            <string name="empty"></string>
            <string name="self_closing"/>
            <string name="styled">Tap <b>here</b></string>
            <plurals name="apples">
                <item quantity="one">%d apple</item>
                <item quantity="other">%d apples</item>
            </plurals>
            <string-array name="planets">
                <item>Mercury</item>
            </string-array>
            <dimen name="margin">16dp</dimen>
        </resources>
    "#};

    #[test]
    fn test_parse_entries() {
        let doc = Document::from_str(SAMPLE).unwrap();
        let entries = doc.entries();
        assert_eq!(entries.len(), 6);

        let Entry::Simple(hello) = &entries[0] else {
            panic!("expected string")
        };
        assert_eq!(hello.key, "hello");
        assert_eq!(hello.value, "Hello & welcome");
        assert!(hello.translatable);

        let Entry::Simple(bye) = &entries[1] else {
            panic!("expected string")
        };
        assert!(!bye.translatable);

        assert!(matches!(&entries[3], Entry::Simple(s) if s.key == "self_closing" && s.value.is_empty()));
        assert!(matches!(&entries[4], Entry::Simple(s) if s.value == "Tap <b>here</b>"));

        let Entry::Plural(apples) = &entries[5] else {
            panic!("expected plurals")
        };
        assert_eq!(apples.forms.len(), 2);
        assert_eq!(apples.forms[&PluralCategory::One], "%d apple");
    }

    #[test]
    fn test_spans_cover_elements() {
        let doc = Document::from_str(SAMPLE).unwrap();
        let text = doc.text();
        let res = doc.resources().unwrap();
        assert!(text[res.start_tag.clone()].starts_with("<resources"));
        assert_eq!(&text[res.end_tag.clone().unwrap()], "</resources>");

        let hello = doc.element(EntryKind::Simple, "hello").unwrap();
        assert_eq!(
            &text[hello.span.clone()],
            r#"<string name="hello">Hello &amp; welcome</string>"#
        );
        assert_eq!(&text[hello.content.clone().unwrap()], "Hello &amp; welcome");

        let closing = doc.element(EntryKind::Simple, "self_closing").unwrap();
        assert_eq!(&text[closing.span.clone()], r#"<string name="self_closing"/>"#);
        assert!(closing.content.is_none());

        let apples = doc.element(EntryKind::Plural, "apples").unwrap();
        assert!(text[apples.span.clone()].ends_with("</plurals>"));
        assert_eq!(&text[apples.items[1].span.clone()], r#"<item quantity="other">%d apples</item>"#);

        assert_eq!(doc.elements().len(), 8);
        assert_eq!(doc.elements()[6].tag, "string-array");
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(SAMPLE.replace('\n', "\r\n").as_bytes());
        let doc = Document::from_bytes(&bytes).unwrap();
        assert!(doc.has_bom());
        assert_eq!(doc.line_ending(), "\r\n");
        let mut out = Vec::new();
        doc.to_writer(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_missing_name_attribute() {
        let xml = indoc! {r#"
            <resources>
                <string>No name attr</string>
            </resources>
        "#};
        let err = Document::from_str(xml).unwrap_err();
        assert!(err.to_string().contains("missing 'name'"), "{err}");
    }

    #[test]
    fn test_unknown_quantity_is_parse_error() {
        let xml = indoc! {r#"
            <resources>
                <plurals name="apples">
                    <item quantity="several">%d apples</item>
                </plurals>
            </resources>
        "#};
        let err = Document::from_str(xml).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("several"));
    }

    #[test]
    fn test_wrong_root_and_malformed_xml() {
        assert!(Document::from_str("<manifest></manifest>").is_err());
        assert!(Document::from_str("<resources><string name=\"a\">x</resources>").is_err());
    }

    #[test]
    fn test_rejects_utf16() {
        let bytes = b"\xFF\xFE<\x00r\x00";
        let err = Document::from_bytes(bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported encoding"));
    }

    #[test]
    fn test_duplicates_first_wins() {
        let xml = indoc! {r#"
            <resources>
                <string name="a">first</string>
                <string name="a">second</string>
                <plurals name="a"><item quantity="other">p</item></plurals>
            </resources>
        "#};
        let doc = Document::from_str(xml).unwrap();
        assert_eq!(doc.duplicates(), vec![(EntryKind::Simple, "a".to_string())]);
        assert!(doc.is_duplicated(EntryKind::Simple, "a"));
        assert!(!doc.is_duplicated(EntryKind::Plural, "a"));
        let entries = doc.entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(&entries[0], Entry::Simple(s) if s.value == "first"));
    }

    #[test]
    fn test_self_closing_resources() {
        let doc = Document::from_str("<resources/>\n").unwrap();
        let res = doc.resources().unwrap();
        assert!(res.end_tag.is_none());
        assert!(doc.entries().is_empty());
    }
}
