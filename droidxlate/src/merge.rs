//! Format-preserving merge of accepted translations into a target file.
//!
//! The merge never re-serializes the document. It computes a list of
//! splices against the original text (fill a blank value, insert an element,
//! insert a plural item) and copies every other byte through unchanged.

use std::{collections::BTreeMap, ops::Range};

use quick_xml::escape::escape;
use tracing::debug;

use crate::{
    error::Error,
    formats::android_strings::{Document, Element},
    markup::encode_value,
    orchestrator::AcceptedTranslations,
    types::{EntryKind, PluralCategory, ResourceFile},
};

/// Result of a merge: the new file bytes and what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    /// Elements or plural items added.
    pub inserted: usize,
    /// Existing blank values filled in.
    pub updated: usize,
}

impl MergeOutput {
    pub fn is_unchanged(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

#[derive(Debug)]
struct Edit {
    range: Range<usize>,
    seq: usize,
    text: String,
}

struct Layout {
    eol: &'static str,
    indent: String,
    unit: String,
    quote: char,
}

impl Layout {
    fn infer(doc: &Document) -> Self {
        let text = doc.text();
        let indent = doc
            .elements()
            .iter()
            .find_map(|e| indentation(text, e.span.start))
            .unwrap_or("    ")
            .to_string();
        let unit = if indent.is_empty() {
            "    ".to_string()
        } else {
            indent.clone()
        };
        let quote = doc
            .elements()
            .iter()
            .find_map(|e| {
                let tag = &text[e.start_tag.clone()];
                let at = tag.find("name=")?;
                tag[at + 5..].chars().next().filter(|c| *c == '"' || *c == '\'')
            })
            .unwrap_or('"');
        Self {
            eol: doc.line_ending(),
            indent,
            unit,
            quote,
        }
    }

    fn attr(&self, name: &str, value: &str) -> String {
        let q = self.quote;
        format!("{}={}{}{}", name, q, escape(value), q)
    }

    fn string_element(&self, key: &str, value: &str) -> String {
        format!("<string {}>{}</string>", self.attr("name", key), encode_value(value))
    }

    fn item_element(&self, category: PluralCategory, value: &str) -> String {
        format!(
            "<item {}>{}</item>",
            self.attr("quantity", category.as_str()),
            encode_value(value)
        )
    }

    fn plurals_element(&self, key: &str, forms: &BTreeMap<PluralCategory, String>) -> String {
        let item_indent = format!("{}{}", self.indent, self.unit);
        let mut out = format!("<plurals {}>", self.attr("name", key));
        for (category, value) in forms {
            out.push_str(self.eol);
            out.push_str(&item_indent);
            out.push_str(&self.item_element(*category, value));
        }
        out.push_str(self.eol);
        out.push_str(&self.indent);
        out.push_str("</plurals>");
        out
    }
}

/// Where a new top-level element goes.
enum Placement {
    After(usize),
    Before(usize),
    /// `<resources>` has no child elements yet.
    Empty,
}

struct Splicer<'a> {
    text: &'a str,
    layout: Layout,
    edits: Vec<Edit>,
    inserted: usize,
    updated: usize,
}

impl<'a> Splicer<'a> {
    fn push(&mut self, range: Range<usize>, text: String) {
        let seq = self.edits.len();
        self.edits.push(Edit { range, seq, text });
    }

    fn insert(&mut self, at: usize, text: String) {
        self.push(at..at, text);
    }

    /// Fill a container that has no child elements yet with `children`.
    fn fill_empty(
        &mut self,
        content: Range<usize>,
        child_indent: &str,
        closing_indent: &str,
        children: &[String],
    ) {
        let eol = self.layout.eol;
        let close = content.end;
        let ls = line_start(self.text, close);
        let own_line = ls > content.start && is_blank(&self.text[ls..close]);
        if own_line {
            for child in children {
                self.insert(ls, format!("{}{}{}", child_indent, child, eol));
            }
        } else {
            for child in children {
                self.insert(close, format!("{}{}{}", eol, child_indent, child));
            }
            self.insert(close, format!("{}{}", eol, closing_indent));
        }
    }

    /// Replace a self-closing container tag with an open/close pair holding `children`.
    fn expand_container(
        &mut self,
        tag: Range<usize>,
        name: &str,
        child_indent: &str,
        closing_indent: &str,
        children: &[String],
    ) {
        let eol = self.layout.eol;
        let mut out = open_tag(&self.text[tag.clone()]);
        for child in children {
            out.push_str(eol);
            out.push_str(child_indent);
            out.push_str(child);
        }
        out.push_str(eol);
        out.push_str(closing_indent);
        out.push_str(&format!("</{}>", name));
        self.push(tag, out);
    }

    /// Replace the value of an existing element or item.
    fn fill_value(&mut self, span: Range<usize>, content: Option<Range<usize>>, close: &str, value: &str) {
        let encoded = encode_value(value);
        match content {
            Some(range) => self.push(range, encoded),
            None => {
                let opening = open_tag(&self.text[span.clone()]);
                self.push(span, format!("{}{}</{}>", opening, encoded, close));
            }
        }
        self.updated += 1;
    }

    fn apply(mut self, doc: &Document) -> MergeOutput {
        self.edits
            .sort_by_key(|e| (e.range.start, e.range.end > e.range.start, e.seq));
        let mut out = String::with_capacity(self.text.len() + 256);
        let mut cursor = 0;
        for edit in &self.edits {
            out.push_str(&self.text[cursor..edit.range.start]);
            out.push_str(&edit.text);
            cursor = edit.range.end;
        }
        out.push_str(&self.text[cursor..]);
        MergeOutput {
            bytes: doc.encode(&out),
            inserted: self.inserted,
            updated: self.updated,
        }
    }
}

/// Merge `accepted` into `target`, placing new entries in `reference` order.
///
/// Fails without producing output when the target has no `<resources>` root
/// or a touched key is duplicated in the target.
pub fn merge(
    target: &ResourceFile,
    reference: &ResourceFile,
    accepted: &AcceptedTranslations,
) -> Result<MergeOutput, Error> {
    let doc = target.document();
    let text = doc.text();
    let Some(resources) = doc.resources() else {
        return Err(Error::merge(&target.path, "document has no <resources> root element"));
    };

    for key in accepted.simple().keys() {
        check_unique(target, EntryKind::Simple, key)?;
    }
    for key in accepted.plurals().keys() {
        check_unique(target, EntryKind::Plural, key)?;
    }

    let mut splicer = Splicer {
        text,
        layout: Layout::infer(doc),
        edits: Vec::new(),
        inserted: 0,
        updated: 0,
    };

    // New top-level elements, in reference order.
    let mut new_elements: Vec<(usize, EntryKind, &str)> = Vec::new();

    for (key, value) in accepted.simple() {
        match doc.element(EntryKind::Simple, key) {
            Some(element) => splicer.fill_value(
                element.span.clone(),
                element.content.clone(),
                "string",
                value,
            ),
            None => new_elements.push((reference_position(reference, EntryKind::Simple, key), EntryKind::Simple, key)),
        }
    }
    for (key, forms) in accepted.plurals() {
        match doc.element(EntryKind::Plural, key) {
            Some(element) => merge_family(&mut splicer, element, forms),
            None => new_elements.push((reference_position(reference, EntryKind::Plural, key), EntryKind::Plural, key)),
        }
    }
    new_elements.sort_by_key(|(pos, _, _)| *pos);

    let mut empty_children = Vec::new();
    for (_, kind, key) in new_elements {
        let element = match kind {
            EntryKind::Simple => splicer
                .layout
                .string_element(key, accepted.simple().get(key).map_or("", String::as_str)),
            EntryKind::Plural => match accepted.plurals().get(key) {
                Some(forms) => splicer.layout.plurals_element(key, forms),
                None => continue,
            },
        };
        splicer.inserted += match kind {
            EntryKind::Simple => 1,
            EntryKind::Plural => accepted.plurals().get(key).map_or(0, BTreeMap::len),
        };
        let eol = splicer.layout.eol;
        let indent = splicer.layout.indent.clone();
        match placement(doc, reference, kind, key) {
            Placement::After(at) => splicer.insert(at, format!("{}{}{}", eol, indent, element)),
            Placement::Before(at) => splicer.insert(at, format!("{}{}{}", element, eol, indent)),
            Placement::Empty => empty_children.push(element),
        }
    }

    if !empty_children.is_empty() {
        let child_indent = splicer.layout.indent.clone();
        let closing_indent = indentation(text, resources.start_tag.start)
            .unwrap_or("")
            .to_string();
        match &resources.end_tag {
            Some(end_tag) => splicer.fill_empty(
                resources.start_tag.end..end_tag.start,
                &child_indent,
                &closing_indent,
                &empty_children,
            ),
            None => splicer.expand_container(
                resources.start_tag.clone(),
                "resources",
                &child_indent,
                &closing_indent,
                &empty_children,
            ),
        }
    }

    debug!(
        path = %target.path.display(),
        inserted = splicer.inserted,
        updated = splicer.updated,
        "merged translations"
    );
    Ok(splicer.apply(doc))
}

fn check_unique(target: &ResourceFile, kind: EntryKind, key: &str) -> Result<(), Error> {
    if target.document().is_duplicated(kind, key) {
        let tag = match kind {
            EntryKind::Simple => "string",
            EntryKind::Plural => "plurals",
        };
        return Err(Error::merge(
            &target.path,
            format!("duplicate <{}> key '{}'", tag, key),
        ));
    }
    Ok(())
}

fn merge_family(
    splicer: &mut Splicer<'_>,
    element: &Element,
    forms: &BTreeMap<PluralCategory, String>,
) {
    let text = splicer.text;
    let family_indent = indentation(text, element.span.start)
        .unwrap_or(&splicer.layout.indent)
        .to_string();
    let item_indent = element
        .items
        .iter()
        .find_map(|i| indentation(text, i.span.start))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}{}", family_indent, splicer.layout.unit));

    let Some(content) = element.content.clone() else {
        let children: Vec<String> = forms
            .iter()
            .map(|(c, v)| splicer.layout.item_element(*c, v))
            .collect();
        splicer.inserted += children.len();
        splicer.expand_container(
            element.span.clone(),
            "plurals",
            &item_indent,
            &family_indent,
            &children,
        );
        return;
    };

    let mut fresh = Vec::new();
    for (category, value) in forms {
        if let Some(item) = element.items.iter().find(|i| i.category == *category) {
            splicer.fill_value(item.span.clone(), item.content.clone(), "item", value);
            continue;
        }
        let rendered = splicer.layout.item_element(*category, value);
        splicer.inserted += 1;
        let eol = splicer.layout.eol;
        let before = element
            .items
            .iter()
            .filter(|i| i.category < *category)
            .max_by_key(|i| (i.category, i.span.start));
        let after = element
            .items
            .iter()
            .filter(|i| i.category > *category)
            .min_by_key(|i| (i.category, i.span.start));
        match (before, after) {
            (Some(prev), _) => splicer.insert(prev.span.end, format!("{}{}{}", eol, item_indent, rendered)),
            (None, Some(next)) => {
                splicer.insert(next.span.start, format!("{}{}{}", rendered, eol, item_indent))
            }
            (None, None) => fresh.push(rendered),
        }
    }
    if !fresh.is_empty() {
        splicer.fill_empty(content, &item_indent, &family_indent, &fresh);
    }
}

/// Index of an entry in the reference file, or past the end when absent.
fn reference_position(reference: &ResourceFile, kind: EntryKind, key: &str) -> usize {
    reference
        .entries
        .iter()
        .position(|e| e.kind() == kind && e.key() == key)
        .unwrap_or(usize::MAX)
}

fn placement(doc: &Document, reference: &ResourceFile, kind: EntryKind, key: &str) -> Placement {
    let text = doc.text();
    let order = &reference.entries;
    if let Some(pos) = order.iter().position(|e| e.kind() == kind && e.key() == key) {
        for entry in order[..pos].iter().rev() {
            if let Some(anchor) = doc.element(entry.kind(), entry.key()) {
                return Placement::After(past_trailing_comment(text, anchor.span.end));
            }
        }
        for entry in &order[pos + 1..] {
            if let Some(anchor) = doc.element(entry.kind(), entry.key()) {
                return Placement::Before(anchor.span.start);
            }
        }
    }
    match doc.elements().last() {
        Some(last) => Placement::After(past_trailing_comment(text, last.span.end)),
        None => Placement::Empty,
    }
}

/// Skip a comment that sits on the same line right after `pos`.
fn past_trailing_comment(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let after_gap = &rest[gap..];
    if !after_gap.starts_with("<!--") {
        return pos;
    }
    let line_end = after_gap.find('\n').unwrap_or(after_gap.len());
    match after_gap.find("-->") {
        Some(end) if end + 3 <= line_end => pos + gap + end + 3,
        _ => pos,
    }
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t' || c == '\r')
}

/// Leading whitespace of the line holding `pos`, if only whitespace precedes it.
fn indentation(text: &str, pos: usize) -> Option<&str> {
    let ls = line_start(text, pos);
    let prefix = &text[ls..pos];
    is_blank(prefix).then_some(prefix.trim_end_matches('\r'))
}

/// Turn `<tag attrs/>` into `<tag attrs>`.
fn open_tag(self_closing: &str) -> String {
    let body = self_closing
        .strip_suffix("/>")
        .unwrap_or(self_closing)
        .trim_end();
    format!("{}>", body)
}
