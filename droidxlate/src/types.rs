//! Core types shared by the scanner, diff engine, orchestrator and merge engine.

use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    formats::android_strings::Document,
    locale::{Locale, TargetLocale},
    traits::Parser,
};

/// A `res` directory: one reference `values/` file and its `values-xx/` siblings.
#[derive(Debug, Clone)]
pub struct Module {
    /// Canonical path of the res root; identifies the module.
    pub root: PathBuf,

    /// Res root relative to the scanned project, `/`-separated.
    pub name: String,

    pub reference: Option<ResourceFile>,

    /// Target locale files, sorted by qualifier.
    pub targets: Vec<ResourceFile>,
}

impl Module {
    pub fn new(root: PathBuf, name: String) -> Self {
        Self {
            root,
            name,
            reference: None,
            targets: Vec::new(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.targets.len() + usize::from(self.reference.is_some())
    }

    pub fn target(&self, qualifier: &str) -> Option<&ResourceFile> {
        self.targets.iter().find(|t| match &t.locale {
            Locale::Target(l) => l.qualifier == qualifier,
            Locale::Reference => false,
        })
    }
}

/// One parsed `strings.xml` for one locale.
///
/// `entries` is a view derived from the underlying [`Document`], which keeps
/// the original text and node spans needed for lossless rewriting.
#[derive(Debug, Clone)]
pub struct ResourceFile {
    pub locale: Locale,
    pub path: PathBuf,
    pub entries: Vec<Entry>,
    document: Document,
}

impl ResourceFile {
    /// Read and parse a resource file from disk.
    pub fn load(path: impl AsRef<Path>, locale: Locale) -> Result<Self, Error> {
        let path = path.as_ref();
        let document = Document::read_from(path)?;
        Ok(Self::from_document(path.to_path_buf(), locale, document))
    }

    /// Parse a resource file from an in-memory string.
    pub fn parse_str(path: impl Into<PathBuf>, locale: Locale, xml: &str) -> Result<Self, Error> {
        let path = path.into();
        let document = Document::from_str(xml).map_err(|e| match e {
            Error::Parse { message, .. } => Error::parse(&path, message),
            Error::Xml(e) => Error::parse(&path, e.to_string()),
            other => other,
        })?;
        Ok(Self::from_document(path, locale, document))
    }

    pub(crate) fn from_document(path: PathBuf, locale: Locale, document: Document) -> Self {
        let entries = document.entries();
        Self {
            locale,
            path,
            entries,
            document,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn target_locale(&self) -> Option<&TargetLocale> {
        match &self.locale {
            Locale::Target(l) => Some(l),
            Locale::Reference => None,
        }
    }

    pub fn simple(&self, key: &str) -> Option<&SimpleEntry> {
        self.entries.iter().find_map(|e| match e {
            Entry::Simple(s) if s.key == key => Some(s),
            _ => None,
        })
    }

    pub fn plural(&self, key: &str) -> Option<&PluralFamily> {
        self.entries.iter().find_map(|e| match e {
            Entry::Plural(p) if p.key == key => Some(p),
            _ => None,
        })
    }

    pub fn has_key(&self, key: &str, kind: EntryKind) -> bool {
        match kind {
            EntryKind::Simple => self.simple(key).is_some(),
            EntryKind::Plural => self.plural(key).is_some(),
        }
    }

    /// Number of (strings, plurals) entries.
    pub fn summary(&self) -> (usize, usize) {
        let plurals = self
            .entries
            .iter()
            .filter(|e| matches!(e, Entry::Plural(_)))
            .count();
        (self.entries.len() - plurals, plurals)
    }
}

/// A translatable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    Simple(SimpleEntry),
    Plural(PluralFamily),
}

impl Entry {
    pub fn key(&self) -> &str {
        match self {
            Entry::Simple(s) => &s.key,
            Entry::Plural(p) => &p.key,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Simple(_) => EntryKind::Simple,
            Entry::Plural(_) => EntryKind::Plural,
        }
    }

    pub fn is_translatable(&self) -> bool {
        match self {
            Entry::Simple(s) => s.translatable,
            Entry::Plural(p) => p.translatable,
        }
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entry::Simple(s) => write!(f, "string {} = {}", s.key, s.value),
            Entry::Plural(p) => {
                let forms: Vec<String> = p
                    .forms
                    .iter()
                    .map(|(c, v)| format!("{}={}", c, v))
                    .collect();
                write!(f, "plurals {} {{ {} }}", p.key, forms.join(", "))
            }
        }
    }
}

/// Android resource type of an entry. Keys are unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Simple,
    Plural,
}

/// A `<string>` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleEntry {
    pub key: String,
    /// Display form: entities decoded, inline markup and CDATA kept verbatim.
    pub value: String,
    pub translatable: bool,
}

impl SimpleEntry {
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// A `<plurals>` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluralFamily {
    pub key: String,
    pub forms: BTreeMap<PluralCategory, String>,
    pub translatable: bool,
}

impl PluralFamily {
    /// Non-blank text for `category`, if present.
    pub fn form(&self, category: PluralCategory) -> Option<&str> {
        self.forms
            .get(&category)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn has_content(&self) -> bool {
        self.forms.values().any(|v| !v.trim().is_empty())
    }

    /// Source text to translate `category` from: the category itself, else
    /// `other`, else the first non-blank form.
    pub fn source_for(&self, category: PluralCategory) -> Option<&str> {
        self.form(category)
            .or_else(|| self.form(PluralCategory::Other))
            .or_else(|| {
                self.forms
                    .values()
                    .map(String::as_str)
                    .find(|v| !v.trim().is_empty())
            })
    }
}

/// Standard CLDR plural forms, in the order Android lists them.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Copy, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluralCategory {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralCategory {
    pub const ALL: [PluralCategory; 6] = [
        PluralCategory::Zero,
        PluralCategory::One,
        PluralCategory::Two,
        PluralCategory::Few,
        PluralCategory::Many,
        PluralCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PluralCategory::Zero => "zero",
            PluralCategory::One => "one",
            PluralCategory::Two => "two",
            PluralCategory::Few => "few",
            PluralCategory::Many => "many",
            PluralCategory::Other => "other",
        }
    }
}

impl Display for PluralCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluralCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ZERO" => Ok(PluralCategory::Zero),
            "ONE" => Ok(PluralCategory::One),
            "TWO" => Ok(PluralCategory::Two),
            "FEW" => Ok(PluralCategory::Few),
            "MANY" => Ok(PluralCategory::Many),
            "OTHER" => Ok(PluralCategory::Other),
            _ => Err(format!("Unknown plural category: {}", s)),
        }
    }
}

/// Identifier of one translatable item: a string key, or a plural key plus category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub category: Option<PluralCategory>,
}

impl ItemId {
    pub fn simple(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            category: None,
        }
    }

    pub fn plural(key: impl Into<String>, category: PluralCategory) -> Self {
        Self {
            key: key.into(),
            category: Some(category),
        }
    }

    /// Identifier sent to the backend: `key` or `key#category`.
    pub fn wire(&self) -> String {
        match self.category {
            Some(c) => format!("{}#{}", self.key, c),
            None => self.key.clone(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        if self.category.is_some() {
            EntryKind::Plural
        } else {
            EntryKind::Simple
        }
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.wire())
    }
}
