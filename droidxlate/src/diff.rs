//! Missing and stale entries of a target locale relative to the reference.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    locale::TargetLocale,
    plural_rules::missing_categories_for_plural,
    types::{Entry, EntryKind, ItemId, PluralCategory, ResourceFile},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingPlural {
    pub key: String,
    pub category: PluralCategory,
    /// Whether the target already has a `<plurals>` element for `key`.
    pub family_exists: bool,
}

/// A target entry whose key no longer exists in the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleEntry {
    pub key: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub missing_simple: Vec<String>,
    pub missing_plural: Vec<MissingPlural>,
    pub stale: Vec<StaleEntry>,
}

impl DiffResult {
    /// True when nothing needs translating. Stale entries do not count.
    pub fn is_empty(&self) -> bool {
        self.missing_simple.is_empty() && self.missing_plural.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.missing_simple.len() + self.missing_plural.len()
    }

    /// Every missing item, strings first, in reference order.
    pub fn missing_items(&self) -> Vec<ItemId> {
        self.missing_simple
            .iter()
            .map(ItemId::simple)
            .chain(
                self.missing_plural
                    .iter()
                    .map(|p| ItemId::plural(p.key.clone(), p.category)),
            )
            .collect()
    }
}

/// Reference text to translate for `item`.
///
/// A plural category the reference lacks falls back to its `other` form, then
/// to the first non-blank form.
pub fn source_text_for<'a>(reference: &'a ResourceFile, item: &ItemId) -> Option<&'a str> {
    match item.category {
        None => reference
            .simple(&item.key)
            .map(|s| s.value.as_str())
            .filter(|v| !v.trim().is_empty()),
        Some(category) => reference.plural(&item.key)?.source_for(category),
    }
}

/// Compare `target` against `reference` for `locale`.
pub fn diff(reference: &ResourceFile, target: &ResourceFile, locale: &TargetLocale) -> DiffResult {
    let mut result = DiffResult::default();

    for entry in &reference.entries {
        if !entry.is_translatable() {
            continue;
        }
        match entry {
            Entry::Simple(s) => {
                if s.is_blank() {
                    continue;
                }
                let present = target.simple(&s.key).is_some_and(|t| !t.is_blank());
                if !present {
                    result.missing_simple.push(s.key.clone());
                }
            }
            Entry::Plural(p) => {
                if !p.has_content() {
                    continue;
                }
                let existing = target.plural(&p.key);
                for category in missing_categories_for_plural(&locale.id, p, existing) {
                    result.missing_plural.push(MissingPlural {
                        key: p.key.clone(),
                        category,
                        family_exists: existing.is_some(),
                    });
                }
            }
        }
    }

    let reference_keys: HashSet<(EntryKind, &str)> = reference
        .entries
        .iter()
        .map(|e| (e.kind(), e.key()))
        .collect();
    for entry in &target.entries {
        if entry.is_translatable() && !reference_keys.contains(&(entry.kind(), entry.key())) {
            result.stale.push(StaleEntry {
                key: entry.key().to_string(),
                kind: entry.kind(),
            });
        }
    }

    result
}
