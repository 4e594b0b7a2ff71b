use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use unic_langid::LanguageIdentifier;

use crate::types::{PluralCategory, PluralFamily};

lazy_static! {
    /// Static mapping from base language subtag → required plural categories (CLDR‑style, cardinals).
    static ref CATEGORY_TABLE: BTreeMap<&'static str, BTreeSet<PluralCategory>> = {
        use PluralCategory::*;
        let mut m: BTreeMap<&'static str, BTreeSet<PluralCategory>> = BTreeMap::new();

        fn s(items: &[PluralCategory]) -> BTreeSet<PluralCategory> {
            items.iter().cloned().collect()
        }

        // One/Other
        for code in [
            "en","de","nl","sv","da","nb","nn","no","is","fi","et","fa","hi","bn","gu",
            "ta","te","kn","ml","mr","it","es","pt","mk","el","eu","gl","af","sw","ur",
            "fil","tl","tr","fr","hy","kab","hu","yi"
        ] {
            m.insert(code, s(&[One, Other]));
        }

        // Only Other
        for code in ["ja","zh","ko","th","vi","km","lo","my","yue","id","ms"] {
            m.insert(code, s(&[Other]));
        }

        // East Slavic, BCS, Polish
        for code in ["ru","uk","be","sr","hr","bs","sh","pl"] {
            m.insert(code, s(&[One, Few, Many, Other]));
        }

        for code in ["cs","sk","lt","ro"] {
            m.insert(code, s(&[One, Few, Other]));
        }

        m.insert("sl", s(&[One, Two, Few, Other]));
        m.insert("lv", s(&[Zero, One, Other]));
        m.insert("ga", s(&[One, Two, Few, Many, Other]));
        m.insert("ar", s(&[Zero, One, Two, Few, Many, Other]));

        // Hebrew (legacy code iw also maps here)
        for code in ["he","iw"] {
            m.insert(code, s(&[One, Two, Many, Other]));
        }

        m
    };
}

/// Plural categories the rule table requires for `lang`, or `None` when the
/// language is not covered.
pub fn rule_for(lang: &LanguageIdentifier) -> Option<&'static BTreeSet<PluralCategory>> {
    CATEGORY_TABLE.get(lang.language.as_str())
}

/// Returns the plural categories a target locale must provide for `reference`.
///
/// Locales outside the table fall back to the categories the reference family
/// itself uses, plus `other`.
pub fn required_categories_for(
    lang: &LanguageIdentifier,
    reference: &PluralFamily,
) -> BTreeSet<PluralCategory> {
    match rule_for(lang) {
        Some(set) => set.clone(),
        None => {
            let mut set: BTreeSet<PluralCategory> = reference.forms.keys().cloned().collect();
            set.insert(PluralCategory::Other);
            set
        }
    }
}

/// Required categories that `target` lacks or leaves blank.
pub fn missing_categories_for_plural(
    lang: &LanguageIdentifier,
    reference: &PluralFamily,
    target: Option<&PluralFamily>,
) -> BTreeSet<PluralCategory> {
    required_categories_for(lang, reference)
        .into_iter()
        .filter(|c| target.and_then(|t| t.form(*c)).is_none())
        .collect()
}
