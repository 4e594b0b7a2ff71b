//! Android `values-*` qualifier parsing and language display names.

use std::fmt::Display;

use lazy_static::lazy_static;
use regex::Regex;
use unic_langid::LanguageIdentifier;

/// The locale a resource file belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locale {
    /// The unqualified `values/` directory.
    Reference,
    Target(TargetLocale),
}

impl Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locale::Reference => f.write_str("default"),
            Locale::Target(l) => f.write_str(&l.qualifier),
        }
    }
}

/// A target locale as written in the directory name, plus its parsed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLocale {
    /// Raw Android qualifier, e.g. `zh-rCN` or `b+sr+Latn`.
    pub qualifier: String,
    pub id: LanguageIdentifier,
}

impl TargetLocale {
    pub fn new(qualifier: impl Into<String>, id: LanguageIdentifier) -> Self {
        Self {
            qualifier: qualifier.into(),
            id,
        }
    }

    /// Parse a qualifier such as `es`, `pt-rBR` or `b+sr+Latn`.
    pub fn from_qualifier(qualifier: &str) -> Result<Self, String> {
        match parse_values_dir(&format!("values-{}", qualifier))? {
            ValuesDir::Locale(locale) => Ok(locale),
            _ => Err(format!("'{}' is not a locale qualifier", qualifier)),
        }
    }

    /// BCP 47 tag, e.g. `pt-BR`.
    pub fn tag(&self) -> String {
        self.id.to_string()
    }

    pub fn display_name(&self) -> String {
        language_name(&self.id)
    }
}

impl Display for TargetLocale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.qualifier)
    }
}

/// Classification of a resource directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuesDir {
    Reference,
    Locale(TargetLocale),
    /// Carries a non-locale configuration qualifier (`night`, `v21`, ...).
    ConfigVariant(String),
    /// Not a `values` directory at all.
    Other,
}

lazy_static! {
    static ref CONFIG_QUALIFIER: Regex = Regex::new(
        r"(?x)^(
            mcc\d+ | mnc\d+ |
            ldrtl | ldltr |
            sw\d+dp | w\d+dp | h\d+dp |
            small | normal | large | xlarge |
            long | notlong |
            round | notround |
            widecg | nowidecg | highdr | lowdr |
            port | land |
            car | desk | television | appliance | watch | vrheadset |
            night | notnight |
            ldpi | mdpi | tvdpi | hdpi | xhdpi | xxhdpi | xxxhdpi | nodpi | anydpi | \d+dpi |
            notouch | finger | stylus |
            keysexposed | keyshidden | keyssoft |
            nokeys | qwerty | 12key |
            navexposed | navhidden |
            nonav | dpad | trackball | wheel |
            \d+x\d+ |
            v\d+ |
            feminine | masculine | neuter
        )$"
    )
    .unwrap();
    static ref LANGUAGE: Regex = Regex::new(r"^[a-z]{2,3}$").unwrap();
    static ref REGION: Regex = Regex::new(r"^r([A-Z]{2}|[0-9]{3})$").unwrap();
}

/// Classify a directory name such as `values`, `values-es` or `values-night`.
///
/// Returns `Err` for `values-*` names whose qualifiers are neither a locale
/// nor a known configuration qualifier.
pub fn parse_values_dir(name: &str) -> Result<ValuesDir, String> {
    if name == "values" {
        return Ok(ValuesDir::Reference);
    }
    let Some(rest) = name.strip_prefix("values-") else {
        return Ok(ValuesDir::Other);
    };

    let mut language: Option<String> = None;
    let mut region: Option<String> = None;
    let mut bcp47: Option<String> = None;
    let mut config = false;

    for token in rest.split('-') {
        if CONFIG_QUALIFIER.is_match(token) {
            config = true;
        } else if let Some(tag) = token.strip_prefix("b+") {
            if language.is_some() || bcp47.is_some() {
                return Err(format!("duplicate locale qualifier in '{}'", name));
            }
            bcp47 = Some(tag.replace('+', "-"));
        } else if language.is_none() && bcp47.is_none() && LANGUAGE.is_match(token) {
            language = Some(token.to_string());
        } else if language.is_some() && region.is_none() && REGION.is_match(token) {
            region = Some(token[1..].to_string());
        } else {
            return Err(format!("unrecognized qualifier '{}' in '{}'", token, name));
        }
    }

    let tag = match (bcp47, language, region) {
        (Some(tag), _, _) => Some(tag),
        (None, Some(lang), Some(region)) => Some(format!("{}-{}", lang, region)),
        (None, Some(lang), None) => Some(lang),
        (None, None, _) => None,
    };

    if config {
        return Ok(ValuesDir::ConfigVariant(rest.to_string()));
    }
    let Some(tag) = tag else {
        return Err(format!("no locale qualifier in '{}'", name));
    };
    let mut id: LanguageIdentifier = tag
        .parse()
        .map_err(|e| format!("invalid locale '{}' in '{}': {}", tag, name, e))?;
    canonicalize_legacy(&mut id);
    Ok(ValuesDir::Locale(TargetLocale::new(rest, id)))
}

/// Android still ships the pre-ISO 639 codes for Hebrew, Indonesian and Yiddish.
fn canonicalize_legacy(id: &mut LanguageIdentifier) {
    let replacement = match id.language.as_str() {
        "iw" => "he",
        "in" => "id",
        "ji" => "yi",
        _ => return,
    };
    if let Ok(lang) = replacement.parse() {
        id.language = lang;
    }
}

lazy_static! {
    static ref LANGUAGE_NAMES: Vec<(&'static str, &'static str)> = vec![
        ("af", "Afrikaans"),
        ("ar", "Arabic"),
        ("be", "Belarusian"),
        ("bn", "Bangla"),
        ("bs", "Bosnian"),
        ("cs", "Czech"),
        ("da", "Danish"),
        ("de", "German"),
        ("el", "Greek"),
        ("en", "English"),
        ("es", "Spanish"),
        ("et", "Estonian"),
        ("eu", "Basque"),
        ("fa", "Persian"),
        ("fi", "Finnish"),
        ("fil", "Filipino"),
        ("fr", "French"),
        ("ga", "Irish"),
        ("gl", "Galician"),
        ("gu", "Gujarati"),
        ("he", "Hebrew"),
        ("hi", "Hindi"),
        ("hr", "Croatian"),
        ("hu", "Hungarian"),
        ("hy", "Armenian"),
        ("id", "Indonesian"),
        ("is", "Icelandic"),
        ("it", "Italian"),
        ("ja", "Japanese"),
        ("kab", "Kabyle"),
        ("km", "Khmer"),
        ("kn", "Kannada"),
        ("ko", "Korean"),
        ("lo", "Lao"),
        ("lt", "Lithuanian"),
        ("lv", "Latvian"),
        ("mk", "Macedonian"),
        ("ml", "Malayalam"),
        ("mr", "Marathi"),
        ("ms", "Malay"),
        ("my", "Burmese"),
        ("nb", "Norwegian Bokmål"),
        ("nl", "Dutch"),
        ("nn", "Norwegian Nynorsk"),
        ("no", "Norwegian"),
        ("pl", "Polish"),
        ("pt", "Portuguese"),
        ("ro", "Romanian"),
        ("ru", "Russian"),
        ("sk", "Slovak"),
        ("sl", "Slovenian"),
        ("sr", "Serbian"),
        ("sv", "Swedish"),
        ("sw", "Swahili"),
        ("ta", "Tamil"),
        ("te", "Telugu"),
        ("th", "Thai"),
        ("tl", "Tagalog"),
        ("tr", "Turkish"),
        ("uk", "Ukrainian"),
        ("ur", "Urdu"),
        ("vi", "Vietnamese"),
        ("yi", "Yiddish"),
        ("yue", "Cantonese"),
        ("zh", "Chinese"),
    ];
    static ref REGION_NAMES: Vec<(&'static str, &'static str)> = vec![
        ("AR", "Argentina"),
        ("AT", "Austria"),
        ("AU", "Australia"),
        ("BE", "Belgium"),
        ("BR", "Brazil"),
        ("CA", "Canada"),
        ("CH", "Switzerland"),
        ("CN", "China"),
        ("DE", "Germany"),
        ("ES", "Spain"),
        ("FR", "France"),
        ("GB", "United Kingdom"),
        ("HK", "Hong Kong SAR China"),
        ("IN", "India"),
        ("MX", "Mexico"),
        ("PT", "Portugal"),
        ("TW", "Taiwan"),
        ("US", "United States"),
        ("419", "Latin America"),
    ];
    static ref SCRIPT_NAMES: Vec<(&'static str, &'static str)> = vec![
        ("Cyrl", "Cyrillic"),
        ("Hans", "Simplified"),
        ("Hant", "Traditional"),
        ("Latn", "Latin"),
    ];
}

fn lookup(table: &[(&'static str, &'static str)], code: &str) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

/// English display name for a language, e.g. `Portuguese (Brazil)` for `pt-BR`.
///
/// Falls back to the language tag itself when the base language is unknown.
pub fn language_name(id: &LanguageIdentifier) -> String {
    let Some(base) = lookup(&LANGUAGE_NAMES, id.language.as_str()) else {
        return id.to_string();
    };
    let mut qualifiers = Vec::new();
    if let Some(script) = id.script.as_ref() {
        qualifiers.push(lookup(&SCRIPT_NAMES, script.as_str()).unwrap_or(script.as_str()));
    }
    if let Some(region) = id.region.as_ref() {
        qualifiers.push(lookup(&REGION_NAMES, region.as_str()).unwrap_or(region.as_str()));
    }
    if qualifiers.is_empty() {
        base.to_string()
    } else {
        format!("{} ({})", base, qualifiers.join(", "))
    }
}

/// Display name for a [`Locale`]; the reference locale is rendered as the default language.
pub fn locale_name(locale: &Locale) -> String {
    match locale {
        Locale::Reference => "Default (English)".to_string(),
        Locale::Target(l) => l.display_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale(name: &str) -> TargetLocale {
        match parse_values_dir(name).unwrap() {
            ValuesDir::Locale(l) => l,
            other => panic!("expected locale for {name}, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_and_other_dirs() {
        assert_eq!(parse_values_dir("values").unwrap(), ValuesDir::Reference);
        assert_eq!(parse_values_dir("drawable").unwrap(), ValuesDir::Other);
        assert_eq!(parse_values_dir("values_old").unwrap(), ValuesDir::Other);
    }

    #[test]
    fn test_locale_qualifiers() {
        assert_eq!(locale("values-es").tag(), "es");
        assert_eq!(locale("values-pt-rBR").tag(), "pt-BR");
        assert_eq!(locale("values-pt-rBR").qualifier, "pt-rBR");
        assert_eq!(locale("values-b+sr+Latn").tag(), "sr-Latn");
        assert_eq!(locale("values-b+es+419").tag(), "es-419");
        assert_eq!(locale("values-fil").tag(), "fil");
    }

    #[test]
    fn test_legacy_codes_are_canonicalized() {
        let he = locale("values-iw");
        assert_eq!(he.qualifier, "iw");
        assert_eq!(he.id.language.as_str(), "he");
        assert_eq!(locale("values-in").id.language.as_str(), "id");
        assert_eq!(locale("values-ji").id.language.as_str(), "yi");
    }

    #[test]
    fn test_config_variants_are_flagged() {
        for name in [
            "values-night",
            "values-v21",
            "values-sw600dp",
            "values-land",
            "values-es-night",
            "values-hdpi",
            "values-mcc310-mnc004",
            "values-car",
        ] {
            assert!(
                matches!(parse_values_dir(name).unwrap(), ValuesDir::ConfigVariant(_)),
                "{name} should be a config variant"
            );
        }
    }

    #[test]
    fn test_malformed_qualifiers() {
        assert!(parse_values_dir("values-zz123").is_err());
        assert!(parse_values_dir("values-").is_err());
        assert!(parse_values_dir("values-es-fr").is_err());
        assert!(parse_values_dir("values-rUS").is_err());
    }

    #[test]
    fn test_language_names() {
        assert_eq!(locale("values-es").display_name(), "Spanish");
        assert_eq!(locale("values-pt-rBR").display_name(), "Portuguese (Brazil)");
        assert_eq!(locale("values-b+zh+Hans+CN").display_name(), "Chinese (Simplified, China)");
        assert_eq!(locale("values-xx").display_name(), "xx");
        assert_eq!(locale_name(&Locale::Reference), "Default (English)");
    }

    #[test]
    fn test_from_qualifier() {
        assert_eq!(TargetLocale::from_qualifier("zh-rTW").unwrap().tag(), "zh-TW");
        assert!(TargetLocale::from_qualifier("night").is_err());
    }
}
