use std::path::Path;

use droidxlate::TargetLocale;
use unic_langid::LanguageIdentifier;

use crate::config::Settings;

/// Validation context for the `check` and `translate` commands
pub struct ValidationContext {
    pub roots: Vec<String>,
    pub report_file: Option<String>,
    pub locales: Vec<String>,
    pub dry_run: bool,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationContext {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            report_file: None,
            locales: Vec::new(),
            dry_run: false,
        }
    }

    pub fn with_root(mut self, root: String) -> Self {
        self.roots.push(root);
        self
    }

    pub fn with_report_file(mut self, file: String) -> Self {
        self.report_file = Some(file);
        self
    }

    pub fn with_locale(mut self, locale: String) -> Self {
        self.locales.push(locale);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Validate that a project root exists and is a directory
pub fn validate_root_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(format!("Path does not exist: {}", path));
    }

    if !path_obj.is_dir() {
        return Err(format!("Path is not a directory: {}", path));
    }

    Ok(())
}

/// Validate output directory exists or can be created
pub fn validate_output_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if path_obj.is_dir() {
        return Err(format!("Output path is a directory: {}", path));
    }

    if let Some(parent) = path_obj.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return Err(format!("Cannot create output directory: {}", e));
    }

    Ok(())
}

/// Parse a locale filter given either as an Android qualifier (`pt-rBR`,
/// `b+sr+Latn`) or as a BCP 47 tag (`pt-BR`).
pub fn parse_locale_filter(locale: &str) -> Result<LanguageIdentifier, String> {
    if locale.trim().is_empty() {
        return Err("Language code cannot be empty".to_string());
    }
    if let Ok(target) = TargetLocale::from_qualifier(locale) {
        return Ok(target.id);
    }
    locale.parse::<LanguageIdentifier>().map_err(|_| {
        format!(
            "Invalid language code format: {}. Expected an Android qualifier or a BCP 47 language identifier",
            locale
        )
    })
}

/// A translation run needs a key; a dry run does not.
pub fn validate_api_key(settings: &Settings, dry_run: bool) -> Result<(), String> {
    if dry_run || settings.api_key.is_some() {
        return Ok(());
    }
    Err(format!(
        "No API key for {}: set {} or pass --api-key",
        settings.provider,
        settings.provider.api_key_var()
    ))
}

/// Validate a complete validation context
pub fn validate_context(context: &ValidationContext) -> Result<(), String> {
    if context.roots.is_empty() {
        return Err("At least one project path is required".to_string());
    }
    for (i, root) in context.roots.iter().enumerate() {
        validate_root_path(root)
            .map_err(|e| format!("Project path {} validation failed: {}", i + 1, e))?;
    }

    if let Some(ref report) = context.report_file {
        validate_output_path(report).map_err(|e| format!("Report validation failed: {}", e))?;
    }

    for locale in &context.locales {
        parse_locale_filter(locale)
            .map_err(|e| format!("Locale filter validation failed: {}", e))?;
    }

    Ok(())
}
