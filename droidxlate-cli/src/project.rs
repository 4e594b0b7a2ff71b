//! Settings loading and project scanning shared by the commands.

use std::path::Path;

use droidxlate::{
    Module, ScanOptions, TargetLocale, pipeline::Issue, scan_all, types::ResourceFile,
};
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

use crate::{
    config::{FileConfig, Overrides, Settings},
    validation::parse_locale_filter,
};

/// Options common to every command that works on a project tree.
#[derive(Clone, Default)]
pub struct ProjectOptions {
    pub roots: Vec<String>,
    pub config: Option<String>,
    pub overrides: Overrides,
    /// Only these target locales; empty means all.
    pub locales: Vec<String>,
}

pub fn load_settings(options: &ProjectOptions) -> Result<Settings, String> {
    let file = FileConfig::load(options.config.as_deref().map(Path::new))?;
    Settings::resolve(&options.overrides, |name| std::env::var(name).ok(), file)
}

/// Scan every root and apply the locale filter.
pub fn scan_projects(
    options: &ProjectOptions,
    settings: &Settings,
) -> Result<(Vec<Module>, Vec<Issue>), String> {
    let scan_options = ScanOptions {
        gitignore: settings.gitignore,
        ignore_folders: settings.ignore_folders.clone(),
        ..ScanOptions::default()
    };
    let report = scan_all(&options.roots, &scan_options).map_err(|e| e.to_string())?;
    for issue in &report.issues {
        warn!("{}", issue);
    }
    let issues = report.issues.iter().map(Issue::from).collect();

    let filters = options
        .locales
        .iter()
        .map(|l| parse_locale_filter(l))
        .collect::<Result<Vec<_>, _>>()?;
    let mut modules = report.modules;
    if !filters.is_empty() {
        for module in &mut modules {
            module
                .targets
                .retain(|t| t.target_locale().is_some_and(|l| matches_filter(l, &filters)));
        }
    }

    for module in &modules {
        debug!(module = %module.name, files = module.file_count(), "module");
        if let Some(reference) = &module.reference {
            log_file(reference);
        }
        for target in &module.targets {
            log_file(target);
        }
    }
    Ok((modules, issues))
}

fn matches_filter(locale: &TargetLocale, filters: &[LanguageIdentifier]) -> bool {
    filters.iter().any(|f| {
        f == &locale.id
            || (f.region.is_none() && f.script.is_none() && f.language == locale.id.language)
    })
}

fn log_file(file: &ResourceFile) {
    let (strings, plurals) = file.summary();
    debug!(
        locale = %file.locale,
        path = %file.path.display(),
        strings,
        plurals,
        "resource file"
    );
}
