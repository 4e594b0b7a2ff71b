//! Discovery of Android resource modules inside a project tree.

use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::{
    error::Error,
    locale::{Locale, ValuesDir, parse_values_dir},
    types::{Module, ResourceFile},
};

/// Decides whether a path found during the walk should be skipped.
pub trait IgnorePredicate: Send + Sync {
    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool;
}

/// Ignores directories whose name matches one of a set of names or glob patterns.
#[derive(Debug, Clone)]
pub struct IgnoreFolders {
    set: GlobSet,
    empty: bool,
}

impl IgnoreFolders {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim().trim_end_matches('/');
            if pattern.is_empty() {
                continue;
            }
            let glob = Glob::new(pattern).map_err(|e| {
                Error::Config(format!("invalid ignore folder pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build ignore folder set: {}", e)))?;
        Ok(Self {
            empty: set.is_empty(),
            set,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

impl IgnorePredicate for IgnoreFolders {
    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        is_dir && path.file_name().is_some_and(|name| self.set.is_match(name))
    }
}

#[derive(Clone)]
pub struct ScanOptions {
    /// Resource file name to look for.
    pub file_name: String,
    /// Honour `.gitignore` files. Only applies when no ignore folders are given.
    pub gitignore: bool,
    pub ignore_folders: Vec<String>,
    pub extra_ignore: Option<Arc<dyn IgnorePredicate>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            file_name: "strings.xml".to_string(),
            gitignore: true,
            ignore_folders: Vec::new(),
            extra_ignore: None,
        }
    }
}

impl std::fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("file_name", &self.file_name)
            .field("gitignore", &self.gitignore)
            .field("ignore_folders", &self.ignore_folders)
            .field("extra_ignore", &self.extra_ignore.is_some())
            .finish()
    }
}

/// Modules found by a scan plus the non-fatal problems met on the way.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub modules: Vec<Module>,
    pub issues: Vec<Error>,
}

impl ScanReport {
    pub fn file_count(&self) -> usize {
        self.modules.iter().map(Module::file_count).sum()
    }
}

/// Scan one project root.
///
/// Fails only when the root itself cannot be read; every other problem is
/// recorded in [`ScanReport::issues`].
pub fn scan(root: impl AsRef<Path>, options: &ScanOptions) -> Result<ScanReport, Error> {
    let root = root.as_ref();
    let canonical_root = root.canonicalize().map_err(|e| Error::Scan {
        path: root.to_path_buf(),
        message: format!("cannot read project root: {}", e),
    })?;
    if !canonical_root.is_dir() {
        return Err(Error::Scan {
            path: root.to_path_buf(),
            message: "project root is not a directory".to_string(),
        });
    }

    let folders = IgnoreFolders::new(&options.ignore_folders)?;
    let use_gitignore = options.gitignore && folders.is_empty();
    let extra = options.extra_ignore.clone();

    let walker = WalkBuilder::new(&canonical_root)
        .hidden(false)
        .git_ignore(use_gitignore)
        .git_global(use_gitignore)
        .git_exclude(use_gitignore)
        .ignore(use_gitignore)
        .parents(use_gitignore)
        .require_git(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if is_dir && entry.file_name() == ".git" {
                return false;
            }
            if folders.is_ignored(entry.path(), is_dir) {
                return false;
            }
            !extra
                .as_ref()
                .is_some_and(|p| p.is_ignored(entry.path(), is_dir))
        })
        .build();

    let mut modules: BTreeMap<PathBuf, Module> = BTreeMap::new();
    let mut issues = Vec::new();

    for dent in walker {
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "walk error");
                issues.push(Error::Scan {
                    path: canonical_root.clone(),
                    message: e.to_string(),
                });
                continue;
            }
        };
        if !dent.file_type().is_some_and(|t| t.is_file()) || dent.file_name() != options.file_name.as_str() {
            continue;
        }
        let path = dent.path();
        let Some(values_dir) = path.parent() else {
            continue;
        };
        let Some(res_root) = values_dir.parent() else {
            continue;
        };
        let dir_name = values_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let locale = match parse_values_dir(&dir_name) {
            Ok(ValuesDir::Reference) => Locale::Reference,
            Ok(ValuesDir::Locale(l)) => Locale::Target(l),
            Ok(ValuesDir::ConfigVariant(q)) => {
                debug!(path = %path.display(), qualifiers = %q, "skipping configuration variant");
                continue;
            }
            Ok(ValuesDir::Other) => continue,
            Err(message) => {
                warn!(path = %values_dir.display(), %message, "malformed resource directory");
                issues.push(Error::Scan {
                    path: values_dir.to_path_buf(),
                    message,
                });
                continue;
            }
        };

        let file = match ResourceFile::load(path, locale) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse resource file");
                issues.push(e);
                continue;
            }
        };
        for (kind, key) in file.document().duplicates() {
            warn!(path = %path.display(), %key, ?kind, "duplicate resource key");
        }
        debug!(path = %path.display(), locale = %file.locale, entries = file.entries.len(), "parsed resource file");

        let module = modules.entry(res_root.to_path_buf()).or_insert_with(|| {
            Module::new(res_root.to_path_buf(), module_name(&canonical_root, res_root))
        });
        if file.locale == Locale::Reference {
            module.reference = Some(file);
        } else {
            module.targets.push(file);
        }
    }

    let mut modules: Vec<Module> = modules.into_values().collect();
    for module in &mut modules {
        module.targets.sort_by(|a, b| a.locale.to_string().cmp(&b.locale.to_string()));
    }
    modules.sort_by(|a, b| a.name.cmp(&b.name));

    if modules.is_empty() {
        issues.push(Error::NoResourcesFound(root.to_path_buf()));
    }
    info!(
        root = %root.display(),
        modules = modules.len(),
        "scan finished"
    );
    Ok(ScanReport { modules, issues })
}

/// Scan several roots. Modules reachable from more than one root are kept once.
pub fn scan_all<P: AsRef<Path>>(roots: &[P], options: &ScanOptions) -> Result<ScanReport, Error> {
    let mut report = ScanReport::default();
    for root in roots {
        let part = scan(root, options)?;
        report.issues.extend(part.issues);
        for module in part.modules {
            if report.modules.iter().any(|m| m.root == module.root) {
                debug!(module = %module.name, "module already scanned from another root");
                continue;
            }
            report.modules.push(module);
        }
    }
    Ok(report)
}

fn module_name(root: &Path, res_root: &Path) -> String {
    let relative: Vec<String> = res_root
        .strip_prefix(root)
        .unwrap_or(res_root)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if relative.is_empty() {
        root.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root.display().to_string())
    } else {
        relative.join("/")
    }
}
