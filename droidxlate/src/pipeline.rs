//! The scan → diff → translate → merge cycle over a set of modules.
//!
//! Each (module, target file) pair is an independent task. A file is merged
//! and written as soon as its own translations are done, so an interrupted
//! run leaves every written file complete.

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{error, info, warn};

use crate::{
    diff::{DiffResult, diff, source_text_for},
    error::{Error, ErrorKind},
    locale::language_name,
    merge::merge,
    orchestrator::{
        DiscardedResponse, ItemFailure, Orchestrator, TranslationJob, TranslationOutcome,
        UsageSnapshot,
    },
    traits::write_atomic,
    types::{ItemId, Module},
};

/// How a run ended, mapped to the process exit status by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every missing item was translated and written.
    Completed,
    /// Nothing was missing.
    NoWork,
    /// Finished, but some items or files failed.
    Unresolved,
    /// The run could not be carried out.
    Fatal,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Fatal => 1,
            RunStatus::NoWork => 2,
            RunStatus::Unresolved => 3,
        }
    }
}

/// A non-fatal problem recorded during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl From<&Error> for Issue {
    fn from(error: &Error) -> Self {
        Issue {
            kind: error.kind(),
            path: error.path().cloned(),
            message: error.to_string(),
        }
    }
}

impl From<Error> for Issue {
    fn from(error: Error) -> Self {
        Issue::from(&error)
    }
}

/// An accepted translation with the text it was translated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedItem {
    pub id: ItemId,
    pub source: String,
    pub translation: String,
}

/// What happened to one target file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub module: String,
    /// Android qualifier, e.g. `pt-rBR`.
    pub locale: String,
    pub language: String,
    pub path: PathBuf,
    pub missing: DiffResult,
    pub translated: Vec<TranslatedItem>,
    pub rejected: Vec<ItemFailure>,
    pub unresolved: Vec<ItemFailure>,
    pub discarded: Vec<DiscardedResponse>,
    pub inserted: usize,
    pub updated: usize,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn new(module: &Module, index: usize, missing: DiffResult) -> Self {
        let target = &module.targets[index];
        let (locale, language) = match target.target_locale() {
            Some(l) => (l.qualifier.clone(), language_name(&l.id)),
            None => (String::new(), String::new()),
        };
        Self {
            module: module.name.clone(),
            locale,
            language,
            path: target.path.clone(),
            missing,
            translated: Vec::new(),
            rejected: Vec::new(),
            unresolved: Vec::new(),
            discarded: Vec::new(),
            inserted: 0,
            updated: 0,
            written: false,
            error: None,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.rejected.is_empty() || !self.unresolved.is_empty() || self.error.is_some()
    }
}

/// Accumulated result of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub files: Vec<FileReport>,
    /// Modules that were found without a usable reference file.
    pub skipped_modules: Vec<String>,
    pub issues: Vec<Issue>,
    pub usage: UsageSnapshot,
}

impl RunReport {
    pub fn missing_count(&self) -> usize {
        self.files.iter().map(|f| f.missing.missing_count()).sum()
    }

    pub fn translated_count(&self) -> usize {
        self.files.iter().map(|f| f.translated.len()).sum()
    }

    pub fn status(&self) -> RunStatus {
        if self.issues.iter().any(|i| i.kind == ErrorKind::Config) {
            return RunStatus::Fatal;
        }
        let failed = self.files.iter().any(FileReport::has_failures)
            || self
                .issues
                .iter()
                .any(|i| i.kind != ErrorKind::NoResourcesFound);
        if failed {
            RunStatus::Unresolved
        } else if self.missing_count() == 0 {
            RunStatus::NoWork
        } else {
            RunStatus::Completed
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Upper bound on files processed at once.
    pub concurrency: usize,
    /// Report missing entries only; nothing is translated or written.
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            dry_run: false,
        }
    }
}

/// Split modules into usable ones and report the rest.
fn usable_modules(modules: Vec<Module>, report: &mut RunReport) -> Vec<Arc<Module>> {
    let mut usable = Vec::new();
    for module in modules {
        if module.reference.is_none() {
            warn!(module = %module.name, "module has no readable reference strings.xml; skipping");
            report.skipped_modules.push(module.name.clone());
            continue;
        }
        usable.push(Arc::new(module));
    }
    usable
}

/// Diff every target file without translating.
pub fn dry_run(modules: Vec<Module>) -> RunReport {
    let mut report = RunReport {
        dry_run: true,
        ..RunReport::default()
    };
    for module in usable_modules(modules, &mut report) {
        for index in 0..module.targets.len() {
            if let Some(missing) = diff_target(&module, index) {
                report.files.push(FileReport::new(&module, index, missing));
            }
        }
    }
    report
}

fn diff_target(module: &Module, index: usize) -> Option<DiffResult> {
    let reference = module.reference.as_ref()?;
    let target = &module.targets[index];
    let locale = target.target_locale()?;
    let result = diff(reference, target, locale);
    info!(
        module = %module.name,
        locale = %locale,
        missing = result.missing_count(),
        stale = result.stale.len(),
        "diffed"
    );
    Some(result)
}

/// Translate and merge every target file of `modules`.
pub async fn run(
    modules: Vec<Module>,
    orchestrator: Arc<Orchestrator>,
    options: &PipelineOptions,
) -> RunReport {
    if options.dry_run {
        let mut report = dry_run(modules);
        report.usage = orchestrator.usage().snapshot();
        return report;
    }

    let mut report = RunReport::default();
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for module in usable_modules(modules, &mut report) {
        for index in 0..module.targets.len() {
            let module = Arc::clone(&module);
            let orchestrator = Arc::clone(&orchestrator);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                process_file(&module, index, &orchestrator).await
            });
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(file)) => report.files.push(file),
            Ok(None) => {}
            Err(e) => report.issues.push(Issue {
                kind: ErrorKind::Io,
                path: None,
                message: format!("translation task failed: {}", e),
            }),
        }
    }
    report
        .files
        .sort_by(|a, b| (&a.module, &a.locale).cmp(&(&b.module, &b.locale)));
    for file in &report.files {
        if let Some(message) = &file.error {
            report.issues.push(Issue {
                kind: ErrorKind::Merge,
                path: Some(file.path.clone()),
                message: message.clone(),
            });
        }
    }
    report.usage = orchestrator.usage().snapshot();
    report
}

async fn process_file(
    module: &Module,
    index: usize,
    orchestrator: &Orchestrator,
) -> Option<FileReport> {
    let missing = diff_target(module, index)?;
    let reference = module.reference.as_ref()?;
    let target = &module.targets[index];
    let locale = target.target_locale()?;
    let mut file = FileReport::new(module, index, missing);
    if file.missing.is_empty() {
        return Some(file);
    }

    let job = TranslationJob {
        module: &module.name,
        reference,
        target,
        locale,
        diff: &file.missing,
    };
    let TranslationOutcome {
        accepted,
        rejected,
        unresolved,
        discarded,
        ..
    } = orchestrator.translate(&job).await;
    file.rejected = rejected;
    file.unresolved = unresolved;
    file.discarded = discarded;

    for failure in &file.unresolved {
        warn!(
            module = %module.name,
            locale = %locale,
            key = %failure.id,
            reason = %failure.reason,
            "item unresolved"
        );
    }
    if accepted.is_empty() {
        return Some(file);
    }

    let written = merge(target, reference, &accepted)
        .and_then(|output| write_atomic(&target.path, &output.bytes).map(|()| output));
    match written {
        Ok(output) => {
            file.inserted = output.inserted;
            file.updated = output.updated;
            file.written = true;
            file.translated = file
                .missing
                .missing_items()
                .into_iter()
                .filter_map(|id| {
                    let translation = accepted.get(&id)?.to_string();
                    let source = source_text_for(reference, &id)?.to_string();
                    Some(TranslatedItem {
                        id,
                        source,
                        translation,
                    })
                })
                .collect();
            info!(
                module = %module.name,
                locale = %locale,
                path = %target.path.display(),
                inserted = output.inserted,
                updated = output.updated,
                "wrote translations"
            );
        }
        Err(e) => {
            error!(path = %target.path.display(), error = %e, "failed to write translations");
            file.error = Some(e.to_string());
        }
    }
    Some(file)
}
