#![forbid(unsafe_code)]
//! Missing-translation tooling for Android `strings.xml` resources.
//!
//! Finds translatable entries present in a project's reference `values/`
//! strings but missing from its `values-xx/` locales, obtains translations
//! from a pluggable backend, and merges them back without disturbing the
//! rest of each file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use droidxlate::{ScanOptions, scan};
//!
//! let report = scan("path/to/project", &ScanOptions::default())?;
//! for module in &report.modules {
//!     let Some(reference) = &module.reference else { continue };
//!     for target in &module.targets {
//!         let locale = target.target_locale().expect("targets carry a locale");
//!         let missing = droidxlate::diff(reference, target, locale);
//!         println!("{} {}: {} missing", module.name, locale, missing.missing_count());
//!     }
//! }
//! # Ok::<(), droidxlate::Error>(())
//! ```
//!
//! # Pieces
//!
//! - [`scanner`]: locate resource modules under one or more roots
//! - [`diff`]: compare a target file against the reference
//! - [`orchestrator`]: batch, dispatch, reconcile and validate translations
//! - [`merge`]: splice accepted translations into the original file text
//! - [`pipeline`]: run the whole cycle concurrently and collect a report

pub mod diff;
pub mod error;
pub mod escape;
pub mod formats;
pub mod locale;
pub mod markup;
pub mod merge;
pub mod orchestrator;
pub mod pipeline;
pub mod placeholder;
pub mod plural_rules;
pub mod scanner;
pub mod traits;
pub mod types;

// Re-export most used types for easy consumption
pub use crate::{
    diff::{DiffResult, diff},
    error::{Error, ErrorKind},
    locale::{Locale, TargetLocale, language_name},
    merge::{MergeOutput, merge},
    orchestrator::{
        AcceptedTranslations, Approval, Approver, BatchRequest, BatchResponse, CancelFlag,
        Candidate, Orchestrator, OrchestratorConfig, TranslationBackend, TranslationOutcome,
        UsageCounter,
    },
    pipeline::{PipelineOptions, RunReport, RunStatus},
    scanner::{IgnoreFolders, IgnorePredicate, ScanOptions, ScanReport, scan, scan_all},
    types::{Entry, EntryKind, ItemId, Module, PluralCategory, PluralFamily, ResourceFile, SimpleEntry},
};
