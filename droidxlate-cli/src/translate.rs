use std::{fs, sync::Arc};

use droidxlate::{
    CancelFlag, Orchestrator, OrchestratorConfig, RunStatus, UsageCounter,
    pipeline::{self, PipelineOptions},
};
use tracing::info;

use crate::{
    approval::StdinApprover,
    backend::HttpBackend,
    check::run_check_command,
    project::{ProjectOptions, load_settings, scan_projects},
    report::{render_json, render_markdown},
    validation::{ValidationContext, validate_api_key, validate_context},
};

#[derive(Clone, Default)]
pub struct TranslateOptions {
    pub project: ProjectOptions,
    pub dry_run: bool,
    pub json: bool,
    /// Write the markdown report here instead of stdout.
    pub report_file: Option<String>,
    pub interactive: bool,
}

/// Translate every missing entry and merge the results into the target files.
pub async fn run_translate_command(
    options: &TranslateOptions,
    cancel: CancelFlag,
) -> Result<RunStatus, String> {
    if options.dry_run {
        return run_check_command(&options.project, options.json);
    }

    let mut context = ValidationContext::new();
    for root in &options.project.roots {
        context = context.with_root(root.clone());
    }
    for locale in &options.project.locales {
        context = context.with_locale(locale.clone());
    }
    if let Some(report) = &options.report_file {
        context = context.with_report_file(report.clone());
    }
    validate_context(&context)?;

    let settings = load_settings(&options.project)?;
    validate_api_key(&settings, false)?;
    let backend = HttpBackend::new(&settings)?;
    let (modules, issues) = scan_projects(&options.project, &settings)?;

    let config = OrchestratorConfig {
        max_batch_size: settings.max_batch_size,
        context_limit: settings.reference_context_limit,
        project_context: settings.project_context.clone(),
        ..OrchestratorConfig::default()
    };
    let usage = Arc::new(UsageCounter::new(settings.request_budget));
    let mut orchestrator = Orchestrator::new(Arc::new(backend), config)
        .with_usage(Arc::clone(&usage))
        .with_cancel(cancel);
    let mut concurrency = settings.concurrency;
    if options.interactive {
        orchestrator = orchestrator.with_approver(Arc::new(StdinApprover::stdin()));
        concurrency = 1;
    }
    info!(
        provider = %settings.provider,
        model = %settings.model,
        modules = modules.len(),
        concurrency,
        "starting translation"
    );

    let pipeline_options = PipelineOptions {
        concurrency,
        dry_run: false,
    };
    let mut report = pipeline::run(modules, Arc::new(orchestrator), &pipeline_options).await;
    report.issues.splice(0..0, issues);

    let markdown = render_markdown(&report);
    match &options.report_file {
        Some(path) => {
            fs::write(path, &markdown).map_err(|e| format!("Error writing to {}: {}", path, e))?;
            info!(path = %path, "report written");
        }
        None if !options.json => print!("{}", markdown),
        None => {}
    }
    if options.json {
        println!("{}", render_json(&report)?);
    }

    let snapshot = usage.snapshot();
    info!(
        requests = snapshot.requests,
        items = snapshot.items,
        characters = snapshot.characters,
        failures = snapshot.failures,
        translated = report.translated_count(),
        "finished"
    );
    Ok(report.status())
}
