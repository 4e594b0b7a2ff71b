use droidxlate::{RunStatus, pipeline};

use crate::{
    project::{ProjectOptions, load_settings, scan_projects},
    report::{render_json, render_missing},
    validation::{ValidationContext, validate_context},
};

/// Report missing translations without contacting any backend.
pub fn run_check_command(options: &ProjectOptions, json: bool) -> Result<RunStatus, String> {
    let mut context = ValidationContext::new().with_dry_run(true);
    for root in &options.roots {
        context = context.with_root(root.clone());
    }
    for locale in &options.locales {
        context = context.with_locale(locale.clone());
    }
    validate_context(&context)?;

    let settings = load_settings(options)?;
    let (modules, issues) = scan_projects(options, &settings)?;
    let mut report = pipeline::dry_run(modules);
    report.issues.splice(0..0, issues);

    if json {
        println!("{}", render_json(&report)?);
    } else {
        print!("{}", render_missing(&report));
    }
    Ok(report.status())
}
