//! Rendering of run reports: the markdown translation report, the dry-run
//! missing report and JSON.

use std::collections::BTreeMap;

use droidxlate::{
    RunReport,
    pipeline::FileReport,
    types::{EntryKind, ItemId},
};

fn cell(text: &str) -> String {
    text.replace('\n', " ").replace('|', "\\|")
}

/// Markdown report of every translation that was merged.
pub fn render_markdown(report: &RunReport) -> String {
    let mut out = String::from("# Translation Report\n\n");
    let mut any = false;

    for (module, files) in by_module(report) {
        let translated: Vec<&FileReport> = files
            .into_iter()
            .filter(|f| !f.translated.is_empty() || !f.unresolved.is_empty())
            .collect();
        if translated.is_empty() {
            continue;
        }
        out.push_str(&format!("## Module: {}\n\n", module));
        for file in translated {
            any |= !file.translated.is_empty();
            out.push_str(&format!("### Language: {}\n\n", file.language));
            render_file(file, &mut out);
        }
    }

    if !any {
        out.push_str("No translations were performed.\n");
    }
    out
}

fn render_file(file: &FileReport, out: &mut String) {
    let simple: Vec<_> = file
        .translated
        .iter()
        .filter(|t| t.id.kind() == EntryKind::Simple)
        .collect();
    if !simple.is_empty() {
        out.push_str("| Key | Source Text | Translated Text |\n");
        out.push_str("| --- | ----------- | --------------- |\n");
        for item in simple {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                item.id.key,
                cell(&item.source),
                cell(&item.translation)
            ));
        }
        out.push('\n');
    }

    let mut families: BTreeMap<&str, Vec<(&ItemId, &str)>> = BTreeMap::new();
    for item in &file.translated {
        if item.id.kind() == EntryKind::Plural {
            families
                .entry(item.id.key.as_str())
                .or_default()
                .push((&item.id, item.translation.as_str()));
        }
    }
    if !families.is_empty() {
        out.push_str("#### Plural Resources\n\n");
        for (key, forms) in families {
            out.push_str(&format!("**{}**\n\n", key));
            out.push_str("| Quantity | Translated Text |\n");
            out.push_str("| -------- | --------------- |\n");
            for (id, text) in forms {
                let quantity = id.category.map(|c| c.as_str()).unwrap_or("other");
                out.push_str(&format!("| {} | {} |\n", quantity, cell(text)));
            }
            out.push('\n');
        }
    }

    if !file.unresolved.is_empty() {
        out.push_str("#### Unresolved\n\n");
        out.push_str("| Key | Reason |\n");
        out.push_str("| --- | ------ |\n");
        for failure in &file.unresolved {
            out.push_str(&format!(
                "| {} | {} |\n",
                failure.id,
                cell(&failure.reason.to_string())
            ));
        }
        out.push('\n');
    }
}

fn by_module(report: &RunReport) -> BTreeMap<&str, Vec<&FileReport>> {
    let mut modules: BTreeMap<&str, Vec<&FileReport>> = BTreeMap::new();
    for file in &report.files {
        modules.entry(file.module.as_str()).or_default().push(file);
    }
    modules
}

/// Plain-text listing of what is missing per module and locale.
pub fn render_missing(report: &RunReport) -> String {
    let mut out = String::from("Missing Translations Report\n");
    for module in &report.skipped_modules {
        out.push_str(&format!("Module: {}\n  No default language resources found\n", module));
    }
    for (module, files) in by_module(report) {
        out.push_str(&format!("Module: {}\n", module));
        for file in files {
            let missing = &file.missing;
            if missing.missing_simple.is_empty() && missing.missing_plural.is_empty() {
                out.push_str(&format!("  [{}]: complete\n", file.locale));
            } else {
                let mut parts = Vec::new();
                if !missing.missing_simple.is_empty() {
                    parts.push(format!("strings: {}", missing.missing_simple.join(", ")));
                }
                let mut plurals: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
                for p in &missing.missing_plural {
                    plurals.entry(p.key.as_str()).or_default().push(p.category.as_str());
                }
                if !plurals.is_empty() {
                    let families: Vec<String> = plurals
                        .iter()
                        .map(|(key, cats)| format!("{}({})", key, cats.join(", ")))
                        .collect();
                    parts.push(format!("plurals: {}", families.join(", ")));
                }
                out.push_str(&format!("  [{}]: missing {}\n", file.locale, parts.join(" | ")));
            }
            if !missing.stale.is_empty() {
                let keys: Vec<&str> = missing.stale.iter().map(|s| s.key.as_str()).collect();
                out.push_str(&format!("  [{}]: not in reference: {}\n", file.locale, keys.join(", ")));
            }
        }
    }
    for issue in &report.issues {
        out.push_str(&format!("Issue: {}\n", issue.message));
    }
    out.push_str(&format!("Total missing: {}\n", report.missing_count()));
    out
}

pub fn render_json(report: &RunReport) -> Result<String, String> {
    serde_json::to_string_pretty(report).map_err(|e| format!("Error serializing report: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidxlate::{
        diff::{DiffResult, MissingPlural},
        pipeline::TranslatedItem,
        types::PluralCategory,
    };
    use indoc::indoc;
    use std::path::PathBuf;

    fn file(locale: &str, language: &str, missing: DiffResult, translated: Vec<TranslatedItem>) -> FileReport {
        FileReport {
            module: "app/src/main/res".into(),
            locale: locale.into(),
            language: language.into(),
            path: PathBuf::from(format!("values-{}/strings.xml", locale)),
            missing,
            translated,
            rejected: Vec::new(),
            unresolved: Vec::new(),
            discarded: Vec::new(),
            inserted: 0,
            updated: 0,
            written: true,
            error: None,
        }
    }

    fn item(id: ItemId, source: &str, translation: &str) -> TranslatedItem {
        TranslatedItem {
            id,
            source: source.into(),
            translation: translation.into(),
        }
    }

    #[test]
    fn test_markdown_report() {
        let report = RunReport {
            files: vec![file(
                "es",
                "Spanish",
                DiffResult::default(),
                vec![
                    item(ItemId::simple("app_name"), "My App", "Mi App"),
                    item(ItemId::plural("apples", PluralCategory::One), "%d apple", "%d manzana"),
                    item(ItemId::plural("apples", PluralCategory::Other), "%d apples", "%d manzanas"),
                ],
            )],
            ..RunReport::default()
        };
        assert_eq!(
            render_markdown(&report),
            indoc! {"
                # Translation Report

                ## Module: app/src/main/res

                ### Language: Spanish

                | Key | Source Text | Translated Text |
                | --- | ----------- | --------------- |
                | app_name | My App | Mi App |

                #### Plural Resources

                **apples**

                | Quantity | Translated Text |
                | -------- | --------------- |
                | one | %d manzana |
                | other | %d manzanas |

            "}
        );
    }

    #[test]
    fn test_markdown_report_without_translations() {
        assert_eq!(
            render_markdown(&RunReport::default()),
            "# Translation Report\n\nNo translations were performed.\n"
        );
    }

    #[test]
    fn test_missing_report() {
        let missing = DiffResult {
            missing_simple: vec!["app_name".into(), "welcome_message".into()],
            missing_plural: vec![
                MissingPlural {
                    key: "apples".into(),
                    category: PluralCategory::Few,
                    family_exists: true,
                },
                MissingPlural {
                    key: "apples".into(),
                    category: PluralCategory::Many,
                    family_exists: true,
                },
            ],
            stale: Vec::new(),
        };
        let report = RunReport {
            dry_run: true,
            files: vec![
                file("ru", "Russian", missing, Vec::new()),
                file("es", "Spanish", DiffResult::default(), Vec::new()),
            ],
            ..RunReport::default()
        };
        let text = render_missing(&report);
        assert!(text.contains(
            "  [ru]: missing strings: app_name, welcome_message | plurals: apples(few, many)\n"
        ));
        assert!(text.contains("  [es]: complete\n"));
        assert!(text.ends_with("Total missing: 4\n"));
    }

    #[test]
    fn test_json_report_is_parseable() {
        let json = render_json(&RunReport::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["files"].as_array().unwrap().len(), 0);
    }
}
