use async_trait::async_trait;
use droidxlate::orchestrator::{BatchRequest, BatchResponse};
use droidxlate::pipeline::{self, PipelineOptions, RunStatus};
use droidxlate::{
    Error, Locale, Orchestrator, OrchestratorConfig, ResourceFile, ScanOptions, TargetLocale,
    TranslationBackend, diff, scan, scan_all,
};
use indoc::indoc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const REFERENCE: &str = indoc! {r#"
    <?xml version="1.0" encoding="utf-8"?>
    <resources>
        <string name="app_name">My App</string>
        <string name="welcome_message">Welcome, %1$s!</string>
        <string name="build_id" translatable="false">2024.1</string>
        <plurals name="apples">
            <item quantity="one">%d apple</item>
            <item quantity="other">%d apples</item>
        </plurals>
    </resources>
"#};

/// Answers from a fixed dictionary keyed by `(language tag, wire id)`.
struct DictionaryBackend {
    entries: HashMap<(String, String), String>,
    id_suffix: &'static str,
    requests: Mutex<Vec<BatchRequest>>,
}

impl DictionaryBackend {
    fn new(entries: &[(&str, &str, &str)]) -> Arc<Self> {
        Self::with_suffix(entries, "")
    }

    /// Returned ids get `suffix` appended, the way chatty models decorate them.
    fn with_suffix(entries: &[(&str, &str, &str)], suffix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            entries: entries
                .iter()
                .map(|(lang, id, text)| ((lang.to_string(), id.to_string()), text.to_string()))
                .collect(),
            id_suffix: suffix,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TranslationBackend for DictionaryBackend {
    fn name(&self) -> &str {
        "dictionary"
    }

    async fn send(&self, request: &BatchRequest) -> Result<BatchResponse, Error> {
        self.requests.lock().unwrap().push(request.clone());
        let lang = &request.context.language_tag;
        Ok(BatchResponse::new(request.items.iter().filter_map(|item| {
            self.entries
                .get(&(lang.clone(), item.id.clone()))
                .map(|text| (format!("{}{}", item.id, self.id_suffix), text.clone()))
        })))
    }
}

const SPANISH: &[(&str, &str, &str)] = &[
    ("es", "app_name", "Mi App"),
    ("es", "welcome_message", "¡Bienvenido, %1$s!"),
    ("es", "apples#one", "%d manzana"),
    ("es", "apples#other", "%d manzanas"),
];

fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn project(targets: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "app/src/main/res/values/strings.xml", REFERENCE);
    for (qualifier, xml) in targets {
        write_file(
            dir.path(),
            &format!("app/src/main/res/values-{}/strings.xml", qualifier),
            xml,
        );
    }
    dir
}

fn orchestrator(backend: Arc<DictionaryBackend>) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        backend,
        OrchestratorConfig {
            retry_base_delay: Duration::ZERO,
            ..OrchestratorConfig::default()
        },
    ))
}

async fn run(dir: &TempDir, backend: Arc<DictionaryBackend>) -> pipeline::RunReport {
    let report = scan(dir.path(), &ScanOptions::default()).unwrap();
    pipeline::run(report.modules, orchestrator(backend), &PipelineOptions::default()).await
}

fn remaining_missing(dir: &TempDir, qualifier: &str) -> usize {
    let res = dir.path().join("app/src/main/res");
    let reference = ResourceFile::load(res.join("values/strings.xml"), Locale::Reference).unwrap();
    let locale = TargetLocale::from_qualifier(qualifier).unwrap();
    let target = ResourceFile::load(
        res.join(format!("values-{}/strings.xml", qualifier)),
        Locale::Target(locale.clone()),
    )
    .unwrap();
    diff(&reference, &target, &locale).missing_count()
}

#[tokio::test]
async fn test_end_to_end_translation_is_merged() {
    let dir = project(&[("es", "<resources>\n</resources>\n")]);
    let backend = DictionaryBackend::new(SPANISH);
    let report = run(&dir, backend.clone()).await;

    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(report.translated_count(), 4);
    assert_eq!(backend.request_count(), 1);
    let written = fs::read_to_string(dir.path().join("app/src/main/res/values-es/strings.xml")).unwrap();
    assert_eq!(
        written,
        indoc! {r#"
            <resources>
                <string name="app_name">Mi App</string>
                <string name="welcome_message">¡Bienvenido, %1$s!</string>
                <plurals name="apples">
                    <item quantity="one">%d manzana</item>
                    <item quantity="other">%d manzanas</item>
                </plurals>
            </resources>
        "#}
    );
    assert!(!written.contains("build_id"));
    assert_eq!(remaining_missing(&dir, "es"), 0);
}

#[tokio::test]
async fn test_russian_requires_few_and_many() {
    let dir = project(&[(
        "ru",
        indoc! {r#"
            <resources>
                <string name="app_name">Моё приложение</string>
                <string name="welcome_message">Добро пожаловать, %1$s!</string>
                <plurals name="apples">
                    <item quantity="one">%d яблоко</item>
                    <item quantity="other">%d яблока</item>
                </plurals>
            </resources>
        "#},
    )]);
    let backend = DictionaryBackend::new(&[
        ("ru", "apples#few", "%d яблока"),
        ("ru", "apples#many", "%d яблок"),
    ]);
    let report = run(&dir, backend.clone()).await;

    assert_eq!(report.status(), RunStatus::Completed);
    let requested: Vec<String> = backend.requests.lock().unwrap()[0]
        .items
        .iter()
        .map(|i| i.id.clone())
        .collect();
    assert_eq!(requested, vec!["apples#few", "apples#many"]);
    let written = fs::read_to_string(dir.path().join("app/src/main/res/values-ru/strings.xml")).unwrap();
    let one = written.find("quantity=\"one\"").unwrap();
    let few = written.find("quantity=\"few\"").unwrap();
    let many = written.find("quantity=\"many\"").unwrap();
    let other = written.find("quantity=\"other\"").unwrap();
    assert!(one < few && few < many && many < other);
    assert_eq!(remaining_missing(&dir, "ru"), 0);
}

#[tokio::test]
async fn test_dropped_placeholder_stays_unresolved() {
    let dir = project(&[("es", "<resources>\n</resources>\n")]);
    let mut entries = SPANISH.to_vec();
    entries[1] = ("es", "welcome_message", "¡Bienvenido!");
    let backend = DictionaryBackend::new(&entries);
    let report = run(&dir, backend.clone()).await;

    assert_eq!(report.status(), RunStatus::Unresolved);
    assert_eq!(report.status().exit_code(), 3);
    // One batch, then the rejected item alone twice.
    assert_eq!(backend.request_count(), 3);
    let file = &report.files[0];
    assert_eq!(file.unresolved.len(), 1);
    assert_eq!(file.unresolved[0].id.wire(), "welcome_message");
    assert!(file.written);
    assert_eq!(remaining_missing(&dir, "es"), 1);
}

#[tokio::test]
async fn test_decorated_response_ids_are_reconciled() {
    let dir = project(&[("es", "<resources>\n</resources>\n")]);
    let backend = DictionaryBackend::with_suffix(SPANISH, ":");
    let report = run(&dir, backend).await;

    assert_eq!(report.status(), RunStatus::Completed);
    assert!(report.files[0].discarded.is_empty());
    assert_eq!(remaining_missing(&dir, "es"), 0);
}

#[tokio::test]
async fn test_untouched_bytes_survive_merge() {
    let original = "\u{FEFF}<?xml version=\"1.0\" encoding=\"utf-8\"?>\r\n\
        <!-- Spanish strings -->\r\n\
        <resources xmlns:tools=\"http://schemas.android.com/tools\">\r\n\
        \t<string name=\"app_name\">Mi App</string>\r\n\
        \t<string-array name=\"planets\">\r\n\
        \t\t<item>Mercurio</item>\r\n\
        \t</string-array>\r\n\
        \t<plurals name=\"apples\">\r\n\
        \t\t<item quantity=\"one\">%d manzana</item>\r\n\
        \t\t<item quantity=\"other\">%d manzanas</item>\r\n\
        \t</plurals>\r\n\
        </resources>\r\n";
    let dir = project(&[("es", original)]);
    let report = run(&dir, DictionaryBackend::new(SPANISH)).await;
    assert_eq!(report.status(), RunStatus::Completed);

    let written = fs::read_to_string(dir.path().join("app/src/main/res/values-es/strings.xml")).unwrap();
    let inserted = "\r\n\t<string name=\"welcome_message\">¡Bienvenido, %1$s!</string>";
    assert!(written.contains(inserted));
    assert_eq!(written.replacen(inserted, "", 1), original);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = project(&[("es", "<resources>\n</resources>\n")]);
    let backend = DictionaryBackend::new(SPANISH);
    let modules = scan(dir.path(), &ScanOptions::default()).unwrap().modules;
    let options = PipelineOptions {
        dry_run: true,
        ..PipelineOptions::default()
    };
    let report = pipeline::run(modules, orchestrator(backend.clone()), &options).await;

    assert!(report.dry_run);
    assert_eq!(report.missing_count(), 4);
    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(backend.request_count(), 0);
    assert_eq!(
        fs::read_to_string(dir.path().join("app/src/main/res/values-es/strings.xml")).unwrap(),
        "<resources>\n</resources>\n"
    );
}

#[tokio::test]
async fn test_complete_locale_is_no_work() {
    let dir = project(&[(
        "es",
        indoc! {r#"
            <resources>
                <string name="app_name">Mi App</string>
                <string name="welcome_message">¡Bienvenido, %1$s!</string>
                <plurals name="apples">
                    <item quantity="one">%d manzana</item>
                    <item quantity="other">%d manzanas</item>
                </plurals>
            </resources>
        "#},
    )]);
    let backend = DictionaryBackend::new(SPANISH);
    let report = run(&dir, backend.clone()).await;
    assert_eq!(report.status(), RunStatus::NoWork);
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn test_many_locales_run_concurrently() {
    let dir = project(&[
        ("es", "<resources/>\n"),
        ("fr", "<resources/>\n"),
        ("pt-rBR", "<resources/>\n"),
    ]);
    let mut entries = SPANISH.to_vec();
    for lang in ["fr", "pt-BR"] {
        for (_, id, text) in SPANISH {
            entries.push((lang, id, text));
        }
    }
    let backend = DictionaryBackend::new(&entries);
    let report = run(&dir, backend.clone()).await;

    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(backend.request_count(), 3);
    let locales: Vec<&str> = report.files.iter().map(|f| f.locale.as_str()).collect();
    assert_eq!(locales, vec!["es", "fr", "pt-rBR"]);
    assert_eq!(report.usage.requests, 3);
    for q in ["es", "fr", "pt-rBR"] {
        assert_eq!(remaining_missing(&dir, q), 0);
    }
}

#[test]
fn test_scan_all_merges_overlapping_roots() {
    let dir = project(&[("es", "<resources/>\n")]);
    let roots = [dir.path().to_path_buf(), dir.path().join("app")];
    let report = scan_all(&roots, &ScanOptions::default()).unwrap();
    assert_eq!(report.modules.len(), 1);
    assert_eq!(report.modules[0].targets.len(), 1);
}
