//! Translation orchestration for one (module, target locale) pair.
//!
//! Missing items are batched and sent to a [`TranslationBackend`]. Returned
//! items are reconciled against the request, validated, retried one by one
//! when missing or rejected, optionally approved, and finally escaped for
//! Android. Failures stay scoped to the items they affect.

pub mod backend;
pub mod reconcile;
pub mod validate;

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Display,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use backend::{
    BatchContext, BatchRequest, BatchResponse, ItemContext, ReferenceExample, RequestItem,
    ReturnedItem, TranslationBackend,
};
pub use reconcile::{DiscardReason, DiscardedResponse, normalize_id, reconcile};

use crate::{
    diff::{DiffResult, source_text_for},
    error::Error,
    escape::escape_android,
    locale::TargetLocale,
    types::{Entry, ItemId, PluralCategory, ResourceFile},
};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_CONTEXT_LIMIT: usize = 25;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_batch_size: usize,
    /// Maximum number of few-shot examples per batch; 0 disables them.
    pub context_limit: usize,
    pub project_context: Option<String>,
    /// Retries of one dispatch after a retryable backend error.
    pub batch_retries: u32,
    /// Single-item re-sends for items missing from a response or rejected by validation.
    pub item_retries: u32,
    /// Base delay of the exponential backoff between dispatch retries.
    pub retry_base_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            context_limit: DEFAULT_CONTEXT_LIMIT,
            project_context: None,
            batch_retries: 3,
            item_retries: 2,
            retry_base_delay: Duration::from_millis(800),
        }
    }
}

/// Why an item did not end up accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Blank,
    Placeholder(String),
    Markup(String),
    MissingFromResponse,
    Backend(String),
    Cancelled,
    ApprovalDenied,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Blank => f.write_str("blank translation"),
            FailureReason::Placeholder(d) | FailureReason::Markup(d) => f.write_str(d),
            FailureReason::MissingFromResponse => f.write_str("missing from backend response"),
            FailureReason::Backend(d) => write!(f, "backend error: {}", d),
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::ApprovalDenied => f.write_str("denied during review"),
        }
    }
}

/// Lifecycle of one requested item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Requested,
    Returned,
    Accepted,
    Rejected(FailureReason),
    Retrying(u32),
    Unresolved(FailureReason),
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemState::Accepted | ItemState::Rejected(_) | ItemState::Unresolved(_)
        )
    }

    pub fn can_transition_to(&self, next: &ItemState) -> bool {
        use ItemState::*;
        match (self, next) {
            (Requested, Returned | Retrying(_) | Unresolved(_)) => true,
            (Returned, Accepted | Rejected(_) | Retrying(_) | Unresolved(_)) => true,
            (Retrying(_), Returned | Retrying(_) | Unresolved(_)) => true,
            _ => false,
        }
    }
}

/// Validated translations, keyed by entry. Text is already Android-escaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptedTranslations {
    simple: BTreeMap<String, String>,
    plural: BTreeMap<String, BTreeMap<PluralCategory, String>>,
}

impl AcceptedTranslations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ItemId, text: impl Into<String>) {
        match id.category {
            None => {
                self.simple.insert(id.key, text.into());
            }
            Some(category) => {
                self.plural
                    .entry(id.key)
                    .or_default()
                    .insert(category, text.into());
            }
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&str> {
        match id.category {
            None => self.simple.get(&id.key),
            Some(c) => self.plural.get(&id.key).and_then(|forms| forms.get(&c)),
        }
        .map(String::as_str)
    }

    pub fn simple(&self) -> &BTreeMap<String, String> {
        &self.simple
    }

    pub fn plurals(&self) -> &BTreeMap<String, BTreeMap<PluralCategory, String>> {
        &self.plural
    }

    pub fn len(&self) -> usize {
        self.simple.len() + self.plural.values().map(BTreeMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub id: ItemId,
    pub source_text: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Default)]
pub struct TranslationOutcome {
    pub accepted: AcceptedTranslations,
    pub rejected: Vec<ItemFailure>,
    pub unresolved: Vec<ItemFailure>,
    pub discarded: Vec<DiscardedResponse>,
    /// Final state of every requested item.
    pub states: BTreeMap<ItemId, ItemState>,
}

impl TranslationOutcome {
    /// True when no item was left unresolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Everything the orchestrator needs to translate one target file.
#[derive(Debug, Clone, Copy)]
pub struct TranslationJob<'a> {
    pub module: &'a str,
    pub reference: &'a ResourceFile,
    pub target: &'a ResourceFile,
    pub locale: &'a TargetLocale,
    pub diff: &'a DiffResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Approve,
    Deny,
}

/// A validated translation awaiting review.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub module: &'a str,
    pub locale: &'a TargetLocale,
    pub id: &'a ItemId,
    pub source: &'a str,
    pub translation: &'a str,
}

pub trait Approver: Send + Sync {
    fn review(&self, candidate: &Candidate<'_>) -> Approval;
}

/// Backend usage shared by every orchestrator of a run.
#[derive(Debug, Default)]
pub struct UsageCounter {
    requests: AtomicU64,
    items: AtomicU64,
    characters: AtomicU64,
    failures: AtomicU64,
    budget: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub items: u64,
    pub characters: u64,
    pub failures: u64,
}

impl UsageCounter {
    /// `budget` caps the number of backend requests for the whole run.
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }

    /// Account for one dispatch, or fail when the request budget is spent.
    pub fn begin_request(&self, request: &BatchRequest) -> Result<(), Error> {
        let previous = self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(budget) = self.budget {
            if previous >= budget {
                self.requests.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::backend_fatal(format!(
                    "request budget of {} exhausted",
                    budget
                )));
            }
        }
        let chars: usize = request.items.iter().map(|i| i.source_text.chars().count()).sum();
        self.items
            .fetch_add(request.items.len() as u64, Ordering::Relaxed);
        self.characters.fetch_add(chars as u64, Ordering::Relaxed);
        Ok(())
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            requests: self.requests.load(Ordering::SeqCst),
            items: self.items.load(Ordering::Relaxed),
            characters: self.characters.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Cooperative cancellation, checked between dispatches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct PendingItem {
    id: ItemId,
    wire: String,
    source: String,
    context: ItemContext,
}

impl PendingItem {
    fn request_item(&self) -> RequestItem {
        RequestItem {
            id: self.wire.clone(),
            source_text: self.source.clone(),
            context: self.context.clone(),
        }
    }

    fn failure(&self, reason: FailureReason) -> ItemFailure {
        ItemFailure {
            id: self.id.clone(),
            source_text: self.source.clone(),
            reason,
        }
    }
}

pub struct Orchestrator {
    backend: Arc<dyn TranslationBackend>,
    config: OrchestratorConfig,
    approver: Option<Arc<dyn Approver>>,
    usage: Arc<UsageCounter>,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn TranslationBackend>, config: OrchestratorConfig) -> Self {
        Self {
            backend,
            config,
            approver: None,
            usage: Arc::new(UsageCounter::default()),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_approver(mut self, approver: Arc<dyn Approver>) -> Self {
        self.approver = Some(approver);
        self
    }

    pub fn with_usage(mut self, usage: Arc<UsageCounter>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn usage(&self) -> &Arc<UsageCounter> {
        &self.usage
    }

    /// Translate every missing item of `job`.
    pub async fn translate(&self, job: &TranslationJob<'_>) -> TranslationOutcome {
        let items = build_items(job);
        let mut outcome = TranslationOutcome::default();
        if items.is_empty() {
            return outcome;
        }
        for item in &items {
            outcome.states.insert(item.id.clone(), ItemState::Requested);
        }

        let batch_size = self.config.max_batch_size.max(1);
        info!(
            module = job.module,
            locale = %job.locale,
            items = items.len(),
            batches = items.len().div_ceil(batch_size),
            backend = self.backend.name(),
            "translating"
        );

        let mut candidates: Vec<(usize, String)> = Vec::new();
        for (batch_no, chunk) in items.chunks(batch_size).enumerate() {
            let offset = batch_no * batch_size;
            if self.cancel.is_cancelled() {
                for item in &items[offset..] {
                    self.fail(&mut outcome, item, FailureReason::Cancelled);
                }
                break;
            }

            let request = self.batch_request(job, chunk);
            let response = match self.dispatch(&request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(module = job.module, locale = %job.locale, error = %e, "batch failed");
                    for item in chunk {
                        self.fail(&mut outcome, item, FailureReason::Backend(e.to_string()));
                    }
                    continue;
                }
            };

            let wires: Vec<String> = chunk.iter().map(|i| i.wire.clone()).collect();
            let reconciled = reconcile(&wires, &response);
            self.record_discarded(job, &mut outcome, reconciled.discarded.clone());

            let mut retry = Vec::new();
            for (i, item) in chunk.iter().enumerate() {
                let Some(text) = reconciled.text_for(i) else {
                    retry.push((offset + i, FailureReason::MissingFromResponse));
                    continue;
                };
                set_state(&mut outcome, &item.id, ItemState::Returned);
                match validate::validate(&item.source, text) {
                    Ok(()) => candidates.push((offset + i, text.to_string())),
                    Err(reason) => {
                        debug!(key = %item.id, %reason, "translation rejected");
                        retry.push((offset + i, reason));
                    }
                }
            }

            for (index, reason) in retry {
                if let Some(text) = self.retry_item(job, &items[index], reason, &mut outcome).await {
                    candidates.push((index, text));
                }
            }
        }

        candidates.sort_by_key(|(i, _)| *i);
        for (index, text) in candidates {
            let item = &items[index];
            let approved = self.approver.as_ref().is_none_or(|approver| {
                approver.review(&Candidate {
                    module: job.module,
                    locale: job.locale,
                    id: &item.id,
                    source: &item.source,
                    translation: &text,
                }) == Approval::Approve
            });
            if approved {
                set_state(&mut outcome, &item.id, ItemState::Accepted);
                outcome
                    .accepted
                    .insert(item.id.clone(), escape_android(&text, Some(&item.source)));
            } else {
                set_state(
                    &mut outcome,
                    &item.id,
                    ItemState::Rejected(FailureReason::ApprovalDenied),
                );
                outcome.rejected.push(item.failure(FailureReason::ApprovalDenied));
            }
        }

        info!(
            module = job.module,
            locale = %job.locale,
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            unresolved = outcome.unresolved.len(),
            "translation finished"
        );
        outcome
    }

    async fn retry_item(
        &self,
        job: &TranslationJob<'_>,
        item: &PendingItem,
        mut reason: FailureReason,
        outcome: &mut TranslationOutcome,
    ) -> Option<String> {
        for attempt in 1..=self.config.item_retries {
            if self.cancel.is_cancelled() {
                reason = FailureReason::Cancelled;
                break;
            }
            set_state(outcome, &item.id, ItemState::Retrying(attempt));
            debug!(key = %item.id, attempt, previous = %reason, "retrying item");

            let request = self.batch_request(job, std::slice::from_ref(item));
            let response = match self.dispatch(&request).await {
                Ok(r) => r,
                Err(e) => {
                    reason = FailureReason::Backend(e.to_string());
                    break;
                }
            };
            let reconciled = reconcile(std::slice::from_ref(&item.wire), &response);
            self.record_discarded(job, outcome, reconciled.discarded.clone());
            match reconciled.text_for(0) {
                Some(text) => {
                    set_state(outcome, &item.id, ItemState::Returned);
                    match validate::validate(&item.source, text) {
                        Ok(()) => return Some(text.to_string()),
                        Err(r) => reason = r,
                    }
                    set_state(outcome, &item.id, ItemState::Retrying(attempt));
                }
                None => reason = FailureReason::MissingFromResponse,
            }
        }
        self.fail(outcome, item, reason);
        None
    }

    /// Send one request, retrying retryable backend errors with exponential backoff.
    async fn dispatch(&self, request: &BatchRequest) -> Result<BatchResponse, Error> {
        let mut attempt = 0u32;
        loop {
            self.usage.begin_request(request)?;
            match self.backend.send(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    self.usage.record_failure();
                    if !e.is_retryable()
                        || attempt >= self.config.batch_retries
                        || self.cancel.is_cancelled()
                    {
                        return Err(e);
                    }
                    let delay = backoff(self.config.retry_base_delay, attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retryable backend error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn batch_request(&self, job: &TranslationJob<'_>, items: &[PendingItem]) -> BatchRequest {
        let exclude: HashSet<&str> = items.iter().map(|i| i.id.key.as_str()).collect();
        BatchRequest {
            items: items.iter().map(PendingItem::request_item).collect(),
            context: BatchContext {
                language_tag: job.locale.tag(),
                language_name: job.locale.display_name(),
                project_context: self.config.project_context.clone(),
                examples: reference_examples(job, &exclude, self.config.context_limit),
            },
        }
    }

    fn fail(&self, outcome: &mut TranslationOutcome, item: &PendingItem, reason: FailureReason) {
        warn!(key = %item.id, %reason, "item unresolved");
        set_state(outcome, &item.id, ItemState::Unresolved(reason.clone()));
        outcome.unresolved.push(item.failure(reason));
    }

    fn record_discarded(
        &self,
        job: &TranslationJob<'_>,
        outcome: &mut TranslationOutcome,
        discarded: Vec<DiscardedResponse>,
    ) {
        for d in &discarded {
            warn!(module = job.module, locale = %job.locale, id = %d.id, reason = ?d.reason, "discarded response item");
        }
        outcome.discarded.extend(discarded);
    }
}

fn set_state(outcome: &mut TranslationOutcome, id: &ItemId, next: ItemState) {
    let Some(current) = outcome.states.get_mut(id) else {
        return;
    };
    if !current.can_transition_to(&next) {
        warn!(key = %id, from = ?current, to = ?next, "unexpected item state transition");
    }
    *current = next;
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let jitter: u64 = rand::thread_rng().gen_range(0..=base_ms / 4);
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt)) + jitter)
}

fn build_items(job: &TranslationJob<'_>) -> Vec<PendingItem> {
    let mut items = Vec::with_capacity(job.diff.missing_count());
    for id in job.diff.missing_items() {
        let Some(source) = source_text_for(job.reference, &id) else {
            continue;
        };
        let context = match id.category {
            None => ItemContext::default(),
            Some(category) => ItemContext {
                plural_category: Some(category),
                plural_forms: job
                    .reference
                    .plural(&id.key)
                    .map(|family| {
                        family
                            .forms
                            .iter()
                            .filter(|(_, v)| !v.trim().is_empty())
                            .map(|(c, v)| (*c, v.clone()))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        };
        items.push(PendingItem {
            wire: id.wire(),
            source: source.to_string(),
            id,
            context,
        });
    }
    items
}

/// Existing translations of the target file, sorted by key, skipping the keys
/// in the batch.
fn reference_examples(
    job: &TranslationJob<'_>,
    exclude: &HashSet<&str>,
    limit: usize,
) -> Vec<ReferenceExample> {
    if limit == 0 {
        return Vec::new();
    }
    let mut examples = Vec::new();
    for entry in &job.target.entries {
        if exclude.contains(entry.key()) || !entry.is_translatable() {
            continue;
        }
        match entry {
            Entry::Simple(t) => {
                if t.is_blank() {
                    continue;
                }
                if let Some(source) = source_text_for(job.reference, &ItemId::simple(&t.key)) {
                    examples.push(ReferenceExample {
                        id: t.key.clone(),
                        source: source.to_string(),
                        translation: t.value.clone(),
                    });
                }
            }
            Entry::Plural(t) => {
                let Some(reference) = job.reference.plural(&t.key) else {
                    continue;
                };
                for (category, translation) in &t.forms {
                    if translation.trim().is_empty() {
                        continue;
                    }
                    if let Some(source) = reference.source_for(*category) {
                        examples.push(ReferenceExample {
                            id: ItemId::plural(t.key.clone(), *category).wire(),
                            source: source.to_string(),
                            translation: translation.clone(),
                        });
                    }
                }
            }
        }
    }
    examples.sort_by(|a, b| a.id.cmp(&b.id));
    examples.truncate(limit);
    examples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{diff::diff, locale::Locale};
    use async_trait::async_trait;
    use indoc::indoc;
    use std::{collections::VecDeque, sync::Mutex};

    /// Replays scripted responses and records every request it receives.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<BatchResponse, Error>>>,
        requests: Mutex<Vec<BatchRequest>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<BatchResponse, Error>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<BatchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslationBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, request: &BatchRequest) -> Result<BatchResponse, Error> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(BatchResponse::default()))
        }
    }

    struct DenyKey(&'static str);

    impl Approver for DenyKey {
        fn review(&self, candidate: &Candidate<'_>) -> Approval {
            if candidate.id.key == self.0 {
                Approval::Deny
            } else {
                Approval::Approve
            }
        }
    }

    const REFERENCE: &str = indoc! {r#"
        <resources>
            <string name="app_name">My App</string>
            <string name="welcome_message">Welcome, %1$s!</string>
            <string name="settings">Settings</string>
            <plurals name="apples">
                <item quantity="one">%d apple</item>
                <item quantity="other">%d apples</item>
            </plurals>
        </resources>
    "#};

    const TARGET: &str = indoc! {r#"
        <resources>
            <string name="settings">Ajustes</string>
        </resources>
    "#};

    struct Fixture {
        reference: ResourceFile,
        target: ResourceFile,
        locale: TargetLocale,
        diff: DiffResult,
    }

    impl Fixture {
        fn new(target_xml: &str, qualifier: &str) -> Self {
            let locale = TargetLocale::from_qualifier(qualifier).unwrap();
            let reference =
                ResourceFile::parse_str("values/strings.xml", Locale::Reference, REFERENCE).unwrap();
            let target = ResourceFile::parse_str(
                "values-x/strings.xml",
                Locale::Target(locale.clone()),
                target_xml,
            )
            .unwrap();
            let diff = diff(&reference, &target, &locale);
            Self {
                reference,
                target,
                locale,
                diff,
            }
        }

        fn job(&self) -> TranslationJob<'_> {
            TranslationJob {
                module: "app",
                reference: &self.reference,
                target: &self.target,
                locale: &self.locale,
                diff: &self.diff,
            }
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            retry_base_delay: Duration::ZERO,
            ..OrchestratorConfig::default()
        }
    }

    fn full_response() -> BatchResponse {
        BatchResponse::new([
            ("app_name", "Mi App"),
            ("welcome_message", "¡Bienvenido, %1$s!"),
            ("apples#one", "%d manzana"),
            ("apples#other", "%d manzanas"),
        ])
    }

    #[tokio::test]
    async fn test_translate_accepts_valid_batch() {
        let fixture = Fixture::new(TARGET, "es");
        let backend = ScriptedBackend::new(vec![Ok(full_response())]);
        let orchestrator = Orchestrator::new(backend.clone(), config());

        let outcome = orchestrator.translate(&fixture.job()).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.accepted.len(), 4);
        assert_eq!(outcome.accepted.get(&ItemId::simple("app_name")), Some("Mi App"));
        assert_eq!(
            outcome.accepted.get(&ItemId::plural("apples", PluralCategory::Other)),
            Some("%d manzanas")
        );
        assert!(outcome.states.values().all(|s| *s == ItemState::Accepted));

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let context = &requests[0].context;
        assert_eq!(context.language_tag, "es");
        assert_eq!(context.language_name, "Spanish");
        assert_eq!(context.examples.len(), 1);
        assert_eq!(context.examples[0].translation, "Ajustes");
        assert_eq!(
            requests[0].items[2].context.plural_category,
            Some(PluralCategory::One)
        );
    }

    #[tokio::test]
    async fn test_placeholder_rejection_retries_then_unresolved() {
        let fixture = Fixture::new(TARGET, "es");
        let mut first = full_response();
        first.items[1].text = "¡Bienvenido!".to_string();
        let backend = ScriptedBackend::new(vec![
            Ok(first),
            Ok(BatchResponse::new([("welcome_message", "¡Hola!")])),
            Ok(BatchResponse::new([("welcome_message", "Bienvenido")])),
        ]);
        let orchestrator = Orchestrator::new(backend.clone(), config());

        let outcome = orchestrator.translate(&fixture.job()).await;

        assert_eq!(outcome.accepted.len(), 3);
        assert!(outcome.accepted.get(&ItemId::simple("welcome_message")).is_none());
        assert_eq!(outcome.unresolved.len(), 1);
        assert!(matches!(outcome.unresolved[0].reason, FailureReason::Placeholder(_)));
        assert!(!outcome.is_complete());

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].items.len(), 1);
        assert_eq!(requests[1].items[0].id, "welcome_message");
    }

    #[tokio::test]
    async fn test_missing_item_is_resent_alone() {
        let fixture = Fixture::new(TARGET, "es");
        let mut partial = full_response();
        partial.items.remove(0);
        let backend = ScriptedBackend::new(vec![
            Ok(partial),
            Ok(BatchResponse::new([("app_name:", "Mi App")])),
        ]);
        let orchestrator = Orchestrator::new(backend.clone(), config());

        let outcome = orchestrator.translate(&fixture.job()).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.accepted.get(&ItemId::simple("app_name")), Some("Mi App"));
        assert_eq!(backend.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_retryable_backend_errors_are_bounded() {
        let fixture = Fixture::new(TARGET, "es");
        let backend = ScriptedBackend::new(vec![
            Err(Error::backend_retryable("HTTP 503")),
            Err(Error::backend_retryable("HTTP 503")),
            Ok(full_response()),
        ]);
        let orchestrator = Orchestrator::new(backend.clone(), config());
        let outcome = orchestrator.translate(&fixture.job()).await;
        assert!(outcome.is_complete());
        assert_eq!(backend.requests().len(), 3);

        let backend = ScriptedBackend::new(vec![Err(Error::backend_fatal("HTTP 401"))]);
        let orchestrator = Orchestrator::new(backend.clone(), config());
        let outcome = orchestrator.translate(&fixture.job()).await;
        assert_eq!(outcome.unresolved.len(), 4);
        assert!(outcome
            .unresolved
            .iter()
            .all(|f| matches!(f.reason, FailureReason::Backend(_))));
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_approval_denial_rejects_only_that_item() {
        let fixture = Fixture::new(TARGET, "es");
        let backend = ScriptedBackend::new(vec![Ok(full_response())]);
        let orchestrator =
            Orchestrator::new(backend, config()).with_approver(Arc::new(DenyKey("app_name")));

        let outcome = orchestrator.translate(&fixture.job()).await;

        assert_eq!(outcome.accepted.len(), 3);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].reason, FailureReason::ApprovalDenied);
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let fixture = Fixture::new(TARGET, "es");
        let backend = ScriptedBackend::new(vec![Ok(full_response())]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let orchestrator = Orchestrator::new(backend.clone(), config()).with_cancel(cancel);

        let outcome = orchestrator.translate(&fixture.job()).await;

        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.unresolved.len(), 4);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_request_budget_is_enforced() {
        let fixture = Fixture::new(TARGET, "es");
        let backend = ScriptedBackend::new(vec![Ok(full_response())]);
        let usage = Arc::new(UsageCounter::new(Some(0)));
        let orchestrator = Orchestrator::new(backend.clone(), config()).with_usage(usage.clone());

        let outcome = orchestrator.translate(&fixture.job()).await;

        assert_eq!(outcome.unresolved.len(), 4);
        assert!(backend.requests().is_empty());
        assert_eq!(usage.snapshot().requests, 0);
    }

    #[tokio::test]
    async fn test_batches_respect_max_size_and_escape() {
        let fixture = Fixture::new(TARGET, "fr");
        let backend = ScriptedBackend::new(vec![
            Ok(BatchResponse::new([("app_name", "L'appli"), ("welcome_message", "Bienvenue, %1$s !")])),
            Ok(BatchResponse::new([("apples#one", "%d pomme"), ("apples#other", "%d pommes")])),
        ]);
        let orchestrator = Orchestrator::new(
            backend.clone(),
            OrchestratorConfig {
                max_batch_size: 2,
                ..config()
            },
        );

        let outcome = orchestrator.translate(&fixture.job()).await;

        assert_eq!(backend.requests().len(), 2);
        assert_eq!(outcome.accepted.get(&ItemId::simple("app_name")), Some("L\\'appli"));
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_item_state_transitions() {
        assert!(ItemState::Requested.can_transition_to(&ItemState::Returned));
        assert!(ItemState::Returned.can_transition_to(&ItemState::Retrying(1)));
        assert!(ItemState::Retrying(1).can_transition_to(&ItemState::Unresolved(FailureReason::Blank)));
        assert!(!ItemState::Accepted.can_transition_to(&ItemState::Returned));
        assert!(!ItemState::Requested.can_transition_to(&ItemState::Accepted));
        assert!(ItemState::Rejected(FailureReason::ApprovalDenied).is_terminal());
    }

    #[test]
    fn test_usage_counter_counts() {
        let usage = UsageCounter::new(Some(1));
        let request = BatchRequest {
            items: vec![RequestItem {
                id: "a".into(),
                source_text: "héllo".into(),
                context: ItemContext::default(),
            }],
            context: BatchContext {
                language_tag: "es".into(),
                language_name: "Spanish".into(),
                project_context: None,
                examples: Vec::new(),
            },
        };
        usage.begin_request(&request).unwrap();
        assert!(usage.begin_request(&request).is_err());
        let snap = usage.snapshot();
        assert_eq!(snap.requests, 1);
        assert_eq!(snap.items, 1);
        assert_eq!(snap.characters, 5);
    }
}
