//! The seam between the orchestrator and a machine-translation service.

use async_trait::async_trait;
use serde::Serialize;

use crate::{error::Error, types::PluralCategory};

/// A machine-translation service.
///
/// Implementations send one batch and report what came back, unfiltered:
/// duplicate or perturbed ids are sorted out by the orchestrator.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Translate one batch. Transient failures (network, 408/429/5xx) should be
    /// reported with [`Error::backend_retryable`].
    async fn send(&self, request: &BatchRequest) -> Result<BatchResponse, Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    pub items: Vec<RequestItem>,
    pub context: BatchContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestItem {
    /// Wire id: `key` or `key#category`.
    pub id: String,
    pub source_text: String,
    #[serde(skip_serializing_if = "ItemContext::is_empty")]
    pub context: ItemContext,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural_category: Option<PluralCategory>,
    /// Reference forms of the plural family, for orientation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plural_forms: Vec<(PluralCategory, String)>,
}

impl ItemContext {
    pub fn is_empty(&self) -> bool {
        self.plural_category.is_none() && self.plural_forms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchContext {
    /// BCP 47 tag of the target language.
    pub language_tag: String,
    /// English display name, e.g. `Portuguese (Brazil)`.
    pub language_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_context: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ReferenceExample>,
}

/// An existing translation from the same target file, used as a few-shot example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceExample {
    pub id: String,
    pub source: String,
    pub translation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub items: Vec<ReturnedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedItem {
    pub id: String,
    pub text: String,
}

impl BatchResponse {
    pub fn new<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            items: items
                .into_iter()
                .map(|(id, text)| ReturnedItem {
                    id: id.into(),
                    text: text.into(),
                })
                .collect(),
        }
    }
}
