//! Chat-completion backends (OpenAI, OpenRouter) behind [`TranslationBackend`].

use std::time::Duration;

use async_trait::async_trait;
use droidxlate::{
    Error,
    orchestrator::{BatchRequest, BatchResponse, TranslationBackend},
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::{OpenRouterSettings, Provider, Settings};

const TIMEOUT_SECS: u64 = 60;

const SYSTEM_MESSAGE: &str = "\
You are a software engineer translating textual UI elements of an Android application \
from English into {language}, keeping technical terms in English.

Guidelines:
1. Keep every printf placeholder (%s, %d, %1$s, %2$d, ...) exactly as in the source.
2. Keep inline markup (<b>, <i>, <u>, <a href=\"...\">, CDATA sections) exactly as in the source.
3. Use natural, concise UI wording for the target dialect.
4. For plural items (ids of the form key#category) translate for that plural category of {language}.

Return ONLY a JSON object of the form {\"translations\": {\"<id>\": \"<translated text>\"}} \
using exactly the ids you were given.";

pub struct HttpBackend {
    client: Client,
    provider: Provider,
    endpoint: String,
    api_key: String,
    model: String,
    openrouter: OpenRouterSettings,
}

impl HttpBackend {
    pub fn new(settings: &Settings) -> Result<Self, String> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            format!(
                "No API key for {}: set {} or pass --api-key",
                settings.provider,
                settings.provider.api_key_var()
            )
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("Cannot create HTTP client: {}", e))?;
        Ok(Self {
            client,
            provider: settings.provider,
            endpoint: format!("{}/chat/completions", settings.provider.base_url()),
            api_key,
            model: settings.model.clone(),
            openrouter: settings.openrouter.clone(),
        })
    }

    fn body(&self, request: &BatchRequest) -> Result<Value, Error> {
        let system = SYSTEM_MESSAGE.replace("{language}", &request.context.language_name);
        let user = serde_json::to_string_pretty(&json!({
            "target_language": {
                "tag": request.context.language_tag,
                "name": request.context.language_name,
            },
            "project_context": request.context.project_context,
            "examples": request.context.examples,
            "items": request.items,
        }))?;
        Ok(json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": 0,
            "response_format": { "type": "json_object" }
        }))
    }
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    fn name(&self) -> &str {
        match self.provider {
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
        }
    }

    async fn send(&self, request: &BatchRequest) -> Result<BatchResponse, Error> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.body(request)?);
        if self.provider == Provider::OpenRouter && self.openrouter.send_site_info {
            if let Some(url) = &self.openrouter.site_url {
                builder = builder.header("HTTP-Referer", url);
            }
            if let Some(name) = &self.openrouter.site_name {
                builder = builder.header("X-Title", name);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::backend_retryable(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::backend_retryable(e.to_string()))?;
        if !status.is_success() {
            let message = extract_error_message(status, &text);
            return Err(if should_retry_http(status) {
                Error::backend_retryable(message)
            } else {
                Error::backend_fatal(message)
            });
        }

        let content = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| {
                v.get("choices")?
                    .get(0)?
                    .get("message")?
                    .get("content")?
                    .as_str()
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                Error::backend_retryable("Invalid response: missing choices[0].message.content")
            })?;
        let items = parse_translations(&content).map_err(Error::backend_retryable)?;
        debug!(
            backend = self.name(),
            requested = request.items.len(),
            returned = items.len(),
            "batch answered"
        );
        Ok(BatchResponse::new(items))
    }
}

/// 408, 429 and 5xx are usually temporary.
pub fn should_retry_http(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let message = v
            .get("error")
            .and_then(|e| e.get("message"))
            .or_else(|| v.get("message"))
            .and_then(Value::as_str);
        if let Some(message) = message {
            return format!("HTTP {}: {}", status.as_u16(), message);
        }
    }
    let trimmed = body.trim();
    let snippet: String = trimmed.chars().take(400).collect();
    let ellipsis = if snippet.len() < trimmed.len() { "..." } else { "" };
    format!("HTTP {}: {}{}", status.as_u16(), snippet, ellipsis)
}

/// Pull `(id, text)` pairs out of a model reply.
///
/// Accepts a bare JSON object or one wrapped in a markdown code fence, with
/// or without a `translations` wrapper object. Non-string values are dropped.
pub fn parse_translations(content: &str) -> Result<Vec<(String, String)>, String> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| format!("Invalid JSON in model reply: {}", e))?;
    let object = match value.get("translations") {
        Some(Value::Object(inner)) => inner,
        _ => value
            .as_object()
            .ok_or_else(|| "Model reply is not a JSON object".to_string())?,
    };
    Ok(object
        .iter()
        .filter_map(|(id, text)| text.as_str().map(|t| (id.clone(), t.to_string())))
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
