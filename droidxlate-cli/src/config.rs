//! Settings resolution: command-line flags, then environment, then
//! `droidxlate.toml`, then built-in defaults.
//!
//! API keys only ever come from flags or the environment.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "droidxlate.toml";
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenRouter,
}

impl Provider {
    pub fn base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::OpenRouter => "google/gemini-2.5-flash",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(format!(
                "Unsupported provider: {}. Supported providers: openai, openrouter",
                other
            )),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
        })
    }
}

/// `[openrouter]` table of the config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OpenRouterFileConfig {
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub send_site_info: Option<bool>,
}

/// Contents of `droidxlate.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub project_context: Option<String>,
    pub ignore_folders: Option<Vec<String>>,
    pub include_reference_context: Option<bool>,
    pub reference_context_limit: Option<i64>,
    pub max_batch_size: Option<i64>,
    pub concurrency: Option<i64>,
    pub request_budget: Option<i64>,
    pub openrouter: OpenRouterFileConfig,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, String> {
        let raw: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| format!("Invalid config file: {}", e))?;
        let has_key = |table: &toml::Table| {
            table
                .keys()
                .any(|k| k.to_ascii_lowercase().contains("api_key"))
        };
        let nested_key = raw
            .values()
            .filter_map(toml::Value::as_table)
            .any(has_key);
        if has_key(&raw) || nested_key {
            return Err(
                "API keys are not read from the config file; use OPENAI_API_KEY, OPENROUTER_API_KEY or --api-key"
                    .to_string(),
            );
        }
        toml::from_str(text).map_err(|e| format!("Invalid config file: {}", e))
    }

    /// Load `path`, or `./droidxlate.toml` when no path is given and it exists.
    pub fn load(path: Option<&Path>) -> Result<Option<Self>, String> {
        let path = match path {
            Some(p) => {
                if !p.is_file() {
                    return Err(format!("Config file does not exist: {}", p.display()));
                }
                p.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(None);
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("Cannot read config file {}: {}", path.display(), e))?;
        Self::parse(&text)
            .map(Some)
            .map_err(|e| format!("{} ({})", e, path.display()))
    }
}

/// Values given on the command line.
#[derive(Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub project_context: Option<String>,
    pub ignore_folders: Option<Vec<String>>,
    pub no_reference_context: bool,
    pub reference_context_limit: Option<i64>,
    pub max_batch_size: Option<i64>,
    pub concurrency: Option<i64>,
    pub request_budget: Option<i64>,
    pub no_gitignore: bool,
    pub openrouter_site_url: Option<String>,
    pub openrouter_site_name: Option<String>,
    pub openrouter_send_site_info: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRouterSettings {
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub send_site_info: bool,
}

/// Fully resolved settings for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
    pub project_context: Option<String>,
    pub ignore_folders: Vec<String>,
    /// Few-shot examples per batch; 0 disables them.
    pub reference_context_limit: usize,
    pub max_batch_size: usize,
    pub concurrency: usize,
    pub request_budget: Option<u64>,
    pub gitignore: bool,
    pub openrouter: OpenRouterSettings,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("project_context", &self.project_context)
            .field("ignore_folders", &self.ignore_folders)
            .field("reference_context_limit", &self.reference_context_limit)
            .field("max_batch_size", &self.max_batch_size)
            .field("concurrency", &self.concurrency)
            .field("request_budget", &self.request_budget)
            .field("gitignore", &self.gitignore)
            .field("openrouter", &self.openrouter)
            .finish()
    }
}

impl Settings {
    /// Resolve settings. `env` looks up an environment variable.
    pub fn resolve(
        overrides: &Overrides,
        env: impl Fn(&str) -> Option<String>,
        file: Option<FileConfig>,
    ) -> Result<Self, String> {
        let file = file.unwrap_or_default();
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let provider = match overrides.provider.clone().or(file.provider.clone()) {
            Some(name) => name.parse()?,
            None => Provider::OpenRouter,
        };
        let model = non_empty(overrides.model.clone())
            .or_else(|| non_empty(env("DROIDXLATE_MODEL")))
            .or_else(|| non_empty(file.model.clone()))
            .unwrap_or_else(|| provider.default_model().to_string());
        let api_key = non_empty(overrides.api_key.clone())
            .or_else(|| non_empty(env(provider.api_key_var())));

        let include_context =
            !overrides.no_reference_context && file.include_reference_context.unwrap_or(true);
        let reference_context_limit = if include_context {
            count(
                "reference_context_limit",
                overrides.reference_context_limit.or(file.reference_context_limit),
                droidxlate::orchestrator::DEFAULT_CONTEXT_LIMIT,
                true,
            )?
        } else {
            0
        };
        let max_batch_size = count(
            "max_batch_size",
            overrides.max_batch_size.or(file.max_batch_size),
            droidxlate::orchestrator::DEFAULT_MAX_BATCH_SIZE,
            false,
        )?;
        let concurrency = count(
            "concurrency",
            overrides.concurrency.or(file.concurrency),
            DEFAULT_CONCURRENCY,
            false,
        )?;
        let request_budget = match overrides.request_budget.or(file.request_budget) {
            Some(n) if n < 0 => return Err(format!("request_budget must not be negative, got {}", n)),
            Some(n) => Some(n as u64),
            None => None,
        };

        Ok(Self {
            provider,
            model,
            api_key,
            project_context: non_empty(overrides.project_context.clone())
                .or_else(|| non_empty(file.project_context.clone())),
            ignore_folders: overrides
                .ignore_folders
                .clone()
                .or(file.ignore_folders)
                .unwrap_or_default(),
            reference_context_limit,
            max_batch_size,
            concurrency,
            request_budget,
            gitignore: !overrides.no_gitignore,
            openrouter: OpenRouterSettings {
                site_url: non_empty(overrides.openrouter_site_url.clone())
                    .or(file.openrouter.site_url),
                site_name: non_empty(overrides.openrouter_site_name.clone())
                    .or(file.openrouter.site_name),
                send_site_info: overrides
                    .openrouter_send_site_info
                    .or(file.openrouter.send_site_info)
                    .unwrap_or(true),
            },
        })
    }
}

/// A non-negative count. Zero is only accepted where it means "disabled".
fn count(name: &str, value: Option<i64>, default: usize, zero_ok: bool) -> Result<usize, String> {
    match value {
        None => Ok(default),
        Some(n) if n < 0 => Err(format!("{} must not be negative, got {}", name, n)),
        Some(0) if !zero_ok => Err(format!("{} must be at least 1", name)),
        Some(n) => Ok(n as usize),
    }
}
