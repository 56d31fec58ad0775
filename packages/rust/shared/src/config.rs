//! Application configuration for Pagesmith.
//!
//! The config file is looked up at `--config`, then `./pagesmith.toml`, then
//! `~/.pagesmith/pagesmith.toml`. Missing files mean defaults. Secrets never
//! live in the file: each service section names the environment variable
//! that holds its token.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PagesmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagesmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagesmith";

// ---------------------------------------------------------------------------
// Config structs (matching pagesmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dataset, ledger, and draft locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Language-model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// CMS settings.
    #[serde(default)]
    pub cms: CmsConfig,

    /// Brand the pages are written for.
    #[serde(default)]
    pub brand: BrandConfig,

    /// Unit prices used for the running cost estimate.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Batch behaviour.
    #[serde(default)]
    pub batch: BatchConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Static connector dataset (JSON).
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Progress ledger (JSON, read-write).
    #[serde(default = "default_ledger")]
    pub ledger: String,

    /// Where generated page text is kept until it is published.
    #[serde(default = "default_drafts_dir")]
    pub drafts_dir: String,

    /// Optional category taxonomy (JSON list of `{id, name, keywords}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<String>,

    /// Optional tag taxonomy (same shape as categories).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            ledger: default_ledger(),
            drafts_dir: default_drafts_dir(),
            categories: None,
            tags: None,
        }
    }
}

fn default_dataset() -> String {
    "connectors.json".into()
}
fn default_ledger() -> String {
    "ledger.json".into()
}
fn default_drafts_dir() -> String {
    "drafts".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search endpoint.
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Env var that overrides `base_url` when set.
    #[serde(default = "default_search_url_env")]
    pub base_url_env: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Search engine parameter.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Country code (`gl`).
    #[serde(default = "default_country")]
    pub country: String,

    /// Interface language (`hl`).
    #[serde(default = "default_language")]
    pub language: String,

    /// Results per query.
    #[serde(default = "default_results")]
    pub results: u32,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            base_url_env: default_search_url_env(),
            api_key_env: default_search_key_env(),
            engine: default_engine(),
            country: default_country(),
            language: default_language(),
            results: default_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "https://serpapi.com/search".into()
}
fn default_search_url_env() -> String {
    "SERPAPI_BASE_URL".into()
}
fn default_search_key_env() -> String {
    "SERPAPI_API_KEY".into()
}
fn default_engine() -> String {
    "google".into()
}
fn default_country() -> String {
    "us".into()
}
fn default_language() -> String {
    "en".into()
}
fn default_results() -> u32 {
    10
}
fn default_search_timeout() -> u64 {
    30
}

/// `[llm]` section (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API base, without the `/chat/completions` suffix.
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    /// Env var that overrides `base_url` when set.
    #[serde(default = "default_llm_url_env")]
    pub base_url_env: String,

    /// Name of the env var holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            base_url_env: default_llm_url_env(),
            api_key_env: default_llm_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_llm_url_env() -> String {
    "OPENAI_API_BASE".into()
}
fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2500
}
fn default_llm_timeout() -> u64 {
    120
}

/// `[cms]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsConfig {
    /// CMS origin.
    #[serde(default = "default_cms_url")]
    pub base_url: String,

    /// Env var that overrides `base_url` when set.
    #[serde(default = "default_cms_url_env")]
    pub base_url_env: String,

    /// Name of the env var holding the API token.
    #[serde(default = "default_cms_token_env")]
    pub token_env: String,

    /// Collection endpoint path under `base_url`.
    #[serde(default = "default_collection_path")]
    pub collection_path: String,

    /// Wrap the payload as `{"data": ...}` (stock Strapi REST) instead of
    /// sending it bare (custom routes).
    #[serde(default)]
    pub wrap_data: bool,

    #[serde(default = "default_cms_timeout")]
    pub timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_cms_url(),
            base_url_env: default_cms_url_env(),
            token_env: default_cms_token_env(),
            collection_path: default_collection_path(),
            wrap_data: false,
            timeout_secs: default_cms_timeout(),
        }
    }
}

fn default_cms_url() -> String {
    "http://127.0.0.1:8083".into()
}
fn default_cms_url_env() -> String {
    "STRAPI_API_URL".into()
}
fn default_cms_token_env() -> String {
    "STRAPI_API_TOKEN".into()
}
fn default_collection_path() -> String {
    "/api/v1/integrations".into()
}
fn default_cms_timeout() -> u64 {
    30
}

/// `[brand]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    /// Brand name used in titles, copy, and structured data.
    #[serde(default = "default_brand_name")]
    pub name: String,

    /// Public base URL for canonical and Open Graph links (slug is appended).
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Twitter/X handle for card metadata.
    #[serde(default = "default_twitter_handle")]
    pub twitter_handle: String,

    /// Product names every page must mention.
    #[serde(default = "default_products")]
    pub products: Vec<String>,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            name: default_brand_name(),
            site_url: default_site_url(),
            twitter_handle: default_twitter_handle(),
            products: default_products(),
        }
    }
}

fn default_brand_name() -> String {
    "Ruh AI".into()
}
fn default_site_url() -> String {
    "https://ruh.ai/integrations".into()
}
fn default_twitter_handle() -> String {
    "@ruh_ai".into()
}
fn default_products() -> Vec<String> {
    vec!["AI SDR".into(), "Work-Lab".into()]
}

/// `[pricing]` section, in USD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Cost of one search request.
    #[serde(default)]
    pub per_search: f64,

    /// Cost per million prompt tokens.
    #[serde(default = "default_input_price")]
    pub input_per_million: f64,

    /// Cost per million completion tokens.
    #[serde(default = "default_output_price")]
    pub output_per_million: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            per_search: 0.0,
            input_per_million: default_input_price(),
            output_per_million: default_output_price(),
        }
    }
}

fn default_input_price() -> f64 {
    0.15
}
fn default_output_price() -> f64 {
    0.60
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Pause between connectors in a batch.
    #[serde(default = "default_delay")]
    pub delay_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay(),
        }
    }
}

fn default_delay() -> u64 {
    2
}

// ---------------------------------------------------------------------------
// Resolved service credentials
// ---------------------------------------------------------------------------

/// Base URL and token for one external service.
#[derive(Clone)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub token: String,
}

impl std::fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Endpoints for all three services, validated at startup.
#[derive(Debug, Clone)]
pub struct ServiceCredentials {
    pub search: ServiceEndpoint,
    pub llm: ServiceEndpoint,
    pub cms: ServiceEndpoint,
}

/// Resolve service endpoints from the process environment.
pub fn resolve_services(config: &AppConfig) -> Result<ServiceCredentials> {
    resolve_services_with(config, |name| std::env::var(name).ok())
}

/// Resolve service endpoints using `lookup` for environment variables.
///
/// Every missing token is reported in one error so the operator can fix
/// them all at once.
pub fn resolve_services_with<F>(config: &AppConfig, lookup: F) -> Result<ServiceCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let mut missing = Vec::new();
    let mut endpoint = |label: &str, url: &str, url_env: &str, token_env: &str| {
        let base_url = read(url_env).unwrap_or_else(|| url.to_string());
        let token = read(token_env).unwrap_or_else(|| {
            missing.push(format!("{label} ({token_env})"));
            String::new()
        });
        (base_url, token)
    };

    let (search_url, search_token) = endpoint(
        "search",
        &config.search.base_url,
        &config.search.base_url_env,
        &config.search.api_key_env,
    );
    let (llm_url, llm_token) = endpoint(
        "llm",
        &config.llm.base_url,
        &config.llm.base_url_env,
        &config.llm.api_key_env,
    );
    let (cms_url, cms_token) = endpoint(
        "cms",
        &config.cms.base_url,
        &config.cms.base_url_env,
        &config.cms.token_env,
    );

    if !missing.is_empty() {
        return Err(PagesmithError::config(format!(
            "missing credentials: {}. Set the environment variables (or a .env file).",
            missing.join(", ")
        )));
    }

    for (label, url) in [("search", &search_url), ("llm", &llm_url), ("cms", &cms_url)] {
        Url::parse(url).map_err(|e| {
            PagesmithError::config(format!("invalid {label} base URL '{url}': {e}"))
        })?;
    }

    Ok(ServiceCredentials {
        search: ServiceEndpoint {
            base_url: search_url,
            token: search_token,
        },
        llm: ServiceEndpoint {
            base_url: llm_url.trim_end_matches('/').to_string(),
            token: llm_token,
        },
        cms: ServiceEndpoint {
            base_url: cms_url.trim_end_matches('/').to_string(),
            token: cms_token,
        },
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagesmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PagesmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the per-user config file (`~/.pagesmith/pagesmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Find the config file to use.
///
/// An explicit path must exist. Otherwise `./pagesmith.toml` wins over the
/// per-user file; `None` means run on defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(PagesmithError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local));
    }

    match config_file_path() {
        Ok(user) if user.exists() => Ok(Some(user)),
        _ => Ok(None),
    }
}

/// Load the application config. Returns defaults if no file is found.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match resolve_config_path(explicit)? {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!("config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PagesmithError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PagesmithError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file to `path` (or `./pagesmith.toml`).
///
/// Refuses to overwrite an existing file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    if path.exists() {
        return Err(PagesmithError::config(format!(
            "{} already exists, not overwriting",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PagesmithError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| PagesmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PagesmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
