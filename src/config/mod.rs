//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimoConfig {
    /// Legacy XML brief-search API settings
    #[serde(default)]
    pub legacy: LegacyConfig,

    /// REST/JSON API settings
    #[serde(default)]
    pub rest: RestConfig,

    /// Response and token cache settings
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for PrimoConfig {
    fn default() -> Self {
        Self {
            legacy: LegacyConfig::default(),
            rest: RestConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Settings for the legacy XML brief-search API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// Brief-search endpoint URL
    #[serde(default = "default_legacy_url")]
    pub url: String,

    /// Institution code sent with every request
    #[serde(default = "default_institution")]
    pub institution: String,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            url: default_legacy_url(),
            institution: default_institution(),
        }
    }
}

fn default_legacy_url() -> String {
    "http://localhost:1701/PrimoWebServices/xservice/search/brief".to_string()
}

fn default_institution() -> String {
    "PRIMO".to_string()
}

/// Settings for the REST/JSON API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Search endpoint URL
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Guest JWT endpoint URL. May contain an `{{INSTCODE}}` placeholder,
    /// substituted with the effective institution code at request time.
    #[serde(default = "default_jwt_url")]
    pub jwt_url: String,

    /// Institution code sent with every request
    #[serde(default = "default_institution")]
    pub institution: String,

    /// Interface language
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Search the CDI index instead of the local one
    #[serde(default)]
    pub search_cdi: bool,

    /// API key (optional; most deployments use the guest JWT instead)
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            jwt_url: default_jwt_url(),
            institution: default_institution(),
            lang: default_lang(),
            search_cdi: false,
            api_key: std::env::var("PRIMO_API_KEY").ok(),
        }
    }
}

fn default_search_url() -> String {
    "http://localhost:1701/primo_library/libweb/webservices/rest/primo-explore/v1/pnxs".to_string()
}

fn default_jwt_url() -> String {
    "http://localhost:1701/primo_library/libweb/webservices/rest/v1/guestJwt/{{INSTCODE}}"
        .to_string()
}

fn default_lang() -> String {
    "en_US".to_string()
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether response caching is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Response cache entry lifetime, in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// JWT lifetime assumed for the local expiry clock, in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_ttl(),
            token_ttl_seconds: default_token_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u64 {
    300
}

fn default_token_ttl() -> u64 {
    3600
}

/// Load configuration from a file, with `PRIMO`-prefixed environment
/// variables layered on top
pub fn load_config(path: &PathBuf) -> Result<PrimoConfig, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .add_source(config::Environment::with_prefix("PRIMO"))
        .build()?;

    settings.try_deserialize()
}
