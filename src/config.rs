use crate::models::Collection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Front door HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Search store connection
    #[serde(default)]
    pub meilisearch: MeilisearchConfig,

    /// Upstream repositories
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Index naming and write batching
    #[serde(default)]
    pub indexes: IndexesConfig,

    /// Upstream revision polling
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Query composition defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: MGS_)
            .add_source(
                config::Environment::with_prefix("MGS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    /// Reject settings that would let a staging index collide with production.
    pub fn validated(self) -> Result<Self, config::ConfigError> {
        if self.indexes.shadow_suffix.is_empty() {
            return Err(config::ConfigError::Message(
                "indexes.shadow_suffix must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeilisearchConfig {
    /// Base URL of the Meilisearch instance
    #[serde(default = "default_meili_url")]
    pub url: String,

    /// Key used for indexing, swapping and index listing
    pub admin_api_key: Option<String>,

    /// Key used for search requests (falls back to the admin key)
    pub search_api_key: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Delay between task status polls (milliseconds)
    #[serde(default = "default_task_poll_interval")]
    pub task_poll_interval_ms: u64,

    /// Give up waiting on an enqueued task after this long (seconds)
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
}

impl MeilisearchConfig {
    pub fn search_key(&self) -> Option<&str> {
        self.search_api_key
            .as_deref()
            .or(self.admin_api_key.as_deref())
    }
}

impl Default for MeilisearchConfig {
    fn default() -> Self {
        Self {
            url: default_meili_url(),
            admin_api_key: None,
            search_api_key: None,
            timeout_secs: default_request_timeout(),
            task_poll_interval_ms: default_task_poll_interval(),
            task_timeout_secs: default_task_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Clone or pull a working tree under `data_dir`
    #[default]
    Local,
    /// Walk the GitHub contents API
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl RepositoryConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: default_branch(),
        }
    }

    /// `owner/repo`, the key used in the revision state file
    pub fn id(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub mode: SourceMode,

    /// Where local checkouts live
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Environment variable holding an optional GitHub token
    pub github_token_env: Option<String>,

    #[serde(default = "default_galaxy_repo")]
    pub galaxy: RepositoryConfig,

    #[serde(default = "default_objects_repo")]
    pub objects: RepositoryConfig,

    #[serde(default = "default_taxonomies_repo")]
    pub taxonomies: RepositoryConfig,
}

impl SourcesConfig {
    pub fn repository(&self, collection: Collection) -> &RepositoryConfig {
        match collection {
            Collection::GalaxyClusters => &self.galaxy,
            Collection::Objects => &self.objects,
            Collection::Taxonomies => &self.taxonomies,
        }
    }

    pub fn github_token(&self) -> Option<String> {
        self.github_token_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|token| !token.is_empty())
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::default(),
            data_dir: default_data_dir(),
            github_api_url: default_github_api_url(),
            github_token_env: Some("GITHUB_TOKEN".to_string()),
            galaxy: default_galaxy_repo(),
            objects: default_objects_repo(),
            taxonomies: default_taxonomies_repo(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexesConfig {
    #[serde(default = "default_galaxy_index")]
    pub galaxy_clusters: String,

    #[serde(default = "default_objects_index")]
    pub objects: String,

    #[serde(default = "default_taxonomies_index")]
    pub taxonomies: String,

    /// Suffix naming the staging generation of an index
    #[serde(default = "default_shadow_suffix")]
    pub shadow_suffix: String,

    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Documents per upsert request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl IndexesConfig {
    /// Production index name for a collection
    pub fn production_name(&self, collection: Collection) -> &str {
        match collection {
            Collection::GalaxyClusters => &self.galaxy_clusters,
            Collection::Objects => &self.objects,
            Collection::Taxonomies => &self.taxonomies,
        }
    }

    /// Staging index name for a collection
    pub fn shadow_name(&self, collection: Collection) -> String {
        format!("{}{}", self.production_name(collection), self.shadow_suffix)
    }

    pub fn is_shadow(&self, index_name: &str) -> bool {
        index_name.ends_with(&self.shadow_suffix)
    }

    /// Reverse lookup from a production index name
    pub fn collection_of(&self, index_name: &str) -> Option<Collection> {
        Collection::ALL
            .into_iter()
            .find(|c| self.production_name(*c) == index_name)
    }
}

impl Default for IndexesConfig {
    fn default() -> Self {
        Self {
            galaxy_clusters: default_galaxy_index(),
            objects: default_objects_index(),
            taxonomies: default_taxonomies_index(),
            shadow_suffix: default_shadow_suffix(),
            primary_key: default_primary_key(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Poll interval (seconds)
    #[serde(default = "default_watch_interval")]
    pub interval_secs: u64,

    /// Revision state file
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_watch_interval(),
            state_path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the request omits one
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    /// How long the discoverable index list is cached (seconds)
    #[serde(default = "default_index_cache_ttl")]
    pub index_cache_ttl_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            index_cache_ttl_secs: default_index_cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8001
}

fn default_meili_url() -> String {
    "http://localhost:7700".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_task_poll_interval() -> u64 {
    100
}

fn default_task_timeout() -> u64 {
    600
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_galaxy_repo() -> RepositoryConfig {
    RepositoryConfig::new("MISP", "misp-galaxy")
}

fn default_objects_repo() -> RepositoryConfig {
    RepositoryConfig::new("MISP", "misp-objects")
}

fn default_taxonomies_repo() -> RepositoryConfig {
    RepositoryConfig::new("MISP", "misp-taxonomies")
}

fn default_galaxy_index() -> String {
    "misp-galaxy".to_string()
}

fn default_objects_index() -> String {
    "misp-objects".to_string()
}

fn default_taxonomies_index() -> String {
    "misp-taxonomies".to_string()
}

fn default_shadow_suffix() -> String {
    "_new".to_string()
}

fn default_primary_key() -> String {
    "uuid".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_watch_interval() -> u64 {
    600
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./data/state.json")
}

fn default_page_size() -> i64 {
    10
}

fn default_index_cache_ttl() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
