use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Scopes requested on every install.
pub const DEFAULT_SCOPES: &[&str] = &[
    "read_orders",
    "read_products",
    "read_inventory",
    "read_reports",
    "read_analytics",
    "write_products",
    "write_orders",
    "write_customers",
    "write_inventory",
];

/// Complete shopq configuration.
///
/// Built once at start-up (TOML file, then environment overrides) and handed to
/// the OAuth handler and question proxy by reference. Nothing reads the
/// environment after `Config::load` returns.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub shopify: ShopifyConfig,
    #[serde(default)]
    pub answer_service: AnswerServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Externally reachable base URL, used to build the OAuth callback URL
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Origins allowed to call the API from a browser (empty = any)
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
    /// Maximum accepted question body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_max_body_bytes() -> usize {
    65_536 // 64 KB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: default_public_url(),
            cors_allowed_origins: default_cors_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Commerce platform (Shopify) app credentials and endpoints
#[derive(Debug, Deserialize)]
pub struct ShopifyConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "empty_secret")]
    pub client_secret: SecretString,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Every shop domain must end with this suffix
    #[serde(default = "default_shop_domain_suffix")]
    pub shop_domain_suffix: String,
    /// Replaces `https://{shop}` for the authorize and token endpoints
    #[serde(default)]
    pub platform_base_url: Option<String>,
    #[serde(default = "default_token_timeout")]
    pub request_timeout_seconds: u64,
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_shop_domain_suffix() -> String {
    ".myshopify.com".to_string()
}

fn default_token_timeout() -> u64 {
    10
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: empty_secret(),
            scopes: default_scopes(),
            shop_domain_suffix: default_shop_domain_suffix(),
            platform_base_url: None,
            request_timeout_seconds: default_token_timeout(),
        }
    }
}

/// External answering service
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerServiceConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_answer_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Retries on transport failures only (connect errors, timeouts)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_answer_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

impl Default for AnswerServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout_seconds: default_answer_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Credential database
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Base64-encoded 32-byte key sealing access tokens at rest
    #[serde(default = "empty_secret")]
    pub encryption_key: SecretString,
}

fn default_database_path() -> String {
    "shopq.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            encryption_key: empty_secret(),
        }
    }
}

/// Upper bound on how long an install may wait for its callback (one day).
pub const MAX_STATE_EXPIRY_SECONDS: i64 = 86_400;

/// OAuth state token lifetime
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_state_expiry")]
    pub state_expiry_seconds: i64,
    #[serde(default = "default_state_cleanup_interval")]
    pub state_cleanup_interval_seconds: u64,
}

fn default_state_expiry() -> i64 {
    600
}

fn default_state_cleanup_interval() -> u64 {
    60
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            state_expiry_seconds: default_state_expiry(),
            state_cleanup_interval_seconds: default_state_cleanup_interval(),
        }
    }
}

impl Config {
    /// Loads the configuration: optional TOML file, environment overrides, validation.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SHOPIFY_API_KEY") {
            self.shopify.client_id = v;
        }
        if let Some(v) = lookup("SHOPIFY_API_SECRET") {
            self.shopify.client_secret = SecretString::new(v);
        }
        if let Some(v) = lookup("AI_SERVICE_URL") {
            self.answer_service.base_url = v;
        }
        if let Some(v) = lookup("SHOPQ_ENCRYPTION_KEY") {
            self.storage.encryption_key = SecretString::new(v);
        }
        if let Some(v) = lookup("SHOPQ_DATABASE_PATH") {
            self.storage.database_path = v;
        }
        if let Some(v) = lookup("SHOPQ_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("SHOPQ_PUBLIC_URL") {
            self.server.public_url = v;
        }
    }

    /// Rejects configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.shopify.client_id.is_empty() {
            return Err(anyhow!("shopify.client_id is required (SHOPIFY_API_KEY)"));
        }
        if self.shopify.client_secret.expose_secret().is_empty() {
            return Err(anyhow!(
                "shopify.client_secret is required (SHOPIFY_API_SECRET)"
            ));
        }
        if self.answer_service.base_url.is_empty() {
            return Err(anyhow!("answer_service.base_url is required (AI_SERVICE_URL)"));
        }
        if self.storage.encryption_key.expose_secret().is_empty() {
            return Err(anyhow!(
                "storage.encryption_key is required (SHOPQ_ENCRYPTION_KEY)"
            ));
        }
        if !(1..=MAX_STATE_EXPIRY_SECONDS).contains(&self.oauth.state_expiry_seconds) {
            return Err(anyhow!(
                "oauth.state_expiry_seconds must be between 1 and {}",
                MAX_STATE_EXPIRY_SECONDS
            ));
        }
        if self.oauth.state_cleanup_interval_seconds == 0 {
            return Err(anyhow!("oauth.state_cleanup_interval_seconds must be positive"));
        }
        Ok(())
    }

    /// Callback URL registered with the platform.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/shopify/oauth/callback",
            self.server.public_url.trim_end_matches('/')
        )
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
    Ok(config)
}
