//! Configuration loading.
//!
//! Settings come from an optional TOML file; every key has a default so the
//! server can start without one. A handful of environment variables override
//! the file so deployments can inject secrets and ports without editing it:
//!
//! | Variable | Key |
//! |----------|-----|
//! | `DATABASE_URL` | `db.url` |
//! | `HOST` | `server.host` |
//! | `PORT` | `server.port` |
//! | `RESET_DB` | `seed.reset_db` |
//! | `CLOUDINARY_CLOUD_NAME` | `cloudinary.cloud_name` |
//! | `CLOUDINARY_API_KEY` | `cloudinary.api_key` |
//! | `CLOUDINARY_API_SECRET` | `cloudinary.api_secret` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub cloudinary: CloudinaryConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

fn default_db_url() -> String {
    "sqlite:data/portfolio.sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Plain-text body served on `GET /`.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            greeting: default_greeting(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_greeting() -> String {
    "This is Jessica Panditha's portfolio API".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    /// Clear and repopulate the content collections before serving.
    #[serde(default)]
    pub reset_db: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloudinaryConfig {
    #[serde(default)]
    pub cloud_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CloudinaryConfig {
    pub fn has_credentials(&self) -> bool {
        [&self.cloud_name, &self.api_key, &self.api_secret]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

fn default_api_base() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Request body limit for `POST /thoughts`.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            allowed_formats: default_allowed_formats(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_folder() -> String {
    "thoughts".to_string()
}
fn default_allowed_formats() -> Vec<String> {
    vec!["jpg".to_string(), "png".to_string()]
}
fn default_max_width() -> u32 {
    520
}
fn default_max_height() -> u32 {
    354
}
fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

/// Load configuration from `path` (if it exists), apply environment
/// overrides and validate the result.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;

    if !config.cloudinary.has_credentials() {
        warn!("image host credentials are not fully configured; uploads will fail");
    }

    Ok(config)
}

/// Overlay environment values onto `config`. `lookup` is injected so the
/// mapping can be tested without touching the process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        config.db.url = url;
    }
    if let Some(host) = lookup("HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
    }
    if let Some(flag) = lookup("RESET_DB") {
        config.seed.reset_db = parse_flag(&flag);
    }
    if let Some(name) = lookup("CLOUDINARY_CLOUD_NAME") {
        config.cloudinary.cloud_name = Some(name);
    }
    if let Some(key) = lookup("CLOUDINARY_API_KEY") {
        config.cloudinary.api_key = Some(key);
    }
    if let Some(secret) = lookup("CLOUDINARY_API_SECRET") {
        config.cloudinary.api_secret = Some(secret);
    }
    Ok(())
}

/// Interpret a boolean-like environment value. Any non-empty value enables
/// the flag except the usual negatives.
pub fn parse_flag(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    !matches!(v.as_str(), "" | "0" | "false" | "no" | "off")
}

fn validate(config: &Config) -> Result<()> {
    if config.db.url.trim().is_empty() {
        anyhow::bail!("db.url must not be empty");
    }

    if config.upload.allowed_formats.is_empty() {
        anyhow::bail!("upload.allowed_formats must list at least one format");
    }

    if config.upload.max_width == 0 || config.upload.max_height == 0 {
        anyhow::bail!("upload.max_width and upload.max_height must be > 0");
    }

    if config.upload.max_bytes == 0 {
        anyhow::bail!("upload.max_bytes must be > 0");
    }

    if config.cloudinary.timeout_secs == 0 {
        anyhow::bail!("cloudinary.timeout_secs must be > 0");
    }

    Ok(())
}
