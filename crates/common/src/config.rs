//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Forum limits.
    #[serde(default)]
    pub forum: ForumConfig,
    /// Initial data loaded into an empty store.
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (`postgres://...` or `sqlite::memory:`).
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl DatabaseConfig {
    /// Whether the URL points at an in-memory `SQLite` database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite") && self.url.contains(":memory:")
    }
}

/// Forum limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    /// Page size used when the client does not ask for one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Upper bound on the page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    /// Maximum number of options a poll may carry.
    #[serde(default = "default_max_poll_options")]
    pub max_poll_options: usize,
    /// Maximum number of tags on a post.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_poll_options: default_max_poll_options(),
            max_tags: default_max_tags(),
        }
    }
}

/// Seed data applied at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    /// Whether seeding runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Categories to create when missing.
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    /// Users to create when missing.
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// A seeded category.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_category_color")]
    pub color: String,
}

/// A seeded user with a pre-issued bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub display_name: String,
    /// `citizen`, `official` or `admin`.
    #[serde(default = "default_role")]
    pub role: String,
    pub token: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_page_size() -> u64 {
    10
}

const fn default_max_page_size() -> u64 {
    100
}

const fn default_max_poll_options() -> usize {
    10
}

const fn default_max_tags() -> usize {
    10
}

fn default_category_color() -> String {
    "#3B82F6".to_string()
}

fn default_role() -> String {
    "citizen".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `CIVIC_ENV`)
    /// 4. Environment variables with `CIVIC__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("CIVIC_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CIVIC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CIVIC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        url = "http://localhost:3000"

        [database]
        url = "sqlite::memory:"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.forum.default_page_size, 10);
        assert_eq!(config.forum.max_poll_options, 10);
        assert!(!config.seed.enabled);
        assert!(config.database.is_in_memory());
    }

    #[test]
    fn test_seed_section_is_parsed() {
        let toml = format!(
            r#"{MINIMAL}
            [seed]
            enabled = true

            [[seed.categories]]
            name = "Policy"
            slug = "policy"

            [[seed.users]]
            username = "mayor"
            display_name = "Mayor Johnson"
            role = "official"
            token = "mayor-token"
            "#
        );
        let config = Config::from_toml_str(&toml).unwrap();

        assert!(config.seed.enabled);
        assert_eq!(config.seed.categories[0].slug, "policy");
        assert_eq!(config.seed.categories[0].color, "#3B82F6");
        assert_eq!(config.seed.users[0].role, "official");
    }

    #[test]
    fn test_postgres_url_is_not_in_memory() {
        let db = DatabaseConfig {
            url: "postgres://localhost/civic".to_string(),
            max_connections: 10,
            min_connections: 1,
        };
        assert!(!db.is_in_memory());
    }
}
