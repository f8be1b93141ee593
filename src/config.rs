//! Configuration management for the Puku core

use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub thumbnail: ThumbnailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Minio,
    R2,
    S3,
    B2,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Tunables for thumbnail generation and serving.
#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailConfig {
    /// JPEG quality, 1-100. A tunable, not a contract.
    pub jpeg_quality: u8,
    /// Longest edge of a generated thumbnail, in pixels.
    pub max_size: u32,
    /// Capacity of the in-memory thumbnail cache, in entries.
    pub cache_entries: usize,
    /// Lifetime of signed thumbnail URLs, in seconds.
    pub signed_url_ttl_secs: u64,
    /// Per-page rendering timeout, in seconds.
    pub render_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                provider: StorageProvider::Minio,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "puku".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            database: DatabaseConfig {
                url: "sqlite:./puku.db".to_string(),
            },
            thumbnail: ThumbnailConfig::default(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        ThumbnailConfig {
            jpeg_quality: 70,
            max_size: 512,
            cache_entries: 100,
            signed_url_ttl_secs: 3600,
            render_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        let defaults = ThumbnailConfig::default();

        Ok(Config {
            storage: StorageConfig {
                provider: match env::var("S3_PROVIDER")
                    .unwrap_or_else(|_| "minio".to_string())
                    .as_str()
                {
                    "r2" => StorageProvider::R2,
                    "s3" => StorageProvider::S3,
                    "b2" => StorageProvider::B2,
                    _ => StorageProvider::Minio,
                },
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./puku.db".to_string()),
            },
            thumbnail: ThumbnailConfig {
                jpeg_quality: parse_env("THUMBNAIL_JPEG_QUALITY", defaults.jpeg_quality),
                max_size: parse_env("THUMBNAIL_MAX_SIZE", defaults.max_size),
                cache_entries: parse_env("THUMBNAIL_CACHE_ENTRIES", defaults.cache_entries),
                signed_url_ttl_secs: parse_env(
                    "THUMBNAIL_URL_TTL_SECS",
                    defaults.signed_url_ttl_secs,
                ),
                render_timeout_secs: parse_env(
                    "THUMBNAIL_RENDER_TIMEOUT_SECS",
                    defaults.render_timeout_secs,
                ),
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thumbnail_tunables() {
        let config = ThumbnailConfig::default();
        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.signed_url_ttl_secs, 3600);
        assert!(config.cache_entries > 0);
    }
}
