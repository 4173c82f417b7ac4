//! Configuration layer: typed settings with layered precedence (file → env).

use std::{path::Path, str::FromStr};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const ENV_PREFIX: &str = "QUIRE";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (files → environment).
///
/// `config/default` and `quire` (any supported extension) are read when
/// present; `config_file`, when given, must exist. `QUIRE__SECTION__KEY`
/// variables override file values.
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            logging: build_logging_settings(raw.logging)?,
            cache: build_cache_settings(raw.cache)?,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings {
                level: LevelFilter::INFO,
                format: LogFormat::Compact,
            },
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    capacity: Option<usize>,
    sweep_interval_secs: Option<u64>,
    user_ttl_secs: Option<u64>,
    document_ttl_secs: Option<u64>,
    listing_ttl_secs: Option<u64>,
    author_ttl_secs: Option<u64>,
    feed_page_size: Option<usize>,
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheConfig, LoadError> {
    let defaults = CacheConfig::default();

    Ok(CacheConfig {
        capacity: positive("cache.capacity", cache.capacity, defaults.capacity)?,
        sweep_interval_secs: positive(
            "cache.sweep_interval_secs",
            cache.sweep_interval_secs,
            defaults.sweep_interval_secs,
        )?,
        user_ttl_secs: positive("cache.user_ttl_secs", cache.user_ttl_secs, defaults.user_ttl_secs)?,
        document_ttl_secs: positive(
            "cache.document_ttl_secs",
            cache.document_ttl_secs,
            defaults.document_ttl_secs,
        )?,
        listing_ttl_secs: positive(
            "cache.listing_ttl_secs",
            cache.listing_ttl_secs,
            defaults.listing_ttl_secs,
        )?,
        author_ttl_secs: positive(
            "cache.author_ttl_secs",
            cache.author_ttl_secs,
            defaults.author_ttl_secs,
        )?,
        feed_page_size: positive(
            "cache.feed_page_size",
            cache.feed_page_size,
            defaults.feed_page_size,
        )?,
    })
}

fn positive<T>(key: &'static str, value: Option<T>, default: T) -> Result<T, LoadError>
where
    T: PartialEq + Default,
{
    let value = value.unwrap_or(default);
    if value == T::default() {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}
