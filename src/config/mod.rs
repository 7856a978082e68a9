//! Command-line and environment configuration.
//!
//! Every flag can also be set through a `MOVIE_CACHE_*` environment variable;
//! an explicit flag wins over the environment.

use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum, builder::BoolishValueParser};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::api::RouteOptions;
use crate::cache::CacheConfig;
use crate::database::StoreOptions;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache TTL must be at least one second")]
    ZeroTtl,

    #[error("cache capacity must be at least one entry")]
    ZeroCapacity,

    #[error("bind address must not be empty")]
    EmptyBind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Settings for the `movie-cache` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "movie-cache",
    version,
    about = "Movie API with a read-through response cache"
)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "MOVIE_CACHE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Lifetime of a cached response, in seconds.
    #[arg(long, env = "MOVIE_CACHE_TTL_SECS", default_value_t = 30)]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached responses.
    #[arg(long, env = "MOVIE_CACHE_CAPACITY", default_value_t = 1024)]
    pub cache_capacity: usize,

    /// Serve `/cached/movie/{id}` through the cache; `false` turns it into a pass-through.
    #[arg(
        long,
        env = "MOVIE_CACHE_ENABLED",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: bool,

    /// Deadline for one backing-store read, in milliseconds; 0 disables it.
    #[arg(long, env = "MOVIE_CACHE_FETCH_TIMEOUT_MS", default_value_t = 3000)]
    pub fetch_timeout_ms: u64,

    /// Interval of the expired-entry sweep, in seconds; 0 disables the sweep.
    #[arg(long, env = "MOVIE_CACHE_JANITOR_INTERVAL_SECS", default_value_t = 0)]
    pub janitor_interval_secs: u64,

    /// Artificial delay added to every store read, in milliseconds.
    #[arg(long, env = "MOVIE_CACHE_STORE_LATENCY_MS", default_value_t = 0)]
    pub store_latency_ms: u64,

    /// Upper bound of random extra store delay, in milliseconds.
    #[arg(long, env = "MOVIE_CACHE_STORE_JITTER_MS", default_value_t = 0)]
    pub store_jitter_ms: u64,

    /// Make every store read fail.
    #[arg(
        long,
        env = "MOVIE_CACHE_FAULT_INJECTION",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub fault_injection: bool,

    /// Answer invalid ids with 400 instead of 200 and a message.
    #[arg(
        long,
        env = "MOVIE_CACHE_STRICT_VALIDATION",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub strict_validation: bool,

    /// Let clients force a refetch with `Cache-Control: max-age=0` or `no-cache`.
    #[arg(
        long,
        env = "MOVIE_CACHE_ALLOW_CLIENT_REFRESH",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub allow_client_refresh: bool,

    #[arg(long, env = "MOVIE_CACHE_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long, env = "MOVIE_CACHE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::EmptyBind);
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_ms > 0).then(|| Duration::from_millis(self.fetch_timeout_ms))
    }

    pub fn janitor_interval(&self) -> Option<Duration> {
        (self.janitor_interval_secs > 0).then(|| Duration::from_secs(self.janitor_interval_secs))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_capacity(self.cache_capacity)
            .with_fetch_timeout(self.fetch_timeout())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            latency: Duration::from_millis(self.store_latency_ms),
            jitter: Duration::from_millis(self.store_jitter_ms),
            fault_injection: self.fault_injection,
        }
    }

    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            cache_enabled: self.cache_enabled,
            strict_validation: self.strict_validation,
            allow_client_refresh: self.allow_client_refresh,
            fetch_timeout: self.fetch_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("movie-cache").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert!(config.cache_enabled);
        assert!(!config.strict_validation);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.validate(), Ok(()));

        let cache = config.cache_config();
        assert_eq!(cache.ttl, Duration::from_secs(30));
        assert_eq!(cache.capacity.get(), 1024);
        assert_eq!(cache.fetch_timeout, Some(Duration::from_millis(3000)));
        assert_eq!(config.janitor_interval(), None);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--cache-ttl-secs",
            "5",
            "--cache-enabled",
            "false",
            "--fetch-timeout-ms",
            "0",
            "--strict-validation",
            "yes",
            "--store-latency-ms",
            "250",
            "--log-format",
            "json",
        ]);
        assert_eq!(config.cache_config().ttl, Duration::from_secs(5));
        assert_eq!(config.fetch_timeout(), None);
        assert_eq!(config.log_format, LogFormat::Json);

        let routes = config.route_options();
        assert!(!routes.cache_enabled);
        assert!(routes.strict_validation);
        assert_eq!(
            config.store_options().latency,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn validate_rejects_zero_ttl_and_capacity() {
        assert_eq!(
            parse(&["--cache-ttl-secs", "0"]).validate(),
            Err(ConfigError::ZeroTtl)
        );
        assert_eq!(
            parse(&["--cache-capacity", "0"]).validate(),
            Err(ConfigError::ZeroCapacity)
        );
    }

    #[test]
    fn level_maps_to_filter() {
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
    }
}
