//! Configuration Surface (§6, §4.12): everything this service needs is
//! environment-derived — a workspace token, the four upstream database
//! identifiers, rate-limit and cache tuning, feature flags, and the
//! handful of knobs the embedding binary needs (port, execution mode, log
//! level). This surface is small enough that plain `env::var` reads are the
//! idiomatic choice; there is no include graph or variable expansion to
//! support.

use crate::model::EntityKind;
use std::env;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// The workspace API token. `Debug`/`Display` redact the value so it never
/// lands in a log line by accident.
#[derive(Clone)]
pub struct WorkspaceToken(String);

impl WorkspaceToken {
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for WorkspaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WorkspaceToken(***redacted***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Development,
    Test,
    Production,
}

impl ExecutionMode {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "development" => Ok(ExecutionMode::Development),
            "test" => Ok(ExecutionMode::Test),
            "production" => Ok(ExecutionMode::Production),
            other => Err(ConfigError::InvalidValue {
                field: "EXECUTION_MODE".to_string(),
                reason: format!("expected development|test|production, got '{other}'"),
            }),
        }
    }
}

/// The four upstream database identifiers, and the database-id-based
/// entity-kind detection this service adopts (Q1).
#[derive(Debug, Clone)]
pub struct DatabaseIds {
    pub character: String,
    pub element: String,
    pub puzzle: String,
    pub timeline_event: String,
}

impl DatabaseIds {
    pub fn kind_for_database(&self, db_id: &str) -> Option<EntityKind> {
        if db_id == self.character {
            Some(EntityKind::Character)
        } else if db_id == self.element {
            Some(EntityKind::Element)
        } else if db_id == self.puzzle {
            Some(EntityKind::Puzzle)
        } else if db_id == self.timeline_event {
            Some(EntityKind::TimelineEvent)
        } else {
            None
        }
    }

    pub fn database_for_kind(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Character => &self.character,
            EntityKind::Element => &self.element,
            EntityKind::Puzzle => &self.puzzle,
            EntityKind::TimelineEvent => &self.timeline_event,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub reservoir: u64,
    pub refill_per_sec: u64,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            reservoir: 3,
            refill_per_sec: 3,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub cleanup_period_secs: u64,
    pub max_entries: usize,
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            cleanup_period_secs: 300,
            max_entries: 1000,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace_token: WorkspaceToken,
    pub workspace_base_url: String,
    pub database_ids: DatabaseIds,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheSettings,
    pub listening_port: u16,
    pub execution_mode: ExecutionMode,
    pub log_level: String,
    pub cors_origins: Vec<String>,
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn optional_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            reason: format!("'{raw}' is not a valid integer"),
        }),
        Err(_) => Ok(default),
    }
}

fn optional_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                field: name.to_string(),
                reason: format!("'{raw}' is not a boolean"),
            }),
        },
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from the process environment. Fails fast
    /// (§7: "Config (fatal at startup)") on a missing token or malformed
    /// database identifier rather than starting in a half-configured
    /// state.
    pub fn from_env() -> Result<Self, ConfigError> {
        let workspace_token = WorkspaceToken(required("WORKSPACE_TOKEN")?);
        let workspace_base_url =
            env::var("WORKSPACE_BASE_URL").unwrap_or_else(|_| "https://api.workspace.example".to_string());

        let database_ids = DatabaseIds {
            character: validated_database_id("CHARACTERS_DB_ID")?,
            element: validated_database_id("ELEMENTS_DB_ID")?,
            puzzle: validated_database_id("PUZZLES_DB_ID")?,
            timeline_event: validated_database_id("TIMELINE_DB_ID")?,
        };

        let rate_limit = RateLimitConfig {
            reservoir: optional_u64("RATE_LIMIT_RESERVOIR", 3)?,
            refill_per_sec: optional_u64("RATE_LIMIT_REFILL_PER_SEC", 3)?,
            enabled: optional_bool("RATE_LIMIT_ENABLED", true)?,
        };

        let cache = CacheSettings {
            ttl_secs: optional_u64("CACHE_TTL_SECS", 300)?,
            cleanup_period_secs: optional_u64("CACHE_CLEANUP_PERIOD_SECS", 300)?,
            max_entries: optional_u64("CACHE_MAX_ENTRIES", 1000)? as usize,
            enabled: optional_bool("CACHE_ENABLED", true)?,
        };

        let listening_port = optional_u64("PORT", 3000)? as u16;

        let execution_mode = match env::var("EXECUTION_MODE") {
            Ok(raw) => ExecutionMode::parse(&raw)?,
            Err(_) => ExecutionMode::Development,
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Ok(Config {
            workspace_token,
            workspace_base_url,
            database_ids,
            rate_limit,
            cache,
            listening_port,
            execution_mode,
            log_level,
            cors_origins,
        })
    }
}

fn validated_database_id(var: &str) -> Result<String, ConfigError> {
    let raw = required(var)?;
    if crate::model::uuid_util::normalize(&raw).is_none() {
        return Err(ConfigError::InvalidValue {
            field: var.to_string(),
            reason: "not a valid UUID".to_string(),
        });
    }
    Ok(raw)
}
