use std::path::PathBuf;

use ulid::Ulid;

use crate::auth::{Actor, Role};

/// Everything the service reads from the environment, parsed once at startup
/// and injected from there — nothing reads env vars mid-request.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends since the last compaction that trigger the next one.
    pub compact_threshold: u64,
    /// Bearer tokens and the actors they authenticate.
    pub tokens: Vec<(String, Actor)>,
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid(what) => write!(f, "invalid configuration: {what}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load from `INNKEEP_*` environment variables.
    ///
    /// `INNKEEP_API_TOKENS` is a comma-separated list of
    /// `token:role:user-ulid` entries, e.g.
    /// `s3cret:admin:01ARZ3NDEKTSV4RRFFQ69G5FAV`. Leaving it unset starts the
    /// server with an empty registry (every request is rejected as
    /// unauthenticated).
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind = std::env::var("INNKEEP_BIND").unwrap_or_else(|_| "0.0.0.0".into());
        let port = match std::env::var("INNKEEP_PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::Invalid("INNKEEP_PORT"))?,
            Err(_) => 8080,
        };
        let data_dir =
            PathBuf::from(std::env::var("INNKEEP_DATA_DIR").unwrap_or_else(|_| "./data".into()));
        let metrics_port = match std::env::var("INNKEEP_METRICS_PORT") {
            Ok(s) => Some(
                s.parse()
                    .map_err(|_| ConfigError::Invalid("INNKEEP_METRICS_PORT"))?,
            ),
            Err(_) => None,
        };
        let compact_threshold = match std::env::var("INNKEEP_COMPACT_THRESHOLD") {
            Ok(s) => s
                .parse()
                .map_err(|_| ConfigError::Invalid("INNKEEP_COMPACT_THRESHOLD"))?,
            Err(_) => 1000,
        };
        let tokens = match std::env::var("INNKEEP_API_TOKENS") {
            Ok(s) => parse_tokens(&s)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            bind,
            port,
            data_dir,
            metrics_port,
            compact_threshold,
            tokens,
        })
    }
}

fn parse_tokens(raw: &str) -> Result<Vec<(String, Actor)>, ConfigError> {
    let mut tokens = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.splitn(3, ':');
        let (Some(token), Some(role), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ConfigError::Invalid("INNKEEP_API_TOKENS entry"));
        };
        if token.is_empty() {
            return Err(ConfigError::Invalid("INNKEEP_API_TOKENS entry"));
        }
        let role = match role {
            "user" => Role::User,
            "admin" => Role::Admin,
            _ => return Err(ConfigError::Invalid("INNKEEP_API_TOKENS role")),
        };
        let id = Ulid::from_string(id)
            .map_err(|_| ConfigError::Invalid("INNKEEP_API_TOKENS user id"))?;
        tokens.push((token.to_string(), Actor { id, role }));
    }
    Ok(tokens)
}
