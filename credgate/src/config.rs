//! Startup configuration read from environment variables. Every helper returns
//! a `ConfigError` instead of aborting; the binary decides when to exit.

use std::collections::HashMap;
use std::fmt;
use std::num::ParseIntError;
use std::time::Duration;

use jiff::SignedDuration;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::passwords::HashParams;

pub const AUTH_SECRET: &str = "CREDGATE_AUTH_SECRET";
pub const AUTH_MAX_SKEW: &str = "CREDGATE_AUTH_MAX_SKEW";
pub const ARGON2_TIME_COST: &str = "CREDGATE_ARGON2_TIME_COST";
pub const ARGON2_MEMORY_KIB: &str = "CREDGATE_ARGON2_MEMORY_KIB";
pub const ARGON2_PARALLELISM: &str = "CREDGATE_ARGON2_PARALLELISM";
pub const ARGON2_KEY_LEN: &str = "CREDGATE_ARGON2_KEY_LEN";
pub const ARGON2_SALT_LEN: &str = "CREDGATE_ARGON2_SALT_LEN";
pub const LOG_LEVEL: &str = "CREDGATE_LOG_LEVEL";
pub const LOG_FORMAT: &str = "CREDGATE_LOG_FORMAT";

const DEFAULT_MAX_SKEW: Duration = Duration::from_secs(5 * 60);
const MIN_PORT: i64 = 1024;
const MAX_PORT: i64 = 65353;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not set in environment")]
    Missing { key: String },
    #[error("{key} couldn't be converted to int: {source}")]
    InvalidInt {
        key: String,
        #[source]
        source: ParseIntError,
    },
    #[error("{key} must be a port between 1024 and 65353, got {port}")]
    PortOutOfRange { key: String, port: i64 },
    #[error("{key} couldn't be converted to a duration: {reason}")]
    InvalidDuration { key: String, reason: String },
    #[error("{key} is invalid: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Where configuration values come from.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Reads a required, non-empty string.
pub fn get_str(env: &impl EnvSource, key: &str) -> Result<String, ConfigError> {
    match env.var(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing { key: key.to_string() }),
    }
}

/// Reads a required comma separated list. Items are not trimmed.
pub fn get_str_list(env: &impl EnvSource, key: &str) -> Result<Vec<String>, ConfigError> {
    let value = get_str(env, key)?;
    Ok(value.split(',').map(str::to_string).collect())
}

/// Reads a required base-10 integer.
pub fn get_int(env: &impl EnvSource, key: &str) -> Result<i64, ConfigError> {
    let value = get_str(env, key)?;
    value.parse().map_err(|source| ConfigError::InvalidInt {
        key: key.to_string(),
        source,
    })
}

/// Reads a required unprivileged port number.
pub fn read_port(env: &impl EnvSource, key: &str) -> Result<u16, ConfigError> {
    let port = get_int(env, key)?;
    if !(MIN_PORT..=MAX_PORT).contains(&port) {
        return Err(ConfigError::PortOutOfRange {
            key: key.to_string(),
            port,
        });
    }
    u16::try_from(port).map_err(|_| ConfigError::PortOutOfRange {
        key: key.to_string(),
        port,
    })
}

/// Reads a required non-negative duration such as `300s`, `5m`, `1h30m` or `PT5M`.
pub fn parse_duration(env: &impl EnvSource, key: &str) -> Result<Duration, ConfigError> {
    let value = get_str(env, key)?;
    let invalid = |reason: String| ConfigError::InvalidDuration {
        key: key.to_string(),
        reason,
    };
    let signed: SignedDuration = value.parse().map_err(|e| invalid(format!("{e}")))?;
    Duration::try_from(signed).map_err(|e| invalid(format!("{e}")))
}

/// Reads an optional unsigned knob, falling back to `default` when unset.
pub fn get_u32_or(env: &impl EnvSource, key: &str, default: u32) -> Result<u32, ConfigError> {
    match env.var(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{e}"),
        }),
    }
}

/// Shared HMAC key. Zeroed on drop and never printed.
#[derive(Clone)]
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret(<{} bytes redacted>)", self.0.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

/// Validated inputs for the signature and password components.
#[derive(Debug, Clone)]
pub struct Settings {
    pub secret: SharedSecret,
    pub max_skew: Duration,
    pub hash_params: HashParams,
    pub logging: LogSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&ProcessEnv)
    }

    pub fn load(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let secret = SharedSecret::new(get_str(env, AUTH_SECRET)?.into_bytes());

        let max_skew = match env.var(AUTH_MAX_SKEW) {
            None => DEFAULT_MAX_SKEW,
            Some(value) if value.is_empty() => {
                return Err(ConfigError::InvalidDuration {
                    key: AUTH_MAX_SKEW.to_string(),
                    reason: "value is empty".to_string(),
                })
            }
            Some(_) => parse_duration(env, AUTH_MAX_SKEW)?,
        };
        if max_skew.as_secs() == 0 {
            return Err(ConfigError::InvalidValue {
                key: AUTH_MAX_SKEW.to_string(),
                reason: "skew window must be at least one second".to_string(),
            });
        }

        let defaults = HashParams::RECOMMENDED;
        let hash_params = HashParams {
            time_cost: get_u32_or(env, ARGON2_TIME_COST, defaults.time_cost)?,
            memory_cost_kib: get_u32_or(env, ARGON2_MEMORY_KIB, defaults.memory_cost_kib)?,
            parallelism: get_u32_or(env, ARGON2_PARALLELISM, defaults.parallelism)?,
            key_len: get_u32_or(env, ARGON2_KEY_LEN, defaults.key_len)?,
            salt_len: get_u32_or(env, ARGON2_SALT_LEN, defaults.salt_len)?,
        };
        hash_params
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: "CREDGATE_ARGON2_*".to_string(),
                reason: format!("{e}"),
            })?;

        let format = match env.var(LOG_FORMAT).as_deref().map(str::to_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: LOG_FORMAT.to_string(),
                    reason: format!("expected 'pretty' or 'json', got '{other}'"),
                })
            }
        };
        let logging = LogSettings {
            level: env.var(LOG_LEVEL).unwrap_or_else(|| "info".to_string()),
            format,
        };

        Ok(Self {
            secret,
            max_skew,
            hash_params,
            logging,
        })
    }
}
