//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::util::time::DEFAULT_TICK_MS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase JWT secret for token verification
    pub supabase_jwt_secret: String,
    /// Profile store; names and ratings are skipped when unset
    pub supabase: Option<SupabaseConfig>,

    /// Allowed client origin for CORS (any origin when unset)
    pub client_origin: Option<String>,

    /// Skirmish tick and bow loop interval
    pub tick_interval: Duration,
    /// Fixed RNG seed mixed into every match seed (reproducible decks/targets)
    pub match_seed: Option<u64>,
}

/// Supabase service credentials
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = match var("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => var("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let supabase = match (var("SUPABASE_URL"), var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_URL")),
        };

        let tick_ms = match var("TICK_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::Invalid("TICK_MS"))?,
            None => DEFAULT_TICK_MS,
        };

        let match_seed = var("MATCH_SEED")
            .map(|raw| raw.parse::<u64>().map_err(|_| ConfigError::Invalid("MATCH_SEED")))
            .transpose()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            supabase_jwt_secret: var("SUPABASE_JWT_SECRET")
                .ok_or(ConfigError::Missing("SUPABASE_JWT_SECRET"))?,
            supabase,

            client_origin: var("CLIENT_ORIGIN"),

            tick_interval: Duration::from_millis(tick_ms),
            match_seed,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
impl Config {
    /// Local config with a fixed match seed and no profile store
    pub fn for_tests() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "debug".to_string(),
            supabase_jwt_secret: "test-secret".to_string(),
            supabase: None,
            client_origin: None,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            match_seed: Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_only_the_jwt_secret() {
        let config = load(&[("SUPABASE_JWT_SECRET", "s")]).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert!(config.supabase.is_none());
        assert!(config.match_seed.is_none());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = load(&[
            ("SUPABASE_JWT_SECRET", "s"),
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:1"),
        ])
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn supabase_needs_both_halves() {
        let err = load(&[("SUPABASE_JWT_SECRET", "s"), ("SUPABASE_URL", "http://x")]);
        assert!(matches!(err, Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            load(&[("SUPABASE_JWT_SECRET", "s"), ("TICK_MS", "0")]),
            Err(ConfigError::Invalid("TICK_MS"))
        ));
        assert!(matches!(
            load(&[("SUPABASE_JWT_SECRET", "s"), ("MATCH_SEED", "abc")]),
            Err(ConfigError::Invalid("MATCH_SEED"))
        ));
        assert!(matches!(load(&[]), Err(ConfigError::Missing("SUPABASE_JWT_SECRET"))));
    }
}
