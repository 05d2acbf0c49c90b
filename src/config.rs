use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub authn: AuthnConfig,
    pub node: NodeConfig,
    pub registry: RegistryConfig,
    pub slo: SloConfig,
    pub tickets: TicketConfig,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RegistryBackend {
    #[default]
    Memory,
    Redb,
    Redis,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
    /// Directory for the redb backend's database file.
    pub data_dir: String,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TicketConfig {
    pub cleanup_interval_seconds: u64,
    pub st_time_to_live_seconds: i64,
    pub tgt_max_time_to_live_seconds: i64,
    pub tgt_time_to_idle_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct SloConfig {
    /// Maximum concurrent back-channel dispatches per logout.
    pub concurrency: usize,
    /// Operator kill-switch: sessions still terminate, but no notices are
    /// sent.
    pub disabled: bool,
    pub http_timeout_seconds: u64,
    /// Registered-service spec, `"url=back|front|none,..."`.
    pub services_spec: String,
}

#[derive(Debug, Clone)]
pub struct AuthnConfig {
    /// `"user:password,..."` table for the static authentication manager.
    pub users: HashMap<String, String>,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: 30,
            st_time_to_live_seconds: 10,
            tgt_max_time_to_live_seconds: 28_800, // 8 hours
            tgt_time_to_idle_seconds: 7_200,      // 2 hours
        }
    }
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            disabled: false,
            http_timeout_seconds: 5,
            services_spec: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let backend = match std::env::var("REGISTRY_BACKEND")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "redis" => RegistryBackend::Redis,
            "redb" => RegistryBackend::Redb,
            _ => RegistryBackend::Memory,
        };
        let redis_url = std::env::var("REDIS_URL").ok();
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let defaults = TicketConfig::default();
        let tickets = TicketConfig {
            cleanup_interval_seconds: env_number(
                "CLEANUP_INTERVAL_SECONDS",
                defaults.cleanup_interval_seconds,
            ),
            st_time_to_live_seconds: env_number("ST_TTL_SECONDS", defaults.st_time_to_live_seconds),
            tgt_max_time_to_live_seconds: env_number(
                "TGT_MAX_TTL_SECONDS",
                defaults.tgt_max_time_to_live_seconds,
            ),
            tgt_time_to_idle_seconds: env_number(
                "TGT_IDLE_TTL_SECONDS",
                defaults.tgt_time_to_idle_seconds,
            ),
        };

        let slo_defaults = SloConfig::default();
        let slo = SloConfig {
            concurrency: env_number("SLO_CONCURRENCY", slo_defaults.concurrency),
            disabled: std::env::var("SLO_DISABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            http_timeout_seconds: env_number(
                "SLO_TIMEOUT_SECONDS",
                slo_defaults.http_timeout_seconds,
            ),
            services_spec: std::env::var("SERVICES").unwrap_or_default(),
        };

        let users = std::env::var("USERS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|entry| {
                let (user, password) = entry.trim().split_once(':')?;
                if user.is_empty() {
                    return None;
                }
                Some((user.to_string(), password.to_string()))
            })
            .collect();

        let config = Config {
            authn: AuthnConfig { users },
            node: NodeConfig { bind_address },
            registry: RegistryConfig {
                backend,
                data_dir,
                redis_url,
            },
            slo,
            tickets,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.backend == RegistryBackend::Redis && self.registry.redis_url.is_none() {
            return Err(ConfigError::ValidationError(
                "REDIS_URL is required when REGISTRY_BACKEND=redis".to_string(),
            ));
        }
        if self.tickets.st_time_to_live_seconds <= 0
            || self.tickets.tgt_max_time_to_live_seconds <= 0
            || self.tickets.tgt_time_to_idle_seconds <= 0
        {
            return Err(ConfigError::ValidationError(
                "ticket TTLs must be greater than 0".to_string(),
            ));
        }
        if self.tickets.tgt_time_to_idle_seconds > self.tickets.tgt_max_time_to_live_seconds {
            return Err(ConfigError::ValidationError(
                "TGT_IDLE_TTL_SECONDS cannot exceed TGT_MAX_TTL_SECONDS".to_string(),
            ));
        }
        if self.authn.users.is_empty() {
            tracing::warn!("No USERS configured; every ticket-granting request will be rejected.");
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
