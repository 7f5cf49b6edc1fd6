//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `samsara-config.yaml` at the
//! project root. This module defines strongly-typed structs mirroring the
//! YAML structure, with serde defaults for every field, and a loader that
//! reads and validates the file. Environment variables override the
//! infrastructure URLs (`DATABASE_URL` for `PostgreSQL`).

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed, founding population).
    #[serde(default)]
    pub world: WorldConfig,

    /// Time settings.
    #[serde(default)]
    pub time: TimeConfig,

    /// Population parameters.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Passive-effect parameters.
    #[serde(default)]
    pub passive: PassiveConfig,

    /// Relation evolution parameters.
    #[serde(default)]
    pub relations: RelationConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulation boundary parameters.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of founding actors spawned at startup.
    #[serde(default = "default_founders")]
    pub founders: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            founders: default_founders(),
        }
    }
}

/// Time configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeConfig {
    /// Months in one in-world year.
    #[serde(default = "default_months_per_year")]
    pub months_per_year: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            months_per_year: default_months_per_year(),
        }
    }
}

/// Population parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PopulationConfig {
    /// Hard cap on the living population.
    #[serde(default = "default_max_actors")]
    pub max_actors: u32,

    /// Per-tick birth chance for a spoused pair, in percent.
    #[serde(default = "default_birth_chance_pct")]
    pub birth_chance_pct: u8,

    /// Expected lifespan in months.
    #[serde(default = "default_lifespan_months")]
    pub lifespan_months: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            max_actors: default_max_actors(),
            birth_chance_pct: default_birth_chance_pct(),
            lifespan_months: default_lifespan_months(),
        }
    }
}

/// Passive-effect parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PassiveConfig {
    /// Per-actor, per-tick chance of a stroke of fortune, in percent.
    #[serde(default = "default_fortune_chance_pct")]
    pub fortune_chance_pct: u8,

    /// Months a gathering site stays closed after being opened.
    #[serde(default = "default_site_reopen_months")]
    pub site_reopen_months: u64,
}

impl Default for PassiveConfig {
    fn default() -> Self {
        Self {
            fortune_chance_pct: default_fortune_chance_pct(),
            site_reopen_months: default_site_reopen_months(),
        }
    }
}

/// Relation evolution parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationConfig {
    /// Interaction count a pair must exceed to be submitted for relation
    /// evolution.
    #[serde(default = "default_evolve_threshold")]
    pub evolve_threshold: u64,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            evolve_threshold: default_evolve_threshold(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// `PostgreSQL` URL for the durable event log. When absent the
    /// in-memory store backs the run.
    #[serde(default)]
    pub postgres_url: Option<String>,
}

impl InfrastructureConfig {
    /// Apply environment overrides: `DATABASE_URL` wins over YAML.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                self.postgres_url = Some(url);
            }
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Simulation boundary parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Stop after this many ticks; `None` runs until extinction.
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

fn default_world_name() -> String {
    String::from("samsara")
}

const fn default_seed() -> u64 {
    42
}

const fn default_founders() -> u32 {
    6
}

const fn default_months_per_year() -> u64 {
    12
}

const fn default_max_actors() -> u32 {
    64
}

const fn default_birth_chance_pct() -> u8 {
    4
}

const fn default_lifespan_months() -> u64 {
    960
}

const fn default_fortune_chance_pct() -> u8 {
    6
}

const fn default_site_reopen_months() -> u64 {
    3
}

const fn default_evolve_threshold() -> u64 {
    5
}

fn default_log_level() -> String {
    String::from("info")
}
