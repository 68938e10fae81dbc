use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub solver: SolverConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// z3 when the binary answers a version probe, bounded search otherwise.
    Auto,
    Z3,
    Bounded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_solver_timeout", with = "duration_ms")]
    pub timeout: Duration,

    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    #[serde(default = "default_z3_path")]
    pub z3_path: String,

    /// Integers explored by the built-in search range over `[-search_bound, search_bound]`.
    #[serde(default = "default_search_bound")]
    pub search_bound: i64,

    #[serde(default = "default_search_budget")]
    pub search_budget: u64,

    #[serde(default = "default_max_models")]
    pub max_models: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout: default_solver_timeout(),
            backend: default_backend(),
            z3_path: default_z3_path(),
            search_bound: default_search_bound(),
            search_budget: default_search_budget(),
            max_models: default_max_models(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Tokens per input place considered when searching for an enabling binding.
    #[serde(default = "default_max_tokens_per_place")]
    pub max_tokens_per_place: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_place: default_max_tokens_per_place(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solver.search_bound < 0 {
            return Err(ConfigError::Invalid(
                "solver.search_bound must not be negative".to_string(),
            ));
        }
        if self.solver.max_models == 0 {
            return Err(ConfigError::Invalid(
                "solver.max_models must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, ConfigError> {
    let config = serde_json::from_str(s)?;
    Ok(config)
}

fn default_solver_timeout() -> Duration {
    Duration::from_millis(10_000)
}
fn default_backend() -> BackendKind {
    BackendKind::Auto
}
fn default_z3_path() -> String {
    "z3".to_string()
}
fn default_search_bound() -> i64 {
    64
}
fn default_search_budget() -> u64 {
    2_000_000
}
fn default_max_models() -> usize {
    5
}
fn default_max_tokens_per_place() -> usize {
    20
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
