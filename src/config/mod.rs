//! Configuration management for MD runs
//!
//! Parameters come from a `key value` text file (one pair per line) or a YAML
//! file with the same keys. Command-line arguments can override a few of them.

mod args;

pub use args::Args;

use serde::{Deserialize, Serialize};
use serde_yml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::lj_pot::EnergyConvention;

/// Boltzmann constant in the engine's native units (amu Å² ps⁻² K⁻¹).
pub const DEFAULT_K_BOLTZMANN: f64 = 0.831451115;
pub const DEFAULT_SEED: u64 = 47329;

/// Keys whose values are always taken verbatim as strings.
const STRING_KEYS: &[&str] = &["dump_file"];

/// Parameters of a run. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationParameters {
    #[serde(rename = "natoms")]
    pub n_atoms: usize,
    /// Edge length of the cubic box
    #[serde(rename = "lattice")]
    pub box_length: f64,
    pub dt: f64,
    #[serde(rename = "LJ_sigma")]
    pub sigma: f64,
    #[serde(rename = "LJ_epsilon")]
    pub epsilon: f64,
    #[serde(rename = "LJ_cutoff")]
    pub cutoff: f64,
    /// Pairs with r² at or below this value are skipped
    #[serde(rename = "LJ_tolerance")]
    pub tolerance: f64,
    #[serde(rename = "T")]
    pub target_temperature: f64,
    /// Berendsen coupling time
    pub tau: f64,
    pub nsteps: usize,
    #[serde(rename = "dump_dyn")]
    pub dump_interval: usize,
    pub dump_file: String,

    #[serde(rename = "kb", default = "default_kb")]
    pub k_boltzmann: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Maxwell-Boltzmann temperature for the initial velocities; zero keeps
    /// the particles at rest.
    #[serde(rename = "init_T", default)]
    pub initial_temperature: f64,
    #[serde(default = "default_true")]
    pub thermostat: bool,
    #[serde(default)]
    pub energy: EnergyConvention,
    #[serde(default = "default_log_every")]
    pub log_every: usize,

    #[serde(default)]
    pub minimize: bool,
    #[serde(default = "default_sd_step")]
    pub sd_step: f64,
    #[serde(default = "default_sd_threshold")]
    pub sd_threshold: f64,
    #[serde(default = "default_sd_max_steps")]
    pub sd_max_steps: usize,
}

fn default_kb() -> f64 {
    DEFAULT_K_BOLTZMANN
}
fn default_seed() -> u64 {
    DEFAULT_SEED
}
fn default_true() -> bool {
    true
}
fn default_log_every() -> usize {
    100
}
fn default_sd_step() -> f64 {
    1e-4
}
fn default_sd_threshold() -> f64 {
    1e-4
}
fn default_sd_max_steps() -> usize {
    2000
}

/// Errors raised while loading parameters.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// A line is not of the form `key value`.
    Syntax { line: usize, text: String },
    /// A key is missing or its value has the wrong type.
    Value(serde_yml::Error),
    /// Values parsed but make no sense together.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read parameter file {}: {}", path.display(), source)
            }
            ConfigError::Syntax { line, text } => {
                write!(f, "line {}: expected 'key value', found '{}'", line, text)
            }
            ConfigError::Value(e) => write!(f, "bad parameter: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid parameters: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Value(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yml::Error> for ConfigError {
    fn from(e: serde_yml::Error) -> Self {
        ConfigError::Value(e)
    }
}

/// Type a bare token: integer, float, boolean, otherwise string.
fn scalar(token: &str) -> Value {
    if let Ok(n) = token.parse::<u64>() {
        Value::from(n)
    } else if let Ok(n) = token.parse::<i64>() {
        Value::from(n)
    } else if let Ok(x) = token.parse::<f64>() {
        Value::from(x)
    } else if let Ok(b) = token.parse::<bool>() {
        Value::from(b)
    } else {
        Value::String(token.to_string())
    }
}

impl SimulationParameters {
    /// Load from disk. `.yaml`/`.yml` files are read as YAML, anything else
    /// as `key value` lines.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let params = if is_yaml {
            serde_yml::from_str::<SimulationParameters>(&content)?
        } else {
            Self::from_key_values(&content)?
        };
        params.validate()?;
        Ok(params)
    }

    /// Parse the `key value` format.
    ///
    /// Blank lines are skipped and a `#` that starts its own token comments
    /// out the rest of the line; a `#` inside a value is kept. Unknown keys are
    /// ignored and a repeated key keeps its last value. Does not validate.
    pub fn from_key_values(content: &str) -> Result<Self, ConfigError> {
        let mut map = Mapping::new();
        for (idx, raw) in content.lines().enumerate() {
            let mut fields = raw.split_whitespace().take_while(|t| !t.starts_with('#'));
            let (key, value) = match (fields.next(), fields.next()) {
                (None, _) => continue,
                (Some(k), Some(v)) => (k, v),
                _ => {
                    return Err(ConfigError::Syntax {
                        line: idx + 1,
                        text: raw.to_string(),
                    })
                }
            };

            let value = if STRING_KEYS.contains(&key) {
                Value::String(value.to_string())
            } else {
                scalar(value)
            };
            map.insert(Value::String(key.to_string()), value);
        }

        Ok(serde_yml::from_value(Value::Mapping(map))?)
    }

    /// Seed for the initial velocities, kept apart from the lattice jitter
    /// stream so the two draws are independent.
    pub fn velocity_seed(&self) -> u64 {
        self.seed.wrapping_add(1)
    }

    /// Save as YAML
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg.to_string())) };

        if self.n_atoms == 0 {
            return fail("natoms must be at least 1");
        }
        if !(self.box_length > 0.0) {
            return fail("lattice (box length) must be positive");
        }
        if !(self.dt > 0.0) {
            return fail("dt must be positive");
        }
        if !(self.cutoff > 0.0) {
            return fail("LJ_cutoff must be positive");
        }
        if self.tolerance < 0.0 {
            return fail("LJ_tolerance must not be negative");
        }
        if self.dump_interval == 0 {
            return fail("dump_dyn must be at least 1");
        }
        if self.thermostat && !(self.tau > 0.0) {
            return fail("tau must be positive when the thermostat is on");
        }
        if self.log_every == 0 {
            return fail("log_every must be at least 1");
        }
        if self.minimize && !(self.sd_step > 0.0) {
            return fail("sd_step must be positive");
        }
        Ok(())
    }
}
