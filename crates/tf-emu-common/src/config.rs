//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Shared configuration and logging primitives."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_simulation_seed() -> u64 {
    0xAEA1E
}

fn default_generator_period() -> Duration {
    Duration::from_millis(100)
}

fn default_true() -> bool {
    true
}

fn default_brickd_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4223))
}

/// Primary configuration object for the emulator daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub brickd: BrickdConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "TF_EMU_CONFIG";

    /// Load configuration from disk, respecting the `TF_EMU_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Devices that should be started.
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.devices.iter().filter(|device| device.enabled)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.enabled_devices().next().is_none() {
            bail!("configuration must enable at least one device");
        }
        let mut seen = HashSet::new();
        for device in &self.devices {
            tf_emu_protocol::uid::decode(&device.uid)
                .with_context(|| format!("device '{}' has an invalid uid", device.uid))?;
            if !seen.insert(device.uid.as_str()) {
                bail!("device uid '{}' is configured more than once", device.uid);
            }
        }
        if self.simulation.generator_period.is_zero() {
            bail!("simulation.generator_period_ms must be greater than zero");
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Also write a daily rolling JSON file.
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: LogFormat::default(),
            file_prefix: None,
            file: true,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed for per-instance default values.
    #[serde(default = "default_simulation_seed")]
    pub random_seed: u64,
    /// Tick of every ramp generator.
    #[serde(rename = "generator_period_ms", default = "default_generator_period")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub generator_period: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            random_seed: default_simulation_seed(),
            generator_period: default_generator_period(),
        }
    }
}

/// Brickd compatible TCP front of the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrickdConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_brickd_listen")]
    pub listen: SocketAddr,
}

impl Default for BrickdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_brickd_listen(),
        }
    }
}

/// Device type selector: catalog key or numeric device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceTypeRef {
    Identifier(u16),
    Key(String),
}

impl fmt::Display for DeviceTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceTypeRef::Identifier(id) => write!(f, "{id}"),
            DeviceTypeRef::Key(key) => f.write_str(key),
        }
    }
}

/// One emulated device instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(rename = "type")]
    pub device_type: DeviceTypeRef,
    pub uid: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// UID of the parent brick reported in the identity, `"0"` when unset.
    #[serde(default)]
    pub connected_uid: Option<String>,
    /// Port position reported in the identity, `'0'` when unset.
    #[serde(default)]
    pub position: Option<char>,
}

impl DeviceConfig {
    pub fn new(device_type: DeviceTypeRef, uid: impl Into<String>) -> Self {
        Self {
            device_type,
            uid: uid.into(),
            enabled: true,
            connected_uid: None,
            position: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
        [logging]
        directory = "target/test-logs"
        format = "structured-json"

        [simulation]
        random_seed = 715214
        generator_period_ms = 250

        [brickd]
        listen = "127.0.0.1:14223"

        [[devices]]
        type = "distance_ir"
        uid = "abc"

        [[devices]]
        type = 240
        uid = "XYZ"
        enabled = false
        position = "b"
    "#;

    #[test]
    fn parses_full_configuration() {
        let config: AppConfig = SAMPLE.parse().expect("valid config");
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
        assert_eq!(config.simulation.random_seed, 715214);
        assert_eq!(config.simulation.generator_period, Duration::from_millis(250));
        assert!(config.brickd.enabled);
        assert_eq!(config.brickd.listen.port(), 14223);
        assert_eq!(config.devices[0].device_type, DeviceTypeRef::Key("distance_ir".into()));
        assert_eq!(config.devices[1].device_type, DeviceTypeRef::Identifier(240));
        assert_eq!(config.devices[1].position, Some('b'));
        assert_eq!(config.enabled_devices().count(), 1);
    }

    #[test]
    fn generator_period_is_read_as_milliseconds() {
        let simulation: SimulationConfig =
            toml::from_str("generator_period_ms = 250").expect("simulation section");
        assert_eq!(simulation.generator_period, Duration::from_millis(250));
        assert_eq!(simulation.random_seed, default_simulation_seed());
    }

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config: AppConfig = r#"
            [[devices]]
            type = "hall_effect"
            uid = "q1"
        "#
        .parse()
        .expect("valid config");
        assert_eq!(config.simulation.generator_period, Duration::from_millis(100));
        assert_eq!(config.brickd.listen, default_brickd_listen());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_invalid_device_sets() {
        assert!("devices = []".parse::<AppConfig>().is_err());

        let duplicate = r#"
            [[devices]]
            type = "hall_effect"
            uid = "abc"
            [[devices]]
            type = "barometer"
            uid = "abc"
        "#;
        let err = duplicate.parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let bad_uid = r#"
            [[devices]]
            type = "hall_effect"
            uid = "0OIl"
        "#;
        assert!(bad_uid.parse::<AppConfig>().is_err());

        let zero_period = r#"
            [simulation]
            generator_period_ms = 0
            [[devices]]
            type = "hall_effect"
            uid = "abc"
        "#;
        assert!(zero_period.parse::<AppConfig>().is_err());
    }

    #[test]
    fn loads_from_first_existing_candidate() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(SAMPLE.as_bytes())?;
        let missing = PathBuf::from("does/not/exist.toml");
        let loaded = AppConfig::load_with_source(&[missing, file.path().to_path_buf()])?;
        assert_eq!(loaded.source, file.path());
        assert_eq!(loaded.config.devices.len(), 2);
        Ok(())
    }
}
