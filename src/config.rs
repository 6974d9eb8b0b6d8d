use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::device::protocol::CHANNEL_COUNT;
use crate::system::cpu::STAT_PATH;
use crate::system::memory::MEMINFO_PATH;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub device: DeviceConfig,
    pub sources: SourcesConfig,
    pub leds: LedsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 500,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub path: PathBuf,
    pub verify_identity: bool,
    /// Sent once at startup when set; the firmware default is left alone otherwise.
    pub idle_timeout: Option<bool>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            path: PathBuf::from("/dev/ttyUSB0"),
            verify_identity: true,
            idle_timeout: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub stat_path: PathBuf,
    pub meminfo_path: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            stat_path: PathBuf::from(STAT_PATH),
            meminfo_path: PathBuf::from(MEMINFO_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedsConfig {
    /// Channels showing CPU load. With exactly one channel per core each
    /// shows its own core, otherwise all of them show the aggregate.
    pub cpu: Vec<usize>,
    pub memory: Option<usize>,
    pub blank_on_exit: bool,
}

impl Default for LedsConfig {
    fn default() -> Self {
        LedsConfig {
            cpu: vec![5, 4],
            memory: Some(3),
            blank_on_exit: true,
        }
    }
}

impl LedsConfig {
    /// Channel numbers the peripheral does not have.
    pub fn invalid_channels(&self) -> Vec<usize> {
        self.cpu
            .iter()
            .copied()
            .chain(self.memory)
            .filter(|&c| c >= CHANNEL_COUNT)
            .collect()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("statusled").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "cannot read config, using defaults");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.general.refresh_rate_ms, 500);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.device.path, PathBuf::from("/dev/ttyUSB0"));
        assert!(config.device.verify_identity);
        assert_eq!(config.device.idle_timeout, None);
        assert_eq!(config.sources.stat_path, PathBuf::from("/proc/stat"));
        assert_eq!(config.leds.cpu, vec![5, 4]);
        assert_eq!(config.leds.memory, Some(3));
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[device]
path = "/dev/ttyACM0"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.path, PathBuf::from("/dev/ttyACM0"));
        // Other fields should be defaults
        assert!(config.device.verify_identity);
        assert_eq!(config.general.refresh_rate_ms, 500);
        assert_eq!(config.leds.cpu, vec![5, 4]);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[general]
refresh_rate_ms = 1000
log_level = "debug"

[device]
path = "/dev/ttyUSB1"
verify_identity = false
idle_timeout = true

[sources]
stat_path = "/tmp/stat"
meminfo_path = "/tmp/meminfo"

[leds]
cpu = [0, 1, 2, 3]
memory = 5
blank_on_exit = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.refresh_rate_ms, 1000);
        assert_eq!(config.general.log_level, "debug");
        assert!(!config.device.verify_identity);
        assert_eq!(config.device.idle_timeout, Some(true));
        assert_eq!(config.sources.meminfo_path, PathBuf::from("/tmp/meminfo"));
        assert_eq!(config.leds.cpu, vec![0, 1, 2, 3]);
        assert_eq!(config.leds.memory, Some(5));
        assert!(!config.leds.blank_on_exit);
    }

    #[test]
    fn invalid_channels_are_reported() {
        let leds = LedsConfig {
            cpu: vec![0, 9],
            memory: Some(6),
            blank_on_exit: true,
        };
        assert_eq!(leds.invalid_channels(), vec![9, 6]);
        assert!(LedsConfig::default().invalid_channels().is_empty());
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.general.refresh_rate_ms, 500);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("statusled_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.general.refresh_rate_ms, 500);
        let _ = std::fs::remove_file(&temp);
    }
}
