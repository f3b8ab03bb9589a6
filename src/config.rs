//! Configuration file handling

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use sayo_protocol::{consts, DeviceIdentity, ProtocolConstants};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub protocol: ProtocolConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the config file path for this platform
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "sayo-mirror").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load config from the default location, or create it if it doesn't exist
    pub fn load_or_create() -> Result<Self, Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;
        Self::load_or_create_at(&path)
    }

    /// Load config from `path`, writing the defaults there if it doesn't exist
    pub fn load_or_create_at(path: &Path) -> Result<Self, Box<dyn Error>> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.save_with_header(path)?;
            eprintln!("created default config at {}", path.display());
            Ok(config)
        }
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save config with header comments for new files
    pub fn save_with_header(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = r#"# sayo-mirror configuration file
# vendor_id/product_id of 0 match any device

"#;
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB vendor id, 0 for any
    pub vendor_id: u16,
    /// USB product id, 0 for any
    pub product_id: u16,
    /// Case-insensitive manufacturer string filter
    pub manufacturer_contains: String,
    /// Case-insensitive product string filter
    pub product_contains: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: consts::VENDOR_ID,
            product_id: consts::PRODUCT_ID,
            manufacturer_contains: String::new(),
            product_contains: String::new(),
        }
    }
}

impl From<&DeviceConfig> for DeviceIdentity {
    fn from(c: &DeviceConfig) -> Self {
        Self {
            vendor_id: c.vendor_id,
            product_id: c.product_id,
            manufacturer_contains: c.manufacturer_contains.clone(),
            product_contains: c.product_contains.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Echo token sent with requests
    pub echo: u8,
    /// Wait for a single report
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Deadline for a whole command
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    /// Quiet period that ends an already covered frame
    #[serde(with = "humantime_serde")]
    pub idle_break: Duration,
    /// End a capture as soon as the frame is covered
    pub exit_on_coverage: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let proto = ProtocolConstants::default();
        Self {
            echo: proto.echo,
            read_timeout: proto.read_timeout,
            command_timeout: proto.command_timeout,
            idle_break: proto.idle_break,
            exit_on_coverage: proto.exit_on_coverage,
        }
    }
}

impl From<&ProtocolConfig> for ProtocolConstants {
    fn from(c: &ProtocolConfig) -> Self {
        Self {
            echo: c.echo,
            read_timeout: c.read_timeout,
            command_timeout: c.command_timeout,
            idle_break: c.idle_break,
            exit_on_coverage: c.exit_on_coverage,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How often capture statistics are logged
    #[serde(with = "humantime_serde")]
    pub stats_interval: Duration,
    /// Reopen the device after a disconnect instead of exiting
    pub reconnect: bool,
    /// Delay between reconnection attempts
    #[serde(with = "humantime_serde")]
    pub retry: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            reconnect: false,
            retry: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [device]
            vendor_id = 0x1234
            product_contains = "o3c"

            [protocol]
            command_timeout = "2s"
            idle_break = "25ms"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.device.vendor_id, 0x1234);
        assert_eq!(parsed.device.product_id, consts::PRODUCT_ID);
        assert_eq!(parsed.protocol.command_timeout, Duration::from_secs(2));
        assert_eq!(parsed.protocol.idle_break, Duration::from_millis(25));
        assert_eq!(parsed.protocol.read_timeout, Duration::from_millis(50));
        assert_eq!(parsed.capture, CaptureConfig::default());

        let identity = DeviceIdentity::from(&parsed.device);
        assert_eq!(identity.product_contains, "o3c");
        let proto = ProtocolConstants::from(&parsed.protocol);
        assert_eq!(proto.report_id, consts::REPORT_ID_FAST);
        assert_eq!(proto.command_timeout, Duration::from_secs(2));
    }

    #[test]
    fn creates_file_with_header() {
        let dir = std::env::temp_dir().join(format!("sayo-mirror-test-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = fs::remove_file(&path);

        let created = Config::load_or_create_at(&path).unwrap();
        assert_eq!(created, Config::default());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# sayo-mirror configuration file"));

        let loaded = Config::load_or_create_at(&path).unwrap();
        assert_eq!(loaded, created);
        let _ = fs::remove_dir_all(&dir);
    }
}
