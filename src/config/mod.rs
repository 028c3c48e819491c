use log::info;
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "MT174_CONFIG";
const CONFIG_PATHS: [&str; 2] = ["config/mt174.yaml", "mt174.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the config on {0}")]
    Io(String, #[source] std::io::Error),
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn meter_baud_rate_default() -> u32 { return 9600 }
fn meter_timeout_ms_default() -> u64 { return 1500 }
fn meter_simulate_default() -> bool { return false }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MeterConfig {
    pub port: Option<String>,
    #[serde(default="meter_baud_rate_default")]
    pub baud_rate: u32,
    #[serde(default="meter_timeout_ms_default")]
    pub timeout_ms: u64,
    #[serde(default="meter_simulate_default")]
    pub simulate: bool,
}

impl MeterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct FileLoggerConfig {
    pub path: String,
}

fn mqtt_client_name_default() -> String { return "mt174reader".to_string() }
fn mqtt_port_default() -> u16 { return 1883 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MqttConsumerConfig {
    pub host: String,
    #[serde(default="mqtt_port_default")]
    pub port: u16,
    pub root_topic: String,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
    pub user: Option<String>,
    pub pass: Option<String>,
}

fn eibd_groupwrite_default() -> String { return "/usr/local/bin/groupwrite".to_string() }
fn eibd_timeout_ms_default() -> u64 { return 10000 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct EibdConsumerConfig {
    /// eibd connection URL, e.g. `ip:localhost` or `local:/tmp/eib`
    pub host: String,
    #[serde(default="eibd_groupwrite_default")]
    pub groupwrite: String,
    /// Limit for a single `groupwrite` call
    #[serde(default="eibd_timeout_ms_default")]
    pub timeout_ms: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumerConfig {
    FileLogger(FileLoggerConfig),
    Mqtt(MqttConsumerConfig),
    Eibd(EibdConsumerConfig),
}

fn interval_default() -> u64 { return crate::scheduler::DEFAULT_INTERVAL.as_secs() }
fn consumers_default() -> Vec<ConsumerConfig> { return Vec::new() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub meter: MeterConfig,
    /// Seconds between two readings
    #[serde(default="interval_default")]
    pub interval: u64,
    #[serde(default="consumers_default")]
    pub consumers: Vec<ConsumerConfig>,
}

impl Config {
    /// Loads from `$MT174_CONFIG`, falling back to `config/mt174.yaml` and
    /// `mt174.yaml`.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(path);
        }

        let path = CONFIG_PATHS
            .iter()
            .find(|p| Path::new(p).exists())
            .unwrap_or(&CONFIG_PATHS[0]);
        Self::load_from(path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
        let config = Self::parse(&contents)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let c: Config = serde_yml::from_str(contents)?;
        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::Invalid("interval must be at least one second".to_string()));
        }
        if !self.meter.simulate && self.meter.port.is_none() {
            return Err(ConfigError::Invalid("meter.port is required unless meter.simulate is set".to_string()));
        }
        for consumer in self.consumers.iter() {
            if let ConsumerConfig::Eibd(c) = consumer {
                if c.timeout_ms == 0 {
                    return Err(ConfigError::Invalid("eibd timeout_ms must be positive".to_string()));
                }
            }
        }
        if self.meter.timeout_ms == 0 {
            return Err(ConfigError::Invalid("meter.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}
