use crate::application::fetch_coordinator::{DEFAULT_FETCH_TIMEOUT, DEFAULT_POOL_SIZE};
use crate::domain::device::Device;
use crate::domain::sample::{KeyGranularity, LookbackWindow};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const ENV_PREFIX: &str = "HOME_TELEMETRY";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub pool_size: usize,
    pub fetch_timeout_secs: u64,
    pub default_window_hours: u32,
    pub key_granularity_secs: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            default_window_hours: LookbackWindow::ONE_DAY.hours(),
            key_granularity_secs: KeyGranularity::MINUTE.secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    pub influx: InfluxSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_temperature_field")]
    pub temperature_field: String,
    #[serde(default = "default_humidity_field")]
    pub humidity_field: String,
    #[serde(default = "default_device_id_tag")]
    pub device_id_tag: String,
    #[serde(default = "default_device_name_tag")]
    pub device_name_tag: String,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
}

fn default_measurement() -> String {
    "climate".to_string()
}

fn default_temperature_field() -> String {
    "temperature".to_string()
}

fn default_humidity_field() -> String {
    "humidity".to_string()
}

fn default_device_id_tag() -> String {
    "device_id".to_string()
}

fn default_device_name_tag() -> String {
    "device_name".to_string()
}

/// Unit the history store keeps temperatures in.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DevicesConfig {
    #[serde(default)]
    pub devices: Vec<Device>,
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    load("config/server", false)
}

pub fn load_influx_config() -> anyhow::Result<InfluxConfig> {
    load("config/influx", true)
}

pub fn load_devices_config() -> anyhow::Result<DevicesConfig> {
    load("config/devices", true)
}

fn load<T: DeserializeOwned>(name: &str, required: bool) -> anyhow::Result<T> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(name).required(required))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
