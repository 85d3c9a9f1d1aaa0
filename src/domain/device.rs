// Device domain model
use serde::{Deserialize, Serialize};
use std::fmt;

use super::sample::Sample;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A configured device as listed by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
}

/// Most recent reading of a device, shown as "data as of" tiles.
#[derive(Debug, Clone, Serialize)]
pub struct LatestReading {
    pub device_id: DeviceId,
    pub display_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub temperature: f64,
    pub humidity: f64,
}

impl LatestReading {
    pub fn new(device_id: DeviceId, display_name: String, sample: Sample) -> Self {
        Self {
            device_id,
            display_name,
            timestamp: sample.timestamp,
            temperature: sample.temperature,
            humidity: sample.humidity,
        }
    }
}

/// Split a comma separated id list ("1,2, 3") into device ids, skipping blanks.
pub fn parse_device_list(raw: &str) -> Vec<DeviceId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(DeviceId::from)
        .collect()
}
