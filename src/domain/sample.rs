// Sample and per-device series domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::device::DeviceId;
use super::error::TelemetryError;

/// One timestamped reading. Temperature is in Fahrenheit, humidity in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, temperature: f64, humidity: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
        }
    }
}

/// Convert a Celsius reading the way the sensor clients store it (two decimals).
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    ((celsius * 9.0 / 5.0 + 32.0) * 100.0).round() / 100.0
}

/// How far back a graph looks, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LookbackWindow(u32);

impl LookbackWindow {
    pub const ONE_HOUR: LookbackWindow = LookbackWindow(1);
    pub const ONE_DAY: LookbackWindow = LookbackWindow(24);
    pub const ONE_WEEK: LookbackWindow = LookbackWindow(168);

    pub fn from_hours(hours: u32) -> Result<Self, TelemetryError> {
        if hours == 0 {
            return Err(TelemetryError::InvalidWindow(hours));
        }
        Ok(Self(hours))
    }

    /// Dashboard range tabs: "1h", "24h" and "7d".
    pub fn from_range(range: &str) -> Result<Self, TelemetryError> {
        match range {
            "1h" => Ok(Self::ONE_HOUR),
            "24h" => Ok(Self::ONE_DAY),
            "7d" => Ok(Self::ONE_WEEK),
            other => Err(TelemetryError::UnknownRange(other.to_string())),
        }
    }

    pub fn hours(&self) -> u32 {
        self.0
    }
}

/// Key used to match samples of different devices on the reference axis.
pub type AlignmentKey = DateTime<Utc>;

/// Rounding unit for alignment keys. Samples falling in the same unit share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGranularity(u32);

impl KeyGranularity {
    pub const MINUTE: KeyGranularity = KeyGranularity(60);

    pub fn from_secs(secs: u32) -> Result<Self, TelemetryError> {
        if secs == 0 {
            return Err(TelemetryError::InvalidGranularity);
        }
        Ok(Self(secs))
    }

    pub fn secs(&self) -> u32 {
        self.0
    }

    pub fn key_for(&self, timestamp: DateTime<Utc>) -> AlignmentKey {
        let unit = i64::from(self.0);
        let truncated = timestamp.timestamp().div_euclid(unit) * unit;
        DateTime::from_timestamp(truncated, 0).unwrap_or(timestamp)
    }
}

impl Default for KeyGranularity {
    fn default() -> Self {
        Self::MINUTE
    }
}

/// A device's samples for one request, oldest first, plus its alignment index.
#[derive(Debug, Clone)]
pub struct DeviceSeries {
    pub device_id: DeviceId,
    pub display_name: String,
    pub samples: Vec<Sample>,
    keys: Vec<AlignmentKey>,
    index: HashMap<AlignmentKey, (f64, f64)>,
}

impl DeviceSeries {
    pub fn new(
        device_id: DeviceId,
        display_name: String,
        samples: Vec<Sample>,
        granularity: KeyGranularity,
    ) -> Self {
        let keys: Vec<AlignmentKey> = samples
            .iter()
            .map(|s| granularity.key_for(s.timestamp))
            .collect();

        // Later samples overwrite earlier ones sharing a key
        let index = keys
            .iter()
            .zip(&samples)
            .map(|(key, s)| (*key, (s.temperature, s.humidity)))
            .collect();

        Self {
            device_id,
            display_name,
            samples,
            keys,
            index,
        }
    }

    /// Series for a device whose fetch failed or returned nothing.
    pub fn empty(device_id: DeviceId) -> Self {
        let display_name = device_id.to_string();
        Self::new(device_id, display_name, Vec::new(), KeyGranularity::default())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Alignment keys in sample order.
    pub fn keys(&self) -> &[AlignmentKey] {
        &self.keys
    }

    pub fn lookup(&self, key: &AlignmentKey) -> Option<(f64, f64)> {
        self.index.get(key).copied()
    }
}
