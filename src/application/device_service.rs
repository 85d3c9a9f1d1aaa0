// Device service - Use case for listing devices and their latest readings
use crate::application::sample_source::SampleSource;
use crate::domain::device::{Device, DeviceId, LatestReading};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct DeviceService {
    source: Arc<dyn SampleSource>,
    devices: Vec<Device>,
    pool: Arc<Semaphore>,
    fetch_timeout: Duration,
}

impl DeviceService {
    pub fn new(
        source: Arc<dyn SampleSource>,
        devices: Vec<Device>,
        pool: Arc<Semaphore>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            devices,
            pool,
            fetch_timeout,
        }
    }

    pub fn list_devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id.clone()).collect()
    }

    /// Latest reading of each device, in request order. Devices that fail,
    /// time out or never reported are left out.
    pub async fn latest_readings(&self, device_ids: &[DeviceId]) -> Vec<LatestReading> {
        let lookups = device_ids.iter().map(|id| self.latest_reading(id));

        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn latest_reading(&self, device_id: &DeviceId) -> Option<LatestReading> {
        // Bounds the pool slot wait and the held permit alike
        match tokio::time::timeout(self.fetch_timeout, self.lookup_latest(device_id)).await {
            Ok(reading) => reading,
            Err(_) => {
                tracing::warn!(
                    "No latest reading for device {} within {:?}",
                    device_id,
                    self.fetch_timeout
                );
                None
            }
        }
    }

    async fn lookup_latest(&self, device_id: &DeviceId) -> Option<LatestReading> {
        let _permit = self.pool.acquire().await.ok()?;

        let sample = match self.source.query_latest(device_id).await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                tracing::debug!("No readings yet for device {}", device_id);
                return None;
            }
            Err(e) => {
                tracing::warn!("Error fetching latest reading for device {}: {:#}", device_id, e);
                return None;
            }
        };

        let display_name = match self.configured_name(device_id) {
            Some(name) => name.to_string(),
            None => self
                .source
                .display_name(device_id)
                .await
                .unwrap_or_else(|_| device_id.to_string()),
        };

        Some(LatestReading::new(device_id.clone(), display_name, sample))
    }

    fn configured_name(&self, device_id: &DeviceId) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| &d.id == device_id)
            .map(|d| d.name.as_str())
    }
}
