// Sample source trait for per-device history access
use crate::domain::device::DeviceId;
use crate::domain::sample::{LookbackWindow, Sample};
use async_trait::async_trait;

#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Display name and samples (oldest first) of a device within the window
    async fn query_series(
        &self,
        device_id: &DeviceId,
        window: LookbackWindow,
    ) -> anyhow::Result<(String, Vec<Sample>)>;

    /// Most recent sample of a device, if it ever reported
    async fn query_latest(&self, device_id: &DeviceId) -> anyhow::Result<Option<Sample>>;

    /// Human readable device name
    async fn display_name(&self, device_id: &DeviceId) -> anyhow::Result<String>;
}
