// Multidevice service - fetch, align and assemble graphs for a device group
use crate::application::aligner::align;
use crate::application::assembler::assemble;
use crate::application::fetch_coordinator::FetchCoordinator;
use crate::domain::alignment::AlignedBundle;
use crate::domain::device::DeviceId;
use crate::domain::error::TelemetryError;
use crate::domain::sample::LookbackWindow;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct MultideviceService {
    coordinator: FetchCoordinator,
}

impl MultideviceService {
    pub fn new(coordinator: FetchCoordinator) -> Self {
        Self { coordinator }
    }

    /// Time-aligned temperature, humidity and combined tables for the devices.
    ///
    /// Devices that fail to answer show up as columns without data. Only an
    /// invalid window is reported as an error.
    pub async fn fetch_aligned(
        &self,
        device_ids: &[DeviceId],
        window_hours: u32,
        cancel: &CancellationToken,
    ) -> Result<AlignedBundle, TelemetryError> {
        let window = LookbackWindow::from_hours(window_hours)?;

        let start = Instant::now();
        let series = self.coordinator.fetch_all(device_ids, window, cancel).await;
        tracing::debug!("Data queried in: {:?}", start.elapsed());

        let start = Instant::now();
        let matrix = align(&series);
        let bundle = assemble(matrix, window);
        if bundle.combined.axis.is_empty() {
            tracing::debug!("No samples for any of {} devices in the last {}h", series.len(), window.hours());
        }
        tracing::debug!(
            "Aligned {:?} on {} points in: {:?}",
            bundle.combined.labels(),
            bundle.combined.axis.len(),
            start.elapsed()
        );

        Ok(bundle)
    }
}
