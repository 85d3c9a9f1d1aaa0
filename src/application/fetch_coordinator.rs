// Concurrent per-device fetch over a bounded worker pool
use crate::application::sample_source::SampleSource;
use crate::domain::device::DeviceId;
use crate::domain::sample::{DeviceSeries, KeyGranularity, LookbackWindow, Sample};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct FetchCoordinator {
    source: Arc<dyn SampleSource>,
    pool: Arc<Semaphore>,
    fetch_timeout: Duration,
    granularity: KeyGranularity,
}

impl FetchCoordinator {
    pub fn new(
        source: Arc<dyn SampleSource>,
        pool_size: usize,
        fetch_timeout: Duration,
        granularity: KeyGranularity,
    ) -> Self {
        Self {
            source,
            pool: Arc::new(Semaphore::new(pool_size.max(1))),
            fetch_timeout,
            granularity,
        }
    }

    pub fn pool(&self) -> Arc<Semaphore> {
        self.pool.clone()
    }

    /// Fetch every device concurrently and wait for all of them.
    ///
    /// The result has one series per distinct device id, in request order.
    /// A device whose fetch fails, times out, panics or is cancelled gets an
    /// empty series. Dropping the returned future aborts outstanding fetches.
    pub async fn fetch_all(
        &self,
        device_ids: &[DeviceId],
        window: LookbackWindow,
        cancel: &CancellationToken,
    ) -> Vec<DeviceSeries> {
        let device_ids = distinct(device_ids);

        let mut results: Vec<DeviceSeries> = device_ids
            .iter()
            .cloned()
            .map(DeviceSeries::empty)
            .collect();

        let mut tasks = JoinSet::new();
        for (idx, device_id) in device_ids.into_iter().enumerate() {
            let source = self.source.clone();
            let pool = self.pool.clone();
            let cancel = cancel.clone();
            let fetch_timeout = self.fetch_timeout;
            let granularity = self.granularity;

            tasks.spawn(async move {
                let series = fetch_one(
                    source,
                    pool,
                    device_id,
                    window,
                    fetch_timeout,
                    granularity,
                    cancel,
                )
                .await;
                (idx, series)
            });
        }

        // Join barrier: each task publishes its own series exactly once
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, series)) => results[idx] = series,
                Err(e) => tracing::warn!("Device fetch task did not complete: {}", e),
            }
        }

        results
    }
}

async fn fetch_one(
    source: Arc<dyn SampleSource>,
    pool: Arc<Semaphore>,
    device_id: DeviceId,
    window: LookbackWindow,
    fetch_timeout: Duration,
    granularity: KeyGranularity,
    cancel: CancellationToken,
) -> DeviceSeries {
    let id = device_id.clone();
    // The timeout covers waiting for a pool slot as well as the query
    let fetch = async move {
        let query = async {
            let _permit = pool.acquire_owned().await?;
            source.query_series(&id, window).await
        };
        match tokio::time::timeout(fetch_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("no response within {:?}", fetch_timeout)),
        }
    };

    let outcome: anyhow::Result<(String, Vec<Sample>)> = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("Fetch for device {} cancelled", device_id);
            return DeviceSeries::empty(device_id);
        }
        outcome = fetch => outcome,
    };

    match outcome {
        Ok((display_name, samples)) => {
            let series = DeviceSeries::new(device_id, display_name, samples, granularity);
            if series.is_empty() {
                tracing::debug!("No samples for device {} in window", series.device_id);
            } else {
                tracing::debug!("Fetched {} samples for device {}", series.len(), series.device_id);
            }
            series
        }
        Err(e) => {
            tracing::warn!("Error fetching series for device {}: {:#}", device_id, e);
            DeviceSeries::empty(device_id)
        }
    }
}

/// Drop repeated ids, keeping the first occurrence.
fn distinct(device_ids: &[DeviceId]) -> Vec<DeviceId> {
    let mut seen = HashSet::new();
    device_ids
        .iter()
        .filter(|id| {
            let first = seen.insert(*id);
            if !first {
                tracing::warn!("Device {} requested more than once, ignoring repeat", id);
            }
            first
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sample_source::test_support::StaticSource;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::Ordering;

    fn samples(n: usize) -> Vec<Sample> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Sample::new(t0 + ChronoDuration::minutes(i as i64), 70.0 + i as f64, 40.0))
            .collect()
    }

    fn ids(raw: &[&str]) -> Vec<DeviceId> {
        raw.iter().map(|s| DeviceId::from(*s)).collect()
    }

    fn coordinator(source: StaticSource, pool_size: usize) -> FetchCoordinator {
        FetchCoordinator::new(
            Arc::new(source),
            pool_size,
            Duration::from_secs(1),
            KeyGranularity::MINUTE,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_request_order() {
        let source = StaticSource::default()
            .with_device("1", "Living Room", samples(3))
            .with_device("2", "Bedroom", samples(2))
            .delayed("1", Duration::from_millis(300))
            .delayed("2", Duration::from_millis(10));
        let coordinator = coordinator(source, DEFAULT_POOL_SIZE);

        let series = coordinator
            .fetch_all(&ids(&["1", "2"]), LookbackWindow::ONE_HOUR, &CancellationToken::new())
            .await;

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].display_name, "Living Room");
        assert_eq!(series[0].len(), 3);
        assert_eq!(series[1].display_name, "Bedroom");
        assert_eq!(series[1].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_bounded_by_slowest_fetch() {
        let source = StaticSource::default()
            .with_device("1", "A", samples(1))
            .with_device("2", "B", samples(1))
            .with_device("3", "C", samples(1))
            .delayed("1", Duration::from_millis(200))
            .delayed("2", Duration::from_millis(200))
            .delayed("3", Duration::from_millis(200));
        let coordinator = coordinator(source, DEFAULT_POOL_SIZE);

        let start = tokio::time::Instant::now();
        coordinator
            .fetch_all(&ids(&["1", "2", "3"]), LookbackWindow::ONE_HOUR, &CancellationToken::new())
            .await;

        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_bounds_concurrency() {
        let mut source = StaticSource::default();
        for id in ["1", "2", "3", "4", "5"] {
            source = source
                .with_device(id, id, samples(1))
                .delayed(id, Duration::from_millis(50));
        }
        let max_in_flight = source.max_in_flight.clone();
        let completed = source.completed.clone();
        let coordinator = coordinator(source, 2);

        let series = coordinator
            .fetch_all(&ids(&["1", "2", "3", "4", "5"]), LookbackWindow::ONE_DAY, &CancellationToken::new())
            .await;

        assert_eq!(series.len(), 5);
        assert_eq!(completed.load(Ordering::SeqCst), 5);
        assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_failed_device_yields_empty_series() {
        let source = StaticSource::default()
            .with_device("1", "Office", samples(4))
            .with_device("2", "Garage", samples(4))
            .failing("2");
        let coordinator = coordinator(source, DEFAULT_POOL_SIZE);

        let series = coordinator
            .fetch_all(&ids(&["1", "2"]), LookbackWindow::ONE_HOUR, &CancellationToken::new())
            .await;

        assert_eq!(series[0].len(), 4);
        assert!(series[1].is_empty());
        assert_eq!(series[1].device_id, DeviceId::from("2"));
        assert_eq!(series[1].display_name, "2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_device_times_out_to_empty_series() {
        let source = StaticSource::default()
            .with_device("1", "Office", samples(2))
            .with_device("2", "Shed", samples(2))
            .delayed("2", Duration::from_secs(30));
        let coordinator = coordinator(source, DEFAULT_POOL_SIZE);

        let start = tokio::time::Instant::now();
        let series = coordinator
            .fetch_all(&ids(&["1", "2"]), LookbackWindow::ONE_HOUR, &CancellationToken::new())
            .await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(series[0].len(), 2);
        assert!(series[1].is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_includes_wait_for_pool_slot() {
        let source = StaticSource::default()
            .with_device("1", "Office", samples(2))
            .with_device("2", "Shed", samples(2))
            .delayed("1", Duration::from_secs(30))
            .delayed("2", Duration::from_secs(30));
        let coordinator = coordinator(source, 1);

        let start = tokio::time::Instant::now();
        let series = coordinator
            .fetch_all(&ids(&["1", "2"]), LookbackWindow::ONE_HOUR, &CancellationToken::new())
            .await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(series.iter().all(DeviceSeries::is_empty));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let source = StaticSource::default().with_device("1", "Office", samples(2));
        let completed = source.completed.clone();
        let coordinator = coordinator(source, DEFAULT_POOL_SIZE);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let series = coordinator
            .fetch_all(&ids(&["1"]), LookbackWindow::ONE_HOUR, &cancel)
            .await;

        assert_eq!(series.len(), 1);
        assert!(series[0].is_empty());
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_in_flight_fetches() {
        let source = StaticSource::default()
            .with_device("1", "Office", samples(2))
            .delayed("1", Duration::from_millis(900));
        let completed = source.completed.clone();
        let coordinator = coordinator(source, DEFAULT_POOL_SIZE);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let series = coordinator
            .fetch_all(&ids(&["1"]), LookbackWindow::ONE_HOUR, &cancel)
            .await;

        assert!(start.elapsed() < Duration::from_millis(900));
        assert!(series[0].is_empty());
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_ids_collapse() {
        let source = StaticSource::default().with_device("1", "Office", samples(1));
        let coordinator = coordinator(source, DEFAULT_POOL_SIZE);

        let series = coordinator
            .fetch_all(&ids(&["1", "1", "2"]), LookbackWindow::ONE_HOUR, &CancellationToken::new())
            .await;

        let got: Vec<&str> = series.iter().map(|s| s.device_id.as_str()).collect();
        assert_eq!(got, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_no_devices() {
        let coordinator = coordinator(StaticSource::default(), DEFAULT_POOL_SIZE);
        let series = coordinator
            .fetch_all(&[], LookbackWindow::ONE_HOUR, &CancellationToken::new())
            .await;
        assert!(series.is_empty());
    }
}
