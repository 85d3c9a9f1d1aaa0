// HTTP request handlers
use crate::domain::alignment::AlignedBundle;
use crate::domain::device::{parse_device_list, Device, DeviceId, LatestReading};
use crate::domain::error::TelemetryError;
use crate::domain::sample::LookbackWindow;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Deserialize)]
pub struct GraphQuery {
    pub devices: Option<String>,
    pub hours: Option<u32>,
    pub range: Option<String>,
}

impl GraphQuery {
    /// Explicit hours, else a range tab, else the configured default
    fn window_hours(&self, default_hours: u32) -> Result<u32, TelemetryError> {
        match (self.hours, self.range.as_deref()) {
            (Some(hours), _) => Ok(hours),
            (None, Some(range)) => Ok(LookbackWindow::from_range(range)?.hours()),
            (None, None) => Ok(default_hours),
        }
    }
}

#[derive(Deserialize)]
pub struct DevicesQuery {
    pub devices: Option<String>,
}

impl IntoResponse for TelemetryError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List configured devices
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<Device>> {
    Json(state.device_service.list_devices().to_vec())
}

/// Latest reading per device, all configured devices by default
pub async fn latest_readings(
    Query(query): Query<DevicesQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<LatestReading>> {
    let device_ids = requested_devices(query.devices.as_deref(), &state);
    Json(state.device_service.latest_readings(&device_ids).await)
}

/// Graphs for a single device
pub async fn device_graphs(
    Path(id): Path<String>,
    Query(query): Query<GraphQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AlignedBundle>, TelemetryError> {
    let hours = query.window_hours(state.default_window_hours)?;
    aligned(&state, &[DeviceId::new(id)], hours).await
}

/// Combined graphs for a group of devices, all configured devices by default
pub async fn group_graphs(
    Query(query): Query<GraphQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AlignedBundle>, TelemetryError> {
    let hours = query.window_hours(state.default_window_hours)?;
    let device_ids = requested_devices(query.devices.as_deref(), &state);
    aligned(&state, &device_ids, hours).await
}

async fn aligned(
    state: &AppState,
    device_ids: &[DeviceId],
    hours: u32,
) -> Result<Json<AlignedBundle>, TelemetryError> {
    // Cancels outstanding fetches if the client goes away mid-request
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let bundle = state
        .multidevice_service
        .fetch_aligned(device_ids, hours, &cancel)
        .await?;
    Ok(Json(bundle))
}

fn requested_devices(raw: Option<&str>, state: &AppState) -> Vec<DeviceId> {
    match raw {
        Some(raw) => parse_device_list(raw),
        None => state.device_service.device_ids(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::device_service::DeviceService;
    use crate::application::fetch_coordinator::{FetchCoordinator, DEFAULT_FETCH_TIMEOUT};
    use crate::application::multidevice_service::MultideviceService;
    use crate::application::sample_source::test_support::StaticSource;
    use crate::domain::sample::{KeyGranularity, Sample};
    use crate::presentation::router;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn samples(minutes: &[i64]) -> Vec<Sample> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap();
        minutes
            .iter()
            .map(|m| Sample::new(t0 + Duration::minutes(*m), 70.0, 40.0))
            .collect()
    }

    fn source() -> StaticSource {
        StaticSource::default()
            .with_device("1", "Living Room", samples(&[0, 1, 2]))
            .with_device("2", "Bedroom", samples(&[0, 2]))
    }

    fn app() -> axum::Router {
        app_with(source())
    }

    fn app_with(source: StaticSource) -> axum::Router {
        let source = Arc::new(source);
        let coordinator =
            FetchCoordinator::new(source.clone(), 4, DEFAULT_FETCH_TIMEOUT, KeyGranularity::MINUTE);
        let devices = vec![
            Device { id: "1".into(), name: "Living Room".to_string() },
            Device { id: "2".into(), name: "Bedroom".to_string() },
        ];
        let state = AppState {
            device_service: DeviceService::new(
                source,
                devices,
                coordinator.pool(),
                DEFAULT_FETCH_TIMEOUT,
            ),
            multidevice_service: MultideviceService::new(coordinator),
            default_window_hours: 24,
        };
        router(Arc::new(state))
    }

    async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = get("/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_group_graphs_default_to_configured_devices() {
        let (status, body) = get("/graphs?hours=1").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["window_hours"], 1);
        assert_eq!(json["temperature"]["axis"].as_array().unwrap().len(), 3);
        assert_eq!(json["temperature"]["columns"][1]["label"], "Bedroom");
        assert_eq!(json["temperature"]["columns"][1]["values"][1], Value::Null);
        assert_eq!(json["combined"]["columns"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_group_graphs_for_selected_devices() {
        let (status, body) = get("/graphs?devices=2&hours=24").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["humidity"]["columns"].as_array().unwrap().len(), 1);
        assert_eq!(json["humidity"]["axis"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_device_graphs() {
        let (status, body) = get("/devices/1/graphs").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["window_hours"], 24);
        assert_eq!(json["combined"]["columns"][0]["label"], "Living Room Temperature");
    }

    #[tokio::test]
    async fn test_zero_window_is_bad_request() {
        let (status, _) = get("/graphs?hours=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_range_tabs() {
        let (status, body) = get("/graphs?range=7d").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["window_hours"], 168);
        assert_eq!(json["humidity"]["title"], "Humidity for the Last 168 Hour(s)");

        let (status, body) = get("/devices/2/graphs?range=1h&hours=3").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["window_hours"], 3);

        let (status, _) = get("/graphs?range=2w").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_request_stops_fetches() {
        let source = source().delayed("1", std::time::Duration::from_secs(5));
        let completed = source.completed.clone();
        let app = app_with(source);

        let request = Request::builder()
            .uri("/graphs?devices=1")
            .body(Body::empty())
            .unwrap();
        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(100), app.oneshot(request)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_list_and_latest() {
        let (status, body) = get("/devices").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json[0]["id"], "1");

        let (status, body) = get("/devices/latest?devices=2").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["display_name"], "Bedroom");
    }
}
