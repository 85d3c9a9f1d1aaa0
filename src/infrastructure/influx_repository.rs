// InfluxDB history store implementation
use crate::application::sample_source::SampleSource;
use crate::domain::device::{Device, DeviceId};
use crate::domain::sample::{celsius_to_fahrenheit, LookbackWindow, Sample};
use crate::infrastructure::config::{InfluxSettings, TemperatureUnit};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct InfluxHistoryStore {
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    schema: ClimateSchema,
    temperature_unit: TemperatureUnit,
    names: HashMap<DeviceId, String>,
    client: reqwest::Client,
}

/// Measurement, field and tag names the readings are stored under
#[derive(Debug, Clone, PartialEq)]
struct ClimateSchema {
    measurement: String,
    temperature: String,
    humidity: String,
    device_id: String,
    device_name: String,
}

impl ClimateSchema {
    fn select_clause(&self) -> String {
        format!(
            "SELECT \"{}\", \"{}\", \"{}\" FROM \"{}\"",
            self.temperature, self.humidity, self.device_name, self.measurement
        )
    }
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
}

/// A parsed row of the climate measurement
#[derive(Debug, Clone, PartialEq)]
struct ClimateRow {
    sample: Sample,
    device_name: Option<String>,
}

impl InfluxHistoryStore {
    pub fn new(settings: InfluxSettings, devices: &[Device]) -> Self {
        Self {
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token,
            database: settings.database,
            retention_policy: settings.retention_policy,
            schema: ClimateSchema {
                measurement: settings.measurement,
                temperature: settings.temperature_field,
                humidity: settings.humidity_field,
                device_id: settings.device_id_tag,
                device_name: settings.device_name_tag,
            },
            temperature_unit: settings.temperature_unit,
            names: devices
                .iter()
                .map(|d| (d.id.clone(), d.name.clone()))
                .collect(),
            client: reqwest::Client::new(),
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.host, self.database, self.retention_policy, encoded_query
        )
    }

    fn series_query(&self, device_id: &DeviceId, window: LookbackWindow) -> String {
        format!(
            "{} WHERE \"{}\" = '{}' AND time >= now() - {}h ORDER BY time ASC",
            self.schema.select_clause(),
            self.schema.device_id,
            escape_literal(device_id.as_str()),
            window.hours()
        )
    }

    fn latest_query(&self, device_id: &DeviceId) -> String {
        format!(
            "{} WHERE \"{}\" = '{}' ORDER BY time DESC LIMIT 1",
            self.schema.select_clause(),
            self.schema.device_id,
            escape_literal(device_id.as_str())
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);
        tracing::debug!("Executing InfluxQL query: {}", query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        if let Some(error) = data.results.first().and_then(|r| r.error.as_ref()) {
            anyhow::bail!("InfluxDB query error: {}", error);
        }

        Ok(data)
    }

    async fn query_rows(&self, query: &str) -> Result<Vec<ClimateRow>> {
        let response = self.execute_query(query).await?;
        Ok(parse_rows(&response, &self.schema, self.temperature_unit))
    }

    /// Configured name, then the stored tag, then the id itself
    fn resolve_name(&self, device_id: &DeviceId, tag: Option<&str>) -> String {
        self.names
            .get(device_id)
            .cloned()
            .or_else(|| tag.map(str::to_string))
            .unwrap_or_else(|| device_id.to_string())
    }
}

#[async_trait]
impl SampleSource for InfluxHistoryStore {
    async fn query_series(
        &self,
        device_id: &DeviceId,
        window: LookbackWindow,
    ) -> Result<(String, Vec<Sample>)> {
        let rows = self.query_rows(&self.series_query(device_id, window)).await?;

        let tag = rows.iter().rev().find_map(|r| r.device_name.as_deref());
        let name = self.resolve_name(device_id, tag);
        let samples = rows.into_iter().map(|r| r.sample).collect();

        Ok((name, samples))
    }

    async fn query_latest(&self, device_id: &DeviceId) -> Result<Option<Sample>> {
        let rows = self.query_rows(&self.latest_query(device_id)).await?;
        Ok(rows.last().map(|r| r.sample))
    }

    async fn display_name(&self, device_id: &DeviceId) -> Result<String> {
        if let Some(name) = self.names.get(device_id) {
            return Ok(name.clone());
        }

        let rows = self.query_rows(&self.latest_query(device_id)).await?;
        let tag = rows.last().and_then(|r| r.device_name.as_deref());
        Ok(self.resolve_name(device_id, tag))
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Rows of every returned series, oldest first. Rows missing a readable
/// time, temperature or humidity are skipped.
fn parse_rows(
    response: &InfluxQLResponse,
    schema: &ClimateSchema,
    unit: TemperatureUnit,
) -> Vec<ClimateRow> {
    let mut rows = Vec::new();

    let Some(series) = response.results.first().and_then(|r| r.series.as_ref()) else {
        return rows;
    };

    for s in series {
        let column = |name: &str| s.columns.iter().position(|c| c == name);
        let (Some(time_idx), Some(temp_idx), Some(humidity_idx)) = (
            column("time"),
            column(&schema.temperature),
            column(&schema.humidity),
        ) else {
            tracing::warn!("Unexpected InfluxDB columns: {:?}", s.columns);
            continue;
        };
        let name_idx = column(&schema.device_name);

        for value_row in &s.values {
            let time = value_row
                .get(time_idx)
                .and_then(|v| v.as_str())
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok());
            let temperature = value_row.get(temp_idx).and_then(|v| v.as_f64());
            let humidity = value_row.get(humidity_idx).and_then(|v| v.as_f64());

            let (Some(time), Some(temperature), Some(humidity)) = (time, temperature, humidity)
            else {
                continue;
            };

            let temperature = match unit {
                TemperatureUnit::Fahrenheit => temperature,
                TemperatureUnit::Celsius => celsius_to_fahrenheit(temperature),
            };

            rows.push(ClimateRow {
                sample: Sample::new(time.with_timezone(&Utc), temperature, humidity),
                device_name: name_idx
                    .and_then(|i| value_row.get(i))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            });
        }
    }

    rows.sort_by_key(|r| r.sample.timestamp);
    rows
}
