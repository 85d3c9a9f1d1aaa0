// Aligned multi-device chart data
use serde::Serialize;

use super::device::DeviceId;
use super::sample::AlignmentKey;

/// Common x-axis shared by every device row of one aligned result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReferenceAxis(pub Vec<AlignmentKey>);

impl ReferenceAxis {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[AlignmentKey] {
        &self.0
    }
}

/// One device's values positioned on the reference axis. `None` means no data.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub device_id: DeviceId,
    pub display_name: String,
    pub temperature: Vec<Option<f64>>,
    pub humidity: Vec<Option<f64>>,
}

impl AlignedRow {
    pub fn no_data_count(&self) -> usize {
        self.temperature.iter().filter(|v| v.is_none()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedMatrix {
    pub axis: ReferenceAxis,
    pub rows: Vec<AlignedRow>,
}

impl AlignedMatrix {
    /// Every row has exactly one temperature and one humidity slot per axis key.
    pub fn is_consistent(&self) -> bool {
        let n = self.axis.len();
        self.rows
            .iter()
            .all(|r| r.temperature.len() == n && r.humidity.len() == n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    Temperature,
    Humidity,
}

impl Variable {
    pub fn title(&self) -> &'static str {
        match self {
            Variable::Temperature => "Temperature",
            Variable::Humidity => "Humidity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledColumn {
    pub label: String,
    pub device_id: DeviceId,
    pub variable: Variable,
    pub values: Vec<Option<f64>>,
}

/// A renderable table: the shared axis plus ordered, uniquely labeled columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartTable {
    pub title: String,
    pub axis: ReferenceAxis,
    pub columns: Vec<LabeledColumn>,
}

impl ChartTable {
    pub fn is_consistent(&self) -> bool {
        let n = self.axis.len();
        self.columns.iter().all(|c| c.values.len() == n)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedBundle {
    pub window_hours: u32,
    pub temperature: ChartTable,
    pub humidity: ChartTable,
    pub combined: ChartTable,
}
