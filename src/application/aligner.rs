// Temporal alignment of per-device series onto one reference axis
use crate::domain::alignment::{AlignedMatrix, AlignedRow, ReferenceAxis};
use crate::domain::sample::DeviceSeries;

/// Align every series onto the key sequence of the longest one.
///
/// When all series have the same number of samples the values are paired
/// positionally. Otherwise the longest series is still paired positionally
/// and every other device's index is looked up with each axis key; a miss
/// becomes `None` for both temperature and humidity. Keys
/// only match exactly, at the granularity the series were indexed with.
pub fn align(series: &[DeviceSeries]) -> AlignedMatrix {
    let Some(reference_idx) = longest(series) else {
        return AlignedMatrix::default();
    };
    let reference = &series[reference_idx];

    let axis = ReferenceAxis(reference.keys().to_vec());
    let uniform = series.iter().all(|s| s.len() == reference.len());

    if !uniform {
        tracing::debug!(
            "Series lengths differ ({}), aligning on device {} with {} samples",
            series
                .iter()
                .map(|s| format!("{}:{}", s.device_id, s.len()))
                .collect::<Vec<_>>()
                .join(", "),
            reference.device_id,
            reference.len()
        );
    }

    let rows = series
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            // The reference device keeps every sample, even those sharing a key
            if uniform || idx == reference_idx {
                positional_row(s)
            } else {
                lookup_row(s, &axis)
            }
        })
        .collect();

    let matrix = AlignedMatrix { axis, rows };
    if !uniform {
        for row in &matrix.rows {
            tracing::debug!(
                "Device {} has no data at {} of {} points",
                row.device_id,
                row.no_data_count(),
                matrix.axis.len()
            );
        }
    }
    debug_assert!(matrix.is_consistent(), "aligned row length differs from axis");
    matrix
}

/// Position of the first series with the greatest sample count.
fn longest(series: &[DeviceSeries]) -> Option<usize> {
    series
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (idx, s)| match best {
            Some((_, len)) if len >= s.len() => best,
            _ => Some((idx, s.len())),
        })
        .map(|(idx, _)| idx)
}

fn positional_row(series: &DeviceSeries) -> AlignedRow {
    AlignedRow {
        device_id: series.device_id.clone(),
        display_name: series.display_name.clone(),
        temperature: series.samples.iter().map(|s| Some(s.temperature)).collect(),
        humidity: series.samples.iter().map(|s| Some(s.humidity)).collect(),
    }
}

fn lookup_row(series: &DeviceSeries, axis: &ReferenceAxis) -> AlignedRow {
    let (temperature, humidity): (Vec<_>, Vec<_>) = axis
        .keys()
        .iter()
        .map(|key| match series.lookup(key) {
            Some((t, h)) => (Some(t), Some(h)),
            None => (None, None),
        })
        .unzip();

    AlignedRow {
        device_id: series.device_id.clone(),
        display_name: series.display_name.clone(),
        temperature,
        humidity,
    }
}
