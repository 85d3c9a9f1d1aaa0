// Transposes aligned rows into the three chart layouts
use crate::domain::alignment::{
    AlignedBundle, AlignedMatrix, AlignedRow, ChartTable, LabeledColumn, Variable,
};
use crate::domain::sample::LookbackWindow;
use std::collections::{HashMap, HashSet};

/// Build the temperature, humidity and combined tables for one request.
///
/// Column order follows row (device) order. The combined table interleaves
/// temperature and humidity per device.
pub fn assemble(matrix: AlignedMatrix, window: LookbackWindow) -> AlignedBundle {
    let hours = window.hours();
    let labels = device_labels(&matrix.rows);

    let mut temperature = Vec::with_capacity(matrix.rows.len());
    let mut humidity = Vec::with_capacity(matrix.rows.len());
    let mut combined = Vec::with_capacity(matrix.rows.len() * 2);

    for (row, label) in matrix.rows.into_iter().zip(labels) {
        let temp_column = LabeledColumn {
            label: label.clone(),
            device_id: row.device_id.clone(),
            variable: Variable::Temperature,
            values: row.temperature,
        };
        let humidity_column = LabeledColumn {
            label,
            device_id: row.device_id,
            variable: Variable::Humidity,
            values: row.humidity,
        };

        combined.push(with_variable_suffix(&temp_column));
        combined.push(with_variable_suffix(&humidity_column));
        temperature.push(temp_column);
        humidity.push(humidity_column);
    }

    let bundle = AlignedBundle {
        window_hours: hours,
        temperature: ChartTable {
            title: format!("Temperature for the Last {} Hour(s)", hours),
            axis: matrix.axis.clone(),
            columns: temperature,
        },
        humidity: ChartTable {
            title: format!("Humidity for the Last {} Hour(s)", hours),
            axis: matrix.axis.clone(),
            columns: humidity,
        },
        combined: ChartTable {
            title: format!("Temperature and Humidity for the Last {} Hour(s)", hours),
            axis: matrix.axis,
            columns: combined,
        },
    };

    debug_assert!(
        bundle.temperature.is_consistent()
            && bundle.humidity.is_consistent()
            && bundle.combined.is_consistent(),
        "assembled column length differs from axis"
    );
    bundle
}

fn with_variable_suffix(column: &LabeledColumn) -> LabeledColumn {
    LabeledColumn {
        label: format!("{} {}", column.label, column.variable.title()),
        ..column.clone()
    }
}

/// One unique label per row. Shared display names get the device id appended.
fn device_labels(rows: &[AlignedRow]) -> Vec<String> {
    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *name_counts.entry(row.display_name.as_str()).or_default() += 1;
    }

    let mut used = HashSet::new();
    rows.iter()
        .map(|row| {
            let base = if name_counts[row.display_name.as_str()] > 1 {
                format!("{} ({})", row.display_name, row.device_id)
            } else {
                row.display_name.clone()
            };

            // A display name may itself look like "Name (id)" of another device
            let mut label = base.clone();
            let mut n = 2;
            while !used.insert(label.clone()) {
                label = format!("{} #{}", base, n);
                n += 1;
            }
            label
        })
        .collect()
}
