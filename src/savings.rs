//! # Savings Calculator
//!
//! Calcolo del risparmio di spazio per singolo file e formattazione human-readable.

/// `(source - output) / source`, undefined when the source is empty or a size is unknown
pub fn savings_ratio(source_size: Option<u64>, output_size: Option<u64>) -> Option<f64> {
    match (source_size, output_size) {
        (Some(source), Some(output)) if source > 0 => {
            Some((source as f64 - output as f64) / source as f64)
        }
        _ => None,
    }
}

/// Signed byte delta, positive when the output is smaller
pub fn bytes_delta(source_size: u64, output_size: u64) -> i64 {
    source_size as i64 - output_size as i64
}

/// Percentage rounded to zero decimals, e.g. `0.6` -> `"60%"`
pub fn format_percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Display cell for a ratio: empty when undefined or when nothing was saved
pub fn display_saving(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) if ratio > 0.0 => format_percent(ratio),
        _ => String::new(),
    }
}

/// Get human-readable size, capped at GB
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size > 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
