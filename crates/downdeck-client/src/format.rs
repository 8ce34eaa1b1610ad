//! Pure view adapters: byte sizes, percentages, speeds, and the status to
//! severity mapping the rendering layer consumes. Stateless and total; the
//! only failure mode is falling back to a default.

use downdeck_core::DownloadStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Primary,
    Danger,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Primary => "primary",
            Severity::Danger => "danger",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn severity(status: &DownloadStatus) -> Severity {
    match status {
        DownloadStatus::Finished => Severity::Success,
        DownloadStatus::Downloading => Severity::Primary,
        DownloadStatus::Error => Severity::Danger,
        _ => Severity::Info,
    }
}

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Binary-unit byte size, two decimals with trailing zeros trimmed.
/// Negative sizes mean "not known yet".
pub fn format_size(size: i64) -> String {
    if size < 0 {
        return "Unknown".to_string();
    }
    if size == 0 {
        return "0 B".to_string();
    }
    // Bit length instead of ln() so exact powers of 1024 never round down.
    let exponent = (((63 - (size as u64).leading_zeros()) / 10) as usize).min(UNITS.len() - 1);
    let value = size as f64 / 1024f64.powi(exponent as i32);
    format!("{} {}", trim_decimals(value), UNITS[exponent])
}

pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_size(bytes_per_second as i64))
}

/// Download progress as a percentage with one decimal; 0 while the total
/// size is unknown.
pub fn format_percent(downloaded: u64, total_size: i64) -> f64 {
    if total_size <= 0 {
        return 0.0;
    }
    let percent = downloaded as f64 / total_size as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

fn trim_decimals(value: f64) -> String {
    let rendered = format!("{value:.2}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
