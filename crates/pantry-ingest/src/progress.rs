//! Progress bar and formatting helpers for terminal output

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%)";

/// Create a progress bar over `total` records
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Human-readable throughput ("12.50 items/s")
pub fn format_rate(items_per_sec: Option<f64>) -> String {
    match items_per_sec {
        Some(rate) if rate.is_finite() => format!("{:.2} items/s", rate),
        _ => "n/a".to_string(),
    }
}

/// Human-readable duration in seconds ("1h 02m 03s")
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// ETA as an absolute time plus the time left from `now`
pub fn format_eta(eta: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match eta {
        Some(eta) => format!(
            "{} (in {})",
            eta.format("%Y-%m-%d %H:%M:%S UTC"),
            format_duration((eta - now).num_seconds())
        ),
        None => "unknown".to_string(),
    }
}

/// Completion percentage with one decimal, or "n/a" before the total is known
pub fn format_percent(ratio: Option<f64>) -> String {
    ratio
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(61), "1m 01s");
        assert_eq!(format_duration(3723), "1h 02m 03s");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(Some(2.5)), "2.50 items/s");
        assert_eq!(format_rate(None), "n/a");
        assert_eq!(format_rate(Some(f64::INFINITY)), "n/a");
    }

    #[test]
    fn test_format_eta() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let eta = DateTime::from_timestamp(1_700_000_090, 0).unwrap();
        assert_eq!(format_eta(Some(eta), now), "2023-11-14 22:14:50 UTC (in 1m 30s)");
        assert_eq!(format_eta(None, now), "unknown");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(0.5)), "50.0%");
        assert_eq!(format_percent(None), "n/a");
    }

    #[test]
    fn test_create_progress_bar() {
        let pb = create_progress_bar(100, "Ingesting");
        assert_eq!(pb.length(), Some(100));
        assert_eq!(pb.message(), "Ingesting");
    }
}
