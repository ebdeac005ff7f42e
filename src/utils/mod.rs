//! Utilities module for logging, errors, and helper functions
//!
//! This module provides:
//! - Structured logging with tracing
//! - Error handling types
//! - Formatting helpers shared by the CLI and explanation reports

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{Result, RiceDiseaseError};
pub use logging::init_logging;

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}

/// Format a percentage the way reports print it: `87.65`, `70.0`, `100.0`
pub fn format_confidence(confidence_percent: f64) -> String {
    if confidence_percent.fract() == 0.0 {
        format!("{:.1}", confidence_percent)
    } else {
        format!("{}", confidence_percent)
    }
}

/// Text meter for a percentage in `[0, 100]`, one block per 10%
///
/// Partial blocks are truncated, so 59.9% shows five filled blocks.
pub fn confidence_meter(confidence_percent: f64) -> String {
    let clamped = confidence_percent.clamp(0.0, 100.0);
    let filled = (clamped / 10.0) as usize;
    let empty = 10 - filled;

    format!(
        "Confidence: [{}{}] {}%",
        "█".repeat(filled),
        "░".repeat(empty),
        format_confidence(confidence_percent)
    )
}

/// Round to two decimals, the precision confidences are reported with
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.5), "30.5s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m");
    }

    #[test]
    fn test_confidence_meter() {
        let meter = confidence_meter(59.9);
        assert!(meter.contains("█████░░░░░"));
        assert!(meter.ends_with("59.9%"));

        assert_eq!(confidence_meter(100.0), "Confidence: [██████████] 100.0%");
        assert!(confidence_meter(0.0).contains("░░░░░░░░░░"));
    }

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(87.65), "87.65");
        assert_eq!(format_confidence(70.0), "70.0");
        assert_eq!(format_confidence(round2(33.333333)), "33.33");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(87.456), 87.46);
        assert_eq!(round2(12.344), 12.34);
        assert_eq!(round2(100.0), 100.0);
    }
}
