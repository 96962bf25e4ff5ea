//! Scale conversion and score classification. Pure functions.

use crate::config::ColorBands;

/// Convert a provider-native value to the common 0-100 range.
///
/// Deliberately unclamped: an upstream scale error (say a 0-10 provider
/// shipping 12.5) surfaces as 125 instead of being hidden behind a clamp.
pub fn normalize(raw_value: f64, scale: f64) -> i32 {
    (raw_value * scale).round() as i32
}

/// Four bands from three ascending thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorBand {
    Low,
    Mid,
    High,
    Top,
}

pub fn classify(score: i32, bands: &ColorBands) -> ColorBand {
    if score <= bands.red_max {
        ColorBand::Low
    } else if score <= bands.orange_max {
        ColorBand::Mid
    } else if score <= bands.yg_max {
        ColorBand::High
    } else {
        ColorBand::Top
    }
}
