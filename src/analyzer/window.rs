// Window split and averaging for before/after comparison
use super::types::MetricSnapshot;

/// Averages over one observation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAverages {
    pub clicks: f64,
    pub impressions: f64,
    /// None when no snapshot in the window carries a ranking
    pub position: Option<f64>,
}

impl WindowAverages {
    /// Average a non-empty window of snapshots
    pub fn from_snapshots(window: &[MetricSnapshot]) -> Self {
        let len = window.len() as f64;
        let clicks = window.iter().map(|s| s.clicks as f64).sum::<f64>() / len;
        let impressions = window.iter().map(|s| s.impressions as f64).sum::<f64>() / len;

        let positions: Vec<f64> = window.iter().filter_map(|s| s.ranking()).collect();
        let position = if positions.is_empty() {
            None
        } else {
            Some(positions.iter().sum::<f64>() / positions.len() as f64)
        };

        Self {
            clicks,
            impressions,
            position,
        }
    }
}

/// Split date-sorted snapshots at the count midpoint
///
/// Returns `(earlier, recent)`. Both halves are non-empty when the input has
/// at least two snapshots; the recent half takes the extra one on odd counts.
pub fn split_windows(sorted: &[MetricSnapshot]) -> Option<(&[MetricSnapshot], &[MetricSnapshot])> {
    if sorted.len() < 2 {
        return None;
    }
    Some(sorted.split_at(sorted.len() / 2))
}

/// Percentage change from `before` to `after`, 0 when `before` is not positive
pub fn percent_change(before: f64, after: f64) -> f64 {
    if before > 0.0 {
        (after - before) / before * 100.0
    } else {
        0.0
    }
}

/// Round to a whole number, halves toward positive infinity
pub fn round_whole(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Round to one decimal place, halves toward positive infinity
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}
