// Content decay detection
//
// Compares the earlier and recent halves of a page's snapshot history,
// flags pages whose clicks, impressions or ranking crossed a threshold,
// then classifies and ranks them by severity.

mod types;
mod window;

pub use types::{
    DecayFactor, DecayMetrics, DecayResult, DecayThresholds, MetricSnapshot, PageSeries, Severity,
};
pub use window::{percent_change, round_tenth, round_whole, split_windows, WindowAverages};

use std::cmp::Ordering;

/// Click decline (percent) beyond which a page is critical
const CRITICAL_CLICKS_CHANGE: f64 = -50.0;
/// Position increase beyond which a page is critical
const CRITICAL_POSITION_CHANGE: f64 = 10.0;
/// Click decline (percent) beyond which a page is high severity
const HIGH_CLICKS_CHANGE: f64 = -40.0;
/// Position increase beyond which a page is high severity
const HIGH_POSITION_CHANGE: f64 = 7.0;

/// Analyze a batch of pages and return the decaying ones, most severe first
///
/// Pages with fewer than two snapshots, or whose earlier-window average clicks
/// fall below `min_previous_clicks`, are left out. So are pages that cross no
/// threshold. None of these are errors.
pub fn analyze(pages: &[PageSeries], thresholds: &DecayThresholds) -> Vec<DecayResult> {
    let mut results: Vec<DecayResult> = pages
        .iter()
        .filter_map(|page| evaluate_page(page, thresholds))
        .collect();

    rank(&mut results);

    tracing::info!(
        "Decay analysis: {} pages analyzed, {} decaying",
        pages.len(),
        results.len()
    );

    results
}

/// Evaluate a single page, returning a result only if it is decaying
pub fn evaluate_page(page: &PageSeries, thresholds: &DecayThresholds) -> Option<DecayResult> {
    if page.snapshots.len() < 2 {
        tracing::debug!(page_id = %page.page_id, "Skipping page: fewer than 2 snapshots");
        return None;
    }

    let mut sorted = page.snapshots.clone();
    sorted.sort_by_key(|s| s.date);

    let (earlier, recent) = split_windows(&sorted)?;
    let before = WindowAverages::from_snapshots(earlier);
    let after = WindowAverages::from_snapshots(recent);

    if before.clicks < thresholds.min_previous_clicks {
        tracing::debug!(
            page_id = %page.page_id,
            "Skipping page: earlier average clicks {:.1} below minimum {}",
            before.clicks,
            thresholds.min_previous_clicks
        );
        return None;
    }

    let clicks_change = percent_change(before.clicks, after.clicks);
    let impressions_change = percent_change(before.impressions, after.impressions);
    let position_change = match (before.position, after.position) {
        (Some(b), Some(a)) => Some(a - b),
        _ => None,
    };

    let mut factors = Vec::new();
    if clicks_change < -thresholds.clicks_drop_percent {
        factors.push(DecayFactor::ClicksDrop);
    }
    if impressions_change < -thresholds.impressions_drop_percent {
        factors.push(DecayFactor::ImpressionsDrop);
    }
    if position_change.is_some_and(|p| p > thresholds.position_drop_threshold) {
        factors.push(DecayFactor::RankingDrop);
    }

    if factors.is_empty() {
        return None;
    }

    let severity = classify(clicks_change, position_change);

    Some(DecayResult {
        page_id: page.page_id.clone(),
        url: page.url.clone(),
        title: page.title.clone(),
        page_type: page.page_type.clone(),
        severity,
        metrics: DecayMetrics {
            previous_clicks: round_tenth(before.clicks),
            recent_clicks: round_tenth(after.clicks),
            clicks_change: round_whole(clicks_change),
            previous_impressions: round_tenth(before.impressions),
            recent_impressions: round_tenth(after.impressions),
            impressions_change: round_whole(impressions_change),
            previous_position: before.position.map(round_tenth),
            recent_position: after.position.map(round_tenth),
            position_change: position_change.map(round_tenth),
        },
        decay_factors: factors,
        clicks_change_raw: clicks_change,
    })
}

/// Severity tier for a page already known to be decaying; first match wins
pub fn classify(clicks_change: f64, position_change: Option<f64>) -> Severity {
    let position = position_change.unwrap_or(0.0);

    if clicks_change < CRITICAL_CLICKS_CHANGE || position > CRITICAL_POSITION_CHANGE {
        Severity::Critical
    } else if clicks_change < HIGH_CLICKS_CHANGE || position > HIGH_POSITION_CHANGE {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Sort by severity, then by magnitude of click change descending.
/// The sort is stable so equal keys keep their input order.
fn rank(results: &mut [DecayResult]) {
    results.sort_by(|a, b| {
        a.severity.cmp(&b.severity).then_with(|| {
            b.clicks_change_exact()
                .abs()
                .partial_cmp(&a.clicks_change_exact().abs())
                .unwrap_or(Ordering::Equal)
        })
    });
}
