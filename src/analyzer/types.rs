// Shared types for decay analysis
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Read a count that may be absent or `null`, treating both as zero
fn count_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

/// One observation of a page's search performance on a given date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Observation date (day granularity)
    pub date: NaiveDate,

    /// Search-result clicks attributed to the page
    #[serde(default, deserialize_with = "count_or_zero")]
    pub clicks: u64,

    /// Search-result impressions
    #[serde(default, deserialize_with = "count_or_zero")]
    pub impressions: u64,

    /// Average search-results position (lower is better)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

impl MetricSnapshot {
    pub fn new(date: NaiveDate, clicks: u64, impressions: u64, position: Option<f64>) -> Self {
        Self {
            date,
            clicks,
            impressions,
            position,
        }
    }

    /// Position usable as a ranking signal.
    ///
    /// Zero, negative and non-finite positions are treated the same as a
    /// missing one: the page had no recorded ranking that day.
    pub fn ranking(&self) -> Option<f64> {
        self.position.filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// A page identity plus its historical snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSeries {
    pub page_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_type: Option<String>,
    #[serde(default)]
    pub snapshots: Vec<MetricSnapshot>,
}

impl PageSeries {
    pub fn new(page_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            url: url.into(),
            title: None,
            page_type: None,
            snapshots: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_page_type(mut self, page_type: impl Into<String>) -> Self {
        self.page_type = Some(page_type.into());
        self
    }

    pub fn with_snapshots(mut self, snapshots: Vec<MetricSnapshot>) -> Self {
        self.snapshots = snapshots;
        self
    }
}

/// Sensitivity settings for decay detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayThresholds {
    /// Minimum % decline in average clicks to flag decay
    pub clicks_drop_percent: f64,
    /// Minimum % decline in average impressions to flag decay
    pub impressions_drop_percent: f64,
    /// Minimum increase in average position to flag decay
    pub position_drop_threshold: f64,
    /// Not used to select windows; see `load_series` for the optional pre-filter
    pub lookback_days: u32,
    /// Pages whose earlier-period average clicks fall below this are skipped
    pub min_previous_clicks: f64,
}

impl Default for DecayThresholds {
    fn default() -> Self {
        Self {
            clicks_drop_percent: 30.0,
            impressions_drop_percent: 25.0,
            position_drop_threshold: 5.0,
            lookback_days: 90,
            min_previous_clicks: 10.0,
        }
    }
}

/// Severity tier of a decaying page
///
/// Ordering puts the most severe tier first so results sort critical → medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Signal that justified flagging a page as decaying
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayFactor {
    ClicksDrop,
    ImpressionsDrop,
    RankingDrop,
}

impl DecayFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecayFactor::ClicksDrop => "clicks_drop",
            DecayFactor::ImpressionsDrop => "impressions_drop",
            DecayFactor::RankingDrop => "ranking_drop",
        }
    }
}

impl fmt::Display for DecayFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Before/after averages and deltas, rounded for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayMetrics {
    pub previous_clicks: f64,
    pub recent_clicks: f64,
    /// Whole percent, negative means decline
    pub clicks_change: i64,
    pub previous_impressions: f64,
    pub recent_impressions: f64,
    pub impressions_change: i64,
    pub previous_position: Option<f64>,
    pub recent_position: Option<f64>,
    /// Absolute change in position, positive means worse ranking
    pub position_change: Option<f64>,
}

/// Verdict for one decaying page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayResult {
    pub page_id: String,
    pub url: String,
    pub title: Option<String>,
    pub page_type: Option<String>,
    pub severity: Severity,
    pub metrics: DecayMetrics,
    pub decay_factors: Vec<DecayFactor>,

    /// Unrounded click change percentage, used for ranking
    #[serde(skip)]
    pub(crate) clicks_change_raw: f64,
}

impl DecayResult {
    /// Unrounded click change percentage
    pub fn clicks_change_exact(&self) -> f64 {
        self.clicks_change_raw
    }

    pub fn has_factor(&self, factor: DecayFactor) -> bool {
        self.decay_factors.contains(&factor)
    }
}
