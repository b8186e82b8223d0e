//! Presentation of decay results
//!
//! Renders ranked results as a terminal table, markdown or JSON, and builds
//! the structured payload handed to the external recommendation generator.

use crate::analyzer::{DecayFactor, DecayResult, Severity};
use crate::error::{DecayError, Result};
use serde::Serialize;
use std::fmt::Write;

/// Output format for a decay report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Markdown,
    Json,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "table" => Some(ReportFormat::Table),
            "markdown" => Some(ReportFormat::Markdown),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Aggregate counts for one analysis run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecaySummary {
    pub pages_analyzed: usize,
    pub pages_decaying: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub clicks_drop: usize,
    pub impressions_drop: usize,
    pub ranking_drop: usize,
}

impl DecaySummary {
    pub fn new(pages_analyzed: usize, results: &[DecayResult]) -> Self {
        let mut summary = Self {
            pages_analyzed,
            pages_decaying: results.len(),
            ..Self::default()
        };

        for result in results {
            match result.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
            }
            for factor in &result.decay_factors {
                match factor {
                    DecayFactor::ClicksDrop => summary.clicks_drop += 1,
                    DecayFactor::ImpressionsDrop => summary.impressions_drop += 1,
                    DecayFactor::RankingDrop => summary.ranking_drop += 1,
                }
            }
        }

        summary
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a DecaySummary,
    results: &'a [DecayResult],
}

/// Render results in the requested format
pub fn render(results: &[DecayResult], summary: &DecaySummary, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Table => Ok(render_table(results, summary)),
        ReportFormat::Markdown => Ok(render_markdown(results, summary)),
        ReportFormat::Json => serde_json::to_string_pretty(&JsonReport { summary, results })
            .map_err(|e| DecayError::Json {
                source: e,
                context: "Failed to serialize decay report".to_string(),
            }),
    }
}

fn render_table(results: &[DecayResult], summary: &DecaySummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} of {} pages decaying ({} critical, {} high, {} medium)",
        summary.pages_decaying, summary.pages_analyzed, summary.critical, summary.high, summary.medium
    );

    if results.is_empty() {
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<9} {:>8} {:>8} {:>9}  {:<40} FACTORS",
        "SEVERITY", "CLICKS", "IMPR", "POSITION", "URL"
    );
    for r in results {
        let _ = writeln!(
            out,
            "{:<9} {:>7}% {:>7}% {:>9}  {:<40} {}",
            r.severity,
            r.metrics.clicks_change,
            r.metrics.impressions_change,
            format_position_change(r.metrics.position_change),
            truncate(&r.url, 40),
            format_factors(&r.decay_factors)
        );
    }

    out
}

fn render_markdown(results: &[DecayResult], summary: &DecaySummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Content Decay Report\n");
    let _ = writeln!(
        out,
        "- Pages analyzed: {}\n- Pages decaying: {}\n- Critical: {} / High: {} / Medium: {}\n",
        summary.pages_analyzed, summary.pages_decaying, summary.critical, summary.high, summary.medium
    );

    if results.is_empty() {
        let _ = writeln!(out, "No decaying pages found.");
        return out;
    }

    let _ = writeln!(
        out,
        "| Severity | Page | Clicks | Impressions | Position | Factors |"
    );
    let _ = writeln!(out, "|---|---|---|---|---|---|");
    for r in results {
        let label = r.title.as_deref().unwrap_or(&r.url);
        let _ = writeln!(
            out,
            "| {} | [{}]({}) | {} → {} ({}%) | {} → {} ({}%) | {} | {} |",
            r.severity,
            label.replace('|', "\\|"),
            r.url,
            r.metrics.previous_clicks,
            r.metrics.recent_clicks,
            r.metrics.clicks_change,
            r.metrics.previous_impressions,
            r.metrics.recent_impressions,
            r.metrics.impressions_change,
            format_position_change(r.metrics.position_change),
            format_factors(&r.decay_factors)
        );
    }

    out
}

fn format_position_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.1}", c),
        None => "n/a".to_string(),
    }
}

fn format_factors(factors: &[DecayFactor]) -> String {
    factors
        .iter()
        .map(DecayFactor::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}

/// Structured input for one page, consumed by the recommendation generator
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationInput {
    pub rank: usize,
    pub page_id: String,
    pub url: String,
    pub title: Option<String>,
    pub page_type: Option<String>,
    pub severity: Severity,
    pub decay_factors: Vec<DecayFactor>,
    /// One-line description of what declined
    pub evidence: String,
}

/// Top `top_n` ranked results as recommendation inputs
pub fn recommendation_inputs(results: &[DecayResult], top_n: usize) -> Vec<RecommendationInput> {
    results
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, r)| RecommendationInput {
            rank: i + 1,
            page_id: r.page_id.clone(),
            url: r.url.clone(),
            title: r.title.clone(),
            page_type: r.page_type.clone(),
            severity: r.severity,
            decay_factors: r.decay_factors.clone(),
            evidence: evidence_line(r),
        })
        .collect()
}

fn evidence_line(r: &DecayResult) -> String {
    let m = &r.metrics;
    let mut parts = vec![
        format!(
            "clicks {} → {} ({}%)",
            m.previous_clicks, m.recent_clicks, m.clicks_change
        ),
        format!(
            "impressions {} → {} ({}%)",
            m.previous_impressions, m.recent_impressions, m.impressions_change
        ),
    ];
    if let (Some(before), Some(after)) = (m.previous_position, m.recent_position) {
        parts.push(format!("position {:.1} → {:.1}", before, after));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{analyze, DecayThresholds, MetricSnapshot, PageSeries};
    use chrono::NaiveDate;

    fn decaying_pages() -> Vec<DecayResult> {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let make = |id: &str, clicks: [u64; 4], positions: [f64; 4]| {
            let snapshots = (0..4)
                .map(|i| {
                    MetricSnapshot::new(
                        start + chrono::Duration::days(i as i64),
                        clicks[i],
                        1000,
                        Some(positions[i]),
                    )
                })
                .collect();
            PageSeries::new(id, format!("https://example.com/{}", id))
                .with_title(format!("Page {}", id))
                .with_snapshots(snapshots)
        };

        let pages = vec![
            make("a", [100, 100, 40, 40], [5.0; 4]),
            make("b", [100, 100, 65, 65], [2.0, 2.0, 8.0, 8.0]),
            make("c", [50, 50, 50, 50], [5.0; 4]),
        ];
        analyze(&pages, &DecayThresholds::default())
    }

    #[test]
    fn test_summary_counts() {
        let results = decaying_pages();
        let summary = DecaySummary::new(3, &results);

        assert_eq!(summary.pages_analyzed, 3);
        assert_eq!(summary.pages_decaying, 2);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.clicks_drop, 2);
        assert_eq!(summary.ranking_drop, 1);
    }

    #[test]
    fn test_render_json_is_valid() {
        let results = decaying_pages();
        let summary = DecaySummary::new(3, &results);
        let json = render(&results, &summary, ReportFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["pagesDecaying"], 2);
        assert_eq!(value["results"][0]["severity"], "critical");
        assert_eq!(value["results"][0]["decayFactors"][0], "clicks_drop");
        assert!(value["results"][0].get("clicksChangeRaw").is_none());
    }

    #[test]
    fn test_render_table_and_markdown() {
        let results = decaying_pages();
        let summary = DecaySummary::new(3, &results);

        let table = render(&results, &summary, ReportFormat::Table).unwrap();
        assert!(table.contains("2 of 3 pages decaying"));
        assert!(table.contains("https://example.com/a"));

        let md = render(&results, &summary, ReportFormat::Markdown).unwrap();
        assert!(md.contains("# Content Decay Report"));
        assert!(md.contains("[Page a](https://example.com/a)"));
        assert!(md.contains("+6.0"));
    }

    #[test]
    fn test_render_empty() {
        let summary = DecaySummary::new(5, &[]);
        let md = render(&[], &summary, ReportFormat::Markdown).unwrap();
        assert!(md.contains("No decaying pages found."));
    }

    #[test]
    fn test_recommendation_inputs_take_top_n() {
        let results = decaying_pages();
        let inputs = recommendation_inputs(&results, 1);

        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].rank, 1);
        assert_eq!(inputs[0].page_id, "a");
        assert!(inputs[0].evidence.contains("clicks 100 → 40 (-60%)"));
        assert!(inputs[0].evidence.contains("position 5.0 → 5.0"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ReportFormat::parse("json"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse("xml"), None);
    }
}
