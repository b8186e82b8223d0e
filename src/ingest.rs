//! Reading page metric histories from JSON exports

use crate::analyzer::PageSeries;
use crate::error::{DecayError, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Wrapped document shape: `{ "pages": [...] }`
#[derive(Deserialize)]
struct SeriesDocument {
    pages: Vec<PageSeries>,
}

/// Read page series from a JSON file
pub fn read_series_file(path: &Path) -> Result<Vec<PageSeries>> {
    let content = std::fs::read_to_string(path).map_err(|e| DecayError::Io {
        source: e,
        context: format!("Failed to read input file: {}", path.display()),
    })?;

    let pages = parse_series(&content)?;
    tracing::debug!("Read {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

/// Parse page series from a JSON string, rejecting duplicate page ids.
///
/// Accepts a bare array or `{ "pages": [...] }`.
pub fn parse_series(content: &str) -> Result<Vec<PageSeries>> {
    let parsed = if content.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<PageSeries>>(content)
    } else {
        serde_json::from_str::<SeriesDocument>(content).map(|doc| doc.pages)
    };

    let pages = parsed.map_err(|e| DecayError::Json {
        source: e,
        context: "Failed to parse page series".to_string(),
    })?;

    check_unique(&pages)?;
    Ok(pages)
}

fn check_unique(pages: &[PageSeries]) -> Result<()> {
    let mut seen = HashSet::new();
    for page in pages {
        if !seen.insert(page.page_id.as_str()) {
            return Err(DecayError::InvalidInput(format!(
                "Duplicate pageId: {}",
                page.page_id
            )));
        }
    }
    Ok(())
}

/// First date inside a lookback window ending today
pub fn lookback_start(lookback_days: u32) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(i64::from(lookback_days))
}

/// Drop snapshots dated before `since`.
///
/// The analyzer splits windows by snapshot count, so this is the only place a
/// calendar window is applied.
pub fn retain_since(pages: &mut [PageSeries], since: NaiveDate) {
    for page in pages {
        page.snapshots.retain(|s| s.date >= since);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{analyze, DecayFactor, DecayThresholds, MetricSnapshot, Severity};

    #[test]
    fn test_parse_bare_array() {
        let json = r#"[
            {
                "pageId": "p1",
                "url": "https://example.com/a",
                "title": "A",
                "snapshots": [
                    { "date": "2024-01-01", "clicks": 10, "impressions": 100, "position": 3.2 },
                    { "date": "2024-01-02", "clicks": 12 }
                ]
            }
        ]"#;

        let pages = parse_series(json).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title.as_deref(), Some("A"));
        assert_eq!(pages[0].snapshots[1].impressions, 0);
        assert_eq!(pages[0].snapshots[1].position, None);
    }

    #[test]
    fn test_parse_wrapped() {
        let json = r#"{ "pages": [ { "pageId": "p1", "url": "https://example.com/a" } ] }"#;
        let pages = parse_series(json).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].snapshots.is_empty());
    }

    #[test]
    fn test_duplicate_page_rejected() {
        let json = r#"[
            { "pageId": "p1", "url": "https://example.com/a" },
            { "pageId": "p1", "url": "https://example.com/b" }
        ]"#;
        assert!(matches!(parse_series(json), Err(DecayError::InvalidInput(_))));
    }

    #[test]
    fn test_null_counts_read_as_zero() {
        let json = r#"[
            {
                "pageId": "p1",
                "url": "https://example.com/a",
                "snapshots": [
                    { "date": "2024-01-01", "clicks": 100, "impressions": 1000, "position": 4.0 },
                    { "date": "2024-01-08", "clicks": null, "impressions": 1000, "position": 4.0 },
                    { "date": "2024-01-15", "clicks": 40, "impressions": null, "position": null },
                    { "date": "2024-01-22", "clicks": 40, "impressions": 800, "position": 4.0 }
                ]
            }
        ]"#;

        let pages = parse_series(json).unwrap();
        let snaps = &pages[0].snapshots;
        assert_eq!(snaps[1].clicks, 0);
        assert_eq!(snaps[2].impressions, 0);
        assert_eq!(snaps[2].position, None);

        // Clicks 50 -> 40 (-20%), impressions 1000 -> 400 (-60%)
        let results = analyze(&pages, &DecayThresholds::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metrics.clicks_change, -20);
        assert_eq!(results[0].metrics.impressions_change, -60);
        assert_eq!(results[0].decay_factors, vec![DecayFactor::ImpressionsDrop]);
        assert_eq!(results[0].severity, Severity::Medium);
    }

    #[test]
    fn test_bad_field_reports_location() {
        let json = r#"{ "pages": [
            { "pageId": "p1", "url": "https://example.com/a",
              "snapshots": [ { "date": "2024-01-01", "clicks": "many" } ] }
        ] }"#;

        let err = parse_series(json).unwrap_err();
        match err {
            DecayError::Json { source, .. } => {
                assert!(source.line() > 1);
                assert!(source.to_string().contains("invalid type"));
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_series("{ nope"), Err(DecayError::Json { .. })));
    }

    #[test]
    fn test_retain_since() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let mut pages = vec![PageSeries::new("p", "https://example.com/p").with_snapshots(vec![
            MetricSnapshot::new(day(1), 1, 1, None),
            MetricSnapshot::new(day(10), 2, 2, None),
            MetricSnapshot::new(day(20), 3, 3, None),
        ])];

        retain_since(&mut pages, day(10));
        let dates: Vec<NaiveDate> = pages[0].snapshots.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![day(10), day(20)]);
    }

    #[test]
    fn test_lookback_start() {
        let today = Utc::now().date_naive();
        assert_eq!(today - lookback_start(90), Duration::days(90));
    }
}
