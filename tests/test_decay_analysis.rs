// Integration tests for decay analysis through the public API
use chrono::NaiveDate;
use pagedecay::analyzer::{
    analyze, DecayFactor, DecayThresholds, MetricSnapshot, PageSeries, Severity,
};
use pagedecay::ingest::parse_series;

fn series(id: &str, clicks: &[u64], impressions: &[u64], positions: &[Option<f64>]) -> PageSeries {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let snapshots = clicks
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            MetricSnapshot::new(
                start + chrono::Duration::days(7 * i as i64),
                c,
                impressions[i],
                positions[i],
            )
        })
        .collect();
    PageSeries::new(id, format!("https://agency.example/blog/{}", id))
        .with_title(format!("Post {}", id))
        .with_page_type("blog")
        .with_snapshots(snapshots)
}

fn mixed_batch() -> Vec<PageSeries> {
    vec![
        series("p1", &[100, 100, 40, 40], &[1000; 4], &[Some(5.0); 4]),
        series("p2", &[20, 20, 15, 15], &[1000; 4], &[Some(5.0); 4]),
        series("p3", &[5, 5, 2, 2], &[1000, 1000, 100, 100], &[Some(5.0); 4]),
        series(
            "p4",
            &[50; 4],
            &[1000; 4],
            &[Some(3.0), Some(3.0), Some(14.0), Some(14.0)],
        ),
        series("p5", &[300], &[1000], &[Some(1.0)]),
        series("p6", &[80, 80, 45, 45], &[900, 900, 600, 600], &[Some(4.0); 4]),
        series("p7", &[60; 6], &[500; 6], &[None; 6]),
    ]
}

#[test]
fn test_reference_scenarios() {
    let results = analyze(&mixed_batch(), &DecayThresholds::default());
    let ids: Vec<&str> = results.iter().map(|r| r.page_id.as_str()).collect();

    // p2 below threshold, p3 low signal, p5 one snapshot, p7 flat
    assert_eq!(ids, vec!["p1", "p4", "p6"]);

    let p1 = &results[0];
    assert_eq!(p1.severity, Severity::Critical);
    assert_eq!(p1.decay_factors, vec![DecayFactor::ClicksDrop]);
    assert_eq!(p1.title.as_deref(), Some("Post p1"));
    assert_eq!(p1.page_type.as_deref(), Some("blog"));

    let p4 = &results[1];
    assert_eq!(p4.severity, Severity::Critical);
    assert_eq!(p4.decay_factors, vec![DecayFactor::RankingDrop]);
    assert_eq!(p4.metrics.position_change, Some(11.0));

    // -43.75% clicks, -33.3% impressions
    let p6 = &results[2];
    assert_eq!(p6.severity, Severity::High);
    assert_eq!(
        p6.decay_factors,
        vec![DecayFactor::ClicksDrop, DecayFactor::ImpressionsDrop]
    );
    assert_eq!(p6.metrics.clicks_change, -44);
    assert_eq!(p6.metrics.impressions_change, -33);
}

#[test]
fn test_short_histories_never_included() {
    let strict = DecayThresholds {
        clicks_drop_percent: 0.0,
        impressions_drop_percent: 0.0,
        position_drop_threshold: 0.0,
        min_previous_clicks: 0.0,
        ..DecayThresholds::default()
    };

    let pages = vec![
        PageSeries::new("empty", "https://agency.example/empty"),
        series("one", &[1000], &[1000], &[Some(40.0)]),
    ];

    assert!(analyze(&pages, &strict).is_empty());
    assert!(analyze(&pages, &DecayThresholds::default()).is_empty());
}

#[test]
fn test_low_signal_excluded_regardless_of_decline() {
    let page = series("tiny", &[9, 9, 0, 0], &[5000, 5000, 0, 0], &[Some(1.0), Some(1.0), Some(90.0), Some(90.0)]);
    assert!(analyze(&[page], &DecayThresholds::default()).is_empty());
}

#[test]
fn test_flat_pages_never_flagged() {
    let pages: Vec<PageSeries> = (1..=20)
        .map(|n| {
            series(
                &format!("flat{}", n),
                &[10 * n; 4],
                &[100 * n; 4],
                &[Some(n as f64); 4],
            )
        })
        .collect();

    assert!(analyze(&pages, &DecayThresholds::default()).is_empty());
}

#[test]
fn test_critical_results_sort_first() {
    let results = analyze(&mixed_batch(), &DecayThresholds::default());
    let first_non_critical = results
        .iter()
        .position(|r| r.severity != Severity::Critical)
        .unwrap_or(results.len());

    assert!(results[first_non_critical..]
        .iter()
        .all(|r| r.severity != Severity::Critical));
    assert!(results
        .windows(2)
        .all(|w| w[0].severity <= w[1].severity));
}

#[test]
fn test_idempotent() {
    let pages = mixed_batch();
    let thresholds = DecayThresholds::default();

    let first = analyze(&pages, &thresholds);
    let second = analyze(&pages, &thresholds);
    assert_eq!(first, second);
}

#[test]
fn test_input_not_mutated() {
    let mut pages = mixed_batch();
    pages[0].snapshots.reverse();
    let before = pages.clone();

    let _ = analyze(&pages, &DecayThresholds::default());
    assert_eq!(pages, before);
}

#[test]
fn test_metrics_always_finite() {
    let permissive = DecayThresholds {
        min_previous_clicks: 0.0,
        ..DecayThresholds::default()
    };
    let pages = vec![
        series("zero-then-some", &[0, 0, 10, 10], &[0, 0, 10, 10], &[None, None, Some(3.0), Some(3.0)]),
        series("no-impressions", &[40, 40, 10, 10], &[0; 4], &[None; 4]),
        series("ranking", &[30, 30, 30, 30], &[100; 4], &[Some(2.0), None, Some(20.0), None]),
    ];

    let results = analyze(&pages, &permissive);
    assert!(!results.is_empty());

    for r in &results {
        let m = &r.metrics;
        for value in [m.previous_clicks, m.recent_clicks, m.previous_impressions, m.recent_impressions] {
            assert!(value.is_finite(), "{} has non-finite metric", r.page_id);
        }
        for value in [m.previous_position, m.recent_position, m.position_change].into_iter().flatten() {
            assert!(value.is_finite(), "{} has non-finite position", r.page_id);
        }
    }

    let json = serde_json::to_string(&results).unwrap();
    assert!(!json.contains("NaN"));
    assert!(!json.contains("inf"));
}

#[test]
fn test_missing_positions_never_rank_drop() {
    let page = series("unranked", &[100, 100, 40, 40], &[1000; 4], &[None; 4]);
    let results = analyze(&[page], &DecayThresholds::default());

    assert_eq!(results.len(), 1);
    assert!(!results[0].has_factor(DecayFactor::RankingDrop));
    assert_eq!(results[0].metrics.position_change, None);

    // Position only in the recent window still gives no ranking signal
    let page = series(
        "half-ranked",
        &[50; 4],
        &[1000; 4],
        &[None, None, Some(30.0), Some(30.0)],
    );
    assert!(analyze(&[page], &DecayThresholds::default()).is_empty());
}

#[test]
fn test_analyze_from_json_export() {
    let json = r#"{
        "pages": [
            {
                "pageId": "9b1c",
                "url": "https://agency.example/services/seo",
                "title": "SEO Services",
                "pageType": "service",
                "snapshots": [
                    { "date": "2024-04-15", "clicks": 40, "impressions": 1000, "position": 5.0 },
                    { "date": "2024-03-01", "clicks": 100, "impressions": 1000, "position": 5.0 },
                    { "date": "2024-04-01", "clicks": 40, "impressions": 1000, "position": 5.0 },
                    { "date": "2024-03-15", "clicks": 100, "impressions": 1000, "position": 5.0 }
                ]
            }
        ]
    }"#;

    let pages = parse_series(json).unwrap();
    let results = analyze(&pages, &DecayThresholds::default());

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].severity, Severity::Critical);
    assert_eq!(results[0].metrics.clicks_change, -60);

    let value = serde_json::to_value(&results[0]).unwrap();
    assert_eq!(value["pageId"], "9b1c");
    assert_eq!(value["pageType"], "service");
    assert_eq!(value["metrics"]["clicksChange"], -60);
}
