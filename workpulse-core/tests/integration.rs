//! Integration tests for the workpulse analysis pipeline
//!
//! These tests load the activity export in `tests/fixtures/week.json` and
//! drive the public analyzer API end to end.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use workpulse_core::analytics::{ActivityRhythm, WorkRhythm};
use workpulse_core::{
    AnalysisScope, Config, Error, InMemoryActivitySource, ManualClock, ReportPeriod,
    TrendDirection, WorkAnalyzer,
};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn analyzer_with(config: &Config) -> WorkAnalyzer {
    workpulse_core::logging::init_test();
    let source = Arc::new(
        InMemoryActivitySource::from_json_file(&fixture_path("week.json"))
            .expect("fixture should load"),
    );
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap(),
    ));
    WorkAnalyzer::from_config(source.clone(), source, clock, config)
}

fn analyzer() -> WorkAnalyzer {
    analyzer_with(&Config::default())
}

// ============================================
// Day and week
// ============================================

#[test]
fn test_monday_work_day() {
    let analyzer = analyzer();
    let day = analyzer.analyze_work_day(date(4)).unwrap();

    assert_eq!(day.total_time, Duration::minutes(120));
    assert_eq!(day.block_count, 3);
    assert_eq!(day.session_count, 1);
    assert_eq!(day.work_span(), Duration::minutes(160));
    assert_eq!(day.break_time, Duration::minutes(40));
    assert!(day.is_complete);
    assert!(day.deep_work_percentage > 90.0);
}

#[test]
fn test_week_summary_fields() {
    let analyzer = analyzer();
    let week = analyzer.analyze_work_week(date(6)).unwrap();

    assert_eq!(week.week_start, date(4));
    assert_eq!(week.total_time, Duration::minutes(273));
    assert_eq!(week.worked_days(), 3);
    assert_eq!(week.peak_day, Some(date(5)));
    assert_eq!(week.overtime, Duration::zero());
    assert_eq!(week.standard_time, Duration::hours(40));
    assert!(week.is_complete);
}

#[test]
fn test_concurrent_week_reads_agree() {
    let analyzer = Arc::new(analyzer());
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let analyzer = analyzer.clone();
            thread::spawn(move || analyzer.analyze_work_week(date(4 + (i % 3))).unwrap())
        })
        .collect();

    let weeks: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for week in &weeks {
        assert_eq!(**week, *weeks[0]);
    }
    assert_eq!(analyzer.cache().stats().entries, 8);
}

// ============================================
// Block-level analyses
// ============================================

#[test]
fn test_deep_work_on_monday() {
    let analyzer = analyzer();
    let blocks = analyzer.work_blocks(date(4), date(4)).unwrap();
    let analysis = analyzer.analyze_deep_work(&blocks);

    assert_eq!(analysis.focus_blocks.len(), 3);
    assert_eq!(analysis.context_switches, 1);
    assert_eq!(analysis.flow_sessions.len(), 1);
    assert_eq!(analysis.flow_sessions[0].duration, Duration::minutes(110));
    assert_eq!(analysis.focus_blocks[2].project_name, "web-client");
}

#[test]
fn test_project_focus_on_tuesday() {
    let analyzer = analyzer();
    let blocks = analyzer.work_blocks(date(5), date(5)).unwrap();
    let analysis = analyzer.analyze_project_focus(&blocks);

    assert_eq!(analysis.project_sessions.len(), 2);
    assert_eq!(analysis.context_switches, 1);
    // The three hour gap is too long to count as switching
    assert_eq!(analysis.switching_cost, Duration::zero());
    assert_eq!(analysis.focus_efficiency, 100.0);
}

// ============================================
// Patterns
// ============================================

#[test]
fn test_work_pattern_prefers_mid_day_on_tie() {
    let analyzer = analyzer();
    let pattern = analyzer.analyze_work_pattern(date(4), date(10)).unwrap();

    assert_eq!(pattern.sample_count, 6);
    assert_eq!(pattern.peak_hours, vec![9, 10]);
    assert_eq!(pattern.rhythm, WorkRhythm::MidDay);
    assert_eq!(pattern.peak_window().as_deref(), Some("09:00-10:00"));
}

#[test]
fn test_activity_patterns() {
    let analyzer = analyzer();
    let analysis = analyzer.analyze_activity_patterns(date(4), date(10)).unwrap();

    assert_eq!(analysis.total_activities, 6);
    assert_eq!(analysis.hourly_distribution[9].activities, 2);
    assert_eq!(analysis.peak_hours, vec![9]);
    assert_eq!(analysis.work_rhythm, ActivityRhythm::EarlyBird);
}

#[test]
fn test_invalid_range_is_rejected() {
    let analyzer = analyzer();
    let err = analyzer.analyze_activity_patterns(date(10), date(4)).unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));
    assert_eq!(err.scope(), Some(AnalysisScope::Range(date(10), date(4))));
}

// ============================================
// Summaries and trends
// ============================================

#[test]
fn test_weekly_summary_serializes_durations_as_seconds() {
    let analyzer = analyzer();
    let cancel = CancellationToken::new();
    let summary = analyzer
        .generate_activity_summary(ReportPeriod::Weekly, date(4), date(10), &cancel)
        .unwrap();

    assert_eq!(summary.total_work_time, Duration::minutes(273));
    assert_eq!(summary.total_sessions, 3);
    assert_eq!(summary.total_work_blocks, 6);
    assert_eq!(summary.trends.direction, TrendDirection::Down);
    assert!(!summary.partial);

    let json = serde_json::to_value(&*summary).unwrap();
    assert_eq!(json["total_work_time"], 273 * 60);
    assert_eq!(json["goals"]["daily_goal"], 8 * 3600);
}

#[test]
fn test_trends_across_week() {
    let analyzer = analyzer();
    let cancel = CancellationToken::new();
    let trend = analyzer
        .get_work_day_trends(date(4), date(5), &cancel)
        .unwrap();

    assert_eq!(trend.direction, TrendDirection::Up);
    assert!((trend.work_time_change - 25.0).abs() < 1e-9);
    assert_eq!(trend.points.len(), 2);
}

// ============================================
// Configuration
// ============================================

#[test]
fn test_config_file_drives_timezone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[analysis]\nutc_offset_minutes = 300\n\n[cache]\nttl_minutes = 5\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.cache.ttl_minutes, 5);
    let analyzer = analyzer_with(&config);

    // 20:00 UTC on Wednesday is 01:00 Thursday at UTC+5
    let wednesday = analyzer.analyze_work_day(date(6)).unwrap();
    let thursday = analyzer.analyze_work_day(date(7)).unwrap();
    assert_eq!(wednesday.block_count, 0);
    assert_eq!(thursday.block_count, 1);
}

#[test]
fn test_missing_fixture_reports_io_error() {
    let err = InMemoryActivitySource::from_json_file(&fixture_path("missing.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(err.scope(), None::<AnalysisScope>);
}
