//! Hour-of-day patterns and work rhythm
//!
//! Two analyses share the same four rhythm windows but stay separate:
//! - [`build_work_pattern`] averages per-sample productivity per hour and
//!   picks peaks at 80% of the best hour
//! - [`analyze_activity_pattern`] counts raw samples per hour and picks
//!   peaks at 75% of the busiest hour
//!
//! Samples are derived from work blocks, one per block, stamped at the
//! block start in the configured timezone.

use super::scoring::{consistency_score, pattern_consistency};
use crate::types::{duration_secs, duration_secs_vec, WorkBlock};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const WORK_PATTERN_PEAK_RATIO: f64 = 0.8;
const ACTIVITY_PEAK_RATIO: f64 = 0.75;
/// More peak hours than this means no single window dominates.
const FLEXIBLE_PEAK_LIMIT: usize = 6;

// ============================================
// Samples
// ============================================

/// Coarse label for how substantial a sample was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Focused,
    Productive,
    Active,
    Brief,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Focused => "focused",
            ActivityKind::Productive => "productive",
            ActivityKind::Active => "active",
            ActivityKind::Brief => "brief",
        }
    }
}

/// One data point for pattern analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSample {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Duration over one hour, capped at 1
    pub intensity: f64,
    /// 0.3 to 0.9 by duration band
    pub productivity: f64,
    pub activity_type: ActivityKind,
}

impl PatternSample {
    pub fn from_work_block(block: &WorkBlock, now: DateTime<Utc>) -> Self {
        let duration = block.duration(now);
        let secs = duration.num_seconds();

        let productivity = match secs {
            s if s > 2400 => 0.9,
            s if s > 1200 => 0.7,
            s if s > 600 => 0.5,
            _ => 0.3,
        };
        let activity_type = match secs {
            s if s > 3600 => ActivityKind::Focused,
            s if s > 1800 => ActivityKind::Productive,
            s if s > 900 => ActivityKind::Active,
            _ => ActivityKind::Brief,
        };

        Self {
            timestamp: block.start,
            duration,
            intensity: (secs as f64 / 3600.0).min(1.0),
            productivity,
            activity_type,
        }
    }

    fn local(&self, tz: FixedOffset) -> DateTime<FixedOffset> {
        self.timestamp.with_timezone(&tz)
    }
}

// ============================================
// Rhythm windows
// ============================================

/// Fixed hour windows used for rhythm classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RhythmWindow {
    /// 06:00-10:00
    Early,
    /// 10:00-14:00
    Mid,
    /// 14:00-18:00
    Late,
    /// 18:00-22:00
    Evening,
}

/// Preference order when two windows hold the same number of peaks.
pub const WINDOW_TIE_ORDER: [RhythmWindow; 4] = [
    RhythmWindow::Mid,
    RhythmWindow::Late,
    RhythmWindow::Early,
    RhythmWindow::Evening,
];

impl RhythmWindow {
    pub fn for_hour(hour: u32) -> Option<Self> {
        match hour {
            6..=9 => Some(RhythmWindow::Early),
            10..=13 => Some(RhythmWindow::Mid),
            14..=17 => Some(RhythmWindow::Late),
            18..=21 => Some(RhythmWindow::Evening),
            _ => None,
        }
    }
}

/// Window holding the most peak hours, `None` if no peak falls in any window.
pub fn dominant_window(peak_hours: &[u32]) -> Option<RhythmWindow> {
    let count = |window: RhythmWindow| {
        peak_hours
            .iter()
            .filter(|h| RhythmWindow::for_hour(**h) == Some(window))
            .count()
    };

    let mut best: Option<(RhythmWindow, usize)> = None;
    for window in WINDOW_TIE_ORDER {
        let n = count(window);
        // Strictly greater keeps the earlier window on ties
        if n > 0 && best.map_or(true, |(_, best_n)| n > best_n) {
            best = Some((window, n));
        }
    }
    best.map(|(window, _)| window)
}

/// When in the day productivity peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkRhythm {
    EarlyBird,
    MidDay,
    Afternoon,
    NightOwl,
    FlexibleDay,
    Irregular,
}

pub fn classify_work_rhythm(peak_hours: &[u32]) -> WorkRhythm {
    if peak_hours.is_empty() {
        return WorkRhythm::Irregular;
    }
    if peak_hours.len() > FLEXIBLE_PEAK_LIMIT {
        return WorkRhythm::FlexibleDay;
    }
    match dominant_window(peak_hours) {
        Some(RhythmWindow::Early) => WorkRhythm::EarlyBird,
        Some(RhythmWindow::Mid) => WorkRhythm::MidDay,
        Some(RhythmWindow::Late) => WorkRhythm::Afternoon,
        Some(RhythmWindow::Evening) => WorkRhythm::NightOwl,
        None => WorkRhythm::Irregular,
    }
}

/// Rhythm vocabulary of the activity-count analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityRhythm {
    EarlyBird,
    MidDay,
    Afternoon,
    NightOwl,
    Distributed,
    Irregular,
    /// No activity in range
    Unknown,
}

pub fn classify_activity_rhythm(peak_hours: &[u32]) -> ActivityRhythm {
    if peak_hours.is_empty() {
        return ActivityRhythm::Irregular;
    }
    match dominant_window(peak_hours) {
        Some(RhythmWindow::Early) => ActivityRhythm::EarlyBird,
        Some(RhythmWindow::Mid) => ActivityRhythm::MidDay,
        Some(RhythmWindow::Late) => ActivityRhythm::Afternoon,
        Some(RhythmWindow::Evening) => ActivityRhythm::NightOwl,
        None => ActivityRhythm::Distributed,
    }
}

fn hour_window_label(hour: u32) -> String {
    format!("{:02}:00-{:02}:00", hour, (hour + 1) % 24)
}

// ============================================
// Work pattern
// ============================================

/// Productivity shape over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkPattern {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Mean productivity per hour of day, 24 entries, 0 for empty hours
    pub productivity_curve: Vec<f64>,
    pub peak_hours: Vec<u32>,
    pub rhythm: WorkRhythm,
    /// 0-1 consistency of sample productivity
    pub consistency: f64,
    /// Mean sample duration per weekday, Monday first
    #[serde(with = "duration_secs_vec")]
    pub weekly_pattern: Vec<Duration>,
    pub sample_count: usize,
}

impl WorkPattern {
    /// Most productive hour as `"HH:00-HH:00"`, first hour wins ties.
    pub fn peak_window(&self) -> Option<String> {
        let mut best: Option<(u32, f64)> = None;
        for (hour, value) in self.productivity_curve.iter().enumerate() {
            if *value > 0.0 && best.map_or(true, |(_, b)| *value > b) {
                best = Some((hour as u32, *value));
            }
        }
        best.map(|(hour, _)| hour_window_label(hour))
    }
}

/// Build the productivity pattern for `samples` between two dates.
pub fn build_work_pattern(
    start_date: NaiveDate,
    end_date: NaiveDate,
    samples: &[PatternSample],
    tz: FixedOffset,
) -> WorkPattern {
    let mut sums = [0.0f64; 24];
    let mut counts = [0usize; 24];
    let mut weekday_totals = [Duration::zero(); 7];
    let mut weekday_counts = [0i32; 7];

    for sample in samples {
        let local = sample.local(tz);
        let hour = local.hour() as usize;
        sums[hour] += sample.productivity;
        counts[hour] += 1;

        let weekday = local.weekday().num_days_from_monday() as usize;
        weekday_totals[weekday] = weekday_totals[weekday] + sample.duration;
        weekday_counts[weekday] += 1;
    }

    let productivity_curve: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(sum, n)| if *n > 0 { sum / *n as f64 } else { 0.0 })
        .collect();

    let max = productivity_curve.iter().copied().fold(0.0f64, f64::max);
    let threshold = max * WORK_PATTERN_PEAK_RATIO;
    let peak_hours: Vec<u32> = productivity_curve
        .iter()
        .enumerate()
        .filter(|(_, p)| **p > 0.0 && **p >= threshold)
        .map(|(hour, _)| hour as u32)
        .collect();

    let rhythm = classify_work_rhythm(&peak_hours);
    let productivity: Vec<f64> = samples.iter().map(|s| s.productivity).collect();
    let consistency = pattern_consistency(&productivity);

    let weekly_pattern = weekday_totals
        .iter()
        .zip(weekday_counts.iter())
        .map(|(total, n)| if *n > 0 { *total / *n } else { Duration::zero() })
        .collect();

    WorkPattern {
        start_date,
        end_date,
        productivity_curve,
        peak_hours,
        rhythm,
        consistency,
        weekly_pattern,
        sample_count: samples.len(),
    }
}

// ============================================
// Activity pattern
// ============================================

/// Activity in one hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyActivity {
    pub hour: u32,
    pub activities: usize,
    /// Share of all activities in range
    pub intensity: f64,
}

/// Activity-count pattern over a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPatternAnalysis {
    pub total_activities: usize,
    /// 24 entries, hour 0 first
    pub hourly_distribution: Vec<HourlyActivity>,
    pub peak_hours: Vec<u32>,
    pub activity_types: BTreeMap<String, usize>,
    pub work_rhythm: ActivityRhythm,
    /// 0-100 consistency of per-day activity counts
    pub consistency_score: f64,
    pub recommendations: Vec<String>,
}

/// Count samples per hour and per day.
pub fn analyze_activity_pattern(samples: &[PatternSample], tz: FixedOffset) -> ActivityPatternAnalysis {
    let total = samples.len();
    let mut hourly = [0usize; 24];
    let mut activity_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();

    for sample in samples {
        let local = sample.local(tz);
        hourly[local.hour() as usize] += 1;
        *activity_types
            .entry(sample.activity_type.as_str().to_string())
            .or_default() += 1;
        *daily.entry(local.date_naive()).or_default() += 1;
    }

    let hourly_distribution = hourly
        .iter()
        .enumerate()
        .map(|(hour, count)| HourlyActivity {
            hour: hour as u32,
            activities: *count,
            intensity: if total > 0 {
                *count as f64 / total as f64
            } else {
                0.0
            },
        })
        .collect();

    if total == 0 {
        return ActivityPatternAnalysis {
            total_activities: 0,
            hourly_distribution,
            peak_hours: Vec::new(),
            activity_types,
            work_rhythm: ActivityRhythm::Unknown,
            consistency_score: 0.0,
            recommendations: Vec::new(),
        };
    }

    let max = hourly.iter().copied().max().unwrap_or(0);
    let threshold = max as f64 * ACTIVITY_PEAK_RATIO;
    let peak_hours: Vec<u32> = hourly
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0 && **count as f64 >= threshold)
        .map(|(hour, _)| hour as u32)
        .collect();

    let daily_counts: Vec<f64> = daily.values().map(|n| *n as f64).collect();

    let mut analysis = ActivityPatternAnalysis {
        total_activities: total,
        hourly_distribution,
        work_rhythm: classify_activity_rhythm(&peak_hours),
        peak_hours,
        activity_types,
        consistency_score: consistency_score(&daily_counts),
        recommendations: Vec::new(),
    };
    analysis.recommendations = activity_pattern_recommendations(&analysis);
    analysis
}

fn activity_pattern_recommendations(analysis: &ActivityPatternAnalysis) -> Vec<String> {
    let mut recs = Vec::new();

    match analysis.work_rhythm {
        ActivityRhythm::EarlyBird => {
            recs.push("Your peak is in the morning: schedule important work before 10:00".to_string())
        }
        ActivityRhythm::NightOwl => {
            recs.push("Evening productivity detected: protect your late-day focus time".to_string())
        }
        ActivityRhythm::Distributed => {
            recs.push("Distributed work pattern: good for varied task scheduling".to_string())
        }
        _ => {}
    }

    if analysis.consistency_score < 50.0 {
        recs.push("Inconsistent work pattern: try establishing regular work hours".to_string());
    }

    if analysis.peak_hours.len() > FLEXIBLE_PEAK_LIMIT {
        recs.push("Work is scattered across many hours: consider focusing on 3-4 peak hours".to_string());
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn sample(day: u32, hour: u32, mins: i64) -> PatternSample {
        let start = Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap();
        let block = WorkBlock {
            id: format!("{day}-{hour}"),
            session_id: "s".into(),
            project_id: "p".into(),
            start,
            end: Some(start + Duration::minutes(mins)),
            last_activity: start + Duration::minutes(mins),
            activity_count: 10,
        };
        PatternSample::from_work_block(&block, start + Duration::hours(4))
    }

    #[test]
    fn test_sample_bands() {
        let s = sample(4, 9, 41);
        assert_eq!(s.productivity, 0.9);
        assert_eq!(s.activity_type, ActivityKind::Productive);
        assert!((s.intensity - 41.0 / 60.0).abs() < 1e-12);

        assert_eq!(sample(4, 9, 40).productivity, 0.7);
        assert_eq!(sample(4, 9, 11).productivity, 0.5);
        assert_eq!(sample(4, 9, 10).productivity, 0.3);
        assert_eq!(sample(4, 9, 10).activity_type, ActivityKind::Brief);
        assert_eq!(sample(4, 9, 16).activity_type, ActivityKind::Active);

        let long = sample(4, 9, 90);
        assert_eq!(long.intensity, 1.0);
        assert_eq!(long.activity_type, ActivityKind::Focused);
    }

    #[test]
    fn test_hour_windows() {
        assert_eq!(RhythmWindow::for_hour(5), None);
        assert_eq!(RhythmWindow::for_hour(6), Some(RhythmWindow::Early));
        assert_eq!(RhythmWindow::for_hour(10), Some(RhythmWindow::Mid));
        assert_eq!(RhythmWindow::for_hour(17), Some(RhythmWindow::Late));
        assert_eq!(RhythmWindow::for_hour(21), Some(RhythmWindow::Evening));
        assert_eq!(RhythmWindow::for_hour(22), None);
    }

    #[test]
    fn test_dominant_window_tie_order() {
        // One peak in each window: Mid wins
        assert_eq!(dominant_window(&[7, 11, 15, 19]), Some(RhythmWindow::Mid));
        // Late beats Early and Evening
        assert_eq!(dominant_window(&[7, 15, 19]), Some(RhythmWindow::Late));
        // Early beats Evening
        assert_eq!(dominant_window(&[7, 19]), Some(RhythmWindow::Early));
        // A clear majority wins regardless of order
        assert_eq!(dominant_window(&[11, 19, 20]), Some(RhythmWindow::Evening));
        assert_eq!(dominant_window(&[2, 23]), None);
    }

    #[test]
    fn test_work_rhythm_classification() {
        assert_eq!(classify_work_rhythm(&[]), WorkRhythm::Irregular);
        assert_eq!(classify_work_rhythm(&[7, 8]), WorkRhythm::EarlyBird);
        assert_eq!(classify_work_rhythm(&[11]), WorkRhythm::MidDay);
        assert_eq!(classify_work_rhythm(&[15]), WorkRhythm::Afternoon);
        assert_eq!(classify_work_rhythm(&[19, 20]), WorkRhythm::NightOwl);
        assert_eq!(classify_work_rhythm(&[1, 2, 3]), WorkRhythm::Irregular);
        assert_eq!(
            classify_work_rhythm(&[9, 10, 11, 12, 13, 14, 15]),
            WorkRhythm::FlexibleDay
        );
    }

    #[test]
    fn test_activity_rhythm_classification() {
        assert_eq!(classify_activity_rhythm(&[]), ActivityRhythm::Irregular);
        assert_eq!(classify_activity_rhythm(&[0, 1]), ActivityRhythm::Distributed);
        assert_eq!(classify_activity_rhythm(&[8]), ActivityRhythm::EarlyBird);
        // No flexible override in this vocabulary
        assert_eq!(
            classify_activity_rhythm(&[9, 10, 11, 12, 13, 14, 15]),
            ActivityRhythm::MidDay
        );
    }

    #[test]
    fn test_build_work_pattern() {
        let samples = vec![
            sample(4, 9, 50),  // Monday, 0.9
            sample(5, 9, 50),  // Tuesday, 0.9
            sample(4, 14, 15), // Monday, 0.5
            sample(6, 10, 45), // Wednesday, 0.9
        ];
        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let pattern = build_work_pattern(start, end, &samples, utc());

        assert_eq!(pattern.productivity_curve.len(), 24);
        assert_eq!(pattern.productivity_curve[9], 0.9);
        assert_eq!(pattern.productivity_curve[14], 0.5);
        assert_eq!(pattern.peak_hours, vec![9, 10]);
        // One peak each in Early and Mid: Mid is preferred
        assert_eq!(pattern.rhythm, WorkRhythm::MidDay);
        assert_eq!(pattern.sample_count, 4);
        assert_eq!(pattern.weekly_pattern.len(), 7);
        assert_eq!(pattern.weekly_pattern[0], Duration::seconds((50 * 60 + 15 * 60) / 2));
        assert_eq!(pattern.weekly_pattern[6], Duration::zero());
        assert_eq!(pattern.peak_window().as_deref(), Some("09:00-10:00"));
        assert!(pattern.consistency > 0.0 && pattern.consistency < 1.0);
    }

    #[test]
    fn test_build_work_pattern_uses_timezone() {
        let samples = vec![sample(4, 23, 50)];
        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let pattern = build_work_pattern(start, start, &samples, plus_two);

        assert_eq!(pattern.peak_hours, vec![1]);
        // Local time is Tuesday 01:00
        assert!(pattern.weekly_pattern[1] > Duration::zero());
    }

    #[test]
    fn test_empty_pattern_defaults() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let pattern = build_work_pattern(start, start, &[], utc());
        assert!(pattern.peak_hours.is_empty());
        assert_eq!(pattern.rhythm, WorkRhythm::Irregular);
        assert_eq!(pattern.consistency, 0.0);
        assert_eq!(pattern.peak_window(), None);
    }

    #[test]
    fn test_activity_pattern_counts_and_peaks() {
        let samples = vec![
            sample(4, 8, 50),
            sample(4, 8, 5),
            sample(4, 8, 20),
            sample(4, 8, 20),
            sample(5, 9, 20),
            sample(5, 9, 20),
            sample(5, 9, 20),
            sample(5, 15, 20),
        ];
        let analysis = analyze_activity_pattern(&samples, utc());

        assert_eq!(analysis.total_activities, 8);
        assert_eq!(analysis.hourly_distribution.len(), 24);
        assert_eq!(analysis.hourly_distribution[8].activities, 4);
        assert_eq!(analysis.hourly_distribution[8].intensity, 0.5);
        // Threshold is 3: hours 8 and 9
        assert_eq!(analysis.peak_hours, vec![8, 9]);
        assert_eq!(analysis.work_rhythm, ActivityRhythm::EarlyBird);
        assert_eq!(analysis.activity_types.get("active"), Some(&6));
        assert_eq!(analysis.activity_types.get("productive"), Some(&1));
        assert_eq!(analysis.activity_types.get("brief"), Some(&1));
        // Four activities on each of two days
        assert_eq!(analysis.consistency_score, 100.0);
        assert_eq!(analysis.recommendations.len(), 1);
    }

    #[test]
    fn test_empty_activity_pattern() {
        let analysis = analyze_activity_pattern(&[], utc());
        assert_eq!(analysis.total_activities, 0);
        assert_eq!(analysis.work_rhythm, ActivityRhythm::Unknown);
        assert!(analysis.peak_hours.is_empty());
        assert!(analysis.recommendations.is_empty());
    }
}
