//! Core domain types for workpulse
//!
//! Input records come from the activity monitor (work blocks, sessions,
//! projects). Everything else in this module is derived by the analyzer and
//! treated as immutable once built.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Work block** | A contiguous span of recorded activity on one project |
//! | **Session** | A monitor session that owns one or more work blocks |
//! | **Project** | A named unit of work a block is attributed to |
//! | **Work day** | All activity whose blocks start on one local calendar date |
//! | **Work week** | Seven work days starting on a Monday |
//!
//! Durations serialize as whole seconds.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================
// Duration serialization
// ============================================

/// Serialize a [`Duration`] as integer seconds.
pub mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs))
    }
}

/// Serialize a list of [`Duration`]s as integer seconds.
pub mod duration_secs_vec {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[Duration], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|d| d.num_seconds()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Duration>, D::Error> {
        let secs = Vec::<i64>::deserialize(deserializer)?;
        Ok(secs.into_iter().map(Duration::seconds).collect())
    }
}

// ============================================
// Input records
// ============================================

/// A contiguous span of activity on one project.
///
/// `end` is `None` while the block is still open; its duration is then
/// measured against the caller's "now" and re-evaluated on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkBlock {
    pub id: String,
    pub session_id: String,
    pub project_id: String,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Most recent activity recorded inside the block
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub activity_count: u64,
}

impl WorkBlock {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Length of the block, measured to `now` while open. Never negative.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end.unwrap_or(now);
        (end - self.start).max(Duration::zero())
    }

    /// Where the block ends for display: its end, or `start + duration` while open.
    pub fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or_else(|| self.start + self.duration(now))
    }

    /// Where the block ends for continuity checks: its end, or its last
    /// recorded activity while open.
    pub fn continuity_end(&self) -> DateTime<Utc> {
        self.end.unwrap_or(self.last_activity)
    }
}

/// A monitor session. Only used for per-day session counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: bool,
}

/// Project display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// Display name used when a project id has no directory entry.
pub const UNKNOWN_PROJECT: &str = "Unknown";

// ============================================
// Work day / week
// ============================================

/// Derived activity for one local calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDay {
    pub date: NaiveDate,
    pub first_activity: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    /// Sum of block durations
    #[serde(with = "duration_secs")]
    pub total_time: Duration,
    /// Span between first and last activity not covered by blocks
    #[serde(with = "duration_secs")]
    pub break_time: Duration,
    pub session_count: usize,
    pub block_count: usize,
    /// True once the date is entirely in the past
    pub is_complete: bool,
    pub deep_work_percentage: f64,
    pub focus_score: f64,
}

impl WorkDay {
    /// A day with no recorded activity.
    pub fn empty(date: NaiveDate, is_complete: bool) -> Self {
        Self {
            date,
            first_activity: None,
            last_activity: None,
            total_time: Duration::zero(),
            break_time: Duration::zero(),
            session_count: 0,
            block_count: 0,
            is_complete,
            deep_work_percentage: 0.0,
            focus_score: 0.0,
        }
    }

    pub fn has_work(&self) -> bool {
        self.total_time > Duration::zero()
    }

    /// Wall-clock span from first to last activity.
    pub fn work_span(&self) -> Duration {
        match (self.first_activity, self.last_activity) {
            (Some(first), Some(last)) if last > first => last - first,
            _ => Duration::zero(),
        }
    }

    /// Active time over the work span, 0 when there is no span.
    pub fn active_ratio(&self) -> f64 {
        let span = self.work_span().num_milliseconds();
        if span <= 0 {
            return 0.0;
        }
        (self.total_time.num_milliseconds() as f64 / span as f64).min(1.0)
    }
}

/// Derived activity for a Monday-to-Sunday week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkWeek {
    /// Always a Monday
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(with = "duration_secs")]
    pub total_time: Duration,
    #[serde(with = "duration_secs")]
    pub standard_time: Duration,
    /// Time beyond the standard week, never negative
    #[serde(with = "duration_secs")]
    pub overtime: Duration,
    /// Monday first, always seven entries
    pub days: Vec<WorkDay>,
    /// Mean over days that had any work
    #[serde(with = "duration_secs")]
    pub average_day: Duration,
    /// 0-1 day-to-day consistency of worked days
    pub consistency: f64,
    pub peak_day: Option<NaiveDate>,
    pub is_complete: bool,
}

impl WorkWeek {
    pub fn worked_days(&self) -> usize {
        self.days.iter().filter(|d| d.has_work()).count()
    }
}

// ============================================
// Summaries and trends
// ============================================

/// Reporting period label attached to a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Daily => "daily",
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
            ReportPeriod::Custom => "custom",
        }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ReportPeriod::Daily),
            "weekly" => Ok(ReportPeriod::Weekly),
            "monthly" => Ok(ReportPeriod::Monthly),
            "custom" => Ok(ReportPeriod::Custom),
            other => Err(format!("unknown report period: {}", other)),
        }
    }
}

/// Direction of a trend between the first and last data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// One day's contribution to a trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    #[serde(with = "duration_secs")]
    pub work_time: Duration,
    pub sessions: usize,
    /// Active ratio of the day as a percentage
    pub efficiency: f64,
}

/// Change between the first and last worked day of a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    /// Percentage change in work time
    pub work_time_change: f64,
    /// Percentage change in session count
    pub session_change: f64,
    /// Percentage change in efficiency
    pub efficiency_change: f64,
    pub direction: TrendDirection,
    pub points: Vec<TrendPoint>,
    /// Set when cancellation stopped the pass early
    pub partial: bool,
}

impl TrendAnalysis {
    pub fn stable() -> Self {
        Self {
            work_time_change: 0.0,
            session_change: 0.0,
            efficiency_change: 0.0,
            direction: TrendDirection::Stable,
            points: Vec::new(),
            partial: false,
        }
    }
}

/// Progress toward the configured daily and weekly goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    #[serde(with = "duration_secs")]
    pub daily_goal: Duration,
    #[serde(with = "duration_secs")]
    pub weekly_goal: Duration,
    /// Daily average over the daily goal, capped at 1
    pub daily_progress: f64,
    /// Weekly-equivalent average over the weekly goal, capped at 1
    pub weekly_progress: f64,
    pub on_track: bool,
}

/// Efficiency figures for a summary range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    /// Active time over the summed work spans (0-1)
    pub active_ratio: f64,
    /// Mean daily focus score over worked days (0-100)
    pub focus_score: f64,
    /// Breaks between blocks per active hour
    pub interruption_rate: f64,
    /// Most productive hour window, e.g. "09:00-10:00"
    pub peak_efficiency: Option<String>,
}

impl Default for EfficiencyMetrics {
    fn default() -> Self {
        Self {
            active_ratio: 0.0,
            focus_score: 0.0,
            interruption_rate: 0.0,
            peak_efficiency: None,
        }
    }
}

/// Aggregated activity for a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub period: ReportPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(with = "duration_secs")]
    pub total_work_time: Duration,
    pub total_sessions: usize,
    pub total_work_blocks: usize,
    #[serde(with = "duration_secs")]
    pub average_session: Duration,
    #[serde(with = "duration_secs")]
    pub average_work_block: Duration,
    #[serde(with = "duration_secs")]
    pub daily_average: Duration,
    pub trends: TrendAnalysis,
    pub goals: GoalProgress,
    pub efficiency: EfficiencyMetrics,
    /// Days whose analysis failed and were left out of the totals
    pub skipped_days: Vec<NaiveDate>,
    /// Set when cancellation stopped the pass early
    pub partial: bool,
}
