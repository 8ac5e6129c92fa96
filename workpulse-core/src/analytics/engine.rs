//! Work analyzer
//!
//! [`WorkAnalyzer`] is the entry point for every analysis. It reads activity
//! through the injected collaborators, derives day, week, pattern and
//! summary structures, and keeps them in an injected [`AnalysisCache`].
//!
//! ## Caching
//!
//! ```text
//!   caller ──► analyze_work_day(d)
//!                 │
//!                 ▼
//!          cache.get_or_compute("YYYY-MM-DD")
//!                 │ fresh? ──► return cached Arc
//!                 │ missing / stale / invalidated
//!                 ▼
//!          ActivitySource ──► classify ──► segment ──► score ──► cache.put
//! ```
//!
//! Weeks are built from cached days; summaries and trends walk day by day
//! and stop early when their cancellation token fires.

use super::deep_work::{
    analyze_deep_work, analyze_project_focus, DeepWorkAnalysis, ProjectFocusAnalysis,
};
use super::pattern::{
    analyze_activity_pattern, build_work_pattern, ActivityPatternAnalysis, PatternSample,
    WorkPattern,
};
use super::scoring::pattern_consistency;
use crate::cache::{AnalysisCache, CacheKey};
use crate::clock::Clock;
use crate::config::{AnalysisConfig, Config};
use crate::error::{AnalysisScope, Error, Result};
use crate::source::{ActivitySource, ProjectDirectory};
use crate::types::{
    ActivitySummary, EfficiencyMetrics, GoalProgress, ReportPeriod, Session, TrendAnalysis,
    TrendDirection, TrendPoint, WorkBlock, WorkDay, WorkWeek,
};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A derived analysis as stored in the cache.
#[derive(Debug, Clone)]
pub enum CachedAnalysis {
    Day(Arc<WorkDay>),
    Week(Arc<WorkWeek>),
    Pattern(Arc<WorkPattern>),
    Summary(Arc<ActivitySummary>),
}

impl CachedAnalysis {
    fn kind(&self) -> &'static str {
        match self {
            CachedAnalysis::Day(_) => "day",
            CachedAnalysis::Week(_) => "week",
            CachedAnalysis::Pattern(_) => "pattern",
            CachedAnalysis::Summary(_) => "summary",
        }
    }
}

/// Cache type used by [`WorkAnalyzer`].
pub type WorkCache = AnalysisCache<CachedAnalysis>;

fn mismatched(key: &str, found: &CachedAnalysis) -> Error {
    Error::Task(format!(
        "cache entry {} holds a {} analysis",
        key,
        found.kind()
    ))
}

/// Percentage change from `previous` to `current`.
///
/// Growth from zero reports 100%.
pub fn calc_delta(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current == 0.0 {
            0.0
        } else {
            100.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Compare the first and last point of a day series.
pub fn trend_from_points(points: Vec<TrendPoint>, partial: bool) -> TrendAnalysis {
    let mut trend = TrendAnalysis::stable();
    trend.partial = partial;

    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if points.len() > 1 {
            let first_secs = first.work_time.num_seconds();
            let last_secs = last.work_time.num_seconds();
            trend.work_time_change = calc_delta(last_secs as f64, first_secs as f64);
            trend.session_change = calc_delta(last.sessions as f64, first.sessions as f64);
            trend.efficiency_change = calc_delta(last.efficiency, first.efficiency);
            trend.direction = match last_secs.cmp(&first_secs) {
                std::cmp::Ordering::Greater => TrendDirection::Up,
                std::cmp::Ordering::Less => TrendDirection::Down,
                std::cmp::Ordering::Equal => TrendDirection::Stable,
            };
        }
    }

    trend.points = points;
    trend
}

/// Result of walking a date range one day at a time.
struct DayWalk {
    days: Vec<Arc<WorkDay>>,
    skipped: Vec<NaiveDate>,
    partial: bool,
}

// ============================================
// Analyzer
// ============================================

/// Entry point for work pattern analysis.
pub struct WorkAnalyzer {
    source: Arc<dyn ActivitySource>,
    projects: Arc<dyn ProjectDirectory>,
    cache: Arc<WorkCache>,
    clock: Arc<dyn Clock>,
    config: AnalysisConfig,
    tz: FixedOffset,
}

impl WorkAnalyzer {
    pub fn new(
        source: Arc<dyn ActivitySource>,
        projects: Arc<dyn ProjectDirectory>,
        cache: Arc<WorkCache>,
        clock: Arc<dyn Clock>,
        config: AnalysisConfig,
    ) -> Self {
        let tz = config.timezone();
        Self {
            source,
            projects,
            cache,
            clock,
            config,
            tz,
        }
    }

    /// Build an analyzer with a fresh cache sized from `config`.
    pub fn from_config(
        source: Arc<dyn ActivitySource>,
        projects: Arc<dyn ProjectDirectory>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let cache = Arc::new(WorkCache::new(
            config.cache.ttl(),
            config.cache.max_entries,
            clock.clone(),
        ));
        Self::new(source, projects, cache, clock, config.analysis.clone())
    }

    pub fn cache(&self) -> &Arc<WorkCache> {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    /// Local calendar date of an instant.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(self.clock.now())
    }

    /// Monday of the week containing `date`.
    pub fn week_start(date: NaiveDate) -> NaiveDate {
        date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
    }

    /// UTC instant of local midnight at the start of `date`.
    fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let offset = Duration::seconds(i64::from(self.tz.local_minus_utc()));
        (date.and_time(NaiveTime::MIN) - offset).and_utc()
    }

    /// Half-open UTC bounds covering local dates `start..=end`.
    fn range_bounds(&self, start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.day_start(start), self.day_start(end) + Duration::days(1))
    }

    fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(())
    }

    fn fetch_blocks(
        &self,
        scope: AnalysisScope,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WorkBlock>> {
        let (from, to) = self.range_bounds(start, end);
        self.source
            .work_blocks_in_range(from, to)
            .map_err(|e| Error::source(scope, e.to_string()))
    }

    fn fetch_sessions(&self, scope: AnalysisScope, date: NaiveDate) -> Result<Vec<Session>> {
        let (from, to) = self.range_bounds(date, date);
        self.source
            .sessions_in_range(from, to)
            .map_err(|e| Error::source(scope, e.to_string()))
    }

    /// Local date a work block belongs to, looked up by id.
    pub fn block_date(&self, block_id: &str) -> Result<Option<NaiveDate>> {
        let today = self.today();
        let block = self
            .source
            .work_block_by_id(block_id)
            .map_err(|e| Error::source(AnalysisScope::Day(today), e.to_string()))?;
        Ok(block.map(|b| self.local_date(b.start)))
    }

    /// Local date a session started on, looked up by id.
    pub fn session_date(&self, session_id: &str) -> Result<Option<NaiveDate>> {
        let today = self.today();
        let session = self
            .source
            .session_by_id(session_id)
            .map_err(|e| Error::source(AnalysisScope::Day(today), e.to_string()))?;
        Ok(session.map(|s| self.local_date(s.start)))
    }

    // ============================================
    // Work day
    // ============================================

    /// Analyze one local calendar day, served from cache while fresh.
    pub fn analyze_work_day(&self, date: NaiveDate) -> Result<Arc<WorkDay>> {
        let key = CacheKey::Day(date).to_string();
        let (cached, computed) = self.cache.get_or_compute(&key, || {
            self.compute_work_day(date)
                .map(|day| CachedAnalysis::Day(Arc::new(day)))
        })?;

        match cached {
            CachedAnalysis::Day(day) => {
                if computed {
                    tracing::info!(
                        date = %date,
                        total_secs = day.total_time.num_seconds(),
                        sessions = day.session_count,
                        blocks = day.block_count,
                        "Work day analysis completed"
                    );
                } else {
                    tracing::debug!(date = %date, "Work day cache hit");
                }
                Ok(day)
            }
            other => Err(mismatched(&key, &other)),
        }
    }

    /// Derive a work day straight from the source, bypassing the cache.
    pub fn compute_work_day(&self, date: NaiveDate) -> Result<WorkDay> {
        let scope = AnalysisScope::Day(date);
        let now = self.clock.now();
        let is_complete = date < self.today();

        let blocks = self.fetch_blocks(scope, date, date)?;
        let sessions = self.fetch_sessions(scope, date)?;

        if blocks.is_empty() {
            let mut day = WorkDay::empty(date, is_complete);
            day.session_count = sessions.len();
            return Ok(day);
        }

        let first = blocks.iter().map(|b| b.start).min();
        let last = blocks.iter().map(|b| b.effective_end(now)).max();
        let total = blocks
            .iter()
            .fold(Duration::zero(), |acc, b| acc + b.duration(now));

        let session_ids: BTreeSet<&str> = blocks
            .iter()
            .map(|b| b.session_id.as_str())
            .chain(sessions.iter().map(|s| s.id.as_str()))
            .collect();

        let deep = analyze_deep_work(&blocks, self.projects.as_ref(), now);

        let mut day = WorkDay {
            date,
            first_activity: first,
            last_activity: last,
            total_time: total,
            break_time: Duration::zero(),
            session_count: session_ids.len(),
            block_count: blocks.len(),
            is_complete,
            deep_work_percentage: deep.deep_work_percentage,
            focus_score: deep.focus_score,
        };
        day.break_time = (day.work_span() - total).max(Duration::zero());

        if day.work_span() > Duration::hours(12) {
            tracing::debug!(
                date = %date,
                span_secs = day.work_span().num_seconds(),
                "Unusually long work span"
            );
        }

        Ok(day)
    }

    /// Drop cached analyses covering `date` and recompute the day.
    pub fn refresh_work_day(&self, date: NaiveDate) -> Result<Arc<WorkDay>> {
        let invalidated = self.invalidate_date(date);
        tracing::debug!(date = %date, invalidated, "Refreshing work day");
        self.analyze_work_day(date)
    }

    /// Mark every cached analysis covering `date` stale.
    pub fn invalidate_date(&self, date: NaiveDate) -> usize {
        self.cache.invalidate_covering(date)
    }

    // ============================================
    // Work week
    // ============================================

    /// Analyze the Monday-to-Sunday week containing `date`.
    pub fn analyze_work_week(&self, date: NaiveDate) -> Result<Arc<WorkWeek>> {
        let monday = Self::week_start(date);
        let key = CacheKey::Week(monday).to_string();

        let (cached, computed) = self.cache.get_or_compute_with(&key, || {
            let (week, degraded) = self.compute_work_week(monday)?;
            Ok((CachedAnalysis::Week(Arc::new(week)), !degraded))
        })?;

        match cached {
            CachedAnalysis::Week(week) => {
                if computed {
                    tracing::info!(
                        week_start = %monday,
                        total_secs = week.total_time.num_seconds(),
                        overtime_secs = week.overtime.num_seconds(),
                        worked_days = week.worked_days(),
                        "Work week analysis completed"
                    );
                } else {
                    tracing::debug!(week_start = %monday, "Work week cache hit");
                }
                Ok(week)
            }
            other => Err(mismatched(&key, &other)),
        }
    }

    /// Returns the week and whether any day had to be skipped.
    fn compute_work_week(&self, monday: NaiveDate) -> Result<(WorkWeek, bool)> {
        let today = self.today();
        let mut days = Vec::with_capacity(7);
        let mut failed = 0;

        for offset in 0..7 {
            let date = monday + Duration::days(offset);
            match self.analyze_work_day(date) {
                Ok(day) => days.push(day.as_ref().clone()),
                Err(e) => {
                    tracing::warn!(date = %date, error = %e, "Skipping day in work week");
                    failed += 1;
                    days.push(WorkDay::empty(date, date < today));
                }
            }
        }

        if failed == days.len() {
            return Err(Error::InsufficientData(AnalysisScope::Week(monday)));
        }

        let total = days
            .iter()
            .fold(Duration::zero(), |acc, d| acc + d.total_time);
        let standard = self.config.standard_week();
        let overtime = (total - standard).max(Duration::zero());

        let worked: Vec<&WorkDay> = days.iter().filter(|d| d.has_work()).collect();
        let average_day = if worked.is_empty() {
            Duration::zero()
        } else {
            total / worked.len() as i32
        };

        let totals: Vec<f64> = worked
            .iter()
            .map(|d| d.total_time.num_seconds() as f64)
            .collect();
        let consistency = pattern_consistency(&totals);

        let mut peak: Option<&WorkDay> = None;
        for day in worked.iter().copied() {
            if peak.map_or(true, |p| day.total_time > p.total_time) {
                peak = Some(day);
            }
        }
        let peak_day = peak.map(|d| d.date);

        let week_end = monday + Duration::days(6);
        let week = WorkWeek {
            week_start: monday,
            week_end,
            total_time: total,
            standard_time: standard,
            overtime,
            days,
            average_day,
            consistency,
            peak_day,
            is_complete: week_end < today,
        };
        Ok((week, failed > 0))
    }

    // ============================================
    // Patterns
    // ============================================

    /// Productivity pattern for `start..=end`, capped at the configured
    /// number of days after `start`.
    pub fn analyze_work_pattern(&self, start: NaiveDate, end: NaiveDate) -> Result<Arc<WorkPattern>> {
        Self::check_range(start, end)?;

        let limit = start + Duration::days(i64::from(self.config.max_pattern_days));
        let end = if end > limit {
            tracing::warn!(
                start = %start,
                requested_end = %end,
                max_days = self.config.max_pattern_days,
                "Limited pattern analysis date range"
            );
            limit
        } else {
            end
        };

        let key = CacheKey::Pattern(start, end).to_string();
        let (cached, computed) = self.cache.get_or_compute(&key, || {
            let blocks = self.fetch_blocks(AnalysisScope::Range(start, end), start, end)?;
            let samples = self.samples(&blocks);
            Ok(CachedAnalysis::Pattern(Arc::new(build_work_pattern(
                start, end, &samples, self.tz,
            ))))
        })?;

        match cached {
            CachedAnalysis::Pattern(pattern) => {
                if computed {
                    tracing::info!(
                        start = %start,
                        end = %end,
                        samples = pattern.sample_count,
                        rhythm = ?pattern.rhythm,
                        peak_hours = ?pattern.peak_hours,
                        "Work pattern analysis completed"
                    );
                }
                Ok(pattern)
            }
            other => Err(mismatched(&key, &other)),
        }
    }

    /// Hour-of-day activity counts for `start..=end`. Not cached.
    pub fn analyze_activity_patterns(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ActivityPatternAnalysis> {
        Self::check_range(start, end)?;
        let blocks = self.fetch_blocks(AnalysisScope::Range(start, end), start, end)?;
        let samples = self.samples(&blocks);
        Ok(analyze_activity_pattern(&samples, self.tz))
    }

    fn samples(&self, blocks: &[WorkBlock]) -> Vec<PatternSample> {
        let now = self.clock.now();
        blocks
            .iter()
            .map(|b| PatternSample::from_work_block(b, now))
            .collect()
    }

    // ============================================
    // Block-level analyses
    // ============================================

    pub fn analyze_deep_work(&self, blocks: &[WorkBlock]) -> DeepWorkAnalysis {
        analyze_deep_work(blocks, self.projects.as_ref(), self.clock.now())
    }

    pub fn analyze_project_focus(&self, blocks: &[WorkBlock]) -> ProjectFocusAnalysis {
        analyze_project_focus(blocks, self.projects.as_ref(), self.clock.now())
    }

    /// Work blocks for `start..=end`, for callers feeding the block-level analyses.
    pub fn work_blocks(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<WorkBlock>> {
        Self::check_range(start, end)?;
        self.fetch_blocks(AnalysisScope::Range(start, end), start, end)
    }

    // ============================================
    // Summaries and trends
    // ============================================

    /// Analyze each day in `start..=end`, skipping failed days and stopping
    /// when `cancel` fires.
    fn walk_days(&self, start: NaiveDate, end: NaiveDate, cancel: &CancellationToken) -> DayWalk {
        let mut walk = DayWalk {
            days: Vec::new(),
            skipped: Vec::new(),
            partial: false,
        };

        for date in start.iter_days().take_while(|d| *d <= end) {
            if cancel.is_cancelled() {
                tracing::info!(
                    start = %start,
                    end = %end,
                    stopped_at = %date,
                    "Day walk cancelled, returning partial result"
                );
                walk.partial = true;
                break;
            }
            match self.analyze_work_day(date) {
                Ok(day) => walk.days.push(day),
                Err(e) => {
                    tracing::warn!(date = %date, error = %e, "Skipping day");
                    walk.skipped.push(date);
                }
            }
        }

        walk
    }

    fn trend_points(days: &[Arc<WorkDay>]) -> Vec<TrendPoint> {
        days.iter()
            .filter(|d| d.has_work())
            .map(|d| TrendPoint {
                date: d.date,
                work_time: d.total_time,
                sessions: d.session_count,
                efficiency: d.active_ratio() * 100.0,
            })
            .collect()
    }

    /// Summarize `start..=end`.
    ///
    /// Cancellation returns what was gathered so far with `partial` set.
    /// Only complete summaries with no skipped days are cached.
    pub fn generate_activity_summary(
        &self,
        period: ReportPeriod,
        start: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Arc<ActivitySummary>> {
        Self::check_range(start, end)?;
        let key = CacheKey::Summary(period, start, end).to_string();

        let (cached, computed) = self.cache.get_or_compute_with(&key, || {
            let summary = self.compute_summary(period, start, end, cancel)?;
            let cacheable = !summary.partial && summary.skipped_days.is_empty();
            Ok((CachedAnalysis::Summary(Arc::new(summary)), cacheable))
        })?;

        match cached {
            CachedAnalysis::Summary(summary) => {
                if computed {
                    tracing::info!(
                        period = %period,
                        start = %start,
                        end = %end,
                        total_secs = summary.total_work_time.num_seconds(),
                        sessions = summary.total_sessions,
                        skipped = summary.skipped_days.len(),
                        partial = summary.partial,
                        "Activity summary generated"
                    );
                }
                Ok(summary)
            }
            other => Err(mismatched(&key, &other)),
        }
    }

    fn compute_summary(
        &self,
        period: ReportPeriod,
        start: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<ActivitySummary> {
        let walk = self.walk_days(start, end, cancel);
        if walk.days.is_empty() && !walk.skipped.is_empty() && !walk.partial {
            return Err(Error::InsufficientData(AnalysisScope::Range(start, end)));
        }

        let days_in_range = ((end - start).num_days() + 1) as i32;
        let mut total = Duration::zero();
        let mut span = Duration::zero();
        let mut sessions = 0usize;
        let mut blocks = 0usize;
        let mut breaks = 0usize;
        let mut focus_sum = 0.0;
        let mut worked = 0usize;

        for day in &walk.days {
            total = total + day.total_time;
            sessions += day.session_count;
            blocks += day.block_count;
            if day.has_work() {
                span = span + day.work_span();
                breaks += day.block_count.saturating_sub(1);
                focus_sum += day.focus_score;
                worked += 1;
            }
        }

        let daily_average = total / days_in_range;
        let average_session = if sessions > 0 {
            total / sessions as i32
        } else {
            Duration::zero()
        };
        let average_work_block = if blocks > 0 {
            total / blocks as i32
        } else {
            Duration::zero()
        };

        let goals = self.goal_progress(daily_average);

        let active_hours = total.num_seconds() as f64 / 3600.0;
        let mut efficiency = EfficiencyMetrics {
            active_ratio: if span > Duration::zero() {
                (total.num_seconds() as f64 / span.num_seconds() as f64).min(1.0)
            } else {
                0.0
            },
            focus_score: if worked > 0 {
                focus_sum / worked as f64
            } else {
                0.0
            },
            interruption_rate: if active_hours > 0.0 {
                breaks as f64 / active_hours
            } else {
                0.0
            },
            peak_efficiency: None,
        };

        if !walk.partial && worked > 0 {
            match self.analyze_work_pattern(start, end) {
                Ok(pattern) => efficiency.peak_efficiency = pattern.peak_window(),
                Err(e) => {
                    tracing::warn!(start = %start, end = %end, error = %e, "Peak efficiency unavailable")
                }
            }
        }

        Ok(ActivitySummary {
            period,
            start_date: start,
            end_date: end,
            total_work_time: total,
            total_sessions: sessions,
            total_work_blocks: blocks,
            average_session,
            average_work_block,
            daily_average,
            trends: trend_from_points(Self::trend_points(&walk.days), walk.partial),
            goals,
            efficiency,
            skipped_days: walk.skipped,
            partial: walk.partial,
        })
    }

    fn goal_progress(&self, daily_average: Duration) -> GoalProgress {
        let daily_goal = self.config.daily_goal();
        let weekly_goal = self.config.standard_week();

        let ratio = |achieved: Duration, goal: Duration| {
            if goal > Duration::zero() {
                (achieved.num_seconds() as f64 / goal.num_seconds() as f64).min(1.0)
            } else {
                0.0
            }
        };

        let daily_progress = ratio(daily_average, daily_goal);
        let weekly_progress = ratio(daily_average * 7, weekly_goal);

        GoalProgress {
            daily_goal,
            weekly_goal,
            daily_progress,
            weekly_progress,
            on_track: weekly_progress >= 0.9,
        }
    }

    /// Day-over-day trend between the first and last worked day in range.
    pub fn get_work_day_trends(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<TrendAnalysis> {
        Self::check_range(start, end)?;
        let walk = self.walk_days(start, end, cancel);
        if walk.days.is_empty() && !walk.skipped.is_empty() && !walk.partial {
            return Err(Error::InsufficientData(AnalysisScope::Range(start, end)));
        }

        let trend = trend_from_points(Self::trend_points(&walk.days), walk.partial);
        tracing::info!(
            start = %start,
            end = %end,
            direction = ?trend.direction,
            work_time_change = trend.work_time_change,
            partial = trend.partial,
            "Work day trends analyzed"
        );
        Ok(trend)
    }
}
