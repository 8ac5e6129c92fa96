//! workpulse-analyze - CLI tool to analyze work patterns
//!
//! Loads work blocks, sessions and projects from a JSON activity export and
//! prints day, week, pattern and summary analyses as text or JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use workpulse_core::aggregator::{self, AggregationStats};
use workpulse_core::analytics::{
    ActivityPatternAnalysis, DeepWorkAnalysis, ProjectFocusAnalysis, WorkPattern,
};
use workpulse_core::{
    ActivitySummary, Config, InMemoryActivitySource, ReportPeriod, SystemClock, TrendAnalysis,
    WorkAnalyzer, WorkDay, WorkWeek,
};

#[derive(Parser)]
#[command(name = "workpulse-analyze")]
#[command(about = "Analyze work patterns from an activity export")]
#[command(version)]
struct Args {
    /// Activity export: JSON with work_blocks, sessions and projects
    #[arg(short, long)]
    blocks: PathBuf,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Stop summaries and trends after this many seconds and print what was gathered
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Clone, Copy)]
struct RangeArgs {
    /// First date (YYYY-MM-DD), defaults to six days before the end
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl RangeArgs {
    fn resolve(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = self.end.unwrap_or(today);
        let start = self.start.unwrap_or(end - Duration::days(6));
        (start, end)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one calendar day
    Day {
        /// Date to analyze (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Analyze the Monday-to-Sunday week containing a date
    Week {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Hour-of-day productivity pattern and work rhythm
    Pattern(RangeArgs),
    /// Focus levels, flow sessions and context switching
    DeepWork(RangeArgs),
    /// Project sessions and switching cost
    ProjectFocus(RangeArgs),
    /// Activity counts per hour of day
    Activity(RangeArgs),
    /// Totals, goals, efficiency and trends for a period
    Summary {
        /// daily, weekly, monthly or custom
        #[arg(long, default_value = "weekly")]
        period: ReportPeriod,

        #[command(flatten)]
        range: RangeArgs,
    },
    /// Change between the first and last worked day of a range
    Trends(RangeArgs),
    /// Run the aggregation coordinator, then print its counters
    Aggregate {
        /// Seconds to keep the coordinator running before shutdown
        #[arg(long, default_value_t = 0)]
        run_secs: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let json = match args.format.as_str() {
        "json" => true,
        "text" => false,
        other => anyhow::bail!("unknown output format '{}' (expected text or json)", other),
    };

    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        workpulse_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let source = Arc::new(
        InMemoryActivitySource::from_json_file(&args.blocks)
            .with_context(|| format!("failed to load activity from {}", args.blocks.display()))?,
    );
    tracing::info!(
        path = %args.blocks.display(),
        blocks = source.work_block_count(),
        bounds = ?source.time_bounds(),
        "Activity export loaded"
    );

    let analyzer = WorkAnalyzer::from_config(source.clone(), source, Arc::new(SystemClock), &config);
    let today = analyzer.today();
    let tz = analyzer.timezone();

    match args.command {
        Command::Day { date } => {
            let day = analyzer
                .analyze_work_day(date.unwrap_or(today))
                .context("work day analysis failed")?;
            emit(json, &*day, |d| print_day(d, tz))?;
        }
        Command::Week { date } => {
            let week = analyzer
                .analyze_work_week(date.unwrap_or(today))
                .context("work week analysis failed")?;
            emit(json, &*week, print_week)?;
        }
        Command::Pattern(range) => {
            let (start, end) = range.resolve(today);
            let pattern = analyzer
                .analyze_work_pattern(start, end)
                .context("work pattern analysis failed")?;
            emit(json, &*pattern, print_pattern)?;
        }
        Command::DeepWork(range) => {
            let (start, end) = range.resolve(today);
            let blocks = analyzer.work_blocks(start, end)?;
            emit(json, &analyzer.analyze_deep_work(&blocks), |a| {
                print_deep_work(a, tz)
            })?;
        }
        Command::ProjectFocus(range) => {
            let (start, end) = range.resolve(today);
            let blocks = analyzer.work_blocks(start, end)?;
            emit(json, &analyzer.analyze_project_focus(&blocks), |a| {
                print_project_focus(a, tz)
            })?;
        }
        Command::Activity(range) => {
            let (start, end) = range.resolve(today);
            let analysis = analyzer
                .analyze_activity_patterns(start, end)
                .context("activity pattern analysis failed")?;
            emit(json, &analysis, print_activity)?;
        }
        Command::Summary { period, range } => {
            let (start, end) = range.resolve(today);
            let cancel = cancel_after(args.timeout_secs);
            let summary = analyzer
                .generate_activity_summary(period, start, end, &cancel)
                .context("activity summary failed")?;
            emit(json, &*summary, print_summary)?;
        }
        Command::Trends(range) => {
            let (start, end) = range.resolve(today);
            let cancel = cancel_after(args.timeout_secs);
            let trend = analyzer
                .get_work_day_trends(start, end, &cancel)
                .context("trend analysis failed")?;
            emit(json, &trend, print_trends)?;
        }
        Command::Aggregate { run_secs } => {
            let stats = run_aggregation(analyzer, &config, run_secs)?;
            emit(json, &stats, print_aggregation)?;
        }
    }

    Ok(())
}

/// Token cancelled after `timeout_secs`, or never.
fn cancel_after(timeout_secs: Option<u64>) -> CancellationToken {
    let token = CancellationToken::new();
    if let Some(secs) = timeout_secs {
        let deadline = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_secs(secs));
            deadline.cancel();
        });
    }
    token
}

fn run_aggregation(analyzer: WorkAnalyzer, config: &Config, run_secs: u64) -> Result<AggregationStats> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let analyzer = Arc::new(analyzer);

    let stats = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let (handle, _sender) = aggregator::spawn(analyzer, config, cancel.clone());
        tokio::time::sleep(std::time::Duration::from_secs(run_secs)).await;
        cancel.cancel();
        aggregator::join(handle).await
    })?;
    Ok(stats)
}

// ============================================
// Output
// ============================================

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text(value);
    }
    Ok(())
}

/// Format a duration as "1h 05m" or "12m".
fn format_duration(d: Duration) -> String {
    let mins = d.num_minutes();
    if mins >= 60 {
        format!("{}h {:02}m", mins / 60, mins % 60)
    } else {
        format!("{}m", mins)
    }
}

fn format_time(t: DateTime<Utc>, tz: FixedOffset) -> String {
    t.with_timezone(&tz).format("%H:%M").to_string()
}

fn print_day(day: &WorkDay, tz: FixedOffset) {
    let state = if day.is_complete { "complete" } else { "in progress" };
    println!("Work day {} ({})", day.date, state);
    if !day.has_work() {
        println!("  No work recorded.");
        return;
    }
    if let (Some(first), Some(last)) = (day.first_activity, day.last_activity) {
        println!("  Span:        {} - {}", format_time(first, tz), format_time(last, tz));
    }
    println!("  Worked:      {}", format_duration(day.total_time));
    println!("  Breaks:      {}", format_duration(day.break_time));
    println!("  Blocks:      {} in {} session(s)", day.block_count, day.session_count);
    println!("  Deep work:   {:.1}%", day.deep_work_percentage);
    println!("  Focus score: {:.1}", day.focus_score);
}

fn print_week(week: &WorkWeek) {
    println!("Work week {} to {}", week.week_start, week.week_end);
    for day in &week.days {
        println!(
            "  {} {:>8}",
            day.date.format("%a %Y-%m-%d"),
            format_duration(day.total_time)
        );
    }
    println!("  Total:       {}", format_duration(week.total_time));
    println!("  Overtime:    {}", format_duration(week.overtime));
    println!("  Average day: {}", format_duration(week.average_day));
    println!("  Consistency: {:.2}", week.consistency);
    if let Some(peak) = week.peak_day {
        println!("  Peak day:    {}", peak);
    }
}

fn print_pattern(pattern: &WorkPattern) {
    println!(
        "Work pattern {} to {} ({} samples)",
        pattern.start_date, pattern.end_date, pattern.sample_count
    );
    println!("  Rhythm:      {:?}", pattern.rhythm);
    println!("  Peak hours:  {:?}", pattern.peak_hours);
    if let Some(window) = pattern.peak_window() {
        println!("  Best hour:   {}", window);
    }
    println!("  Consistency: {:.2}", pattern.consistency);
}

fn print_deep_work(analysis: &DeepWorkAnalysis, tz: FixedOffset) {
    println!("Deep work");
    for block in &analysis.focus_blocks {
        println!(
            "  {} {:>8}  {:<10} {}{}",
            format_time(block.start, tz),
            format_duration(block.duration),
            block.focus_level,
            block.project_name,
            if block.flow_state { "  [flow]" } else { "" }
        );
    }
    println!(
        "  Deep:        {} ({:.1}%)",
        format_duration(analysis.deep_work_time),
        analysis.deep_work_percentage
    );
    println!("  Shallow:     {}", format_duration(analysis.shallow_work_time));
    println!("  Flow runs:   {}", analysis.flow_sessions.len());
    println!("  Switches:    {}", analysis.context_switches);
    println!("  Focus score: {:.1}", analysis.focus_score);
    print_recommendations(&analysis.recommendations);
}

fn print_project_focus(analysis: &ProjectFocusAnalysis, tz: FixedOffset) {
    println!("Project focus");
    for session in &analysis.project_sessions {
        println!(
            "  {} - {} {:>8}  {}",
            format_time(session.start, tz),
            format_time(session.end, tz),
            format_duration(session.duration),
            session.project_name
        );
    }
    println!("  Switches:    {}", analysis.context_switches);
    println!("  Switch cost: {}", format_duration(analysis.switching_cost));
    println!("  Efficiency:  {:.1}%", analysis.focus_efficiency);
    print_recommendations(&analysis.recommendations);
}

fn print_activity(analysis: &ActivityPatternAnalysis) {
    println!("Activity pattern ({} activities)", analysis.total_activities);
    for hour in analysis.hourly_distribution.iter().filter(|h| h.activities > 0) {
        println!(
            "  {:02}:00 {:>4} {}",
            hour.hour,
            hour.activities,
            "#".repeat((hour.intensity * 40.0).round() as usize)
        );
    }
    println!("  Rhythm:      {:?}", analysis.work_rhythm);
    println!("  Consistency: {:.1}", analysis.consistency_score);
    print_recommendations(&analysis.recommendations);
}

fn print_summary(summary: &ActivitySummary) {
    let partial = if summary.partial { " [partial]" } else { "" };
    println!(
        "{} summary {} to {}{}",
        summary.period, summary.start_date, summary.end_date, partial
    );
    println!("  Worked:        {}", format_duration(summary.total_work_time));
    println!("  Daily average: {}", format_duration(summary.daily_average));
    println!(
        "  Sessions:      {} (avg {})",
        summary.total_sessions,
        format_duration(summary.average_session)
    );
    println!(
        "  Blocks:        {} (avg {})",
        summary.total_work_blocks,
        format_duration(summary.average_work_block)
    );
    println!(
        "  Goals:         {:.0}% daily, {:.0}% weekly{}",
        summary.goals.daily_progress * 100.0,
        summary.goals.weekly_progress * 100.0,
        if summary.goals.on_track { ", on track" } else { "" }
    );
    println!("  Active ratio:  {:.2}", summary.efficiency.active_ratio);
    if let Some(ref peak) = summary.efficiency.peak_efficiency {
        println!("  Peak hour:     {}", peak);
    }
    println!(
        "  Trend:         {:?} ({:+.1}% work time)",
        summary.trends.direction, summary.trends.work_time_change
    );
    if !summary.skipped_days.is_empty() {
        println!("  Skipped days:  {}", summary.skipped_days.len());
    }
}

fn print_trends(trend: &TrendAnalysis) {
    let partial = if trend.partial { " [partial]" } else { "" };
    println!("Trend: {:?}{}", trend.direction, partial);
    for point in &trend.points {
        println!(
            "  {} {:>8}  {} session(s)",
            point.date,
            format_duration(point.work_time),
            point.sessions
        );
    }
    println!("  Work time:   {:+.1}%", trend.work_time_change);
    println!("  Sessions:    {:+.1}%", trend.session_change);
    println!("  Efficiency:  {:+.1}%", trend.efficiency_change);
}

fn print_aggregation(stats: &AggregationStats) {
    println!("Aggregation finished");
    println!("  Events:        {}", stats.events_processed);
    println!("  Passes:        {}", stats.passes);
    println!("  Interrupted:   {}", stats.interrupted_passes);
    println!("  Days refreshed: {}", stats.days_refreshed);
    println!("  Day failures:  {}", stats.day_failures);
    println!("  Purged:        {}", stats.entries_purged);
}

fn print_recommendations(recs: &[String]) {
    if recs.is_empty() {
        return;
    }
    println!("  Recommendations:");
    for rec in recs {
        println!("    - {}", rec);
    }
}
