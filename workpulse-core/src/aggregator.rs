//! Background aggregation
//!
//! Keeps cached day analyses current while activity is being recorded.
//!
//! ```text
//!  capture hooks ──► EventSender ──(bounded queue)──► AggregationCoordinator
//!                        │ full: drop + warn               │
//!                                                          ├─ event:       refresh affected day(s)
//!                                                          ├─ interval:    refresh days since last pass
//!                                                          ├─ maintenance: purge old cache entries
//!                                                          └─ cancel:      drain queue, final pass, stop
//! ```
//!
//! Recomputation reads the activity source synchronously, so it runs on the
//! blocking pool. A day that fails to aggregate is logged and skipped.

use crate::analytics::WorkAnalyzer;
use crate::config::{AggregationConfig, Config};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Lifecycle signal emitted by the capture side.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    SessionStarted {
        session_id: String,
        at: DateTime<Utc>,
    },
    SessionEnded {
        session_id: String,
        at: DateTime<Utc>,
    },
    WorkBlockStarted {
        block_id: String,
        at: DateTime<Utc>,
    },
    WorkBlockFinalized {
        block_id: String,
        at: DateTime<Utc>,
    },
}

impl ActivityEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            ActivityEvent::SessionStarted { at, .. }
            | ActivityEvent::SessionEnded { at, .. }
            | ActivityEvent::WorkBlockStarted { at, .. }
            | ActivityEvent::WorkBlockFinalized { at, .. } => *at,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ActivityEvent::SessionStarted { .. } => "session_started",
            ActivityEvent::SessionEnded { .. } => "session_ended",
            ActivityEvent::WorkBlockStarted { .. } => "work_block_started",
            ActivityEvent::WorkBlockFinalized { .. } => "work_block_finalized",
        }
    }
}

// ============================================
// Event sender
// ============================================

/// Cloneable handle for submitting events. Never blocks.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ActivityEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Queue an event. Returns `false` if it was dropped.
    pub fn send(&self, event: ActivityEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    event = event.kind(),
                    at = %event.at(),
                    "Aggregation queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(event = event.kind(), "Aggregation coordinator stopped, dropping event");
                false
            }
        }
    }

    pub fn on_session_started(&self, session_id: impl Into<String>, at: DateTime<Utc>) -> bool {
        self.send(ActivityEvent::SessionStarted {
            session_id: session_id.into(),
            at,
        })
    }

    pub fn on_session_ended(&self, session_id: impl Into<String>, at: DateTime<Utc>) -> bool {
        self.send(ActivityEvent::SessionEnded {
            session_id: session_id.into(),
            at,
        })
    }

    pub fn on_work_block_started(&self, block_id: impl Into<String>, at: DateTime<Utc>) -> bool {
        self.send(ActivityEvent::WorkBlockStarted {
            block_id: block_id.into(),
            at,
        })
    }

    pub fn on_work_block_finalized(&self, block_id: impl Into<String>, at: DateTime<Utc>) -> bool {
        self.send(ActivityEvent::WorkBlockFinalized {
            block_id: block_id.into(),
            at,
        })
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ============================================
// Coordinator
// ============================================

/// Counters reported when the coordinator stops.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub events_processed: u64,
    pub passes: u64,
    /// Passes stopped early by cancellation
    pub interrupted_passes: u64,
    pub days_refreshed: u64,
    pub day_failures: u64,
    pub maintenance_runs: u64,
    pub entries_purged: u64,
}

pub struct AggregationCoordinator {
    analyzer: Arc<WorkAnalyzer>,
    config: AggregationConfig,
    retention: Duration,
    rx: mpsc::Receiver<ActivityEvent>,
    last_pass: Option<NaiveDate>,
    stats: AggregationStats,
}

impl AggregationCoordinator {
    /// Create a coordinator and the sender feeding it.
    pub fn new(analyzer: Arc<WorkAnalyzer>, config: &Config) -> (Self, EventSender) {
        let (tx, rx) = mpsc::channel(config.aggregation.queue_capacity.max(1));
        let sender = EventSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let coordinator = Self {
            analyzer,
            config: config.aggregation.clone(),
            retention: config.cache.retention(),
            rx,
            last_pass: None,
            stats: AggregationStats::default(),
        };
        (coordinator, sender)
    }

    /// Process events and ticks until `cancel` fires.
    ///
    /// On shutdown, queued events are drained and a final pass runs.
    pub async fn run(mut self, cancel: CancellationToken) -> AggregationStats {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut maintenance = tokio::time::interval(self.config.maintenance_interval());
        maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let periodic = self.config.enabled;
        let mut events_open = true;

        tracing::info!(
            periodic,
            interval_mins = self.config.interval_minutes,
            queue_capacity = self.config.queue_capacity,
            "Aggregation coordinator started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick(), if periodic => {
                    self.aggregation_pass(cancel.clone()).await;
                }
                _ = maintenance.tick() => {
                    self.maintenance();
                }
                event = self.rx.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::debug!("All event senders dropped");
                        events_open = false;
                    }
                },
            }
        }

        self.rx.close();
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event).await;
        }
        // The shutdown pass itself is not cancellable
        self.aggregation_pass(CancellationToken::new()).await;

        tracing::info!(
            events = self.stats.events_processed,
            passes = self.stats.passes,
            days_refreshed = self.stats.days_refreshed,
            failures = self.stats.day_failures,
            "Aggregation coordinator stopped"
        );
        self.stats
    }

    async fn handle_event(&mut self, event: ActivityEvent) {
        let analyzer = self.analyzer.clone();
        let kind = event.kind();
        tracing::debug!(event = kind, at = %event.at(), "Handling activity event");

        match tokio::task::spawn_blocking(move || refresh_for_event(&analyzer, &event)).await {
            Ok(results) => {
                for (date, result) in results {
                    self.record(date, result, kind);
                }
            }
            Err(e) => tracing::warn!(event = kind, error = %e, "Event refresh task failed"),
        }
        self.stats.events_processed += 1;
    }

    /// Refresh every day from the last pass (or the initial lookback) to today.
    ///
    /// `cancel` is checked between days. An interrupted pass resumes from
    /// the first day it did not reach.
    async fn aggregation_pass(&mut self, cancel: CancellationToken) {
        let analyzer = self.analyzer.clone();
        let today = analyzer.today();
        let since = self.last_pass.unwrap_or_else(|| {
            analyzer.local_date(analyzer.clock().now() - self.config.initial_lookback())
        });

        let outcome = tokio::task::spawn_blocking(move || {
            let mut results = Vec::new();
            for date in since.iter_days().take_while(|date| *date <= today) {
                if cancel.is_cancelled() {
                    return (results, Some(date));
                }
                results.push((date, analyzer.refresh_work_day(date).map(|_| ())));
            }
            (results, None)
        })
        .await;

        self.stats.passes += 1;
        match outcome {
            Ok((results, interrupted_at)) => {
                let days = results.len();
                for (date, result) in results {
                    self.record(date, result, "periodic");
                }
                match interrupted_at {
                    Some(resume) => {
                        self.stats.interrupted_passes += 1;
                        self.last_pass = Some(resume);
                        tracing::info!(
                            since = %since,
                            resume = %resume,
                            days,
                            "Aggregation pass interrupted"
                        );
                    }
                    None => {
                        self.last_pass = Some(today);
                        tracing::info!(since = %since, until = %today, days, "Aggregation pass completed");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Aggregation pass task failed"),
        }
    }

    /// Purge expired cache entries. Returns the number removed.
    pub fn maintenance(&mut self) -> usize {
        let cache = self.analyzer.cache();
        let removed = cache.purge_older_than(self.retention) + cache.evict_if_over_capacity();
        self.stats.maintenance_runs += 1;
        self.stats.entries_purged += removed as u64;
        tracing::info!(
            removed,
            entries = cache.len(),
            retention_days = self.retention.num_days(),
            "Cache maintenance completed"
        );
        removed
    }

    fn record(&mut self, date: NaiveDate, result: Result<()>, trigger: &'static str) {
        match result {
            Ok(()) => {
                self.stats.days_refreshed += 1;
                tracing::debug!(date = %date, trigger, "Day re-aggregated");
            }
            Err(e) => {
                self.stats.day_failures += 1;
                tracing::warn!(date = %date, trigger, error = %e, "Day aggregation failed, skipping");
            }
        }
    }
}

/// Days touched by an event: the event's own date, plus the start date of
/// the block or session it finishes when that lies on another day.
fn refresh_for_event(
    analyzer: &WorkAnalyzer,
    event: &ActivityEvent,
) -> Vec<(NaiveDate, Result<()>)> {
    let mut dates = vec![analyzer.local_date(event.at())];

    let started_on: Result<Option<NaiveDate>> = match event {
        ActivityEvent::SessionEnded { session_id, .. } => analyzer.session_date(session_id),
        ActivityEvent::WorkBlockFinalized { block_id, .. } => analyzer.block_date(block_id),
        _ => Ok(None),
    };
    match started_on {
        Ok(Some(date)) if !dates.contains(&date) => dates.insert(0, date),
        Ok(_) => {}
        Err(e) => tracing::warn!(event = event.kind(), error = %e, "Could not resolve start date"),
    }

    dates
        .into_iter()
        .map(|date| (date, analyzer.refresh_work_day(date).map(|_| ())))
        .collect()
}

/// Spawn the coordinator on the current runtime.
pub fn spawn(
    analyzer: Arc<WorkAnalyzer>,
    config: &Config,
    cancel: CancellationToken,
) -> (tokio::task::JoinHandle<AggregationStats>, EventSender) {
    let (coordinator, sender) = AggregationCoordinator::new(analyzer, config);
    (tokio::spawn(coordinator.run(cancel)), sender)
}

/// Wait for a spawned coordinator, mapping a panicked task to an error.
pub async fn join(handle: tokio::task::JoinHandle<AggregationStats>) -> Result<AggregationStats> {
    handle.await.map_err(|e| Error::Task(e.to_string()))
}
