//! Focus classification
//!
//! Every work block gets two independent signals:
//! - a [`FocusLevel`] from an ordered rule table (first match wins)
//! - a flow-state flag from [`detect_flow_state`]
//!
//! The two can disagree. A 50 minute block with 10 events (0.2 per minute)
//! is `Deep` by the table but still flagged as flow state.

use crate::types::{duration_secs, WorkBlock};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth of concentration of a work block, ordered from shallow to deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusLevel {
    Distracted,
    Focused,
    Deep,
    Flow,
}

impl FocusLevel {
    /// Weight used by flow quality.
    pub fn quality_weight(self) -> f64 {
        match self {
            FocusLevel::Flow => 1.0,
            FocusLevel::Deep => 0.8,
            FocusLevel::Focused => 0.6,
            FocusLevel::Distracted => 0.3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FocusLevel::Distracted => "distracted",
            FocusLevel::Focused => "focused",
            FocusLevel::Deep => "deep",
            FocusLevel::Flow => "flow",
        }
    }

    pub fn is_deep(self) -> bool {
        self >= FocusLevel::Deep
    }
}

impl fmt::Display for FocusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractional minutes in a duration.
pub(crate) fn minutes(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 60_000.0
}

/// Activity events per minute. `None` for zero-length blocks.
pub fn activity_rate(duration: Duration, activity_count: u64) -> Option<f64> {
    let mins = minutes(duration);
    if mins > 0.0 {
        Some(activity_count as f64 / mins)
    } else {
        None
    }
}

/// One row of the classification table.
struct FocusRule {
    name: &'static str,
    matches: fn(f64, Option<f64>) -> bool,
    level: FocusLevel,
}

fn rate_above(rate: Option<f64>, threshold: f64) -> bool {
    rate.is_some_and(|r| r > threshold)
}

/// Evaluated top to bottom. Ranges overlap, so order matters.
const FOCUS_RULES: [FocusRule; 6] = [
    FocusRule {
        name: "under_5m",
        matches: |mins, _| mins < 5.0,
        level: FocusLevel::Distracted,
    },
    FocusRule {
        name: "under_15m",
        matches: |mins, _| mins < 15.0,
        level: FocusLevel::Focused,
    },
    FocusRule {
        name: "25m_busy",
        matches: |mins, rate| mins >= 25.0 && rate_above(rate, 0.5),
        level: FocusLevel::Deep,
    },
    FocusRule {
        name: "45m_steady",
        matches: |mins, rate| mins >= 45.0 && rate_above(rate, 0.3),
        level: FocusLevel::Flow,
    },
    FocusRule {
        name: "25m_sparse",
        matches: |mins, _| mins >= 25.0,
        level: FocusLevel::Deep,
    },
    FocusRule {
        name: "fallback",
        matches: |_, _| true,
        level: FocusLevel::Focused,
    },
];

/// Classify a block by its duration and activity count.
pub fn classify_focus_level(duration: Duration, activity_count: u64) -> FocusLevel {
    let mins = minutes(duration);
    let rate = activity_rate(duration, activity_count);

    FOCUS_RULES
        .iter()
        .find(|rule| (rule.matches)(mins, rate))
        .map(|rule| {
            tracing::trace!(rule = rule.name, level = %rule.level, "Focus rule matched");
            rule.level
        })
        .unwrap_or(FocusLevel::Focused)
}

/// Flow state: at least 45 minutes at 0.2 to 1.0 events per minute.
pub fn detect_flow_state(block: &WorkBlock, duration: Duration) -> bool {
    if duration < Duration::minutes(45) {
        return false;
    }
    activity_rate(duration, block.activity_count).is_some_and(|rate| (0.2..=1.0).contains(&rate))
}

/// A work block labelled with its focus signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub project_name: String,
    /// Events per minute, absent for zero-length blocks
    pub activity_rate: Option<f64>,
    pub focus_level: FocusLevel,
    pub flow_state: bool,
}

impl FocusBlock {
    /// Label `block`, measuring open blocks against `now`.
    pub fn from_work_block(block: &WorkBlock, project_name: String, now: DateTime<Utc>) -> Self {
        let duration = block.duration(now);
        Self {
            start: block.start,
            end: block.effective_end(now),
            duration,
            project_name,
            activity_rate: activity_rate(duration, block.activity_count),
            focus_level: classify_focus_level(duration, block.activity_count),
            flow_state: detect_flow_state(block, duration),
        }
    }
}
