//! Temporal segmentation of labelled blocks
//!
//! Both segmenters sort their input by start time and make a single
//! left-to-right pass, extending the current run while a continuity test
//! holds and closing it otherwise.

use super::focus::FocusBlock;
use super::scoring::flow_quality;
use crate::source::ProjectDirectory;
use crate::types::{duration_secs, WorkBlock};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Largest gap (exclusive) between two deep blocks of one flow session.
pub const FLOW_GAP_THRESHOLD: Duration = Duration::minutes(15);
/// Smallest number of blocks in a flow session.
pub const FLOW_MIN_BLOCKS: usize = 2;
/// Smallest summed duration of a flow session.
pub const FLOW_MIN_DURATION: Duration = Duration::minutes(45);
/// Largest gap (exclusive) between two blocks of one project session.
pub const PROJECT_GAP_THRESHOLD: Duration = Duration::minutes(30);

// ============================================
// Flow sessions
// ============================================

/// A qualifying run of deep or flow blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSession {
    pub start: DateTime<Utc>,
    /// Latest end over the blocks
    pub end: DateTime<Utc>,
    /// Sum of block durations, which can be less than the wall-clock span
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Mean focus weight of the blocks (0-1)
    pub quality: f64,
    pub blocks: Vec<FocusBlock>,
}

impl FlowSession {
    /// Close a run. Returns `None` unless it has enough blocks and time.
    fn finalize(blocks: Vec<FocusBlock>) -> Option<Self> {
        if blocks.len() < FLOW_MIN_BLOCKS {
            return None;
        }
        let duration = blocks
            .iter()
            .fold(Duration::zero(), |acc, b| acc + b.duration);
        if duration < FLOW_MIN_DURATION {
            return None;
        }

        let start = blocks[0].start;
        let end = blocks.iter().map(|b| b.end).fold(start, |acc, e| acc.max(e));
        let quality = flow_quality(&blocks);

        Some(Self {
            start,
            end,
            duration,
            quality,
            blocks,
        })
    }
}

/// Group focus blocks into flow sessions.
///
/// A block joins the current run when it starts less than 15 minutes after
/// the previous block ended and both are at least [`FocusLevel::Deep`].
/// Runs with fewer than two blocks or under 45 minutes are dropped.
///
/// [`FocusLevel::Deep`]: super::focus::FocusLevel::Deep
pub fn detect_flow_sessions(blocks: &[FocusBlock]) -> Vec<FlowSession> {
    let mut sorted: Vec<FocusBlock> = blocks.to_vec();
    sorted.sort_by_key(|b| b.start);

    let mut sessions = Vec::new();
    let mut run: Vec<FocusBlock> = Vec::new();

    for block in sorted {
        let extends = run.last().is_some_and(|prev| {
            block.start - prev.end < FLOW_GAP_THRESHOLD
                && prev.focus_level.is_deep()
                && block.focus_level.is_deep()
        });

        if !extends && !run.is_empty() {
            sessions.extend(FlowSession::finalize(std::mem::take(&mut run)));
        }
        run.push(block);
    }
    sessions.extend(FlowSession::finalize(run));

    sessions
}

// ============================================
// Project sessions
// ============================================

/// A continuous run of work on one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSession {
    pub project_id: String,
    pub project_name: String,
    pub start: DateTime<Utc>,
    /// Latest end (or last activity for open blocks) over the blocks
    pub end: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub blocks: Vec<WorkBlock>,
}

impl ProjectSession {
    fn finalize(blocks: Vec<WorkBlock>, projects: &dyn ProjectDirectory, now: DateTime<Utc>) -> Self {
        let first = &blocks[0];
        let project_id = first.project_id.clone();
        let project_name = projects.display_name(&project_id);
        let start = first.start;
        let end = blocks
            .iter()
            .map(WorkBlock::continuity_end)
            .fold(start, |acc, e| acc.max(e));
        let duration = blocks
            .iter()
            .fold(Duration::zero(), |acc, b| acc + b.duration(now));

        Self {
            project_id,
            project_name,
            start,
            end,
            duration,
            blocks,
        }
    }
}

/// Group work blocks into per-project sessions.
///
/// A block joins the current session when it has the same project id and
/// starts less than 30 minutes after the previous block's end (or its last
/// activity while open). A gap of exactly 30 minutes is a switch.
pub fn group_project_sessions(
    blocks: &[WorkBlock],
    projects: &dyn ProjectDirectory,
    now: DateTime<Utc>,
) -> Vec<ProjectSession> {
    let mut sorted: Vec<WorkBlock> = blocks.to_vec();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let mut sessions = Vec::new();
    let mut run: Vec<WorkBlock> = Vec::new();

    for block in sorted {
        let extends = run.last().is_some_and(|prev| {
            prev.project_id == block.project_id
                && block.start - prev.continuity_end() < PROJECT_GAP_THRESHOLD
        });

        if !extends && !run.is_empty() {
            sessions.push(ProjectSession::finalize(
                std::mem::take(&mut run),
                projects,
                now,
            ));
        }
        run.push(block);
    }
    if !run.is_empty() {
        sessions.push(ProjectSession::finalize(run, projects, now));
    }

    sessions
}

/// Context switches and the time lost to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchingCost {
    /// Boundaries between consecutive project sessions
    pub context_switches: usize,
    /// Sum of inter-session gaps under 30 minutes; overlaps count as zero
    pub cost: Duration,
}

/// Measure switching between consecutive project sessions.
pub fn switching_cost(sessions: &[ProjectSession]) -> SwitchingCost {
    let context_switches = sessions.len().saturating_sub(1);
    let cost = sessions
        .windows(2)
        .map(|pair| pair[1].start - pair[0].end)
        .filter(|gap| *gap < PROJECT_GAP_THRESHOLD)
        .map(|gap| gap.max(Duration::zero()))
        .fold(Duration::zero(), |acc, gap| acc + gap);

    SwitchingCost {
        context_switches,
        cost,
    }
}
