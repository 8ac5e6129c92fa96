//! Deep work and project focus analysis over a set of work blocks.

use super::focus::FocusBlock;
use super::scoring::{focus_score, fragmentation_score};
use super::segment::{
    detect_flow_sessions, group_project_sessions, switching_cost, FlowSession, ProjectSession,
};
use crate::source::ProjectDirectory;
use crate::types::{duration_secs, WorkBlock};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How much of the work was deep, and how it was interrupted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepWorkAnalysis {
    #[serde(with = "duration_secs")]
    pub deep_work_time: Duration,
    #[serde(with = "duration_secs")]
    pub shallow_work_time: Duration,
    pub deep_work_percentage: f64,
    pub focus_score: f64,
    /// Changes of project name between consecutive blocks
    pub context_switches: usize,
    pub fragmentation_score: f64,
    pub focus_blocks: Vec<FocusBlock>,
    pub flow_sessions: Vec<FlowSession>,
    pub recommendations: Vec<String>,
}

impl Default for DeepWorkAnalysis {
    fn default() -> Self {
        Self {
            deep_work_time: Duration::zero(),
            shallow_work_time: Duration::zero(),
            deep_work_percentage: 0.0,
            focus_score: 0.0,
            context_switches: 0,
            fragmentation_score: 0.0,
            focus_blocks: Vec::new(),
            flow_sessions: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Label every block and derive deep work metrics.
///
/// Blocks are processed in start order. Fragmentation and flow sessions are
/// computed before the focus score, which depends on both.
pub fn analyze_deep_work(
    blocks: &[WorkBlock],
    projects: &dyn ProjectDirectory,
    now: DateTime<Utc>,
) -> DeepWorkAnalysis {
    if blocks.is_empty() {
        return DeepWorkAnalysis::default();
    }

    let mut sorted: Vec<&WorkBlock> = blocks.iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let mut analysis = DeepWorkAnalysis::default();
    let mut total = Duration::zero();
    let mut last_project: Option<String> = None;

    for block in sorted {
        let name = projects.display_name(&block.project_id);
        if last_project.as_ref().is_some_and(|last| *last != name) {
            analysis.context_switches += 1;
        }

        let focus = FocusBlock::from_work_block(block, name.clone(), now);
        total = total + focus.duration;
        if focus.focus_level.is_deep() {
            analysis.deep_work_time = analysis.deep_work_time + focus.duration;
        } else {
            analysis.shallow_work_time = analysis.shallow_work_time + focus.duration;
        }
        analysis.focus_blocks.push(focus);
        last_project = Some(name);
    }

    if total > Duration::zero() {
        analysis.deep_work_percentage = analysis.deep_work_time.num_milliseconds() as f64
            / total.num_milliseconds() as f64
            * 100.0;
    }

    analysis.fragmentation_score = fragmentation_score(&analysis.focus_blocks);
    analysis.flow_sessions = detect_flow_sessions(&analysis.focus_blocks);
    analysis.focus_score = focus_score(
        analysis.deep_work_percentage,
        analysis.flow_sessions.len(),
        analysis.context_switches,
        analysis.fragmentation_score,
    );
    analysis.recommendations = deep_work_recommendations(&analysis);

    tracing::debug!(
        blocks = analysis.focus_blocks.len(),
        deep_pct = analysis.deep_work_percentage,
        flow_sessions = analysis.flow_sessions.len(),
        focus_score = analysis.focus_score,
        "Deep work analyzed"
    );

    analysis
}

fn deep_work_recommendations(analysis: &DeepWorkAnalysis) -> Vec<String> {
    let mut recs = Vec::new();

    if analysis.deep_work_percentage < 30.0 {
        recs.push("Aim for work blocks of 25 minutes or more to build deep work".to_string());
        recs.push("Consider reducing distractions during work sessions".to_string());
    }
    if analysis.context_switches > 8 {
        recs.push("High context switching detected: try time blocking by project".to_string());
    }
    if analysis.fragmentation_score > 0.5 {
        recs.push("Work is highly fragmented: consider longer uninterrupted sessions".to_string());
    }
    if !analysis.flow_sessions.is_empty() {
        recs.push(format!(
            "{} flow sessions detected: replicate these conditions",
            analysis.flow_sessions.len()
        ));
    }

    recs
}

/// How work was split across projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFocusAnalysis {
    pub project_sessions: Vec<ProjectSession>,
    /// Boundaries between consecutive project sessions
    pub context_switches: usize,
    #[serde(with = "duration_secs")]
    pub switching_cost: Duration,
    /// Work time over work plus switching time, as a percentage
    pub focus_efficiency: f64,
    pub recommendations: Vec<String>,
}

impl Default for ProjectFocusAnalysis {
    fn default() -> Self {
        Self {
            project_sessions: Vec::new(),
            context_switches: 0,
            switching_cost: Duration::zero(),
            focus_efficiency: 0.0,
            recommendations: Vec::new(),
        }
    }
}

pub fn analyze_project_focus(
    blocks: &[WorkBlock],
    projects: &dyn ProjectDirectory,
    now: DateTime<Utc>,
) -> ProjectFocusAnalysis {
    if blocks.is_empty() {
        return ProjectFocusAnalysis::default();
    }

    let sessions = group_project_sessions(blocks, projects, now);
    let cost = switching_cost(&sessions);
    let work = sessions
        .iter()
        .fold(Duration::zero(), |acc, s| acc + s.duration);

    let spent = (work + cost.cost).num_milliseconds();
    let focus_efficiency = if spent > 0 {
        work.num_milliseconds() as f64 / spent as f64 * 100.0
    } else {
        0.0
    };

    let mut analysis = ProjectFocusAnalysis {
        project_sessions: sessions,
        context_switches: cost.context_switches,
        switching_cost: cost.cost,
        focus_efficiency,
        recommendations: Vec::new(),
    };
    analysis.recommendations = project_focus_recommendations(&analysis);
    analysis
}

fn project_focus_recommendations(analysis: &ProjectFocusAnalysis) -> Vec<String> {
    let mut recs = Vec::new();

    if analysis.context_switches > 5 {
        recs.push("High project switching: consider batching similar work".to_string());
    }
    if analysis.focus_efficiency < 70.0 {
        recs.push("Focus efficiency below 70%: reduce interruptions between projects".to_string());
    }
    if analysis.switching_cost > Duration::minutes(30) {
        recs.push("High switching cost detected: minimize project transitions".to_string());
    }

    recs
}
