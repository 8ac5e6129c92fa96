//! Analytics module for workpulse
//!
//! Turns raw work blocks into structured insight:
//! - Focus classification of individual blocks
//! - Flow and project session segmentation
//! - Scores (fragmentation, consistency, focus)
//! - Hour-of-day patterns and work rhythm
//! - Day, week and range analyses via [`WorkAnalyzer`]
//!
//! ## Pipeline
//!
//! ```text
//!   WorkBlock ──► focus ──► segment ──► scoring ──► deep_work
//!        │                                              │
//!        └────────► pattern ◄──────────── engine ◄──────┘
//! ```
//!
//! Everything below [`engine`] is pure and takes the current time as an
//! argument. The engine owns the collaborators and the cache.

pub mod deep_work;
pub mod engine;
pub mod focus;
pub mod pattern;
pub mod scoring;
pub mod segment;

pub use deep_work::{DeepWorkAnalysis, ProjectFocusAnalysis};
pub use engine::{calc_delta, CachedAnalysis, WorkAnalyzer, WorkCache};
pub use focus::{classify_focus_level, detect_flow_state, FocusBlock, FocusLevel};
pub use pattern::{
    ActivityKind, ActivityPatternAnalysis, ActivityRhythm, HourlyActivity, PatternSample,
    WorkPattern, WorkRhythm,
};
pub use scoring::{consistency_score, focus_score, fragmentation_score};
pub use segment::{FlowSession, ProjectSession, SwitchingCost};
