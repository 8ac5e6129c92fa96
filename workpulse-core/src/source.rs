//! Activity collaborators
//!
//! The analyzer never captures or stores activity itself. It reads work
//! blocks and sessions through [`ActivitySource`] and resolves project names
//! through [`ProjectDirectory`]. [`InMemoryActivitySource`] implements both
//! and backs the CLI and the test suites.

use crate::error::Result;
use crate::types::{Project, Session, WorkBlock, UNKNOWN_PROJECT};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Error type returned by collaborators. The analyzer attributes it to the
/// day, week or range it was working on.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Read access to recorded activity.
///
/// Range queries are half-open: `[start, end)` on the record's start time.
pub trait ActivitySource: Send + Sync {
    fn work_blocks_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<WorkBlock>>;

    fn sessions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<Session>>;

    fn work_block_by_id(&self, id: &str) -> SourceResult<Option<WorkBlock>>;

    fn session_by_id(&self, id: &str) -> SourceResult<Option<Session>>;
}

/// Project name lookup.
pub trait ProjectDirectory: Send + Sync {
    fn project_name(&self, project_id: &str) -> Option<String>;

    /// Name for display, `"Unknown"` when the id is not known.
    fn display_name(&self, project_id: &str) -> String {
        self.project_name(project_id)
            .unwrap_or_else(|| UNKNOWN_PROJECT.to_string())
    }
}

/// On-disk shape of an activity export.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ActivityExport {
    #[serde(default)]
    pub work_blocks: Vec<WorkBlock>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Activity held in memory.
///
/// Inserting a block or session with an existing id replaces it, which is
/// how open blocks are closed.
#[derive(Debug, Default)]
pub struct InMemoryActivitySource {
    blocks: RwLock<Vec<WorkBlock>>,
    sessions: RwLock<Vec<Session>>,
    projects: RwLock<HashMap<String, String>>,
}

impl InMemoryActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from an already-parsed export.
    pub fn from_export(export: ActivityExport) -> Self {
        let source = Self::new();
        for block in export.work_blocks {
            source.upsert_work_block(block);
        }
        for session in export.sessions {
            source.upsert_session(session);
        }
        for project in export.projects {
            source.insert_project(project);
        }
        source
    }

    /// Load an [`ActivityExport`] JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let export: ActivityExport = serde_json::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            blocks = export.work_blocks.len(),
            sessions = export.sessions.len(),
            projects = export.projects.len(),
            "Loaded activity export"
        );
        Ok(Self::from_export(export))
    }

    pub fn upsert_work_block(&self, block: WorkBlock) {
        let mut blocks = self.blocks.write();
        match blocks.iter_mut().find(|b| b.id == block.id) {
            Some(existing) => *existing = block,
            None => blocks.push(block),
        }
    }

    pub fn upsert_session(&self, session: Session) {
        let mut sessions = self.sessions.write();
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => sessions.push(session),
        }
    }

    pub fn insert_project(&self, project: Project) {
        self.projects.write().insert(project.id, project.name);
    }

    pub fn work_block_count(&self) -> usize {
        self.blocks.read().len()
    }

    /// Earliest and latest block start, if any blocks are held.
    pub fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let blocks = self.blocks.read();
        let first = blocks.iter().map(|b| b.start).min()?;
        let last = blocks.iter().map(|b| b.start).max()?;
        Some((first, last))
    }
}

impl ActivitySource for InMemoryActivitySource {
    fn work_blocks_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<WorkBlock>> {
        let mut blocks: Vec<WorkBlock> = self
            .blocks
            .read()
            .iter()
            .filter(|b| b.start >= start && b.start < end)
            .cloned()
            .collect();
        blocks.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        Ok(blocks)
    }

    fn sessions_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SourceResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .iter()
            .filter(|s| s.start >= start && s.start < end)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    fn work_block_by_id(&self, id: &str) -> SourceResult<Option<WorkBlock>> {
        Ok(self.blocks.read().iter().find(|b| b.id == id).cloned())
    }

    fn session_by_id(&self, id: &str) -> SourceResult<Option<Session>> {
        Ok(self.sessions.read().iter().find(|s| s.id == id).cloned())
    }
}

impl ProjectDirectory for InMemoryActivitySource {
    fn project_name(&self, project_id: &str) -> Option<String> {
        self.projects.read().get(project_id).cloned()
    }
}
