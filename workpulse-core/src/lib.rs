//! # workpulse-core
//!
//! Core library for workpulse, a work pattern analytics engine.
//!
//! This library provides:
//! - Domain types for work blocks, sessions, days, weeks and summaries
//! - Focus classification, flow detection and scoring
//! - Hour-of-day productivity patterns and rhythm classification
//! - A TTL cache of derived analyses and a background aggregation coordinator
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three stages:
//! - **Capture (external):** work blocks and sessions behind [`ActivitySource`]
//! - **Analysis:** [`WorkAnalyzer`] derives immutable structures on demand
//! - **Cache:** [`AnalysisCache`] keeps them fresh, fed by [`AggregationCoordinator`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workpulse_core::{Config, InMemoryActivitySource, SystemClock, WorkAnalyzer};
//!
//! let config = Config::load().expect("failed to load config");
//! let source = Arc::new(InMemoryActivitySource::new());
//! let analyzer = WorkAnalyzer::from_config(source.clone(), source, Arc::new(SystemClock), &config);
//!
//! let today = analyzer.today();
//! let day = analyzer.analyze_work_day(today).expect("analysis failed");
//! println!("worked {} minutes", day.total_time.num_minutes());
//! ```

// Re-export commonly used items at the crate root
pub use aggregator::{ActivityEvent, AggregationCoordinator, AggregationStats, EventSender};
pub use analytics::WorkAnalyzer;
pub use cache::{AnalysisCache, CacheKey, CacheStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{AnalysisScope, Error, Result};
pub use source::{ActivityExport, ActivitySource, InMemoryActivitySource, ProjectDirectory};
pub use types::*;

// Public modules
pub mod aggregator;
pub mod analytics;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod source;
pub mod types;
