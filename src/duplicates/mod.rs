//! Duplicate detection.
//!
//! This module provides functionality for:
//! - Grouping strategies and fuzzy similarity scoring ([`strategy`])
//! - Duplicate clusters and key bucketing ([`groups`])
//! - Keeper selection ([`keep`])
//! - The detection orchestrator that owns the registry ([`engine`])
//!
//! # Pipeline
//!
//! ```text
//! register ──▶ fingerprint (parallel) ──▶ cluster ──▶ select keeper ──▶ outcome
//!                                             ▲
//!                          built-in Strategy or caller plugins
//! ```

pub mod engine;
pub mod groups;
pub mod keep;
pub mod strategy;

pub use engine::{
    DetectError, DetectOptions, DetectionEngine, DetectionOutcome, EngineState,
    DEFAULT_THREADS, DEFAULT_THRESHOLD,
};
pub use groups::{bucket_by_key, DuplicateCluster};
pub use keep::{select_keeper, KeepPolicy};
pub use strategy::{
    group, similarity, token_key, DetectionStrategy, SimilarityOptions, Strategy, StrategyKind,
};
