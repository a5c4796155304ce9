//! Shared types, error model, and configuration for robotscheck.
//!
//! This crate is the foundation depended on by all other robotscheck crates.
//! It provides:
//! - [`RobotsCheckError`]: the unified error type
//! - Domain types ([`Decision`], [`DecisionLabels`], [`LedgerLayout`], [`OutputMode`])
//! - Configuration ([`AppConfig`], [`AnnotateConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnnotateConfig, AnnotateDefaults, AppConfig, RunLayoutConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{Result, RobotsCheckError};
pub use types::{Decision, DecisionLabels, LedgerLayout, OutputMode};
