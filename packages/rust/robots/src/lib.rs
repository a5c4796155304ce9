//! robots.txt policy evaluation and the on-disk artifact store.
//!
//! This crate provides:
//! - [`matcher`]: the [`RobotsMatcher`] seam and its `texting_robots` adapter
//! - [`store`]: [`ArtifactStore`], read-only access to downloaded robots.txt files

pub mod matcher;
pub mod store;

pub use matcher::{MatchError, RobotsMatcher, TextingRobotsMatcher, product_token, select_user_agent};
pub use store::{Artifact, ArtifactStore};
