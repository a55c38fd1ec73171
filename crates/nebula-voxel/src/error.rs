//! Errors for octree construction and instance validation.

use thiserror::Error;

/// Failure to build an [`OctreePlanet`](crate::OctreePlanet).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OctreeError {
    #[error("invalid octree config: {0}")]
    InvalidConfig(String),
}

/// A cube instance that the instancing renderer would reject.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstanceError {
    #[error("instance {index}: {reason}")]
    Invalid { index: usize, reason: &'static str },
}
