use nebula_cubesphere::PatchError;
use thiserror::Error;

/// Errors from patch vertex generation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VertexGenError {
    #[error("invalid vertex generator config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Patch(#[from] PatchError),
}
