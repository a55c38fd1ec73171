//! Level-of-detail selection: screen-space error metrics, altitude-driven
//! thresholds, face culling, and the per-frame spherical quadtree.

mod error_metric;
mod spherical_quadtree;
mod view;

pub use error_metric::{DEFAULT_FOV_RADIANS, lod_threshold, screen_space_error, should_cull_face};
pub use spherical_quadtree::{
    ABSOLUTE_MAX_LEVEL, QuadtreeConfig, QuadtreeError, QuadtreeStats, SphericalQuadtree,
    VisiblePatch,
};
pub use view::ViewState;
