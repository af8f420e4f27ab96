//! Scene Inputs
//!
//! What the visibility pass consumes from the scene: the [`Camera`] providing
//! the view-projection matrix and object [`Bounds`].

pub mod bounds;
pub mod camera;

pub use bounds::Bounds;
pub use camera::{Camera, Frustum, ProjectionType};
