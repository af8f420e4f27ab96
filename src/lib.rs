#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Per-frame GPU resource and visibility core.
//!
//! Decides each frame which objects are visible, reuses framebuffers keyed by
//! their attachment set and filters redundant driver binds.

pub mod culling;
pub mod errors;
pub mod renderer;
pub mod scene;
pub mod utils;

pub use culling::{CullStats, CullingBuffer, CullingBufferAccessor, CullingSystem};
pub use errors::{LumenError, Result};
pub use renderer::{
    ClearFlags, CoreSettings, GpuDriver, HeadlessDriver, RenderContext, RenderState,
    RenderTargetDesc, RenderTargetKey, RenderTexture, RenderTextureDesc,
};
pub use scene::{Bounds, Camera, Frustum};
