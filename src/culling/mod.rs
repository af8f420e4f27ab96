//! Visibility
//!
//! - [`CullingBuffer`]: SoA bounds store with stable slot accessors
//! - [`CullingSystem`]: frustum extraction and the once-per-frame batch cull

pub mod buffer;
pub mod system;

pub use buffer::{CullStats, CullingBuffer, CullingBufferAccessor};
pub use system::CullingSystem;
