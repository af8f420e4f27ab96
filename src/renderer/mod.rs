//! Rendering Resource Core
//!
//! - [`driver`]: the [`GpuDriver`] seam and the [`HeadlessDriver`] model
//! - [`state`]: [`RenderState`], the redundant-bind filter
//! - [`texture`]: shared, resizable [`RenderTexture`]s
//! - [`target`] / [`pool`]: framebuffers keyed by attachment set
//! - [`context`]: [`RenderContext`], owner of all of the above plus culling
//! - [`settings`]: [`CoreSettings`]

pub mod context;
pub mod driver;
pub mod pool;
pub mod settings;
pub mod state;
pub mod target;
pub mod texture;

pub use context::RenderContext;
pub use driver::{
    AttachmentSlot, BlendMode, BufferId, BufferTarget, CullMode, DepthMode, FramebufferId,
    FramebufferStatus, GpuDriver, HeadlessDriver, ShaderId, TextureId, VertexArrayId,
};
pub use pool::{RenderTargetKey, RenderTargetPool};
pub use settings::CoreSettings;
pub use state::RenderState;
pub use target::{
    ClearFlags, RenderTarget, RenderTargetAttachment, RenderTargetDesc, clear_framebuffer,
};
pub use texture::{RenderTexture, RenderTextureDesc, RenderTextureRef, TextureResized};
