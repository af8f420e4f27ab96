//! Error Types
//!
//! This module defines the error type shared by the culling, render-target
//! and render-state layers.
//!
//! # Overview
//!
//! Every variant of [`LumenError`] is **fatal for the current frame**: it
//! signals a composition mistake in the calling passes (mismatched
//! attachments, an incomplete framebuffer, a state mirror that drifted from
//! the driver), not a transient condition. Nothing in this crate retries.
//!
//! Redundant work is never an error. Binding an already-bound handle,
//! releasing a disabled accessor or reading stale visibility are silent
//! no-ops and do not go through this type.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lumen::errors::Result;
//!
//! fn draw_gbuffer(ctx: &mut RenderContext, desc: &RenderTargetDesc) -> Result<()> {
//!     let target = ctx.acquire_render_target(desc)?;
//!     ctx.use_render_target(target)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::renderer::driver::{AttachmentSlot, BufferTarget, FramebufferStatus};

/// The main error type for the crate.
#[derive(Error, Debug)]
pub enum LumenError {
    // ========================================================================
    // Render Target Errors
    // ========================================================================
    /// Two attachments of one render target disagree on their size.
    #[error(
        "Attachment size mismatch on '{texture}' ({slot:?}): \
         expected {expected_width}x{expected_height}, got {width}x{height}"
    )]
    AttachmentSizeMismatch {
        /// Name of the offending texture
        texture: String,
        /// Slot the texture was attached to
        slot: AttachmentSlot,
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// The driver reported the framebuffer as incomplete after rebinding.
    #[error("Framebuffer {framebuffer} is incomplete: {status:?}")]
    FramebufferIncomplete {
        framebuffer: u32,
        status: FramebufferStatus,
    },

    /// A texture's format cannot be attached to the requested slot.
    #[error("Texture '{texture}' with format {format:?} cannot be attached as {slot:?}")]
    InvalidAttachment {
        texture: String,
        slot: AttachmentSlot,
        format: wgpu::TextureFormat,
    },

    /// A render target was requested without any attachment.
    #[error("Render target descriptor has no attachments")]
    EmptyRenderTarget,

    /// The number of clear colors does not match the color attachments.
    #[error("Clear color count mismatch: {given} colors for {attachments} color attachments")]
    ClearColorCountMismatch { given: usize, attachments: usize },

    /// The handle refers to a render target that was evicted or cleared.
    #[error("Render target has been evicted from the pool")]
    RenderTargetEvicted,

    /// Too many nested render target pushes.
    #[error("Render target stack overflow (limit {limit})")]
    RenderTargetStackOverflow { limit: usize },

    /// `pop` without a matching `push`.
    #[error("Render target stack underflow")]
    RenderTargetStackUnderflow,

    // ========================================================================
    // Render State Errors
    // ========================================================================
    /// The mirrored binding disagrees with the driver.
    #[error(
        "Render state mismatch on {category}: mirror holds {mirrored}, driver reports {actual}"
    )]
    StateMismatch {
        /// Human readable state category, e.g. `"shader"` or `"buffer Uniform[3]"`
        category: String,
        mirrored: u32,
        actual: u32,
    },

    /// Indexed binding slot outside of the configured range.
    #[error("Indexed binding slot {slot} out of range for {target:?} (limit {limit})")]
    BindingSlotOutOfRange {
        target: BufferTarget,
        slot: u32,
        limit: u32,
    },

    /// A cull / blend / depth mode name that does not exist.
    #[error("Unknown {kind} mode '{value}'")]
    UnknownRenderMode { kind: &'static str, value: String },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings could not be parsed.
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),

    /// Settings parsed but hold an unusable value.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Alias for `Result<T, LumenError>`.
pub type Result<T> = std::result::Result<T, LumenError>;
