//! Render Targets
//!
//! A [`RenderTarget`] owns one framebuffer object and the attachment list it
//! was created for. Targets are not built directly; passes describe what they
//! want with a [`RenderTargetDesc`] and obtain a target from the
//! [`RenderTargetPool`](super::pool::RenderTargetPool), which reuses an
//! existing target when the attachment set is identical.
//!
//! # Lifecycle
//!
//! ```text
//!  Fresh ──rebind──▶ Rebound ──texture resized──▶ Dirty ──rebind (next get)──▶ Rebound
//!                       │                                                          │
//!                       └──────────── idle for `timeout` frames ──▶ Evicted ◀──────┘
//! ```
//!
//! A target keeps a strong reference to every attached texture and one
//! resize subscription per attachment; both are released when the target is
//! dropped.

use std::borrow::Cow;
use std::cell::Cell;
use std::rc::Rc;

use bitflags::bitflags;
use log::{debug, error};
use smallvec::SmallVec;

use super::driver::{FramebufferId, GpuDriver};
use super::state::RenderState;
use super::texture::RenderTextureRef;
use crate::errors::{LumenError, Result};
use crate::utils::Subscription;

pub use super::driver::AttachmentSlot;

bitflags! {
    /// Buffers affected by a clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits();
    }
}

// ─── Descriptors ──────────────────────────────────────────────────────────────

/// One texture bound to one attachment slot.
///
/// Equality is slot kind plus texture identity; texture size or format play
/// no part in it.
#[derive(Clone)]
pub struct RenderTargetAttachment {
    pub slot: AttachmentSlot,
    pub texture: RenderTextureRef,
}

impl RenderTargetAttachment {
    #[must_use]
    pub fn new(slot: AttachmentSlot, texture: RenderTextureRef) -> Self {
        Self { slot, texture }
    }
}

impl PartialEq for RenderTargetAttachment {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.texture.uid() == other.texture.uid()
    }
}

impl Eq for RenderTargetAttachment {}

impl std::fmt::Debug for RenderTargetAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} <- '{}'#{}", self.slot, self.texture.name(), self.texture.uid())
    }
}

/// Request for a render target, and the pool's cache key.
///
/// Color attachments are ordered by slot index. Gaps are allowed and simply
/// leave that draw buffer unused.
#[derive(Debug, Clone, Default)]
pub struct RenderTargetDesc {
    pub name: Cow<'static, str>,
    color_attachments: SmallVec<[Option<RenderTargetAttachment>; 4]>,
    depth_attachment: Option<RenderTargetAttachment>,
}

impl RenderTargetDesc {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Single color and/or depth attachment.
    #[must_use]
    pub fn from_textures(
        name: impl Into<Cow<'static, str>>,
        color: Option<&RenderTextureRef>,
        depth: Option<&RenderTextureRef>,
        has_stencil: bool,
    ) -> Self {
        let mut desc = Self::new(name);
        if let Some(color) = color {
            desc.set_color_attachment(0, color.clone());
        }
        if let Some(depth) = depth {
            desc.set_depth_attachment(depth.clone(), has_stencil);
        }
        desc
    }

    /// Attaches `texture` to color slot `index`, replacing any previous one.
    pub fn set_color_attachment(&mut self, index: u8, texture: RenderTextureRef) {
        let i = index as usize;
        if self.color_attachments.len() <= i {
            self.color_attachments.resize(i + 1, None);
        }
        self.color_attachments[i] = Some(RenderTargetAttachment::new(
            AttachmentSlot::Color(index),
            texture,
        ));
    }

    pub fn set_depth_attachment(&mut self, texture: RenderTextureRef, has_stencil: bool) {
        let slot = if has_stencil {
            AttachmentSlot::DepthStencil
        } else {
            AttachmentSlot::Depth
        };
        self.depth_attachment = Some(RenderTargetAttachment::new(slot, texture));
    }

    #[must_use]
    pub fn with_color(mut self, index: u8, texture: RenderTextureRef) -> Self {
        self.set_color_attachment(index, texture);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, texture: RenderTextureRef, has_stencil: bool) -> Self {
        self.set_depth_attachment(texture, has_stencil);
        self
    }

    #[must_use]
    pub fn color_attachments(&self) -> &[Option<RenderTargetAttachment>] {
        &self.color_attachments
    }

    #[must_use]
    pub fn depth_attachment(&self) -> Option<&RenderTargetAttachment> {
        self.depth_attachment.as_ref()
    }

    /// Present attachments: colors in slot order, then depth.
    pub fn attachments(&self) -> impl Iterator<Item = &RenderTargetAttachment> {
        self.color_attachments
            .iter()
            .flatten()
            .chain(self.depth_attachment.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attachments().next().is_none()
    }
}

// ─── Render Target ────────────────────────────────────────────────────────────

/// A pooled framebuffer and its attachments.
pub struct RenderTarget {
    pub name: Cow<'static, str>,
    framebuffer: FramebufferId,
    width: u32,
    height: u32,
    pub(crate) last_use_frame: u64,
    dirty: Rc<Cell<bool>>,
    color_attachments: SmallVec<[Option<RenderTargetAttachment>; 4]>,
    depth_attachment: Option<RenderTargetAttachment>,
    _resize_subscriptions: SmallVec<[Subscription; 4]>,
    driver: Rc<dyn GpuDriver>,
}

impl RenderTarget {
    /// Validates the descriptor, creates the framebuffer and subscribes to
    /// resize events. The new target is dirty; attachments are bound by the
    /// first [`rebind_attachments`](Self::rebind_attachments).
    ///
    /// Crate-private: the pool is the only owner of targets, and it forgets
    /// the framebuffer in [`RenderState`] before dropping one.
    pub(crate) fn new(driver: Rc<dyn GpuDriver>, desc: &RenderTargetDesc) -> Result<Self> {
        if desc.is_empty() {
            return Err(LumenError::EmptyRenderTarget);
        }
        for attachment in desc.attachments() {
            let format = attachment.texture.format();
            if !attachment.slot.accepts(format) {
                error!(
                    "Render target '{}': texture '{}' ({format:?}) cannot be attached as {:?}",
                    desc.name,
                    attachment.texture.name(),
                    attachment.slot
                );
                return Err(LumenError::InvalidAttachment {
                    texture: attachment.texture.name().to_owned(),
                    slot: attachment.slot,
                    format,
                });
            }
        }

        let dirty = Rc::new(Cell::new(true));
        let subscriptions: SmallVec<[Subscription; 4]> = desc
            .attachments()
            .map(|attachment| {
                let dirty = dirty.clone();
                attachment
                    .texture
                    .on_resize()
                    .subscribe(move |_| dirty.set(true))
            })
            .collect();

        let framebuffer = driver.create_framebuffer();
        debug!("Created render target '{}' ({framebuffer})", desc.name);

        Ok(Self {
            name: desc.name.clone(),
            framebuffer,
            width: 0,
            height: 0,
            last_use_frame: 0,
            dirty,
            color_attachments: desc.color_attachments.clone(),
            depth_attachment: desc.depth_attachment.clone(),
            _resize_subscriptions: subscriptions,
            driver,
        })
    }

    #[inline]
    #[must_use]
    pub fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    /// Size of the attachments as of the last rebind.
    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    #[inline]
    #[must_use]
    pub fn last_use_frame(&self) -> u64 {
        self.last_use_frame
    }

    pub fn set_dirty(&self) {
        self.dirty.set(true);
    }

    /// Number of color slots (including gaps).
    #[must_use]
    pub fn color_attachment_count(&self) -> usize {
        self.color_attachments.len()
    }

    pub fn attachments(&self) -> impl Iterator<Item = &RenderTargetAttachment> {
        self.color_attachments
            .iter()
            .flatten()
            .chain(self.depth_attachment.iter())
    }

    /// Whether this target was built for exactly the attachment set of `desc`.
    #[must_use]
    pub fn matches(&self, desc: &RenderTargetDesc) -> bool {
        self.color_attachments == desc.color_attachments
            && self.depth_attachment == desc.depth_attachment
    }

    /// Re-attaches every texture and verifies completeness.
    ///
    /// All attachments must have the same size. The framebuffer is bound
    /// through `state` and stays bound afterwards.
    pub fn rebind_attachments(&mut self, state: &mut RenderState) -> Result<()> {
        let mut size = None;
        for attachment in self.attachments() {
            let tex = &attachment.texture;
            match size {
                None => size = Some(tex.size()),
                Some((w, h)) if (w, h) != tex.size() => {
                    error!(
                        "Render target '{}': attachment '{}' is {}x{}, expected {w}x{h}",
                        self.name,
                        tex.name(),
                        tex.width(),
                        tex.height()
                    );
                    return Err(LumenError::AttachmentSizeMismatch {
                        texture: tex.name().to_owned(),
                        slot: attachment.slot,
                        expected_width: w,
                        expected_height: h,
                        width: tex.width(),
                        height: tex.height(),
                    });
                }
                Some(_) => {}
            }
        }
        let (width, height) = size.ok_or(LumenError::EmptyRenderTarget)?;

        state.bind_framebuffer(self.framebuffer);
        for attachment in self.attachments() {
            self.driver
                .framebuffer_texture(attachment.slot, attachment.texture.gpu_id());
        }

        // Positional: fragment output `i` goes to color slot `i`, gaps discard
        let draw_buffers: SmallVec<[Option<AttachmentSlot>; 4]> = self
            .color_attachments
            .iter()
            .map(|a| a.as_ref().map(|a| a.slot))
            .collect();
        self.driver.draw_buffers(&draw_buffers);

        let status = self.driver.framebuffer_status();
        if !status.is_complete() {
            error!(
                "Render target '{}' ({}) incomplete after rebind: {status:?}",
                self.name, self.framebuffer
            );
            return Err(LumenError::FramebufferIncomplete {
                framebuffer: self.framebuffer.raw(),
                status,
            });
        }

        self.width = width;
        self.height = height;
        self.dirty.set(false);
        debug!("Rebound render target '{}' at {width}x{height}", self.name);
        Ok(())
    }

    /// Binds the framebuffer and sets the viewport to the target size.
    pub fn use_target(&self, state: &mut RenderState) {
        state.bind_framebuffer(self.framebuffer);
        self.driver.viewport(0, 0, self.width, self.height);
    }

    /// Clears the selected buffers. With [`ClearFlags::COLOR`], `colors` must
    /// hold exactly one color per color slot, gaps included; `colors[i]`
    /// clears slot `i` and entries at gaps are ignored.
    pub fn clear(
        &self,
        state: &mut RenderState,
        flags: ClearFlags,
        colors: &[wgpu::Color],
        depth: f32,
    ) -> Result<()> {
        if flags.contains(ClearFlags::COLOR) && colors.len() != self.color_attachments.len() {
            return Err(LumenError::ClearColorCountMismatch {
                given: colors.len(),
                attachments: self.color_attachments.len(),
            });
        }

        self.use_target(state);
        if flags.contains(ClearFlags::COLOR) {
            let present = self.color_attachments.iter().map(Option::is_some);
            for (i, (color, present)) in colors.iter().zip(present).enumerate() {
                if present {
                    self.driver.clear_color(i as u32, *color);
                }
            }
        }
        if flags.contains(ClearFlags::DEPTH) {
            self.driver.clear_depth(depth);
        }
        Ok(())
    }

    pub fn clear_color(&self, state: &mut RenderState, color: wgpu::Color) -> Result<()> {
        self.clear(state, ClearFlags::COLOR, &[color], 1.0)
    }

    pub fn clear_colors(&self, state: &mut RenderState, colors: &[wgpu::Color]) -> Result<()> {
        self.clear(state, ClearFlags::COLOR, colors, 1.0)
    }

    pub fn clear_depth(&self, state: &mut RenderState, depth: f32) -> Result<()> {
        self.clear(state, ClearFlags::DEPTH, &[], depth)
    }

    pub fn clear_color_depth(
        &self,
        state: &mut RenderState,
        colors: &[wgpu::Color],
        depth: f32,
    ) -> Result<()> {
        self.clear(state, ClearFlags::ALL, colors, depth)
    }
}

impl Drop for RenderTarget {
    /// The owner must call [`RenderState::invalidate_framebuffer`] first.
    fn drop(&mut self) {
        self.driver.delete_framebuffer(self.framebuffer);
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("name", &self.name)
            .field("framebuffer", &self.framebuffer)
            .field("size", &self.size())
            .field("dirty", &self.dirty.get())
            .field("last_use_frame", &self.last_use_frame)
            .finish_non_exhaustive()
    }
}

/// Binds `framebuffer` and clears it without looking at its attachments.
///
/// Only color buffer 0 is cleared; depth is reset to `1.0`.
pub fn clear_framebuffer(
    state: &mut RenderState,
    framebuffer: FramebufferId,
    color: wgpu::Color,
    flags: ClearFlags,
) {
    state.bind_framebuffer(framebuffer);
    let driver = state.driver().clone();
    if flags.contains(ClearFlags::COLOR) {
        driver.clear_color(0, color);
    }
    if flags.contains(ClearFlags::DEPTH) {
        driver.clear_depth(1.0);
    }
}
