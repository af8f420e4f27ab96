//! Driver Seam
//!
//! Everything this crate asks of the graphics API goes through
//! [`GpuDriver`]: a handle-based, bind-to-edit interface modelled on the
//! classic GL object model. The render state cache, render targets and
//! render textures only ever see this trait.
//!
//! # Handles
//!
//! All objects are addressed by `u32` newtypes. `0` (`NONE`) is the null
//! object; binding it unbinds the category (for framebuffers, `NONE` is the
//! default/screen framebuffer).
//!
//! # Implementations
//!
//! - [`HeadlessDriver`]: software model with call counters, used by tests,
//!   benchmarks and tooling that runs without a GPU.
//!
//! Methods take `&self`; implementations keep their bookkeeping behind
//! interior mutability, so the driver can be shared as `Rc<dyn GpuDriver>`
//! between the state cache and every resource that must free itself on drop.

pub mod headless;

use std::fmt;
use std::str::FromStr;

pub use headless::{DriverCounters, HeadlessDriver};

use crate::errors::LumenError;

// ─── Handles ──────────────────────────────────────────────────────────────────

macro_rules! gpu_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u32);

        impl $name {
            /// The null object.
            pub const NONE: Self = Self(0);

            #[inline]
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    )*};
}

gpu_handle! {
    /// Linked shader program.
    ShaderId;
    /// Vertex array object. Owns its element-array binding.
    VertexArrayId;
    BufferId;
    /// `NONE` is the default (screen) framebuffer.
    FramebufferId;
    TextureId;
}

// ─── Buffer Targets ───────────────────────────────────────────────────────────

/// Buffer binding points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    /// Stored per vertex array, not globally.
    ElementArray,
    Uniform,
    ShaderStorage,
    TransformFeedback,
    DrawIndirect,
}

impl BufferTarget {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Array,
        Self::ElementArray,
        Self::Uniform,
        Self::ShaderStorage,
        Self::TransformFeedback,
        Self::DrawIndirect,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the target has indexed binding points (`bind_buffer_base`).
    #[inline]
    #[must_use]
    pub const fn is_indexed(self) -> bool {
        matches!(
            self,
            Self::Uniform | Self::ShaderStorage | Self::TransformFeedback
        )
    }
}

// ─── Framebuffers ─────────────────────────────────────────────────────────────

/// Attachment point of a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttachmentSlot {
    /// Color attachment `N`.
    Color(u8),
    Depth,
    DepthStencil,
}

impl AttachmentSlot {
    #[inline]
    #[must_use]
    pub const fn is_color(self) -> bool {
        matches!(self, Self::Color(_))
    }

    /// Whether a texture of `format` can be attached to this slot.
    #[must_use]
    pub fn accepts(self, format: wgpu::TextureFormat) -> bool {
        match self {
            Self::Color(_) => !format.is_depth_stencil_format(),
            Self::Depth => format.has_depth_aspect(),
            Self::DepthStencil => format.has_depth_aspect() && format.has_stencil_aspect(),
        }
    }
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    /// An attachment refers to a deleted texture or has an unusable format.
    IncompleteAttachment,
    /// Nothing is attached.
    MissingAttachment,
    /// Attachments differ in size.
    IncompleteDimensions,
    /// A draw buffer names a color slot with no attachment.
    IncompleteDrawBuffer,
}

impl FramebufferStatus {
    #[inline]
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

// ─── Fixed-Function Modes ─────────────────────────────────────────────────────

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    Back,
    Front,
    None,
    All,
}

/// Color blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    None,
    /// Alpha blending: `src * a + dst * (1 - a)`.
    Blend,
    /// Additive: `src + dst`.
    Add,
}

/// Depth test function, or depth testing disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthMode {
    Disable,
    Always,
    #[default]
    Less,
    LessEqual,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
}

fn unknown_mode(kind: &'static str, value: &str) -> LumenError {
    LumenError::UnknownRenderMode {
        kind,
        value: value.to_owned(),
    }
}

impl FromStr for CullMode {
    type Err = LumenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Back" => Ok(Self::Back),
            "Front" => Ok(Self::Front),
            "None" => Ok(Self::None),
            "All" => Ok(Self::All),
            _ => Err(unknown_mode("cull", s)),
        }
    }
}

impl FromStr for BlendMode {
    type Err = LumenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Blend" => Ok(Self::Blend),
            "Add" => Ok(Self::Add),
            _ => Err(unknown_mode("blend", s)),
        }
    }
}

impl FromStr for DepthMode {
    type Err = LumenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Disable" => Ok(Self::Disable),
            "Always" => Ok(Self::Always),
            "Less" => Ok(Self::Less),
            "LessEqual" => Ok(Self::LessEqual),
            "Equal" => Ok(Self::Equal),
            "NotEqual" => Ok(Self::NotEqual),
            "Greater" => Ok(Self::Greater),
            "GreaterEqual" => Ok(Self::GreaterEqual),
            _ => Err(unknown_mode("depth", s)),
        }
    }
}

// ─── Driver Trait ─────────────────────────────────────────────────────────────

/// The graphics API as seen by the resource core.
///
/// Framebuffer editing calls (`framebuffer_texture`, `draw_buffers`,
/// `framebuffer_status`, clears) act on the currently bound framebuffer.
pub trait GpuDriver {
    // === Object lifetime ===

    fn create_texture(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> TextureId;
    fn delete_texture(&self, texture: TextureId);

    fn create_framebuffer(&self) -> FramebufferId;
    fn delete_framebuffer(&self, framebuffer: FramebufferId);

    fn create_shader(&self) -> ShaderId;
    fn delete_shader(&self, shader: ShaderId);

    fn create_vertex_array(&self) -> VertexArrayId;
    fn delete_vertex_array(&self, vertex_array: VertexArrayId);

    fn create_buffer(&self) -> BufferId;
    /// Also resets every binding point that currently refers to `buffer`.
    fn delete_buffer(&self, buffer: BufferId);

    // === Binding ===

    fn use_program(&self, shader: ShaderId);
    /// Switches the element-array binding to the one stored in `vertex_array`.
    fn bind_vertex_array(&self, vertex_array: VertexArrayId);
    fn bind_buffer(&self, target: BufferTarget, buffer: BufferId);
    /// Binds an indexed slot; also replaces the generic binding of `target`.
    fn bind_buffer_base(&self, target: BufferTarget, slot: u32, buffer: BufferId);
    fn bind_framebuffer(&self, framebuffer: FramebufferId);

    // === Framebuffer editing ===

    fn framebuffer_texture(&self, slot: AttachmentSlot, texture: TextureId);
    /// Entry `i` routes fragment output `i` to a color slot; `None` discards
    /// that output. An empty list disables color output.
    fn draw_buffers(&self, slots: &[Option<AttachmentSlot>]);
    fn framebuffer_status(&self) -> FramebufferStatus;

    fn viewport(&self, x: i32, y: i32, width: u32, height: u32);
    /// Clears draw buffer `draw_buffer`. Does nothing for a `None` entry.
    fn clear_color(&self, draw_buffer: u32, color: wgpu::Color);
    fn clear_depth(&self, depth: f32);

    // === Fixed-function state ===

    fn set_cull_mode(&self, mode: CullMode);
    fn set_blend_mode(&self, mode: BlendMode);
    fn set_depth_mode(&self, mode: DepthMode);

    // === Queries ===

    fn current_program(&self) -> ShaderId;
    fn current_vertex_array(&self) -> VertexArrayId;
    fn current_buffer(&self, target: BufferTarget) -> BufferId;
    fn current_buffer_base(&self, target: BufferTarget, slot: u32) -> BufferId;
    fn current_framebuffer(&self) -> FramebufferId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_parse() {
        assert_eq!("Back".parse::<CullMode>().unwrap(), CullMode::Back);
        assert_eq!("Add".parse::<BlendMode>().unwrap(), BlendMode::Add);
        assert_eq!(
            "GreaterEqual".parse::<DepthMode>().unwrap(),
            DepthMode::GreaterEqual
        );
        assert!(matches!(
            "Sideways".parse::<CullMode>(),
            Err(LumenError::UnknownRenderMode { kind: "cull", .. })
        ));
    }

    #[test]
    fn attachment_slots_check_formats() {
        use wgpu::TextureFormat as F;

        assert!(AttachmentSlot::Color(0).accepts(F::Rgba8Unorm));
        assert!(!AttachmentSlot::Color(0).accepts(F::Depth32Float));
        assert!(AttachmentSlot::Depth.accepts(F::Depth24PlusStencil8));
        assert!(!AttachmentSlot::DepthStencil.accepts(F::Depth32Float));
        assert!(!AttachmentSlot::Depth.accepts(F::Rgba16Float));
    }

    #[test]
    fn only_binding_point_targets_are_indexed() {
        assert!(BufferTarget::Uniform.is_indexed());
        assert!(!BufferTarget::ElementArray.is_indexed());
        for (i, target) in BufferTarget::ALL.iter().enumerate() {
            assert_eq!(target.index(), i);
        }
    }
}
