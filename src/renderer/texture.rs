//! Render Textures
//!
//! GPU textures used as framebuffer attachments. A [`RenderTexture`] is
//! shared through `Rc`: passes, descriptors and pooled render targets all
//! hold strong references, and the GPU texture is deleted when the last one
//! goes away.
//!
//! [`RenderTexture::resize`] recreates the GPU texture and raises
//! [`TextureResized`] on [`RenderTexture::on_resize`]; render targets that
//! attach the texture subscribe to it and rebind lazily on their next `get`.

use std::borrow::Cow;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use super::driver::{GpuDriver, TextureId};
use crate::utils::Event;

static NEXT_TEXTURE_UID: AtomicU64 = AtomicU64::new(1);

fn next_uid() -> u64 {
    NEXT_TEXTURE_UID.fetch_add(1, Ordering::Relaxed)
}

/// Creation parameters of a [`RenderTexture`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTextureDesc {
    pub name: Cow<'static, str>,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl RenderTextureDesc {
    #[must_use]
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            format,
        }
    }
}

/// Payload of [`RenderTexture::on_resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureResized {
    pub uid: u64,
    pub width: u32,
    pub height: u32,
}

/// Shared handle to a render texture.
pub type RenderTextureRef = Rc<RenderTexture>;

/// A resizable GPU texture with a stable identity.
///
/// Identity (`uid`) survives resizes even though the underlying GPU texture
/// handle changes; render target cache keys compare by identity.
pub struct RenderTexture {
    uid: u64,
    name: Cow<'static, str>,
    format: wgpu::TextureFormat,
    width: Cell<u32>,
    height: Cell<u32>,
    gpu: Cell<TextureId>,
    on_resize: Event<TextureResized>,
    driver: Rc<dyn GpuDriver>,
}

impl RenderTexture {
    #[must_use]
    pub fn new(driver: Rc<dyn GpuDriver>, desc: &RenderTextureDesc) -> RenderTextureRef {
        let gpu = driver.create_texture(desc.width, desc.height, desc.format);
        debug!(
            "Created render texture '{}' {}x{} {:?}",
            desc.name, desc.width, desc.height, desc.format
        );
        Rc::new(Self {
            uid: next_uid(),
            name: desc.name.clone(),
            format: desc.format,
            width: Cell::new(desc.width),
            height: Cell::new(desc.height),
            gpu: Cell::new(gpu),
            on_resize: Event::new(),
            driver,
        })
    }

    #[inline]
    #[must_use]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width.get()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height.get()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width.get(), self.height.get())
    }

    /// Current GPU handle. Changes on every effective resize.
    #[inline]
    #[must_use]
    pub fn gpu_id(&self) -> TextureId {
        self.gpu.get()
    }

    #[inline]
    #[must_use]
    pub fn on_resize(&self) -> &Event<TextureResized> {
        &self.on_resize
    }

    /// Number of strong references: passes, descriptors and pooled targets.
    #[inline]
    #[must_use]
    pub fn strong_count(this: &RenderTextureRef) -> usize {
        Rc::strong_count(this)
    }

    /// Reallocates the GPU texture at the new size and notifies subscribers.
    /// Does nothing if the size is unchanged.
    pub fn resize(&self, width: u32, height: u32) {
        if self.size() == (width, height) {
            return;
        }

        self.driver.delete_texture(self.gpu.get());
        self.gpu
            .set(self.driver.create_texture(width, height, self.format));
        self.width.set(width);
        self.height.set(height);

        debug!("Resized render texture '{}' to {width}x{height}", self.name);
        self.on_resize.emit(&TextureResized {
            uid: self.uid,
            width,
            height,
        });
    }
}

impl PartialEq for RenderTexture {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for RenderTexture {}

impl Drop for RenderTexture {
    fn drop(&mut self) {
        self.driver.delete_texture(self.gpu.get());
    }
}

impl std::fmt::Debug for RenderTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTexture")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("size", &self.size())
            .field("format", &self.format)
            .field("gpu", &self.gpu.get())
            .finish_non_exhaustive()
    }
}
