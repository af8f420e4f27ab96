//! Headless Driver
//!
//! A software model of the GPU object and binding model. It allocates
//! handles, tracks every binding point, validates framebuffer completeness
//! and counts each driver call, which is what the state-cache and pool tests
//! assert against.
//!
//! Modelled binding rules:
//!
//! - the element-array binding lives in the bound vertex array; binding a
//!   vertex array switches it
//! - `bind_buffer_base` also replaces the generic binding of its target
//! - deleting an object resets every binding point that refers to it

use std::cell::{Cell, RefCell};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::{
    AttachmentSlot, BlendMode, BufferId, BufferTarget, CullMode, DepthMode, FramebufferId,
    FramebufferStatus, GpuDriver, ShaderId, TextureId, VertexArrayId,
};

/// Snapshot of the driver call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverCounters {
    pub program_binds: u32,
    pub vertex_array_binds: u32,
    pub buffer_binds: u32,
    pub buffer_base_binds: u32,
    pub framebuffer_binds: u32,
    pub framebuffers_created: u32,
    pub framebuffers_deleted: u32,
    pub textures_created: u32,
    pub textures_deleted: u32,
    pub attachment_calls: u32,
    pub draw_buffer_calls: u32,
    pub clear_calls: u32,
    pub viewport_calls: u32,
    pub mode_changes: u32,
}

#[derive(Debug, Clone, Copy)]
struct TextureModel {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

#[derive(Debug, Default)]
struct FramebufferModel {
    attachments: SmallVec<[(AttachmentSlot, TextureId); 4]>,
    draw_buffers: SmallVec<[Option<AttachmentSlot>; 4]>,
}

#[derive(Debug, Default)]
struct Bindings {
    program: ShaderId,
    vertex_array: VertexArrayId,
    framebuffer: FramebufferId,
    generic: [BufferId; BufferTarget::COUNT],
    indexed: FxHashMap<(BufferTarget, u32), BufferId>,
    /// Element-array binding per vertex array; `NONE` is the default VAO.
    element_arrays: FxHashMap<VertexArrayId, BufferId>,
    cull: Option<CullMode>,
    blend: Option<BlendMode>,
    depth: Option<DepthMode>,
    viewport: (i32, i32, u32, u32),
}

#[derive(Debug, Default)]
struct Objects {
    textures: FxHashMap<TextureId, TextureModel>,
    framebuffers: FxHashMap<FramebufferId, FramebufferModel>,
    shaders: FxHashSet<ShaderId>,
    vertex_arrays: FxHashSet<VertexArrayId>,
    buffers: FxHashSet<BufferId>,
}

/// In-memory [`GpuDriver`].
#[derive(Debug)]
pub struct HeadlessDriver {
    next_handle: Cell<u32>,
    objects: RefCell<Objects>,
    bindings: RefCell<Bindings>,
    counters: Cell<DriverCounters>,
    color_clears: RefCell<Vec<(TextureId, wgpu::Color)>>,
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: Cell::new(1),
            objects: RefCell::new(Objects::default()),
            bindings: RefCell::new(Bindings::default()),
            counters: Cell::new(DriverCounters::default()),
            color_clears: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn counters(&self) -> DriverCounters {
        self.counters.get()
    }

    pub fn reset_counters(&self) {
        self.counters.set(DriverCounters::default());
    }

    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.objects.borrow().textures.len()
    }

    #[must_use]
    pub fn live_framebuffers(&self) -> usize {
        self.objects.borrow().framebuffers.len()
    }

    #[must_use]
    pub fn texture_exists(&self, texture: TextureId) -> bool {
        self.objects.borrow().textures.contains_key(&texture)
    }

    #[must_use]
    pub fn framebuffer_exists(&self, framebuffer: FramebufferId) -> bool {
        self.objects.borrow().framebuffers.contains_key(&framebuffer)
    }

    #[must_use]
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.objects
            .borrow()
            .textures
            .get(&texture)
            .map(|t| (t.width, t.height))
    }

    /// Texture attached to `slot` of `framebuffer`, if any.
    #[must_use]
    pub fn attachment(
        &self,
        framebuffer: FramebufferId,
        slot: AttachmentSlot,
    ) -> Option<TextureId> {
        let objects = self.objects.borrow();
        let fb = objects.framebuffers.get(&framebuffer)?;
        fb.attachments
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, t)| *t)
    }

    /// Color clears that reached a texture, in call order, as
    /// `(texture, color)`. Clears of discarded draw buffers are not recorded.
    pub fn take_color_clears(&self) -> Vec<(TextureId, wgpu::Color)> {
        std::mem::take(&mut *self.color_clears.borrow_mut())
    }

    #[must_use]
    pub fn draw_buffer_list(&self, framebuffer: FramebufferId) -> Vec<Option<AttachmentSlot>> {
        self.objects
            .borrow()
            .framebuffers
            .get(&framebuffer)
            .map(|fb| fb.draw_buffers.to_vec())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn current_viewport(&self) -> (i32, i32, u32, u32) {
        self.bindings.borrow().viewport
    }

    #[must_use]
    pub fn current_cull_mode(&self) -> Option<CullMode> {
        self.bindings.borrow().cull
    }

    #[must_use]
    pub fn current_blend_mode(&self) -> Option<BlendMode> {
        self.bindings.borrow().blend
    }

    #[must_use]
    pub fn current_depth_mode(&self) -> Option<DepthMode> {
        self.bindings.borrow().depth
    }

    fn alloc_handle(&self) -> u32 {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        id
    }

    fn count(&self, f: impl FnOnce(&mut DriverCounters)) {
        let mut c = self.counters.get();
        f(&mut c);
        self.counters.set(c);
    }

    fn check_framebuffer(objects: &Objects, framebuffer: FramebufferId) -> FramebufferStatus {
        if framebuffer.is_none() {
            return FramebufferStatus::Complete;
        }
        let Some(fb) = objects.framebuffers.get(&framebuffer) else {
            return FramebufferStatus::MissingAttachment;
        };
        if fb.attachments.is_empty() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut size = None;
        for &(slot, texture) in &fb.attachments {
            let Some(model) = objects.textures.get(&texture) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            if !slot.accepts(model.format) {
                return FramebufferStatus::IncompleteAttachment;
            }
            match size {
                None => size = Some((model.width, model.height)),
                Some(s) if s != (model.width, model.height) => {
                    return FramebufferStatus::IncompleteDimensions;
                }
                Some(_) => {}
            }
        }

        let has_slot = |slot: &AttachmentSlot| fb.attachments.iter().any(|(s, _)| s == slot);
        if !fb.draw_buffers.iter().flatten().all(has_slot) {
            return FramebufferStatus::IncompleteDrawBuffer;
        }

        FramebufferStatus::Complete
    }
}

impl GpuDriver for HeadlessDriver {
    fn create_texture(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> TextureId {
        let id = TextureId(self.alloc_handle());
        self.objects.borrow_mut().textures.insert(
            id,
            TextureModel {
                width,
                height,
                format,
            },
        );
        self.count(|c| c.textures_created += 1);
        id
    }

    fn delete_texture(&self, texture: TextureId) {
        if self.objects.borrow_mut().textures.remove(&texture).is_some() {
            self.count(|c| c.textures_deleted += 1);
        }
    }

    fn create_framebuffer(&self) -> FramebufferId {
        let id = FramebufferId(self.alloc_handle());
        self.objects
            .borrow_mut()
            .framebuffers
            .insert(id, FramebufferModel::default());
        self.count(|c| c.framebuffers_created += 1);
        id
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        if self
            .objects
            .borrow_mut()
            .framebuffers
            .remove(&framebuffer)
            .is_some()
        {
            self.count(|c| c.framebuffers_deleted += 1);
        }
        let mut b = self.bindings.borrow_mut();
        if b.framebuffer == framebuffer {
            b.framebuffer = FramebufferId::NONE;
        }
    }

    fn create_shader(&self) -> ShaderId {
        let id = ShaderId(self.alloc_handle());
        self.objects.borrow_mut().shaders.insert(id);
        id
    }

    fn delete_shader(&self, shader: ShaderId) {
        self.objects.borrow_mut().shaders.remove(&shader);
        let mut b = self.bindings.borrow_mut();
        if b.program == shader {
            b.program = ShaderId::NONE;
        }
    }

    fn create_vertex_array(&self) -> VertexArrayId {
        let id = VertexArrayId(self.alloc_handle());
        self.objects.borrow_mut().vertex_arrays.insert(id);
        id
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        self.objects.borrow_mut().vertex_arrays.remove(&vertex_array);
        let mut b = self.bindings.borrow_mut();
        b.element_arrays.remove(&vertex_array);
        if b.vertex_array == vertex_array {
            b.vertex_array = VertexArrayId::NONE;
        }
    }

    fn create_buffer(&self) -> BufferId {
        let id = BufferId(self.alloc_handle());
        self.objects.borrow_mut().buffers.insert(id);
        id
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.objects.borrow_mut().buffers.remove(&buffer);

        let mut b = self.bindings.borrow_mut();
        for bound in &mut b.generic {
            if *bound == buffer {
                *bound = BufferId::NONE;
            }
        }
        b.indexed.retain(|_, bound| *bound != buffer);
        b.element_arrays.retain(|_, bound| *bound != buffer);
    }

    fn use_program(&self, shader: ShaderId) {
        self.bindings.borrow_mut().program = shader;
        self.count(|c| c.program_binds += 1);
    }

    fn bind_vertex_array(&self, vertex_array: VertexArrayId) {
        self.bindings.borrow_mut().vertex_array = vertex_array;
        self.count(|c| c.vertex_array_binds += 1);
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: BufferId) {
        let mut b = self.bindings.borrow_mut();
        if target == BufferTarget::ElementArray {
            let vao = b.vertex_array;
            b.element_arrays.insert(vao, buffer);
        } else {
            b.generic[target.index()] = buffer;
        }
        self.count(|c| c.buffer_binds += 1);
    }

    fn bind_buffer_base(&self, target: BufferTarget, slot: u32, buffer: BufferId) {
        let mut b = self.bindings.borrow_mut();
        b.indexed.insert((target, slot), buffer);
        b.generic[target.index()] = buffer;
        self.count(|c| c.buffer_base_binds += 1);
    }

    fn bind_framebuffer(&self, framebuffer: FramebufferId) {
        self.bindings.borrow_mut().framebuffer = framebuffer;
        self.count(|c| c.framebuffer_binds += 1);
    }

    fn framebuffer_texture(&self, slot: AttachmentSlot, texture: TextureId) {
        let bound = self.bindings.borrow().framebuffer;
        let mut objects = self.objects.borrow_mut();
        if let Some(fb) = objects.framebuffers.get_mut(&bound) {
            fb.attachments.retain(|(s, _)| *s != slot);
            if !texture.is_none() {
                fb.attachments.push((slot, texture));
            }
        }
        self.count(|c| c.attachment_calls += 1);
    }

    fn draw_buffers(&self, slots: &[Option<AttachmentSlot>]) {
        let bound = self.bindings.borrow().framebuffer;
        if let Some(fb) = self.objects.borrow_mut().framebuffers.get_mut(&bound) {
            fb.draw_buffers = slots.iter().copied().collect();
        }
        self.count(|c| c.draw_buffer_calls += 1);
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        let bound = self.bindings.borrow().framebuffer;
        Self::check_framebuffer(&self.objects.borrow(), bound)
    }

    fn viewport(&self, x: i32, y: i32, width: u32, height: u32) {
        self.bindings.borrow_mut().viewport = (x, y, width, height);
        self.count(|c| c.viewport_calls += 1);
    }

    fn clear_color(&self, draw_buffer: u32, color: wgpu::Color) {
        let bound = self.bindings.borrow().framebuffer;
        let objects = self.objects.borrow();
        let texture = objects.framebuffers.get(&bound).and_then(|fb| {
            let slot = (*fb.draw_buffers.get(draw_buffer as usize)?)?;
            fb.attachments.iter().find(|(s, _)| *s == slot).map(|(_, t)| *t)
        });
        if let Some(texture) = texture {
            self.color_clears.borrow_mut().push((texture, color));
        }
        self.count(|c| c.clear_calls += 1);
    }

    fn clear_depth(&self, _depth: f32) {
        self.count(|c| c.clear_calls += 1);
    }

    fn set_cull_mode(&self, mode: CullMode) {
        self.bindings.borrow_mut().cull = Some(mode);
        self.count(|c| c.mode_changes += 1);
    }

    fn set_blend_mode(&self, mode: BlendMode) {
        self.bindings.borrow_mut().blend = Some(mode);
        self.count(|c| c.mode_changes += 1);
    }

    fn set_depth_mode(&self, mode: DepthMode) {
        self.bindings.borrow_mut().depth = Some(mode);
        self.count(|c| c.mode_changes += 1);
    }

    fn current_program(&self) -> ShaderId {
        self.bindings.borrow().program
    }

    fn current_vertex_array(&self) -> VertexArrayId {
        self.bindings.borrow().vertex_array
    }

    fn current_buffer(&self, target: BufferTarget) -> BufferId {
        let b = self.bindings.borrow();
        if target == BufferTarget::ElementArray {
            b.element_arrays
                .get(&b.vertex_array)
                .copied()
                .unwrap_or_default()
        } else {
            b.generic[target.index()]
        }
    }

    fn current_buffer_base(&self, target: BufferTarget, slot: u32) -> BufferId {
        self.bindings
            .borrow()
            .indexed
            .get(&(target, slot))
            .copied()
            .unwrap_or_default()
    }

    fn current_framebuffer(&self) -> FramebufferId {
        self.bindings.borrow().framebuffer
    }
}
