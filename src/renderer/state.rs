//! Render State Cache
//!
//! Mirrors the driver's binding state so redundant binds never reach the
//! driver.
//!
//! Every state category has one record `{dirty, value}`:
//!
//! ```text
//! shader          ─┐
//! vertex array     │
//! framebuffer      ├─ Mirror { dirty, value }
//! buffer[target]   │
//! buffer[target,N] │  (indexed targets only, N < indexed_binding_slots)
//! cull/blend/depth ─┘
//! ```
//!
//! A record with `dirty == false` is guaranteed to equal the driver-side
//! binding. Anything that mutates the driver without going through this
//! cache must call [`RenderState::set_all_dirty`] afterwards; the render
//! context does so at the end of every frame.
//! [`RenderState::check_state_machine`] verifies the guarantee against the
//! driver and is meant for debug builds.

use std::rc::Rc;

use log::error;

use super::driver::{
    BlendMode, BufferId, BufferTarget, CullMode, DepthMode, FramebufferId, GpuDriver, ShaderId,
    VertexArrayId,
};
use crate::errors::{LumenError, Result};

#[derive(Debug, Clone, Copy)]
struct Mirror<T> {
    dirty: bool,
    value: T,
}

impl<T: Copy + PartialEq + Default> Mirror<T> {
    fn unknown() -> Self {
        Self {
            dirty: true,
            value: T::default(),
        }
    }

    /// Records `value`; returns `true` when the driver has to be called.
    #[inline]
    fn update(&mut self, value: T) -> bool {
        if !self.dirty && self.value == value {
            return false;
        }
        self.value = value;
        self.dirty = false;
        true
    }

    /// Marks the record dirty and forgets `value` if it is the mirrored one.
    #[inline]
    fn forget(&mut self, value: T) {
        self.dirty = true;
        if self.value == value {
            self.value = T::default();
        }
    }

    /// Like [`forget`](Self::forget) but leaves unrelated records clean.
    #[inline]
    fn forget_if_bound(&mut self, value: T) {
        if self.value == value {
            self.dirty = true;
            self.value = T::default();
        }
    }

    #[inline]
    fn clean_value(&self) -> Option<T> {
        (!self.dirty).then_some(self.value)
    }
}

/// Redundant-bind filter in front of a [`GpuDriver`].
pub struct RenderState {
    driver: Rc<dyn GpuDriver>,
    slots: u32,

    shader: Mirror<ShaderId>,
    vertex_array: Mirror<VertexArrayId>,
    framebuffer: Mirror<FramebufferId>,
    buffers: [Mirror<BufferId>; BufferTarget::COUNT],
    /// `BufferTarget::COUNT * slots` records, row per target.
    indexed: Vec<Mirror<BufferId>>,

    cull: Mirror<CullMode>,
    blend: Mirror<BlendMode>,
    depth: Mirror<DepthMode>,
}

impl RenderState {
    /// Creates a cache with every record dirty. `slots` is the number of
    /// indexed binding points mirrored per target.
    #[must_use]
    pub fn new(driver: Rc<dyn GpuDriver>, slots: u32) -> Self {
        Self {
            driver,
            slots,
            shader: Mirror::unknown(),
            vertex_array: Mirror::unknown(),
            framebuffer: Mirror::unknown(),
            buffers: [Mirror::unknown(); BufferTarget::COUNT],
            indexed: vec![Mirror::unknown(); BufferTarget::COUNT * slots as usize],
            cull: Mirror::unknown(),
            blend: Mirror::unknown(),
            depth: Mirror::unknown(),
        }
    }

    #[inline]
    #[must_use]
    pub fn driver(&self) -> &Rc<dyn GpuDriver> {
        &self.driver
    }

    #[inline]
    #[must_use]
    pub fn indexed_slots(&self) -> u32 {
        self.slots
    }

    fn indexed_entry(&mut self, target: BufferTarget, slot: u32) -> Result<&mut Mirror<BufferId>> {
        if !target.is_indexed() || slot >= self.slots {
            let limit = if target.is_indexed() { self.slots } else { 0 };
            return Err(LumenError::BindingSlotOutOfRange {
                target,
                slot,
                limit,
            });
        }
        let i = target.index() * self.slots as usize + slot as usize;
        Ok(&mut self.indexed[i])
    }

    fn indexed_row(&mut self, target: BufferTarget) -> &mut [Mirror<BufferId>] {
        let start = target.index() * self.slots as usize;
        &mut self.indexed[start..start + self.slots as usize]
    }

    // === Binding ===

    /// Returns `true` if the driver was called.
    pub fn bind_shader(&mut self, shader: ShaderId) -> bool {
        if !self.shader.update(shader) {
            return false;
        }
        self.driver.use_program(shader);
        true
    }

    /// Binding a vertex array switches the element-array binding, so that
    /// record becomes dirty.
    pub fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) -> bool {
        if !self.vertex_array.update(vertex_array) {
            return false;
        }
        self.driver.bind_vertex_array(vertex_array);
        self.buffers[BufferTarget::ElementArray.index()].dirty = true;
        true
    }

    pub fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) -> bool {
        if !self.buffers[target.index()].update(buffer) {
            return false;
        }
        self.driver.bind_buffer(target, buffer);
        true
    }

    /// Binds an indexed slot. Also updates the generic record of `target`,
    /// which the driver replaces as a side effect.
    pub fn bind_buffer_base(
        &mut self,
        target: BufferTarget,
        slot: u32,
        buffer: BufferId,
    ) -> Result<bool> {
        if !self.indexed_entry(target, slot)?.update(buffer) {
            return Ok(false);
        }
        self.driver.bind_buffer_base(target, slot, buffer);

        let generic = &mut self.buffers[target.index()];
        generic.value = buffer;
        generic.dirty = false;
        Ok(true)
    }

    pub fn bind_framebuffer(&mut self, framebuffer: FramebufferId) -> bool {
        if !self.framebuffer.update(framebuffer) {
            return false;
        }
        self.driver.bind_framebuffer(framebuffer);
        true
    }

    // === Deletion ===

    /// Deletes `buffer` through the driver.
    ///
    /// The record of `target` becomes dirty unconditionally. Every other
    /// record still mirroring `buffer` is cleared, since the driver unbinds a
    /// deleted buffer from all binding points.
    pub fn delete_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        self.buffers[target.index()].forget(buffer);
        for other in &mut self.buffers {
            other.forget_if_bound(buffer);
        }
        for entry in &mut self.indexed {
            entry.forget_if_bound(buffer);
        }
        self.driver.delete_buffer(buffer);
    }

    pub fn delete_shader(&mut self, shader: ShaderId) {
        self.shader.forget(shader);
        self.driver.delete_shader(shader);
    }

    pub fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_array.forget(vertex_array);
        self.buffers[BufferTarget::ElementArray.index()].dirty = true;
        self.driver.delete_vertex_array(vertex_array);
    }

    /// Forgets a framebuffer that is about to be destroyed.
    ///
    /// The driver falls back to the default framebuffer when the bound one is
    /// deleted; the record is marked dirty so the next bind is re-issued.
    pub fn invalidate_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffer.forget_if_bound(framebuffer);
    }

    // === Fixed-function state ===

    pub fn set_cull_mode(&mut self, mode: CullMode) -> bool {
        if !self.cull.update(mode) {
            return false;
        }
        self.driver.set_cull_mode(mode);
        true
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) -> bool {
        if !self.blend.update(mode) {
            return false;
        }
        self.driver.set_blend_mode(mode);
        true
    }

    pub fn set_depth_mode(&mut self, mode: DepthMode) -> bool {
        if !self.depth.update(mode) {
            return false;
        }
        self.driver.set_depth_mode(mode);
        true
    }

    // === Frame boundaries ===

    /// Marks every record dirty. The next bind of each category is issued
    /// to the driver regardless of the mirrored value.
    pub fn set_all_dirty(&mut self) {
        self.shader.dirty = true;
        self.vertex_array.dirty = true;
        self.framebuffer.dirty = true;
        for b in &mut self.buffers {
            b.dirty = true;
        }
        for b in &mut self.indexed {
            b.dirty = true;
        }
        self.cull.dirty = true;
        self.blend.dirty = true;
        self.depth.dirty = true;
    }

    /// Compares every clean record with the driver's actual binding.
    pub fn check_state_machine(&self) -> Result<()> {
        let d = &*self.driver;

        check("shader", self.shader.clean_value().map(ShaderId::raw), || {
            d.current_program().raw()
        })?;
        check(
            "vertex array",
            self.vertex_array.clean_value().map(VertexArrayId::raw),
            || d.current_vertex_array().raw(),
        )?;
        check(
            "framebuffer",
            self.framebuffer.clean_value().map(FramebufferId::raw),
            || d.current_framebuffer().raw(),
        )?;

        for target in BufferTarget::ALL {
            let mirror = self.buffers[target.index()].clean_value().map(BufferId::raw);
            check(&format!("buffer {target:?}"), mirror, || {
                d.current_buffer(target).raw()
            })?;

            if !target.is_indexed() {
                continue;
            }
            let start = target.index() * self.slots as usize;
            for slot in 0..self.slots {
                let entry = self.indexed[start + slot as usize];
                check(
                    &format!("buffer {target:?}[{slot}]"),
                    entry.clean_value().map(BufferId::raw),
                    || d.current_buffer_base(target, slot).raw(),
                )?;
            }
        }

        Ok(())
    }

    // === Introspection ===

    /// Mirrored shader, `None` while dirty.
    #[must_use]
    pub fn shader(&self) -> Option<ShaderId> {
        self.shader.clean_value()
    }

    #[must_use]
    pub fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array.clean_value()
    }

    #[must_use]
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer.clean_value()
    }

    #[must_use]
    pub fn buffer(&self, target: BufferTarget) -> Option<BufferId> {
        self.buffers[target.index()].clean_value()
    }

    #[must_use]
    pub fn buffer_base(&self, target: BufferTarget, slot: u32) -> Option<BufferId> {
        if !target.is_indexed() || slot >= self.slots {
            return None;
        }
        self.indexed[target.index() * self.slots as usize + slot as usize].clean_value()
    }

    /// Marks every indexed slot of `target` dirty.
    pub fn invalidate_indexed(&mut self, target: BufferTarget) {
        for entry in self.indexed_row(target) {
            entry.dirty = true;
        }
    }
}

fn check(category: &str, mirrored: Option<u32>, actual: impl FnOnce() -> u32) -> Result<()> {
    let Some(mirrored) = mirrored else {
        return Ok(());
    };
    let actual = actual();
    if mirrored == actual {
        return Ok(());
    }
    error!("Render state mismatch on {category}: mirror {mirrored}, driver {actual}");
    Err(LumenError::StateMismatch {
        category: category.to_owned(),
        mirrored,
        actual,
    })
}
