//! Culling Buffer
//!
//! Structure-of-arrays storage for object bounds plus the per-slot
//! visibility computed by the last [`CullingBuffer::cull`].
//!
//! # Layout
//!
//! ```text
//! slot:       0     1     2     3   ...
//! center_x  [ f32 | f32 | f32 | f32 ]
//! center_y  [ f32 | f32 | f32 | f32 ]
//! center_z  [ f32 | f32 | f32 | f32 ]
//! extents_x [ f32 | f32 | f32 | f32 ]
//! extents_y [ f32 | f32 | f32 | f32 ]
//! extents_z [ f32 | f32 | f32 | f32 ]
//! visible   [ bool| bool| bool| bool]
//! live      [ yes | no  | yes | yes ]   ← slot 1 is on the free list
//! ```
//!
//! Slots are never removed or reordered, so an index handed out by
//! [`CullingBuffer::alloc`] stays valid until it is released. Released slots
//! go onto a LIFO free list and are reused by the next allocation.
//!
//! # Accessors
//!
//! [`CullingBufferAccessor`] is a capability: slot index, slot generation, an
//! `enabled` flag and a weak reference to the storage. Once released (or if
//! never allocated) it is inert: [`submit`](CullingBufferAccessor::submit)
//! does nothing and [`visible`](CullingBufferAccessor::visible) returns
//! `false`. The generation check additionally keeps an accessor from ever
//! touching a slot that was recycled for somebody else.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec4;
use log::{trace, warn};

use crate::scene::bounds::Bounds;

/// Result summary of one cull pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Occupied slots that were tested.
    pub live: usize,
    /// Occupied slots that passed all six planes.
    pub visible: usize,
}

impl CullStats {
    #[inline]
    #[must_use]
    pub fn culled(&self) -> usize {
        self.live - self.visible
    }
}

#[derive(Default)]
struct CullingSoA {
    center_x: Vec<f32>,
    center_y: Vec<f32>,
    center_z: Vec<f32>,
    extents_x: Vec<f32>,
    extents_y: Vec<f32>,
    extents_z: Vec<f32>,
    visible: Vec<bool>,
    live: Vec<bool>,
    generation: Vec<u32>,
    free: Vec<u32>,
}

impl CullingSoA {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            center_x: Vec::with_capacity(capacity),
            center_y: Vec::with_capacity(capacity),
            center_z: Vec::with_capacity(capacity),
            extents_x: Vec::with_capacity(capacity),
            extents_y: Vec::with_capacity(capacity),
            extents_z: Vec::with_capacity(capacity),
            visible: Vec::with_capacity(capacity),
            live: Vec::with_capacity(capacity),
            generation: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.live.len()
    }

    fn push_slot(&mut self) -> u32 {
        let index = self.len() as u32;
        self.center_x.push(0.0);
        self.center_y.push(0.0);
        self.center_z.push(0.0);
        self.extents_x.push(0.0);
        self.extents_y.push(0.0);
        self.extents_z.push(0.0);
        self.visible.push(true);
        self.live.push(false);
        self.generation.push(0);
        index
    }

    #[inline]
    fn is_current(&self, index: u32, generation: u32) -> bool {
        let i = index as usize;
        i < self.len() && self.live[i] && self.generation[i] == generation
    }

    fn write(&mut self, i: usize, bounds: &Bounds) {
        self.center_x[i] = bounds.center.x;
        self.center_y[i] = bounds.center.y;
        self.center_z[i] = bounds.center.z;
        self.extents_x[i] = bounds.extents.x;
        self.extents_y[i] = bounds.extents.y;
        self.extents_z[i] = bounds.extents.z;
    }
}

/// One frustum plane split into the scalars the inner loop needs.
#[derive(Clone, Copy)]
struct CullPlane {
    nx: f32,
    ny: f32,
    nz: f32,
    ax: f32,
    ay: f32,
    az: f32,
    d: f32,
}

impl From<Vec4> for CullPlane {
    fn from(p: Vec4) -> Self {
        Self {
            nx: p.x,
            ny: p.y,
            nz: p.z,
            ax: p.x.abs(),
            ay: p.y.abs(),
            az: p.z.abs(),
            d: p.w,
        }
    }
}

/// SoA store of object bounds and their visibility.
pub struct CullingBuffer {
    storage: Rc<RefCell<CullingSoA>>,
}

impl CullingBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Rc::new(RefCell::new(CullingSoA::with_capacity(capacity))),
        }
    }

    /// Reserves a slot and returns the accessor bound to it.
    ///
    /// Never fails; the arrays grow as needed. A recycled slot starts out
    /// visible with zeroed bounds, exactly like a fresh one.
    pub fn alloc(&mut self) -> CullingBufferAccessor {
        let mut s = self.storage.borrow_mut();

        let index = match s.free.pop() {
            Some(index) => index,
            None => s.push_slot(),
        };

        let i = index as usize;
        s.live[i] = true;
        s.visible[i] = true;
        s.write(i, &Bounds::new(glam::Vec3::ZERO, glam::Vec3::ZERO));

        CullingBufferAccessor {
            index,
            generation: s.generation[i],
            enabled: true,
            buffer: Rc::downgrade(&self.storage),
        }
    }

    /// Returns the accessor's slot to the free list and disables the accessor.
    ///
    /// Releasing an accessor that is already disabled, or that belongs to a
    /// different buffer, is a no-op.
    pub fn release(&mut self, accessor: &mut CullingBufferAccessor) {
        if !accessor.enabled {
            trace!("CullingBuffer::release on disabled accessor (slot {})", accessor.index);
            return;
        }
        if !Weak::ptr_eq(&accessor.buffer, &Rc::downgrade(&self.storage)) {
            warn!(
                "CullingBuffer::release: accessor for slot {} belongs to another buffer",
                accessor.index
            );
            return;
        }

        let mut s = self.storage.borrow_mut();
        if s.is_current(accessor.index, accessor.generation) {
            let i = accessor.index as usize;
            s.live[i] = false;
            s.visible[i] = false;
            s.generation[i] = s.generation[i].wrapping_add(1);
            s.free.push(accessor.index);
        }
        accessor.enabled = false;
    }

    /// Overwrites the bounds of a slot. Out-of-range indices are ignored.
    pub fn set_bounds(&mut self, index: u32, bounds: &Bounds) {
        let mut s = self.storage.borrow_mut();
        let i = index as usize;
        if i < s.len() {
            s.write(i, bounds);
        } else {
            warn!("CullingBuffer::set_bounds: slot {index} out of range");
        }
    }

    /// Visibility computed by the last cull. Stale until the next
    /// [`cull`](Self::cull); `false` for out-of-range or empty slots.
    #[must_use]
    pub fn visible(&self, index: u32) -> bool {
        let s = self.storage.borrow();
        let i = index as usize;
        i < s.len() && s.live[i] && s.visible[i]
    }

    /// Tests every occupied slot against six inward-facing planes.
    ///
    /// For plane `(n, d)`: `r = extents · |n|`, `s = n · center + d`; the box
    /// is outside iff `s < -r`. A slot is visible when it is outside none of
    /// the planes. Empty slots are skipped; released slots read as not
    /// visible.
    pub fn cull(&mut self, planes: &[Vec4; 6]) -> CullStats {
        let planes: [CullPlane; 6] = planes.map(CullPlane::from);

        let mut s = self.storage.borrow_mut();
        let s = &mut *s;
        let n = s.len();

        let cx = &s.center_x[..n];
        let cy = &s.center_y[..n];
        let cz = &s.center_z[..n];
        let ex = &s.extents_x[..n];
        let ey = &s.extents_y[..n];
        let ez = &s.extents_z[..n];
        let live = &s.live[..n];
        let visible = &mut s.visible[..n];

        let mut stats = CullStats::default();
        for i in 0..n {
            if !live[i] {
                continue;
            }

            let mut inside = true;
            for p in &planes {
                let r = ex[i] * p.ax + ey[i] * p.ay + ez[i] * p.az;
                let dist = cx[i] * p.nx + cy[i] * p.ny + cz[i] * p.nz + p.d;
                inside &= dist >= -r;
            }

            visible[i] = inside;
            stats.live += 1;
            stats.visible += usize::from(inside);
        }

        stats
    }

    /// Number of slots ever created (occupied + free).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.storage.borrow().len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn live_count(&self) -> usize {
        let s = self.storage.borrow();
        s.len() - s.free.len()
    }
}

impl Default for CullingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability handle to one slot of a [`CullingBuffer`].
///
/// Deliberately not `Clone`: releasing through `&mut` must disable the only
/// handle to the slot.
#[derive(Debug)]
pub struct CullingBufferAccessor {
    index: u32,
    generation: u32,
    enabled: bool,
    buffer: Weak<RefCell<CullingSoA>>,
}

impl Default for CullingBufferAccessor {
    /// A never-allocated, disabled accessor.
    fn default() -> Self {
        Self {
            index: u32::MAX,
            generation: 0,
            enabled: false,
            buffer: Weak::new(),
        }
    }
}

impl CullingBufferAccessor {
    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Writes new bounds into the slot. Does not compute visibility.
    pub fn submit(&self, bounds: &Bounds) {
        if !self.enabled {
            return;
        }
        let Some(storage) = self.buffer.upgrade() else {
            return;
        };
        let mut s = storage.borrow_mut();
        if s.is_current(self.index, self.generation) {
            s.write(self.index as usize, bounds);
        }
    }

    /// Last computed visibility of the slot.
    #[must_use]
    pub fn visible(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(storage) = self.buffer.upgrade() else {
            return false;
        };
        let s = storage.borrow();
        s.is_current(self.index, self.generation) && s.visible[self.index as usize]
    }
}

impl std::fmt::Debug for CullingSoA {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CullingSoA")
            .field("slots", &self.len())
            .field("free", &self.free.len())
            .finish_non_exhaustive()
    }
}
