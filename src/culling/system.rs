//! Culling System
//!
//! Per-frame driver of the [`CullingBuffer`]: extracts the six frustum
//! planes from the active camera and runs one batch cull.
//!
//! # Data Flow
//! ```text
//! Camera ──view_projection──▶ Frustum (6 planes) ──▶ CullingBuffer::cull ──▶ visible bits
//! ```
//!
//! Run [`CullingSystem::cull`] once per frame after the camera matrices are
//! final and before any pass reads visibility.

use glam::Mat4;
use log::trace;

use super::buffer::{CullStats, CullingBuffer};
use crate::scene::camera::{Camera, Frustum};

/// Owns the culling buffer and the frustum of the last cull.
#[derive(Default)]
pub struct CullingSystem {
    buffer: CullingBuffer,
    frustum: Frustum,
    last_stats: CullStats,
}

impl CullingSystem {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: CullingBuffer::with_capacity(capacity),
            frustum: Frustum::default(),
            last_stats: CullStats::default(),
        }
    }

    /// Culls against the camera's current view-projection matrix.
    pub fn cull(&mut self, camera: &Camera) -> CullStats {
        self.cull_view_projection(camera.view_projection_matrix())
    }

    pub fn cull_view_projection(&mut self, view_projection: Mat4) -> CullStats {
        self.cull_frustum(Frustum::from_matrix(view_projection))
    }

    pub fn cull_frustum(&mut self, frustum: Frustum) -> CullStats {
        self.frustum = frustum;
        self.last_stats = self.buffer.cull(self.frustum.planes());
        trace!(
            "Culled {} of {} objects",
            self.last_stats.culled(),
            self.last_stats.live
        );
        self.last_stats
    }

    /// Buffer for `alloc` / `release` / `submit`.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &CullingBuffer {
        &self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut CullingBuffer {
        &mut self.buffer
    }

    /// Frustum used by the last cull.
    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    #[inline]
    #[must_use]
    pub fn last_stats(&self) -> CullStats {
        self.last_stats
    }
}
