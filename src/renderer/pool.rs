//! Render Target Pool
//!
//! Content-addressed cache of [`RenderTarget`]s keyed by their attachment
//! set.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    RenderTargetPool                      │
//! │                                                          │
//! │  targets: SlotMap<RenderTargetKey, RenderTarget>         │
//! │                                                          │
//! │  get(desc, frame)  linear scan → hit | create            │
//! │                    last_use_frame = frame                │
//! │                    dirty? → rebind_attachments           │
//! │                    sweep (at most once per `timeout`)    │
//! │  clear_all_cache() destroy everything                    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The pool holds a handful of targets per frame, so the lookup is a linear
//! scan comparing attachment lists.
//!
//! # Eviction
//!
//! A target that has not been returned by [`get`](RenderTargetPool::get) for
//! `timeout` frames is destroyed by the next sweep. Sweeps run from `get`
//! and are rate-limited to one every `timeout` frames, so an idle target lives
//! between `timeout` and `2 * timeout` frames. Keys of evicted targets stop
//! resolving.

use std::rc::Rc;

use log::{debug, info};
use slotmap::{SlotMap, new_key_type};

use super::driver::GpuDriver;
use super::state::RenderState;
use super::target::{ClearFlags, RenderTarget, RenderTargetDesc};
use crate::errors::{LumenError, Result};

new_key_type! {
    /// Handle to a pooled render target. Stops resolving after eviction.
    pub struct RenderTargetKey;
}

/// Cache of framebuffers keyed by attachment set.
pub struct RenderTargetPool {
    targets: SlotMap<RenderTargetKey, RenderTarget>,
    timeout: u64,
    last_clear_frame: u64,
    driver: Rc<dyn GpuDriver>,
}

impl RenderTargetPool {
    /// `timeout` is the number of idle frames after which a target is evicted.
    #[must_use]
    pub fn new(driver: Rc<dyn GpuDriver>, timeout: u64) -> Self {
        Self {
            targets: SlotMap::with_key(),
            timeout: timeout.max(1),
            last_clear_frame: 0,
            driver,
        }
    }

    #[inline]
    #[must_use]
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: RenderTargetKey) -> bool {
        self.targets.contains_key(key)
    }

    #[must_use]
    pub fn target(&self, key: RenderTargetKey) -> Option<&RenderTarget> {
        self.targets.get(key)
    }

    fn resolve(&self, key: RenderTargetKey) -> Result<&RenderTarget> {
        self.targets.get(key).ok_or(LumenError::RenderTargetEvicted)
    }

    /// Returns the target for `desc`, creating it on a miss.
    ///
    /// A dirty target (fresh, or one of its textures was resized) is rebound
    /// before returning; rebind failures are fatal and leave the target dirty
    /// in the pool.
    pub fn get(
        &mut self,
        desc: &RenderTargetDesc,
        frame: u64,
        state: &mut RenderState,
    ) -> Result<RenderTargetKey> {
        let found = self
            .targets
            .iter()
            .find(|(_, target)| target.matches(desc))
            .map(|(key, _)| key);

        let key = match found {
            Some(key) => key,
            None => {
                let target = RenderTarget::new(self.driver.clone(), desc)?;
                self.targets.insert(target)
            }
        };

        let target = self
            .targets
            .get_mut(key)
            .ok_or(LumenError::RenderTargetEvicted)?;
        target.name.clone_from(&desc.name);
        target.last_use_frame = frame;
        if target.is_dirty() {
            target.rebind_attachments(state)?;
        }

        self.clear_unused(frame, state);
        Ok(key)
    }

    /// Binds the target's framebuffer and sets the viewport to its size.
    pub fn use_target(&self, key: RenderTargetKey, state: &mut RenderState) -> Result<()> {
        self.resolve(key)?.use_target(state);
        Ok(())
    }

    pub fn clear(
        &self,
        key: RenderTargetKey,
        state: &mut RenderState,
        flags: ClearFlags,
        colors: &[wgpu::Color],
        depth: f32,
    ) -> Result<()> {
        self.resolve(key)?.clear(state, flags, colors, depth)
    }

    /// Eviction sweep. Runs at most once every `timeout` frames.
    fn clear_unused(&mut self, frame: u64, state: &mut RenderState) {
        if frame.saturating_sub(self.last_clear_frame) < self.timeout {
            return;
        }
        self.last_clear_frame = frame;

        let timeout = self.timeout;
        let before = self.targets.len();
        self.targets.retain(|_, target| {
            let keep = frame.saturating_sub(target.last_use_frame) < timeout;
            if !keep {
                debug!(
                    "Evicting render target '{}' (idle since frame {})",
                    target.name, target.last_use_frame
                );
                state.invalidate_framebuffer(target.framebuffer());
            }
            keep
        });

        let evicted = before - self.targets.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle render target(s) at frame {frame}");
        }
    }

    /// Destroys every pooled target.
    pub fn clear_all_cache(&mut self, state: &mut RenderState) {
        for (_, target) in &self.targets {
            state.invalidate_framebuffer(target.framebuffer());
        }
        let count = self.targets.len();
        self.targets.clear();
        if count > 0 {
            info!("Cleared render target cache ({count} targets)");
        }
    }
}

impl std::fmt::Debug for RenderTargetPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTargetPool")
            .field("targets", &self.targets.len())
            .field("timeout", &self.timeout)
            .field("last_clear_frame", &self.last_clear_frame)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::driver::HeadlessDriver;
    use crate::renderer::texture::{RenderTexture, RenderTextureDesc};

    #[test]
    fn sweep_is_rate_limited() {
        let gpu = Rc::new(HeadlessDriver::new());
        let mut state = RenderState::new(gpu.clone(), 12);
        let mut pool = RenderTargetPool::new(gpu.clone(), 10);

        let rgba = wgpu::TextureFormat::Rgba8Unorm;
        let a = RenderTexture::new(gpu.clone(), &RenderTextureDesc::new("a", 4, 4, rgba));
        let b = RenderTexture::new(gpu.clone(), &RenderTextureDesc::new("b", 4, 4, rgba));
        let desc_a = RenderTargetDesc::new("a").with_color(0, a);
        let desc_b = RenderTargetDesc::new("b").with_color(0, b);

        // A used once at frame 1; the frame 10 sweep sees it idle for 9 frames.
        pool.get(&desc_a, 1, &mut state).unwrap();
        for frame in 2..=19 {
            pool.get(&desc_b, frame, &mut state).unwrap();
        }
        assert_eq!(pool.len(), 2);

        // Next sweep at frame 20 evicts it.
        pool.get(&desc_b, 20, &mut state).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn failed_rebind_keeps_target_dirty() {
        let gpu = Rc::new(HeadlessDriver::new());
        let mut state = RenderState::new(gpu.clone(), 12);
        let mut pool = RenderTargetPool::new(gpu.clone(), 10);

        let color_desc = RenderTextureDesc::new("c", 8, 8, wgpu::TextureFormat::Rgba8Unorm);
        let depth_desc = RenderTextureDesc::new("d", 4, 4, wgpu::TextureFormat::Depth32Float);
        let color = RenderTexture::new(gpu.clone(), &color_desc);
        let depth = RenderTexture::new(gpu.clone(), &depth_desc);
        let desc = RenderTargetDesc::new("t")
            .with_color(0, color)
            .with_depth(depth.clone(), false);

        assert!(pool.get(&desc, 0, &mut state).is_err());
        assert_eq!(pool.len(), 1);

        depth.resize(8, 8);
        let key = pool.get(&desc, 1, &mut state).unwrap();
        assert!(!pool.target(key).unwrap().is_dirty());
    }
}
