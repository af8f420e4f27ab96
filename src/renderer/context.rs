//! Render Context
//!
//! Owns every per-frame subsystem of the core and drives the frame
//! lifecycle. There is exactly one mutator; passes receive `&mut
//! RenderContext`.
//!
//! # Frame Lifecycle
//!
//! ```text
//! begin_frame()        advance frame counter
//!   cull(&camera)      frustum planes → batch cull
//!   passes:            visibility queries, acquire/use/clear render targets,
//!                      binds through state_mut()
//! end_frame()          optional state validation → set_all_dirty()
//! ...
//! shutdown()           destroy pooled render targets
//! ```

use std::rc::Rc;

use log::{debug, info, trace, warn};

use super::driver::{FramebufferId, GpuDriver};
use super::pool::{RenderTargetKey, RenderTargetPool};
use super::settings::CoreSettings;
use super::state::RenderState;
use super::target::{ClearFlags, RenderTargetDesc};
use super::texture::{RenderTexture, RenderTextureDesc, RenderTextureRef};
use crate::culling::{CullStats, CullingSystem};
use crate::errors::{LumenError, Result};
use crate::scene::camera::Camera;
use crate::utils::FrameClock;

/// The per-frame resource and visibility core.
pub struct RenderContext {
    settings: CoreSettings,
    driver: Rc<dyn GpuDriver>,
    clock: FrameClock,
    state: RenderState,
    pool: RenderTargetPool,
    culling: CullingSystem,
    screen_size: (u32, u32),
    target_stack: Vec<RenderTargetKey>,
}

impl RenderContext {
    pub fn new(driver: Rc<dyn GpuDriver>, settings: CoreSettings) -> Result<Self> {
        settings.validate()?;

        info!(
            "Render context: timeout {} frames, {} indexed slots, culling capacity {}",
            settings.render_target_timeout,
            settings.indexed_binding_slots,
            settings.culling_capacity
        );

        Ok(Self {
            state: RenderState::new(driver.clone(), settings.indexed_binding_slots),
            pool: RenderTargetPool::new(driver.clone(), settings.render_target_timeout),
            culling: CullingSystem::new(settings.culling_capacity),
            clock: FrameClock::new(),
            screen_size: (0, 0),
            target_stack: Vec::with_capacity(settings.max_render_target_stack),
            settings,
            driver,
        })
    }

    // === Accessors ===

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn driver(&self) -> &Rc<dyn GpuDriver> {
        &self.driver
    }

    /// Current frame index.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    #[inline]
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &RenderTargetPool {
        &self.pool
    }

    #[inline]
    #[must_use]
    pub fn culling(&self) -> &CullingSystem {
        &self.culling
    }

    #[inline]
    pub fn culling_mut(&mut self) -> &mut CullingSystem {
        &mut self.culling
    }

    #[inline]
    #[must_use]
    pub fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }

    #[inline]
    #[must_use]
    pub fn render_target_depth(&self) -> usize {
        self.target_stack.len()
    }

    // === Frame lifecycle ===

    pub fn begin_frame(&mut self) {
        let frame = self.clock.tick();
        trace!("Frame {frame} begins");
    }

    /// Runs the frame's visibility pass against `camera`.
    pub fn cull(&mut self, camera: &Camera) -> CullStats {
        self.culling.cull(camera)
    }

    /// Ends the frame.
    ///
    /// With `validate_state_machine` set, the state mirror is checked against
    /// the driver first; the mirror is marked dirty either way.
    pub fn end_frame(&mut self) -> Result<()> {
        let checked = if self.settings.validate_state_machine {
            self.state.check_state_machine()
        } else {
            Ok(())
        };

        if !self.target_stack.is_empty() {
            if self.settings.warn_on_leaked_target_stack {
                warn!(
                    "Frame {} ended with {} pushed render target(s)",
                    self.frame(),
                    self.target_stack.len()
                );
            }
            self.target_stack.clear();
        }

        self.state.set_all_dirty();
        checked
    }

    /// Destroys every pooled render target.
    pub fn shutdown(&mut self) {
        self.target_stack.clear();
        self.pool.clear_all_cache(&mut self.state);
        info!("Render context shut down at frame {}", self.frame());
    }

    // === Render textures ===

    #[must_use]
    pub fn create_render_texture(&self, desc: &RenderTextureDesc) -> RenderTextureRef {
        RenderTexture::new(self.driver.clone(), desc)
    }

    // === Render targets ===

    /// Pooled target for `desc`, rebound if stale.
    pub fn acquire_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetKey> {
        let frame = self.frame();
        self.pool.get(desc, frame, &mut self.state)
    }

    pub fn use_render_target(&mut self, key: RenderTargetKey) -> Result<()> {
        self.pool.use_target(key, &mut self.state)
    }

    pub fn clear_render_target(
        &mut self,
        key: RenderTargetKey,
        flags: ClearFlags,
        colors: &[wgpu::Color],
        depth: f32,
    ) -> Result<()> {
        self.pool.clear(key, &mut self.state, flags, colors, depth)
    }

    /// Acquires and uses the target for `desc`, remembering it so
    /// [`pop_render_target`](Self::pop_render_target) can restore the
    /// previous one.
    pub fn push_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetKey> {
        let limit = self.settings.max_render_target_stack;
        if self.target_stack.len() >= limit {
            return Err(LumenError::RenderTargetStackOverflow { limit });
        }

        let key = self.acquire_render_target(desc)?;
        self.use_render_target(key)?;
        self.target_stack.push(key);
        Ok(key)
    }

    /// Pops the current target and re-binds the one below it, or the screen
    /// when the stack becomes empty.
    pub fn pop_render_target(&mut self) -> Result<()> {
        if self.target_stack.pop().is_none() {
            return Err(LumenError::RenderTargetStackUnderflow);
        }

        match self.target_stack.last().copied() {
            Some(previous) => self.use_render_target(previous),
            None => {
                self.use_screen_target();
                Ok(())
            }
        }
    }

    /// Binds the default framebuffer with the screen-sized viewport.
    pub fn use_screen_target(&mut self) {
        self.state.bind_framebuffer(FramebufferId::NONE);
        let (width, height) = self.screen_size;
        self.driver.viewport(0, 0, width, height);
    }

    pub fn resize_screen(&mut self, width: u32, height: u32) {
        if self.screen_size != (width, height) {
            debug!("Screen resized to {width}x{height}");
            self.screen_size = (width, height);
        }
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.pool.clear_all_cache(&mut self.state);
    }
}
