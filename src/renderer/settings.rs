//! Core Settings
//!
//! Tunables for the per-frame resource core: eviction window of the render
//! target pool, initial culling capacity, indexed binding slot count and the
//! debug-only state verification pass.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lumen::renderer::CoreSettings;
//!
//! // Defaults: 10-frame eviction, 12 indexed slots, no state validation
//! let settings = CoreSettings::default();
//!
//! // Loaded from a JSON config, missing fields fall back to defaults
//! let settings = CoreSettings::from_json_str(r#"{ "validate_state_machine": true }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{LumenError, Result};

/// Configuration consumed by [`RenderContext::new`](crate::renderer::RenderContext::new).
///
/// # Fields
///
/// | Field                         | Description                                   | Default |
/// |-------------------------------|-----------------------------------------------|---------|
/// | `render_target_timeout`       | Idle frames before a pooled target is evicted | `10`    |
/// | `culling_capacity`            | Initial slot capacity of the culling buffer   | `1024`  |
/// | `indexed_binding_slots`       | Indexed buffer binding slots per target       | `12`    |
/// | `validate_state_machine`      | Re-query the driver at frame end              | `false` |
/// | `max_render_target_stack`     | Nesting limit of pushed render targets        | `10`    |
/// | `warn_on_leaked_target_stack` | Warn when the stack is non-empty at frame end | `true`  |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// Number of consecutive frames without a `get` after which a pooled
    /// render target is destroyed. Also the period of the eviction sweep.
    pub render_target_timeout: u64,

    /// Number of slots reserved up-front in every culling array.
    pub culling_capacity: usize,

    /// Indexed binding slots mirrored per buffer target
    /// (uniform / storage bindings).
    pub indexed_binding_slots: u32,

    /// Run [`RenderState::check_state_machine`](crate::renderer::RenderState::check_state_machine)
    /// before every `end_frame`. Costs one driver query per clean mirror entry.
    pub validate_state_machine: bool,

    /// Maximum depth of the render target stack, see
    /// [`RenderContext::push_render_target`](crate::renderer::RenderContext::push_render_target).
    pub max_render_target_stack: usize,

    /// Log a warning when a frame ends with pushed render targets.
    pub warn_on_leaked_target_stack: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            render_target_timeout: 10,
            culling_capacity: 1024,
            indexed_binding_slots: 12,
            validate_state_machine: false,
            max_render_target_stack: 10,
            warn_on_leaked_target_stack: true,
        }
    }
}

impl CoreSettings {
    /// Parses settings from JSON. Missing fields take their default value.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the core cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.render_target_timeout == 0 {
            return Err(LumenError::InvalidSettings(
                "render_target_timeout must be at least 1 frame".into(),
            ));
        }
        if self.indexed_binding_slots == 0 {
            return Err(LumenError::InvalidSettings(
                "indexed_binding_slots must be non-zero".into(),
            ));
        }
        if self.max_render_target_stack == 0 {
            return Err(LumenError::InvalidSettings(
                "max_render_target_stack must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
