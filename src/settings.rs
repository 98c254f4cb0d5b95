//! Context Settings
//!
//! Tunables of a [`RenderContext`](crate::RenderContext), fixed at creation
//! except for the cache budgets.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use glvariant::{CacheLimits, ContextSettings};
//!
//! let settings = ContextSettings {
//!     num_texture_units: 24,
//!     cache_limits: CacheLimits {
//!         max_bytes: 64 * 1024 * 1024,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! ```
//!
//! Settings derive `serde` traits so applications can keep them in their own
//! configuration files. Missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};

pub use crate::geometry::CacheLimits;

/// Configuration of a render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Texture units available to materials, including the two the renderer
    /// reserves. Shaders see `num_texture_units - 2` through
    /// `SF_NUM_TEXTURE_UNITS`.
    pub num_texture_units: u32,

    /// Hard limit for sampler binding and sampler arrays.
    pub max_texture_units: u32,

    /// Geometry cache budgets.
    pub cache_limits: CacheLimits,
}

impl Default for ContextSettings {
    #[inline]
    fn default() -> Self {
        Self {
            num_texture_units: 16,
            max_texture_units: 32,
            cache_limits: CacheLimits::default(),
        }
    }
}
