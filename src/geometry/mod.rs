//! Geometry
//!
//! Content-addressed caching of uploaded vertex and index data.
//!
//! Callers hand over raw attribute arrays on every draw. The cache
//! fingerprints them ([`ShapeDataHash`]) and reuses the vertex array of a
//! byte-identical earlier draw, so static geometry is uploaded once no matter
//! how the scene graph hands it over.
//!
//! # Budgets
//!
//! Three counters are tracked: shapes, buffers and bytes. They are only
//! enforced when the owner calls [`GeometryCache::shrink_cache`], typically
//! once per frame.

pub mod cache;
pub mod hash;

pub use cache::{CacheLimits, GeometryCache, IndexData, ShapeKey};
pub use hash::{AttributeMask, AttributeSlot, MAX_ATTRIBUTES, ShapeDataHash};
