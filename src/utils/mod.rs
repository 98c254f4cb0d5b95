//! Utility Module
//!
//! - [`interner`]: String interning for shader names and uniform patterns
//!
//! # String Interning
//!
//! Interned strings (Symbols) compare in O(1) time and resolve to `'static`
//! text, which is what lets the shader registry hand out stable names and the
//! uniform cache key on content instead of pointer identity.
//!
//! ```rust,ignore
//! use glvariant::utils::interner;
//!
//! let sym1 = interner::intern("lightSourcePosition0");
//! let sym2 = interner::intern("lightSourcePosition0");
//! assert_eq!(sym1, sym2); // O(1) comparison
//! ```

pub mod interner;

pub use interner::Symbol;
