//! Global String Interner
//!
//! Maps strings to compact integer [`Symbol`]s for comparison and hashing.
//! Shader names and uniform name patterns are interned once, so registry and
//! location-cache keys compare by integer and the resolved text lives for the
//! whole process.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

/// Global interner instance
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// Symbol type alias
///
/// A compact integer identifier that compares and hashes in O(1).
pub type Symbol = Spur;

/// Interns a string and returns its Symbol
///
/// Returns the existing Symbol when the string is already present.
#[inline]
pub fn intern(s: &str) -> Symbol {
    INTERNER.get_or_intern(s)
}

/// Resolves a Symbol back to its string
///
/// # Panics
/// Panics if the Symbol did not come from this interner.
#[inline]
pub fn resolve(sym: Symbol) -> &'static str {
    INTERNER.resolve(&sym)
}

/// Integer value of a Symbol, used as hash input.
#[inline]
#[must_use]
pub fn symbol_bits(sym: Symbol) -> u32 {
    lasso::Key::into_usize(sym) as u32
}

/// Pre-interns the uniform names broadcast to every linked program
///
/// Called when a render context is created so the global-uniform pass never
/// touches the interner's write path.
pub fn preload_global_uniforms() {
    let common = [
        "viewMatrix",
        "projectionMatrix",
        "lightSourcePosition0",
        "lightSourceDiffuse0",
        "lightSourceAmbient",
        "lightSourcePosition1",
        "lightSourceDiffuse1",
        "lightSourcePosition2",
        "lightSourceDiffuse2",
    ];

    for name in common {
        intern(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_resolve() {
        let s1 = intern("modelViewMatrix");
        let s2 = intern("modelViewMatrix");
        let s3 = intern("normalMatrix");

        assert_eq!(s1, s2);
        assert_ne!(s1, s3);

        assert_eq!(resolve(s1), "modelViewMatrix");
        assert_eq!(resolve(s3), "normalMatrix");
    }

    #[test]
    fn test_preload() {
        preload_global_uniforms();
        assert!(INTERNER.contains("lightSourceAmbient"));
        assert!(INTERNER.contains("lightSourceDiffuse2"));
    }
}
