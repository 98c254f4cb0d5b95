//! Shader Pipeline
//!
//! Everything between shader files on disk and a bound, parameterised GPU
//! program:
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Where shader text comes from |
//! | [`preprocess`] | `#include` expansion and macro substitution |
//! | [`registry`] | Named shader/program table, reload and diagnostics |
//! | [`program`] | `.prog` definitions, linking, condition trees |
//! | [`uniforms`] | Per-program uniform location cache |
//! | [`active`] | Typed uniform setters on the bound program |
//!
//! # File kinds
//!
//! Files are classified by suffix: `.vert` and `.frag` are compile units,
//! `.prog` files describe a program as a list of stages plus the conditions
//! under which the program applies. Names are matched case-insensitively.

use std::fmt;

use crate::gl::ShaderStage;

pub mod active;
pub mod preprocess;
pub mod program;
pub mod registry;
pub mod source;
pub mod uniforms;

pub use active::{ActiveProgram, TexClampMode, TextureBinder};
pub use program::Program;
pub use registry::{Shader, ShaderRegistry};
pub use source::{DirectorySource, EmbeddedSource, MemorySource, ShaderSource};
pub use uniforms::{UniformKey, UniformLocationCache};

/// Stable handle to a registry entry.
///
/// Entries are never removed, so an id stays valid for the registry lifetime
/// even across reloads and table growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub(crate) u32);

impl ShaderId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of a registry entry, derived from the file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Vertex,
    Fragment,
    Program,
}

impl ShaderKind {
    /// Classifies an already lowercased file name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".frag") {
            Some(Self::Fragment)
        } else if name.ends_with(".vert") {
            Some(Self::Vertex)
        } else if name.ends_with(".prog") {
            Some(Self::Program)
        } else {
            None
        }
    }

    /// Pipeline stage of a compile unit, `None` for programs.
    #[must_use]
    pub fn stage(self) -> Option<ShaderStage> {
        match self {
            Self::Vertex => Some(ShaderStage::Vertex),
            Self::Fragment => Some(ShaderStage::Fragment),
            Self::Program => None,
        }
    }
}

/// A failed shader or program from the last reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDiagnostic {
    /// Lowercased file name of the failed entry.
    pub name: &'static str,
    pub message: String,
}

impl fmt::Display for ShaderDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:\n\n{}", self.name, self.message)
    }
}
