#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! GPU resource cache and shader-variant engine.
//!
//! Sits between a scene renderer and OpenGL:
//!
//! - [`shader`]: compiles shader stages with `#include` support and links
//!   programs whose applicability is described by [`condition`] trees;
//! - [`shader::uniforms`]: caches uniform locations per program;
//! - [`geometry`]: reuses uploaded vertex/index buffers for byte-identical
//!   draws, with LRU eviction under three budgets.
//!
//! [`RenderContext`] ties them together for one GL context. All GPU calls go
//! through [`gl::GraphicsApi`].

pub mod condition;
pub mod context;
pub mod errors;
pub mod geometry;
pub mod gl;
pub mod settings;
pub mod shader;
pub mod utils;

pub use condition::{Condition, ConditionGroup, ConditionSingle, FieldValue, ModelAccess};
pub use context::{GlobalUniforms, RenderContext};
pub use errors::{GeometryError, GlError, Result, ShaderError};
pub use geometry::{AttributeMask, CacheLimits, GeometryCache, IndexData, ShapeDataHash};
pub use gl::GraphicsApi;
pub use gl::headless::HeadlessGl;
pub use settings::ContextSettings;
pub use shader::{
    ActiveProgram, DirectorySource, EmbeddedSource, MemorySource, ShaderDiagnostic, ShaderId,
    ShaderRegistry, ShaderSource, TexClampMode, TextureBinder,
};
pub use utils::interner;
