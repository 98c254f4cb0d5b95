//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! Failures fall into three families:
//! - [`ShaderError`]: load, compile and link failures of a single shader or
//!   program. These never abort a reload; the registry turns them into
//!   [`ShaderDiagnostic`](crate::shader::ShaderDiagnostic)s.
//! - [`GeometryError`]: malformed draw input or GPU object creation failure in
//!   the geometry cache.
//! - [`GlError`]: the umbrella type returned by fallible public APIs.
//!
//! # Usage
//!
//! ```rust,ignore
//! use glvariant::errors::{GlError, Result};
//!
//! fn upload() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single shader stage or program.
///
/// The `Display` text is the human-readable diagnostic shown to the user.
#[derive(Error, Debug)]
pub enum ShaderError {
    // ========================================================================
    // Load Errors
    // ========================================================================
    /// The source file could not be read.
    #[error("couldn't open {path} for read access: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source collaborator has no file with this name.
    #[error("couldn't open {0} for read access")]
    NotFound(String),

    /// A line-initial `#include` directive is malformed.
    #[error("invalid #include syntax in {0}")]
    InvalidInclude(String),

    /// `#include` nesting went past the depth limit (usually a cycle).
    #[error("{0}: #include recursion depth is too high")]
    IncludeDepth(String),

    /// The expanded source is not valid UTF-8.
    #[error("{0}: source is not valid UTF-8")]
    InvalidUtf8(String),

    /// Unbalanced or malformed `checkgroup` directive.
    #[error("{0}")]
    CheckGroup(&'static str),

    // ========================================================================
    // Compile Errors
    // ========================================================================
    /// The driver rejected the shader source. Holds the info log.
    #[error("{0}")]
    Compile(String),

    // ========================================================================
    // Link Errors
    // ========================================================================
    /// A `shaders` directive names a stage that is not registered.
    #[error("shader {0} not found")]
    MissingShader(String),

    /// A `shaders` directive names a stage that failed to compile.
    #[error("depends on shader {0} which was not compiled successfully")]
    DependencyFailed(String),

    /// The driver rejected linking. Holds the info log.
    #[error("{0}")]
    Link(String),

    /// The driver refused to create a shader or program object.
    #[error("failed to create GPU object: {0}")]
    CreateObject(String),
}

/// Invalid draw input or GPU failure inside the geometry cache.
#[derive(Error, Debug)]
pub enum GeometryError {
    /// The attribute mask uses slot `index` but no data slice was supplied.
    #[error("attribute {index} is enabled in the mask but no data was supplied")]
    MissingAttribute { index: usize },

    /// The data slice for attribute `index` holds fewer floats than required.
    #[error("attribute {index} needs {expected} floats, got {actual}")]
    AttributeTooShort {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// The driver refused to create a buffer or vertex array.
    #[error("failed to create GPU object: {0}")]
    CreateObject(String),
}

/// The umbrella error type of the crate.
#[derive(Error, Debug)]
pub enum GlError {
    /// Shader or program failure.
    #[error("Shader error: {0}")]
    Shader(#[from] ShaderError),

    /// Geometry cache failure.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, GlError>`.
pub type Result<T> = std::result::Result<T, GlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_failure_names_the_stage() {
        let err = ShaderError::DependencyFailed("a.frag".into());
        assert_eq!(
            err.to_string(),
            "depends on shader a.frag which was not compiled successfully"
        );
    }

    #[test]
    fn umbrella_wraps_geometry_errors() {
        let err: GlError = GeometryError::MissingAttribute { index: 2 }.into();
        assert!(err.to_string().contains("attribute 2"));
    }
}
