//! Program Definitions & Linking
//!
//! A `.prog` file is read line by line, each line trimmed:
//!
//! ```text
//! shaders default.vert default.frag
//! checkgroup begin or
//! check NiTexturingProperty
//! check not HEADER/Version < 0x14020007
//! checkgroup end
//! ```
//!
//! `shaders` names the stages to attach, `checkgroup begin [or]` opens a
//! nested group, `checkgroup end` closes the innermost one and `check [not]`
//! adds a condition to it. Lines starting with anything else are ignored. Stages are attached as
//! soon as their `shaders` line is read; the program is linked after the last
//! line. Groups must be balanced.

use crate::condition::{ConditionGroup, ConditionParser, ConditionSingle, ModelAccess};
use crate::errors::ShaderError;
use crate::gl::GraphicsApi;

use super::source::ShaderSource;
use super::uniforms::{UniformKey, UniformLocationCache};

/// A linked (or linkable) program and its per-variant state.
pub struct Program<G: GraphicsApi> {
    pub(crate) handle: Option<G::Program>,
    pub(crate) conditions: ConditionGroup,
    pub(crate) uniforms: UniformLocationCache,
}

impl<G: GraphicsApi> Default for Program<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GraphicsApi> Program<G> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: None,
            conditions: ConditionGroup::new(false),
            uniforms: UniformLocationCache::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> Option<G::Program> {
        self.handle
    }

    /// Root of the condition tree parsed from the definition.
    #[must_use]
    pub fn conditions(&self) -> &ConditionGroup {
        &self.conditions
    }

    #[must_use]
    pub fn uniforms(&self) -> &UniformLocationCache {
        &self.uniforms
    }

    /// Whether this program variant applies to the given blocks.
    pub fn matches<M: ModelAccess>(&self, model: &M, blocks: &[M::Index]) -> bool {
        self.conditions.eval(model, blocks)
    }

    /// Cached location of a uniform name pattern with packed arguments.
    pub fn location_args(&mut self, gl: &G, pattern: &str, args: u32) -> i32 {
        let Some(handle) = self.handle else {
            return crate::gl::NO_LOCATION;
        };
        self.uniforms.get_or_resolve(UniformKey::new(pattern, args), |name| {
            gl.uniform_location(handle, name)
        })
    }

    /// Cached location of a plain uniform name.
    pub fn location(&mut self, gl: &G, name: &str) -> i32 {
        self.location_args(gl, name, 0)
    }

    /// Deletes the GPU object and forgets everything derived from it.
    pub(crate) fn release(&mut self, gl: &G) {
        if let Some(handle) = self.handle.take() {
            gl.delete_program(handle);
        }
        self.conditions.clear();
        self.uniforms.clear();
    }
}

/// Parses the definition at `path`, attaching stages to `handle` as they are
/// named, then links.
///
/// `resolve_stage` maps a stage name to its compiled handle, failing with
/// [`ShaderError::MissingShader`] or [`ShaderError::DependencyFailed`].
/// Returns the condition tree on success.
pub fn load_program<G, S, F>(
    gl: &G,
    source: &S,
    path: &str,
    handle: G::Program,
    mut resolve_stage: F,
) -> Result<ConditionGroup, ShaderError>
where
    G: GraphicsApi + ?Sized,
    S: ShaderSource + ?Sized,
    F: FnMut(&str) -> Result<G::Shader, ShaderError>,
{
    let data = source.read(path)?;
    let text = String::from_utf8_lossy(&data);

    let mut root = ConditionGroup::new(false);
    let mut parser = ConditionParser::new(&mut root);

    for line in text.lines() {
        let line = line.trim();

        if line.starts_with("shaders") {
            for name in line.split_whitespace().skip(1) {
                let stage = resolve_stage(name)?;
                gl.attach_shader(handle, stage);
            }
        } else if line.starts_with("checkgroup") {
            let mut words = line.split_whitespace().skip(1);
            match words.next() {
                Some("begin") => parser.begin(words.next() == Some("or")),
                Some("end") => {
                    if !parser.end() {
                        return Err(ShaderError::CheckGroup("mismatching checkgroup end tag"));
                    }
                }
                _ => return Err(ShaderError::CheckGroup("expected begin or end after checkgroup")),
            }
        } else if let Some(rest) = line.strip_prefix("check") {
            let rest = rest.trim();
            let (expr, invert) = match rest.strip_prefix("not ") {
                Some(expr) => (expr.trim(), true),
                None => (rest, false),
            };
            parser.check(ConditionSingle::parse(expr, invert));
        }
    }

    if parser.depth() > 0 {
        return Err(ShaderError::CheckGroup("missing checkgroup end tag"));
    }

    gl.link_program(handle).map_err(ShaderError::Link)?;
    Ok(root)
}
