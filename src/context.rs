//! Render Context
//!
//! [`RenderContext`] is the single owner of GPU-side resources for one GL
//! context: the shader registry, the geometry cache and the active-program
//! binding.
//!
//! # Frame flow
//!
//! ```rust,ignore
//! let mut cx = RenderContext::new(gl, ContextSettings::default());
//! cx.update_shaders(&DirectorySource::locate().unwrap());
//!
//! // per frame
//! cx.set_global_uniforms(&globals);
//! if let Some(mut prog) = cx.use_program("default.prog") {
//!     prog.set_mat4("modelViewMatrix", &model_view);
//! }
//! cx.draw_shape(n, mask, PrimitiveMode::Triangles, &attrs, IndexData::U16(&idx))?;
//! cx.shrink_cache(false);
//! ```
//!
//! # Teardown
//!
//! Dropping the context flushes the geometry cache, unbinds the program and
//! deletes every shader and program object, in that order.

use glam::{Mat3, Mat4, Vec4};

use crate::condition::ModelAccess;
use crate::errors::Result;
use crate::geometry::{AttributeMask, CacheLimits, GeometryCache, IndexData};
use crate::gl::{GraphicsApi, PrimitiveMode};
use crate::settings::ContextSettings;
use crate::shader::{ActiveProgram, ShaderDiagnostic, ShaderId, ShaderRegistry, ShaderSource};
use crate::utils::interner;

/// Per-frame values broadcast to every linked program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalUniforms {
    pub view_matrix: Mat3,
    pub projection_matrix: Mat4,
    pub light_source_position: [Vec4; 3],
    pub light_source_diffuse: [Vec4; 3],
    pub light_source_ambient: Vec4,
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        Self {
            view_matrix: Mat3::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            light_source_position: [Vec4::Z; 3],
            light_source_diffuse: [Vec4::ONE; 3],
            light_source_ambient: Vec4::ONE,
        }
    }
}

/// Resource manager of one graphics context.
pub struct RenderContext<G: GraphicsApi> {
    gl: G,
    settings: ContextSettings,
    registry: ShaderRegistry<G>,
    geometry: GeometryCache<G>,
    current: Option<ShaderId>,
}

impl<G: GraphicsApi> RenderContext<G> {
    pub fn new(gl: G, settings: ContextSettings) -> Self {
        interner::preload_global_uniforms();
        Self {
            gl,
            settings,
            registry: ShaderRegistry::new(),
            geometry: GeometryCache::new(settings.cache_limits),
            current: None,
        }
    }

    // ---- Accessors ----

    #[must_use]
    pub fn gl(&self) -> &G {
        &self.gl
    }

    #[must_use]
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    #[must_use]
    pub fn registry(&self) -> &ShaderRegistry<G> {
        &self.registry
    }

    #[must_use]
    pub fn geometry(&self) -> &GeometryCache<G> {
        &self.geometry
    }

    /// Program bound by the last successful [`use_program`](Self::use_program).
    #[must_use]
    pub fn current_program(&self) -> Option<ShaderId> {
        self.current
    }

    // ---- Shaders ----

    /// Releases everything and reloads all shaders and programs from
    /// `source`. Returns the failures of this reload.
    pub fn update_shaders<S: ShaderSource + ?Sized>(&mut self, source: &S) -> &[ShaderDiagnostic] {
        self.stop_program();
        self.registry
            .update(&self.gl, source, self.settings.num_texture_units);
        self.registry.diagnostics()
    }

    /// Deletes every compiled shader and linked program.
    pub fn release_shaders(&mut self) {
        self.stop_program();
        self.registry.release(&self.gl);
    }

    /// Binds program `name` and returns a handle for setting its uniforms.
    ///
    /// No GL call is made when the program is already bound. Unknown or
    /// unlinked programs unbind the current program and return `None`.
    pub fn use_program(&mut self, name: &str) -> Option<ActiveProgram<'_, G>> {
        let Some(id) = self.registry.find_program(name) else {
            self.stop_program();
            return None;
        };
        self.bind(id)
    }

    /// Binds a program by id. See [`use_program`](Self::use_program).
    pub fn use_program_id(&mut self, id: ShaderId) -> Option<ActiveProgram<'_, G>> {
        self.bind(id)
    }

    fn bind(&mut self, id: ShaderId) -> Option<ActiveProgram<'_, G>> {
        let linked = self
            .registry
            .get(id)
            .filter(|s| s.status())
            .and_then(|s| s.as_program())
            .and_then(|p| p.handle());
        let Some(handle) = linked else {
            self.stop_program();
            return None;
        };

        if self.current != Some(id) {
            self.gl.use_program(Some(handle));
            self.current = Some(id);
        }

        let entry = self.registry.get_mut(id)?;
        let name = entry.name();
        let program = entry.as_program_mut()?;
        Some(ActiveProgram::new(
            &self.gl,
            id,
            name,
            program,
            self.settings.max_texture_units,
        ))
    }

    /// Unbinds the current program.
    pub fn stop_program(&mut self) {
        self.current = None;
        self.gl.use_program(None);
    }

    /// First linked program, most recently linked first, whose conditions
    /// hold for `blocks`.
    pub fn find_matching_program<M: ModelAccess>(
        &self,
        model: &M,
        blocks: &[M::Index],
    ) -> Option<ShaderId> {
        self.registry.linked_programs().iter().copied().find(|&id| {
            self.registry
                .get(id)
                .and_then(|s| s.as_program())
                .is_some_and(|p| p.matches(model, blocks))
        })
    }

    /// Writes the per-frame globals into every linked program and leaves no
    /// program bound.
    pub fn set_global_uniforms(&mut self, globals: &GlobalUniforms) {
        let linked = self.registry.linked_programs().to_vec();
        for id in linked {
            let Some(mut program) = self.bind(id) else {
                continue;
            };
            program.set_mat3("viewMatrix", &globals.view_matrix);
            program.set_mat4("projectionMatrix", &globals.projection_matrix);
            program.set_vec4("lightSourcePosition0", globals.light_source_position[0]);
            program.set_vec4("lightSourceDiffuse0", globals.light_source_diffuse[0]);
            program.set_vec4("lightSourceAmbient", globals.light_source_ambient);
            program.set_vec4("lightSourcePosition1", globals.light_source_position[1]);
            program.set_vec4("lightSourceDiffuse1", globals.light_source_diffuse[1]);
            program.set_vec4("lightSourcePosition2", globals.light_source_position[2]);
            program.set_vec4("lightSourceDiffuse2", globals.light_source_diffuse[2]);
        }
        self.stop_program();
    }

    // ---- Geometry ----

    /// See [`GeometryCache::draw_shape`].
    pub fn draw_shape(
        &mut self,
        num_verts: u32,
        attr_mask: AttributeMask,
        mode: PrimitiveMode,
        attrs: &[&[f32]],
        indices: IndexData<'_>,
    ) -> Result<()> {
        self.geometry
            .draw_shape(&self.gl, num_verts, attr_mask, mode, attrs, indices)?;
        Ok(())
    }

    pub fn set_cache_limits(&mut self, limits: CacheLimits) {
        self.settings.cache_limits = limits;
        self.geometry.set_cache_limits(limits);
    }

    /// See [`GeometryCache::shrink_cache`].
    pub fn shrink_cache(&mut self, delete_all: bool) -> usize {
        self.geometry.shrink_cache(&self.gl, delete_all)
    }

    pub fn flush_cache(&mut self) -> usize {
        self.geometry.flush_cache(&self.gl)
    }
}

impl<G: GraphicsApi> Drop for RenderContext<G> {
    fn drop(&mut self) {
        self.geometry.flush_cache(&self.gl);
        self.stop_program();
        self.registry.release(&self.gl);
    }
}
