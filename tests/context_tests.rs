//! Render Context Tests
//!
//! Tests for:
//! - Program binding and redundant-bind elision
//! - Per-frame global uniforms
//! - Program variant selection by conditions
//! - Settings (texture units, cache limits, serde defaults)
//! - Teardown order and GPU object release on drop

use std::rc::Rc;

use glam::{Mat3, Mat4, Vec4};
use glvariant::gl::PrimitiveMode;
use glvariant::gl::headless::{GlCall, UniformData};
use glvariant::shader::source::BuiltinShaders;
use glvariant::{
    AttributeMask, CacheLimits, ContextSettings, EmbeddedSource, FieldValue, GeometryError,
    GlError, GlobalUniforms, HeadlessGl, IndexData, ModelAccess, RenderContext,
};

fn context(settings: ContextSettings) -> (Rc<HeadlessGl>, RenderContext<Rc<HeadlessGl>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let gl = Rc::new(HeadlessGl::new());
    let mut cx = RenderContext::new(Rc::clone(&gl), settings);
    let diagnostics = cx.update_shaders(&EmbeddedSource::<BuiltinShaders>::new());
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    (gl, cx)
}

fn draw_quad(cx: &mut RenderContext<Rc<HeadlessGl>>, z: f32) {
    let pos = [0.0, 0.0, z, 1.0, 0.0, z, 1.0, 1.0, z, 0.0, 1.0, z];
    cx.draw_shape(
        4,
        AttributeMask::new().with(0, 3),
        PrimitiveMode::Triangles,
        &[&pos],
        IndexData::U16(&[0, 1, 2, 0, 2, 3]),
    )
    .unwrap();
}

/// Flat list of block type names.
struct Blocks {
    types: Vec<&'static str>,
    version: u32,
}

impl ModelAccess for Blocks {
    type Index = usize;

    fn header(&self) -> Option<usize> {
        None
    }

    fn child(&self, _parent: &usize, _name: &str) -> Option<usize> {
        None
    }

    fn block_inherits(&self, block: &usize, type_name: &str) -> bool {
        self.types.get(*block) == Some(&type_name)
    }

    fn field(&self, _index: &usize) -> Option<FieldValue<'_>> {
        None
    }

    fn bs_version(&self) -> u32 {
        self.version
    }
}

// ============================================================================
// Program binding
// ============================================================================

#[test]
fn rebinding_current_program_is_elided() {
    let (gl, mut cx) = context(ContextSettings::default());
    gl.clear_calls();

    let first = cx.use_program("default.prog").map(|p| p.id());
    let second = cx.use_program("DEFAULT.prog").map(|p| p.id());

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(cx.current_program(), first);
    let binds: Vec<_> = gl
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GlCall::UseProgram(_)))
        .collect();
    assert_eq!(binds.len(), 1);
    assert!(matches!(binds[0], GlCall::UseProgram(Some(_))));
}

#[test]
fn switching_programs_binds_each_once() {
    let (gl, mut cx) = context(ContextSettings::default());
    gl.clear_calls();

    cx.use_program("default.prog");
    cx.use_program("vertexcolor.prog");
    cx.use_program("vertexcolor.prog");

    let binds = gl
        .calls()
        .iter()
        .filter(|c| matches!(c, GlCall::UseProgram(Some(_))))
        .count();
    assert_eq!(binds, 2);
}

#[test]
fn unknown_program_unbinds() {
    let (gl, mut cx) = context(ContextSettings::default());
    cx.use_program("default.prog");
    gl.clear_calls();

    assert!(cx.use_program("missing.prog").is_none());
    assert!(cx.use_program("default.vert").is_none());
    assert_eq!(cx.current_program(), None);
    assert_eq!(gl.calls().last(), Some(&GlCall::UseProgram(None)));
}

#[test]
fn released_programs_cannot_be_bound() {
    let (gl, mut cx) = context(ContextSettings::default());
    cx.release_shaders();

    assert!(cx.use_program("default.prog").is_none());
    assert_eq!(gl.live_programs(), 0);
    assert_eq!(gl.live_shaders(), 0);
}

// ============================================================================
// Global uniforms
// ============================================================================

#[test]
fn globals_reach_every_linked_program() {
    let (gl, mut cx) = context(ContextSettings::default());
    gl.clear_calls();

    let globals = GlobalUniforms {
        view_matrix: Mat3::from_diagonal(glam::Vec3::splat(2.0)),
        projection_matrix: Mat4::from_scale(glam::Vec3::splat(3.0)),
        light_source_ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
        ..Default::default()
    };
    cx.set_global_uniforms(&globals);

    let calls = gl.calls();
    assert_eq!(calls.last(), Some(&GlCall::UseProgram(None)));
    assert_eq!(cx.current_program(), None);

    // Both built-in programs share default.vert/default.frag:
    // viewMatrix 0, projectionMatrix 1, lightSourcePosition0 3,
    // lightSourceDiffuse0 4, lightSourceAmbient 5.
    let writes: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            GlCall::SetUniform { location, data } => Some((*location, data.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(writes.len(), 10);
    let locations: Vec<_> = writes.iter().take(5).map(|(l, _)| *l).collect();
    assert_eq!(locations, [0, 1, 3, 4, 5]);
    assert_eq!(
        writes[0].1,
        UniformData::Floats(globals.view_matrix.to_cols_array().to_vec())
    );
    assert_eq!(writes[4].1, UniformData::Floats(vec![0.2, 0.2, 0.2, 1.0]));

    // Later frames hit the location caches only.
    let lookups = gl.uniform_lookups();
    cx.set_global_uniforms(&globals);
    assert_eq!(gl.uniform_lookups(), lookups);
}

// ============================================================================
// Variant selection
// ============================================================================

#[test]
fn most_recently_linked_matching_program_wins() {
    let (_gl, cx) = context(ContextSettings::default());
    let default = cx.registry().find_program("default.prog");
    let vertex_color = cx.registry().find_program("vertexcolor.prog");

    let colored = Blocks {
        types: vec!["NiTriShape", "NiVertexColorProperty"],
        version: 83,
    };
    assert_eq!(cx.find_matching_program(&colored, &[0, 1]), vertex_color);

    let new_format = Blocks {
        types: vec!["BSTriShape"],
        version: 155,
    };
    assert_eq!(cx.find_matching_program(&new_format, &[0]), vertex_color);

    let textured = Blocks {
        types: vec!["NiTriShape", "NiVertexColorProperty", "NiTexturingProperty"],
        version: 83,
    };
    assert_eq!(cx.find_matching_program(&textured, &[0, 1, 2]), default);
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn texture_unit_setting_reaches_shader_text() {
    let settings = ContextSettings {
        num_texture_units: 10,
        ..Default::default()
    };
    let (gl, cx) = context(settings);

    let id = cx.registry().find_stage("default.frag").unwrap();
    let handle = cx.registry().get(id).unwrap().stage_handle().unwrap();
    let text = gl.shader_source(handle).unwrap();
    assert!(text.contains("uniform sampler2D textureUnits[8];"));
    assert!(text.contains("uniform vec4 lightSourceAmbient;"));
}

#[test]
fn settings_deserialize_with_defaults() {
    let settings: ContextSettings =
        serde_json::from_str(r#"{ "num_texture_units": 24, "cache_limits": { "max_shapes": 10 } }"#)
            .unwrap();
    assert_eq!(settings.num_texture_units, 24);
    assert_eq!(settings.max_texture_units, 32);
    assert_eq!(settings.cache_limits.max_shapes, 10);
    assert_eq!(settings.cache_limits.max_buffers, CacheLimits::default().max_buffers);

    let json = serde_json::to_string(&settings).unwrap();
    let back: ContextSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(back, settings);
}

#[test]
fn cache_limits_can_change_at_runtime() {
    let (_gl, mut cx) = context(ContextSettings::default());
    for z in 0..6 {
        draw_quad(&mut cx, z as f32);
    }
    cx.set_cache_limits(CacheLimits {
        max_shapes: 3,
        ..Default::default()
    });
    assert_eq!(cx.settings().cache_limits.max_shapes, 3);

    assert_eq!(cx.shrink_cache(false), 4);
    assert_eq!(cx.geometry().shape_count(), 2);
}

#[test]
fn invalid_draw_surfaces_geometry_error() {
    let (gl, mut cx) = context(ContextSettings::default());
    let pos = [0.0f32; 9];
    let err = cx
        .draw_shape(
            3,
            AttributeMask::new().with(0, 3).with(1, 2),
            PrimitiveMode::Triangles,
            &[&pos],
            IndexData::U16(&[0, 1, 2]),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        GlError::Geometry(GeometryError::MissingAttribute { index: 1 })
    ));
    assert_eq!(gl.draw_count(), 0);
    assert_eq!(cx.geometry().shape_count(), 0);
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn drop_releases_everything() {
    let (gl, mut cx) = context(ContextSettings::default());
    cx.use_program("default.prog");
    draw_quad(&mut cx, 0.0);
    draw_quad(&mut cx, 1.0);
    assert_eq!(gl.live_buffers(), 4);
    assert!(gl.live_programs() > 0);
    gl.clear_calls();

    drop(cx);

    assert_eq!(gl.live_buffers(), 0);
    assert_eq!(gl.live_vertex_arrays(), 0);
    assert_eq!(gl.live_shaders(), 0);
    assert_eq!(gl.live_programs(), 0);

    // Geometry goes first, then the program binding.
    let calls = gl.calls();
    let unbind_vao = calls
        .iter()
        .position(|c| *c == GlCall::BindVertexArray(None))
        .unwrap();
    let unbind_program = calls
        .iter()
        .position(|c| *c == GlCall::UseProgram(None))
        .unwrap();
    assert!(unbind_vao < unbind_program);
}

#[test]
fn flush_keeps_shaders() {
    let (gl, mut cx) = context(ContextSettings::default());
    draw_quad(&mut cx, 0.0);

    assert_eq!(cx.flush_cache(), 1);
    assert_eq!(gl.live_buffers(), 0);
    assert!(cx.use_program("default.prog").is_some());
}
