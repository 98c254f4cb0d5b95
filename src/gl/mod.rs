//! Graphics API Seam
//!
//! Every GPU call made by the registry, the uniform cache and the geometry
//! cache goes through [`GraphicsApi`]. Two implementations ship with the crate:
//!
//! | Implementation | Use case |
//! |----------------|----------|
//! | `glow::Context` ([`glow_backend`]) | Real OpenGL 4.1 core contexts |
//! | [`HeadlessGl`](headless::HeadlessGl) | Tests and offline shader validation |
//!
//! All methods assume the caller owns the current GL context on this thread.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

pub mod glow_backend;
pub mod headless;

/// Location returned for uniforms the linker did not keep. Setting a value at
/// this location is a no-op.
pub const NO_LOCATION: i32 = -1;

/// Programmable stage of a compile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Primitive topology passed to indexed draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

impl IndexType {
    /// Size of one index in bytes.
    #[inline]
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Binding point a buffer is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// A value written to a uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    IntArray(&'a [i32]),
    FloatArray(&'a [f32]),
    Vec4Array(&'a [Vec4]),
}

/// The narrow slice of OpenGL the caches need.
///
/// Object creation reports the driver message on failure; compile and link
/// report the info log.
pub trait GraphicsApi {
    type Shader: Copy + Eq + fmt::Debug;
    type Program: Copy + Eq + fmt::Debug;
    type Buffer: Copy + Eq + fmt::Debug;
    type VertexArray: Copy + Eq + fmt::Debug;

    // ---- Shaders & programs ----
    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String>;
    fn delete_shader(&self, shader: Self::Shader);
    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program) -> Result<(), String>;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    // ---- Uniforms & textures ----
    /// Returns [`NO_LOCATION`] when the program has no active uniform `name`.
    fn uniform_location(&self, program: Self::Program, name: &str) -> i32;
    /// Writes to the currently bound program.
    fn set_uniform(&self, location: i32, value: UniformValue<'_>);
    fn active_texture(&self, unit: u32);

    // ---- Geometry ----
    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn bind_vertex_array(&self, vao: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vao: Self::VertexArray);
    /// Creates a buffer, binds it to `target` and uploads `data` as static.
    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> Result<Self::Buffer, String>;
    fn delete_buffer(&self, buffer: Self::Buffer);
    /// Sources attribute `index` from the bound vertex buffer as tightly packed floats.
    fn vertex_attrib_array(&self, index: u32, components: u32);
    /// Disables the array for attribute `index` and binds one literal value.
    fn vertex_attrib_constant(&self, index: u32, value: &[f32]);
    /// Draws from the bound vertex array's index buffer, starting at offset 0.
    fn draw_elements(&self, mode: PrimitiveMode, count: u32, index_type: IndexType);
}

macro_rules! forward_graphics_api {
    ($($ptr:ty),*) => {$(
        impl<T: GraphicsApi + ?Sized> GraphicsApi for $ptr {
            type Shader = T::Shader;
            type Program = T::Program;
            type Buffer = T::Buffer;
            type VertexArray = T::VertexArray;

            fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
                (**self).create_shader(stage)
            }
            fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
                (**self).compile_shader(shader, source)
            }
            fn delete_shader(&self, shader: Self::Shader) {
                (**self).delete_shader(shader);
            }
            fn create_program(&self) -> Result<Self::Program, String> {
                (**self).create_program()
            }
            fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
                (**self).attach_shader(program, shader);
            }
            fn link_program(&self, program: Self::Program) -> Result<(), String> {
                (**self).link_program(program)
            }
            fn delete_program(&self, program: Self::Program) {
                (**self).delete_program(program);
            }
            fn use_program(&self, program: Option<Self::Program>) {
                (**self).use_program(program);
            }
            fn uniform_location(&self, program: Self::Program, name: &str) -> i32 {
                (**self).uniform_location(program, name)
            }
            fn set_uniform(&self, location: i32, value: UniformValue<'_>) {
                (**self).set_uniform(location, value);
            }
            fn active_texture(&self, unit: u32) {
                (**self).active_texture(unit);
            }
            fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
                (**self).create_vertex_array()
            }
            fn bind_vertex_array(&self, vao: Option<Self::VertexArray>) {
                (**self).bind_vertex_array(vao);
            }
            fn delete_vertex_array(&self, vao: Self::VertexArray) {
                (**self).delete_vertex_array(vao);
            }
            fn create_buffer(
                &self,
                target: BufferTarget,
                data: &[u8],
            ) -> Result<Self::Buffer, String> {
                (**self).create_buffer(target, data)
            }
            fn delete_buffer(&self, buffer: Self::Buffer) {
                (**self).delete_buffer(buffer);
            }
            fn vertex_attrib_array(&self, index: u32, components: u32) {
                (**self).vertex_attrib_array(index, components);
            }
            fn vertex_attrib_constant(&self, index: u32, value: &[f32]) {
                (**self).vertex_attrib_constant(index, value);
            }
            fn draw_elements(&self, mode: PrimitiveMode, count: u32, index_type: IndexType) {
                (**self).draw_elements(mode, count, index_type);
            }
        }
    )*};
}

forward_graphics_api!(&T, Rc<T>, Arc<T>);
