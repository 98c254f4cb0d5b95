//! `GraphicsApi` for a real OpenGL 4.1 core context through `glow`.
//!
//! Every `unsafe` block below relies on the same contract: the context is
//! current on the calling thread and all handles passed in were created by it.

use glow::HasContext;

use super::{BufferTarget, GraphicsApi, IndexType, PrimitiveMode, ShaderStage, UniformValue};

fn location(l: i32) -> Option<glow::NativeUniformLocation> {
    (l >= 0).then(|| glow::NativeUniformLocation(l as u32))
}

fn primitive_mode(mode: PrimitiveMode) -> u32 {
    match mode {
        PrimitiveMode::Points => glow::POINTS,
        PrimitiveMode::Lines => glow::LINES,
        PrimitiveMode::LineLoop => glow::LINE_LOOP,
        PrimitiveMode::LineStrip => glow::LINE_STRIP,
        PrimitiveMode::Triangles => glow::TRIANGLES,
        PrimitiveMode::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn index_type(ty: IndexType) -> u32 {
    match ty {
        IndexType::U8 => glow::UNSIGNED_BYTE,
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

impl GraphicsApi for glow::Context {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let ty = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { HasContext::create_shader(self, ty) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> Result<(), String> {
        unsafe {
            HasContext::shader_source(self, shader, source);
            HasContext::compile_shader(self, shader);
            if HasContext::get_shader_compile_status(self, shader) {
                Ok(())
            } else {
                Err(HasContext::get_shader_info_log(self, shader))
            }
        }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn link_program(&self, program: Self::Program) -> Result<(), String> {
        unsafe {
            HasContext::link_program(self, program);
            if HasContext::get_program_link_status(self, program) {
                Ok(())
            } else {
                Err(HasContext::get_program_info_log(self, program))
            }
        }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { HasContext::use_program(self, program) }
    }

    fn uniform_location(&self, program: Self::Program, name: &str) -> i32 {
        unsafe { HasContext::get_uniform_location(self, program, name) }
            .map_or(super::NO_LOCATION, |l| l.0 as i32)
    }

    fn set_uniform(&self, l: i32, value: UniformValue<'_>) {
        let Some(loc) = location(l) else {
            return;
        };
        let loc = Some(&loc);
        unsafe {
            match value {
                UniformValue::Int(x) => HasContext::uniform_1_i32(self, loc, x),
                UniformValue::Float(x) => HasContext::uniform_1_f32(self, loc, x),
                UniformValue::Vec2(v) => HasContext::uniform_2_f32(self, loc, v.x, v.y),
                UniformValue::Vec3(v) => HasContext::uniform_3_f32(self, loc, v.x, v.y, v.z),
                UniformValue::Vec4(v) => HasContext::uniform_4_f32(self, loc, v.x, v.y, v.z, v.w),
                UniformValue::Mat3(m) => {
                    HasContext::uniform_matrix_3_f32_slice(self, loc, false, &m.to_cols_array());
                }
                UniformValue::Mat4(m) => {
                    HasContext::uniform_matrix_4_f32_slice(self, loc, false, &m.to_cols_array());
                }
                UniformValue::IntArray(v) => HasContext::uniform_1_i32_slice(self, loc, v),
                UniformValue::FloatArray(v) => HasContext::uniform_1_f32_slice(self, loc, v),
                UniformValue::Vec4Array(v) => {
                    HasContext::uniform_4_f32_slice(self, loc, bytemuck::cast_slice(v));
                }
            }
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, glow::TEXTURE0 + unit) }
    }

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String> {
        unsafe { HasContext::create_vertex_array(self) }
    }

    fn bind_vertex_array(&self, vao: Option<Self::VertexArray>) {
        unsafe { HasContext::bind_vertex_array(self, vao) }
    }

    fn delete_vertex_array(&self, vao: Self::VertexArray) {
        unsafe { HasContext::delete_vertex_array(self, vao) }
    }

    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> Result<Self::Buffer, String> {
        let target = match target {
            BufferTarget::Vertex => glow::ARRAY_BUFFER,
            BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
        };
        unsafe {
            let buffer = HasContext::create_buffer(self)?;
            HasContext::bind_buffer(self, target, Some(buffer));
            HasContext::buffer_data_u8_slice(self, target, data, glow::STATIC_DRAW);
            Ok(buffer)
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn vertex_attrib_array(&self, index: u32, components: u32) {
        unsafe {
            HasContext::vertex_attrib_pointer_f32(
                self,
                index,
                components as i32,
                glow::FLOAT,
                false,
                0,
                0,
            );
            HasContext::enable_vertex_attrib_array(self, index);
        }
    }

    fn vertex_attrib_constant(&self, index: u32, value: &[f32]) {
        unsafe {
            HasContext::disable_vertex_attrib_array(self, index);
            match *value {
                [x] => HasContext::vertex_attrib_1_f32(self, index, x),
                [x, y] => HasContext::vertex_attrib_2_f32(self, index, x, y),
                [x, y, z] => HasContext::vertex_attrib_3_f32(self, index, x, y, z),
                [x, y, z, w, ..] => HasContext::vertex_attrib_4_f32(self, index, x, y, z, w),
                [] => {}
            }
        }
    }

    fn draw_elements(&self, mode: PrimitiveMode, count: u32, ty: IndexType) {
        unsafe {
            HasContext::draw_elements(self, primitive_mode(mode), count as i32, index_type(ty), 0);
        }
    }
}
