//! Headless GraphicsApi
//!
//! A software stand-in for a GL context. It keeps object tables, simulates the
//! parts of compilation and linking the caches observe, and records the calls
//! that reach the driver so callers can assert on GPU traffic.
//!
//! Simulation rules:
//! - compilation fails when a line starts with `#error`, with a driver-style log;
//! - linking fails when no stage is attached or an attached stage did not compile;
//! - program creation fails while [`HeadlessGl::refuse_programs`] is set;
//! - linking assigns consecutive locations to every `uniform` declared in the
//!   attached sources (array elements get consecutive locations too).

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    BufferTarget, GraphicsApi, IndexType, NO_LOCATION, PrimitiveMode, ShaderStage, UniformValue,
};

/// Uniform payload as recorded by [`HeadlessGl`].
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
}

/// A call that reached the headless driver.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    UseProgram(Option<u32>),
    SetUniform { location: i32, data: UniformData },
    ActiveTexture(u32),
    BindVertexArray(Option<u32>),
    AttribArray { index: u32, components: u32 },
    AttribConstant { index: u32, value: Vec<f32> },
    DrawElements { mode: PrimitiveMode, count: u32, index_type: IndexType },
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
}

#[derive(Debug, Default)]
struct ProgramObject {
    attached: Vec<u32>,
    uniforms: FxHashMap<String, i32>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    shaders: FxHashMap<u32, ShaderObject>,
    programs: FxHashMap<u32, ProgramObject>,
    buffers: FxHashMap<u32, usize>,
    vertex_arrays: FxHashSet<u32>,
    buffers_created: usize,
    uniform_lookups: usize,
    refuse_programs: bool,
    calls: Vec<GlCall>,
}

impl State {
    fn alloc(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording, GPU-less implementation of [`GraphicsApi`].
#[derive(Debug, Default)]
pub struct HeadlessGl {
    state: RefCell<State>,
}

impl HeadlessGl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shader objects currently alive.
    #[must_use]
    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    /// Program objects currently alive.
    #[must_use]
    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// Buffers currently alive.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Total bytes held by live buffers.
    #[must_use]
    pub fn live_buffer_bytes(&self) -> usize {
        self.state.borrow().buffers.values().sum()
    }

    /// Vertex arrays currently alive.
    #[must_use]
    pub fn live_vertex_arrays(&self) -> usize {
        self.state.borrow().vertex_arrays.len()
    }

    /// Buffers created over the lifetime of the context.
    #[must_use]
    pub fn buffers_created(&self) -> usize {
        self.state.borrow().buffers_created
    }

    /// Number of `uniform_location` queries that reached the driver.
    #[must_use]
    pub fn uniform_lookups(&self) -> usize {
        self.state.borrow().uniform_lookups
    }

    /// Makes `create_program` fail until called again with `false`.
    pub fn refuse_programs(&self, refuse: bool) {
        self.state.borrow_mut().refuse_programs = refuse;
    }

    /// Source last compiled into `shader`.
    #[must_use]
    pub fn shader_source(&self, shader: u32) -> Option<String> {
        self.state.borrow().shaders.get(&shader).map(|s| s.source.clone())
    }

    /// Snapshot of the recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded draw calls.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, GlCall::DrawElements { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

fn compile_log(source: &str) -> Option<String> {
    source.lines().enumerate().find_map(|(n, line)| {
        let line = line.trim_start();
        line.strip_prefix("#error")
            .map(|msg| format!("ERROR: 0:{}: '#error' : {}", n + 1, msg.trim()))
    })
}

/// Collects `uniform` declarations as `(name, array length)`.
fn declared_uniforms(source: &str) -> impl Iterator<Item = (&str, u32)> {
    source.lines().filter_map(|line| {
        let decl = line.trim_start().strip_prefix("uniform ")?;
        let decl = decl.split(';').next()?;
        let last = decl.split_whitespace().last()?;
        match last.split_once('[') {
            Some((name, len)) => {
                let len = len.trim_end_matches(']').trim().parse().unwrap_or(1);
                Some((name, len))
            }
            None => Some((last, 1)),
        }
    })
}

impl GraphicsApi for HeadlessGl {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type VertexArray = u32;

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc();
        state.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
            },
        );
        Ok(id)
    }

    fn compile_shader(&self, shader: u32, source: &str) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.shaders.get_mut(&shader) else {
            return Err(format!("invalid shader object {shader}"));
        };
        object.source = source.to_string();
        match compile_log(source) {
            Some(log) => {
                object.compiled = false;
                Err(log)
            }
            None => {
                object.compiled = true;
                Ok(())
            }
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        if state.refuse_programs {
            return Err("out of program objects".to_string());
        }
        let id = state.alloc();
        state.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attached.push(shader);
        }
    }

    fn link_program(&self, program: u32) -> Result<(), String> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(p) = state.programs.get_mut(&program) else {
            return Err(format!("invalid program object {program}"));
        };
        if p.attached.is_empty() {
            return Err("error: no shaders attached to the program".to_string());
        }
        let mut has_vertex = false;
        let mut next_location = 0;
        p.uniforms.clear();
        for id in &p.attached {
            let Some(shader) = state.shaders.get(id).filter(|s| s.compiled) else {
                return Err(format!("error: attached shader {id} is not compiled"));
            };
            has_vertex |= shader.stage == ShaderStage::Vertex;
            for (name, len) in declared_uniforms(&shader.source) {
                if p.uniforms.contains_key(name) {
                    continue;
                }
                p.uniforms.insert(name.to_string(), next_location);
                for i in 0..len.max(1) {
                    p.uniforms
                        .insert(format!("{name}[{i}]"), next_location + i as i32);
                }
                next_location += len.max(1) as i32;
            }
        }
        if !has_vertex {
            return Err("error: program has no vertex stage".to_string());
        }
        Ok(())
    }

    fn delete_program(&self, program: u32) {
        self.state.borrow_mut().programs.remove(&program);
    }

    fn use_program(&self, program: Option<u32>) {
        self.record(GlCall::UseProgram(program));
    }

    fn uniform_location(&self, program: u32, name: &str) -> i32 {
        let mut state = self.state.borrow_mut();
        state.uniform_lookups += 1;
        state
            .programs
            .get(&program)
            .and_then(|p| p.uniforms.get(name).copied())
            .unwrap_or(NO_LOCATION)
    }

    fn set_uniform(&self, location: i32, value: UniformValue<'_>) {
        if location < 0 {
            return;
        }
        let data = match value {
            UniformValue::Int(x) => UniformData::Ints(vec![x]),
            UniformValue::IntArray(v) => UniformData::Ints(v.to_vec()),
            UniformValue::Float(x) => UniformData::Floats(vec![x]),
            UniformValue::Vec2(v) => UniformData::Floats(v.to_array().to_vec()),
            UniformValue::Vec3(v) => UniformData::Floats(v.to_array().to_vec()),
            UniformValue::Vec4(v) => UniformData::Floats(v.to_array().to_vec()),
            UniformValue::Mat3(m) => UniformData::Floats(m.to_cols_array().to_vec()),
            UniformValue::Mat4(m) => UniformData::Floats(m.to_cols_array().to_vec()),
            UniformValue::FloatArray(v) => UniformData::Floats(v.to_vec()),
            UniformValue::Vec4Array(v) => {
                UniformData::Floats(v.iter().flat_map(|x| x.to_array()).collect())
            }
        };
        self.record(GlCall::SetUniform { location, data });
    }

    fn active_texture(&self, unit: u32) {
        self.record(GlCall::ActiveTexture(unit));
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc();
        state.vertex_arrays.insert(id);
        Ok(id)
    }

    fn bind_vertex_array(&self, vao: Option<u32>) {
        self.record(GlCall::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: u32) {
        self.state.borrow_mut().vertex_arrays.remove(&vao);
    }

    fn create_buffer(&self, _target: BufferTarget, data: &[u8]) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.alloc();
        state.buffers.insert(id, data.len());
        state.buffers_created += 1;
        Ok(id)
    }

    fn delete_buffer(&self, buffer: u32) {
        self.state.borrow_mut().buffers.remove(&buffer);
    }

    fn vertex_attrib_array(&self, index: u32, components: u32) {
        self.record(GlCall::AttribArray { index, components });
    }

    fn vertex_attrib_constant(&self, index: u32, value: &[f32]) {
        self.record(GlCall::AttribConstant {
            index,
            value: value.to_vec(),
        });
    }

    fn draw_elements(&self, mode: PrimitiveMode, count: u32, index_type: IndexType) {
        self.record(GlCall::DrawElements {
            mode,
            count,
            index_type,
        });
    }
}
