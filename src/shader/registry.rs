//! Shader/Program Registry
//!
//! Owns every named compile unit and program. Entries live in a dense
//! `Vec` addressed by [`ShaderId`]; a flat open-addressing table with linear
//! probing maps lowercased names to ids.
//!
//! # Reload cycle
//!
//! 1. [`release`](ShaderRegistry::release) deletes every GPU object but keeps
//!    the entries.
//! 2. [`update`](ShaderRegistry::update) walks the source listing, recreates
//!    and compiles every stage, then loads and links every program in name
//!    order.
//! 3. Each failure becomes one [`ShaderDiagnostic`]; the reload continues.

use xxhash_rust::xxh3::xxh3_64;

use crate::errors::ShaderError;
use crate::gl::{GraphicsApi, ShaderStage};
use crate::utils::interner;

use super::preprocess::preprocess;
use super::program::{Program, load_program};
use super::source::ShaderSource;
use super::{ShaderDiagnostic, ShaderId, ShaderKind};

const MIN_TABLE_SIZE: usize = 128;

/// GPU side of an entry.
pub enum ShaderObject<G: GraphicsApi> {
    Stage {
        stage: ShaderStage,
        handle: Option<G::Shader>,
    },
    Program(Program<G>),
}

/// A registry entry: a compile unit or a program.
pub struct Shader<G: GraphicsApi> {
    name: &'static str,
    file: String,
    status: bool,
    object: ShaderObject<G>,
}

impl<G: GraphicsApi> Shader<G> {
    /// Lowercased name, unique within the registry.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// File name as listed by the source.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Compiled (stages) or linked (programs) during the last reload.
    #[must_use]
    pub fn status(&self) -> bool {
        self.status
    }

    #[must_use]
    pub fn kind(&self) -> ShaderKind {
        match &self.object {
            ShaderObject::Stage {
                stage: ShaderStage::Vertex,
                ..
            } => ShaderKind::Vertex,
            ShaderObject::Stage {
                stage: ShaderStage::Fragment,
                ..
            } => ShaderKind::Fragment,
            ShaderObject::Program(_) => ShaderKind::Program,
        }
    }

    #[must_use]
    pub fn is_program(&self) -> bool {
        matches!(self.object, ShaderObject::Program(_))
    }

    /// Whether the entry currently owns a GPU object.
    #[must_use]
    pub fn has_handle(&self) -> bool {
        match &self.object {
            ShaderObject::Stage { handle, .. } => handle.is_some(),
            ShaderObject::Program(p) => p.handle.is_some(),
        }
    }

    #[must_use]
    pub fn stage_handle(&self) -> Option<G::Shader> {
        match &self.object {
            ShaderObject::Stage { handle, .. } => *handle,
            ShaderObject::Program(_) => None,
        }
    }

    #[must_use]
    pub fn as_program(&self) -> Option<&Program<G>> {
        match &self.object {
            ShaderObject::Program(p) => Some(p),
            ShaderObject::Stage { .. } => None,
        }
    }

    #[must_use]
    pub fn as_program_mut(&mut self) -> Option<&mut Program<G>> {
        match &mut self.object {
            ShaderObject::Program(p) => Some(p),
            ShaderObject::Stage { .. } => None,
        }
    }

    /// Creates the GPU object if it was released.
    fn ensure_handle(&mut self, gl: &G) {
        let created = match &mut self.object {
            ShaderObject::Stage { stage, handle } if handle.is_none() => {
                gl.create_shader(*stage).map(|h| *handle = Some(h))
            }
            ShaderObject::Program(p) if p.handle.is_none() => {
                gl.create_program().map(|h| p.handle = Some(h))
            }
            _ => Ok(()),
        };
        if let Err(e) = created {
            log::warn!("Failed to create GPU object for {}: {e}", self.name);
        }
    }

    fn release(&mut self, gl: &G) {
        self.status = false;
        match &mut self.object {
            ShaderObject::Stage { handle, .. } => {
                if let Some(h) = handle.take() {
                    gl.delete_shader(h);
                }
            }
            ShaderObject::Program(p) => p.release(gl),
        }
    }
}

#[inline]
fn name_hash(name: &str) -> usize {
    xxh3_64(name.as_bytes()) as usize
}

/// Table of named shaders and programs.
pub struct ShaderRegistry<G: GraphicsApi> {
    entries: Vec<Shader<G>>,
    table: Vec<Option<ShaderId>>,
    linked: Vec<ShaderId>,
    diagnostics: Vec<ShaderDiagnostic>,
}

impl<G: GraphicsApi> Default for ShaderRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GraphicsApi> ShaderRegistry<G> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            table: vec![None; MIN_TABLE_SIZE],
            linked: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[inline]
    fn mask(&self) -> usize {
        self.table.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of slots in the name table.
    #[must_use]
    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn get(&self, id: ShaderId) -> Option<&Shader<G>> {
        self.entries.get(id.index())
    }

    pub fn get_mut(&mut self, id: ShaderId) -> Option<&mut Shader<G>> {
        self.entries.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShaderId, &Shader<G>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, s)| (ShaderId(i as u32), s))
    }

    /// Programs linked by the last reload, most recent first.
    #[must_use]
    pub fn linked_programs(&self) -> &[ShaderId] {
        &self.linked
    }

    /// Failures recorded by the last reload.
    #[must_use]
    pub fn diagnostics(&self) -> &[ShaderDiagnostic] {
        &self.diagnostics
    }

    /// Probes for `name` (already lowercased). Returns the id or the free
    /// slot where it would be inserted.
    fn probe(&self, name: &str, filter: impl Fn(&Shader<G>) -> bool) -> Result<ShaderId, usize> {
        let mask = self.mask();
        let mut i = name_hash(name) & mask;
        while let Some(id) = self.table[i] {
            let entry = &self.entries[id.index()];
            if entry.name == name && filter(entry) {
                return Ok(id);
            }
            i = (i + 1) & mask;
        }
        Err(i)
    }

    /// Any entry named `name`, case-insensitively.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ShaderId> {
        self.probe(&name.to_lowercase(), |_| true).ok()
    }

    /// A compile unit named `name`.
    #[must_use]
    pub fn find_stage(&self, name: &str) -> Option<ShaderId> {
        self.probe(&name.to_lowercase(), |s| !s.is_program()).ok()
    }

    /// A program named `name`.
    #[must_use]
    pub fn find_program(&self, name: &str) -> Option<ShaderId> {
        self.probe(&name.to_lowercase(), Shader::is_program).ok()
    }

    /// Registers `name`, or returns the existing entry after recreating its
    /// GPU object if it had been released.
    ///
    /// Returns `None` for names without a `.vert`, `.frag` or `.prog` suffix.
    pub fn create_shader(&mut self, gl: &G, name: &str) -> Option<ShaderId> {
        let lower = name.to_lowercase();
        let kind = ShaderKind::from_name(&lower)?;

        let slot = match self.probe(&lower, |_| true) {
            Ok(id) => {
                let entry = &mut self.entries[id.index()];
                entry.file = name.to_string();
                entry.ensure_handle(gl);
                return Some(id);
            }
            Err(slot) => slot,
        };

        let object = match kind.stage() {
            Some(stage) => ShaderObject::Stage {
                stage,
                handle: None,
            },
            None => ShaderObject::Program(Program::new()),
        };
        let mut entry = Shader {
            name: interner::resolve(interner::intern(&lower)),
            file: name.to_string(),
            status: false,
            object,
        };
        entry.ensure_handle(gl);

        let id = ShaderId(self.entries.len() as u32);
        self.entries.push(entry);
        self.table[slot] = Some(id);

        if self.entries.len() * 2 > self.mask() {
            self.rehash();
        }
        Some(id)
    }

    fn rehash(&mut self) {
        let bits = usize::BITS - (self.entries.len() >> 6).leading_zeros();
        let size = MIN_TABLE_SIZE << bits;
        let mask = size - 1;
        let mut table = vec![None; size];
        for (i, entry) in self.entries.iter().enumerate() {
            let mut h = name_hash(entry.name) & mask;
            while table[h].is_some() {
                h = (h + 1) & mask;
            }
            table[h] = Some(ShaderId(i as u32));
        }
        self.table = table;
        log::debug!("Shader table rehashed to {size} slots");
    }

    /// Deletes every compiled or linked object. Entries and ids survive.
    pub fn release(&mut self, gl: &G) {
        self.linked.clear();
        for entry in &mut self.entries {
            entry.release(gl);
        }
    }

    /// Reads, preprocesses and compiles a stage entry.
    pub fn compile_stage<S: ShaderSource + ?Sized>(
        &mut self,
        gl: &G,
        source: &S,
        id: ShaderId,
        num_texture_units: u32,
    ) -> Result<(), ShaderError> {
        let Some(entry) = self.entries.get_mut(id.index()) else {
            return Err(ShaderError::MissingShader(format!("#{}", id.index())));
        };
        let ShaderObject::Stage { handle, .. } = &entry.object else {
            return Ok(());
        };
        let Some(handle) = *handle else {
            return Err(ShaderError::CreateObject(entry.name.to_string()));
        };

        entry.status = false;
        let text = preprocess(source, &entry.file, num_texture_units)?;
        gl.compile_shader(handle, &text).map_err(ShaderError::Compile)?;
        entry.status = true;
        Ok(())
    }

    /// Compiled handle of stage `name`, for a program's `shaders` line.
    fn stage_for_link(&self, name: &str) -> Result<G::Shader, ShaderError> {
        let entry = self.find_stage(name).map(|id| &self.entries[id.index()]);
        match entry.and_then(|e| e.stage_handle().map(|h| (e.status, h))) {
            Some((true, handle)) => Ok(handle),
            Some((false, _)) => Err(ShaderError::DependencyFailed(name.to_string())),
            None => Err(ShaderError::MissingShader(name.to_string())),
        }
    }

    /// Parses and links a program entry. On success it joins the front of
    /// the linked sequence; on failure its GPU object is released.
    pub fn link_program<S: ShaderSource + ?Sized>(
        &mut self,
        gl: &G,
        source: &S,
        id: ShaderId,
    ) -> Result<(), ShaderError> {
        let Some(entry) = self.entries.get(id.index()) else {
            return Err(ShaderError::MissingShader(format!("#{}", id.index())));
        };
        let Some(handle) = entry.as_program().and_then(Program::handle) else {
            return Err(ShaderError::CreateObject(entry.name.to_string()));
        };
        let file = entry.file.clone();

        let result = load_program(gl, source, &file, handle, |name| self.stage_for_link(name));

        let entry = &mut self.entries[id.index()];
        let Some(program) = entry.as_program_mut() else {
            return Ok(());
        };
        match result {
            Ok(conditions) => {
                program.conditions = conditions;
                program.uniforms.clear();
                entry.status = true;
                self.linked.insert(0, id);
                Ok(())
            }
            Err(e) => {
                program.release(gl);
                entry.status = false;
                Err(e)
            }
        }
    }

    fn record(&mut self, id: ShaderId, error: &ShaderError) {
        let diagnostic = ShaderDiagnostic {
            name: self.entries[id.index()].name,
            message: error.to_string(),
        };
        log::error!("There were errors during shader compilation: {diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Full reload from `source`: release, rescan, compile stages, link
    /// programs.
    pub fn update<S: ShaderSource + ?Sized>(&mut self, gl: &G, source: &S, num_texture_units: u32) {
        self.release(gl);
        self.diagnostics.clear();

        for name in source.list() {
            let Some(id) = self.create_shader(gl, &name) else {
                continue;
            };
            let entry = &self.entries[id.index()];
            if entry.is_program() {
                if !entry.has_handle() {
                    let error = ShaderError::CreateObject(entry.name.to_string());
                    self.record(id, &error);
                }
                continue;
            }
            if let Err(e) = self.compile_stage(gl, source, id, num_texture_units) {
                self.record(id, &e);
            }
        }

        let mut programs: Vec<ShaderId> = self
            .iter()
            .filter(|(_, s)| s.is_program() && s.has_handle())
            .map(|(id, _)| id)
            .collect();
        programs.sort_by_key(|id| self.entries[id.index()].name);

        for id in programs {
            if let Err(e) = self.link_program(gl, source, id) {
                self.record(id, &e);
            }
        }

        log::info!(
            "Shaders reloaded: {} entries, {} programs linked, {} failures",
            self.entries.len(),
            self.linked.len(),
            self.diagnostics.len()
        );
    }
}
