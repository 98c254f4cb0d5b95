//! Geometry Content Cache
//!
//! Uploaded shapes live in a `SlotMap` arena. Two structures index them:
//!
//! - a flat open-addressing table (linear probing, no tombstones) keyed by
//!   [`ShapeDataHash`], rebuilt whenever entries are evicted;
//! - a circular doubly linked LRU ring threaded through the arena keys.
//!   `last` is the most recently used entry and `last.next` the least
//!   recently used one.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::errors::GeometryError;
use crate::gl::{BufferTarget, GraphicsApi, IndexType, PrimitiveMode};

use super::hash::{AttributeMask, ShapeDataHash};

const MIN_TABLE_SIZE: usize = 256;

new_key_type! {
    /// Arena key of a cached shape.
    pub struct ShapeKey;
}

/// Eviction budgets. [`GeometryCache::shrink_cache`] evicts until every
/// counter is strictly below its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    pub max_shapes: usize,
    pub max_buffers: usize,
    pub max_bytes: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_shapes: 4096,
            max_buffers: 16384,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Index array of a draw. Count and element type derive from the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexData<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl IndexData<'_> {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(i) => i.len(),
            Self::U16(i) => i.len(),
            Self::U32(i) => i.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn index_type(&self) -> IndexType {
        match self {
            Self::U8(_) => IndexType::U8,
            Self::U16(_) => IndexType::U16,
            Self::U32(_) => IndexType::U32,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U8(i) => i,
            Self::U16(i) => bytemuck::cast_slice(i),
            Self::U32(i) => bytemuck::cast_slice(i),
        }
    }
}

struct ShapeData<G: GraphicsApi> {
    hash: ShapeDataHash,
    gpu: Upload<G>,
    prev: ShapeKey,
    next: ShapeKey,
}

/// GPU objects owned by one shape. The index buffer is missing only while
/// an upload is still in progress.
struct Upload<G: GraphicsApi> {
    vao: G::VertexArray,
    vertex_buffers: SmallVec<[G::Buffer; 4]>,
    index_buffer: Option<G::Buffer>,
}

impl<G: GraphicsApi> Upload<G> {
    fn discard(self, gl: &G) {
        gl.bind_vertex_array(None);
        gl.delete_vertex_array(self.vao);
        for buffer in self.vertex_buffers {
            gl.delete_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer {
            gl.delete_buffer(buffer);
        }
    }
}

/// Content-addressed cache of vertex arrays and their buffers.
pub struct GeometryCache<G: GraphicsApi> {
    shapes: SlotMap<ShapeKey, ShapeData<G>>,
    table: Vec<Option<ShapeKey>>,
    last: Option<ShapeKey>,
    buffer_count: usize,
    bytes_used: usize,
    limits: CacheLimits,
}

impl<G: GraphicsApi> Default for GeometryCache<G> {
    fn default() -> Self {
        Self::new(CacheLimits::default())
    }
}

impl<G: GraphicsApi> GeometryCache<G> {
    #[must_use]
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            shapes: SlotMap::with_key(),
            table: Vec::new(),
            last: None,
            buffer_count: 0,
            bytes_used: 0,
            limits,
        }
    }

    // ---- Stats ----

    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    #[must_use]
    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// Number of slots in the lookup table.
    #[must_use]
    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn contains(&self, hash: &ShapeDataHash) -> bool {
        self.probe(hash).is_ok()
    }

    /// Cached fingerprints from most to least recently used.
    pub fn iter_recent(&self) -> impl Iterator<Item = &ShapeDataHash> {
        let mut cursor = self.last;
        std::iter::from_fn(move || {
            let key = cursor?;
            let shape = &self.shapes[key];
            cursor = Some(shape.prev).filter(|&prev| Some(prev) != self.last);
            Some(&shape.hash)
        })
    }

    // ---- Table ----

    fn probe(&self, hash: &ShapeDataHash) -> Result<ShapeKey, usize> {
        if self.table.is_empty() {
            return Err(0);
        }
        let mask = self.table.len() - 1;
        let mut i = hash.bucket() as usize & mask;
        while let Some(key) = self.table[i] {
            if self.shapes[key].hash == *hash {
                return Ok(key);
            }
            i = (i + 1) & mask;
        }
        Err(i)
    }

    /// Rebuilds the table sized for the current entry count, inserting from
    /// the most recently used entry backwards.
    fn rehash(&mut self) {
        let bits = usize::BITS - ((self.shapes.len() * 3) >> 9).leading_zeros();
        let size = MIN_TABLE_SIZE << bits;
        let mask = size - 1;
        let mut table = vec![None; size];

        let mut cursor = self.last;
        while let Some(key) = cursor {
            let shape = &self.shapes[key];
            let mut i = shape.hash.bucket() as usize & mask;
            while table[i].is_some() {
                i = (i + 1) & mask;
            }
            table[i] = Some(key);
            cursor = Some(shape.prev).filter(|&prev| Some(prev) != self.last);
        }

        self.table = table;
        log::debug!(
            "Geometry table rebuilt: {} slots for {} shapes",
            size,
            self.shapes.len()
        );
    }

    // ---- LRU ring ----

    fn unlink(&mut self, key: ShapeKey) {
        let (prev, next) = {
            let shape = &self.shapes[key];
            (shape.prev, shape.next)
        };
        if prev == key {
            self.last = None;
            return;
        }
        self.shapes[prev].next = next;
        self.shapes[next].prev = prev;
        if self.last == Some(key) {
            self.last = Some(prev);
        }
    }

    /// Links `key` right after the current MRU entry and makes it the MRU.
    fn link_most_recent(&mut self, key: ShapeKey) {
        match self.last {
            None => {
                let shape = &mut self.shapes[key];
                shape.prev = key;
                shape.next = key;
            }
            Some(last) => {
                let next = self.shapes[last].next;
                {
                    let shape = &mut self.shapes[key];
                    shape.prev = last;
                    shape.next = next;
                }
                self.shapes[last].next = key;
                self.shapes[next].prev = key;
            }
        }
        self.last = Some(key);
    }

    fn touch(&mut self, key: ShapeKey) {
        if self.last != Some(key) {
            self.unlink(key);
            self.link_most_recent(key);
        }
    }

    // ---- Upload ----

    fn upload(
        gl: &G,
        hash: &ShapeDataHash,
        attrs: &[&[f32]],
        elements: &[u8],
    ) -> Result<Upload<G>, GeometryError> {
        let vao = gl.create_vertex_array().map_err(GeometryError::CreateObject)?;
        gl.bind_vertex_array(Some(vao));
        let mut upload = Upload {
            vao,
            vertex_buffers: SmallVec::new(),
            index_buffer: None,
        };

        for slot in hash.attr_mask.slots() {
            let data = &attrs[slot.index][..slot.float_count(hash.num_verts)];
            let index = slot.index as u32;
            if slot.constant {
                gl.vertex_attrib_constant(index, data);
                continue;
            }
            match gl.create_buffer(BufferTarget::Vertex, bytemuck::cast_slice(data)) {
                Ok(buffer) => upload.vertex_buffers.push(buffer),
                Err(e) => {
                    upload.discard(gl);
                    return Err(GeometryError::CreateObject(e));
                }
            }
            gl.vertex_attrib_array(index, slot.components);
        }

        match gl.create_buffer(BufferTarget::Index, elements) {
            Ok(index_buffer) => {
                upload.index_buffer = Some(index_buffer);
                Ok(upload)
            }
            Err(e) => {
                upload.discard(gl);
                Err(GeometryError::CreateObject(e))
            }
        }
    }

    fn destroy(gl: &G, shape: ShapeData<G>) {
        shape.gpu.discard(gl);
    }

    // ---- Public operations ----

    /// Draws indexed geometry, uploading it first unless byte-identical data
    /// is already cached.
    ///
    /// `attrs[i]` holds the floats of attribute slot `i` as described by
    /// `attr_mask`; constant attributes read their first components only.
    pub fn draw_shape(
        &mut self,
        gl: &G,
        num_verts: u32,
        attr_mask: AttributeMask,
        mode: PrimitiveMode,
        attrs: &[&[f32]],
        indices: IndexData<'_>,
    ) -> Result<(), GeometryError> {
        attr_mask.validate(num_verts, attrs)?;
        let elements = indices.as_bytes();
        let hash = ShapeDataHash::new(num_verts, attr_mask, attrs, elements);
        let count = indices.len() as u32;
        let index_type = indices.index_type();

        if self.shapes.len() * 3 >= self.table.len() * 2 {
            self.rehash();
        }

        let slot = match self.probe(&hash) {
            Ok(key) => {
                self.touch(key);
                gl.bind_vertex_array(Some(self.shapes[key].gpu.vao));
                gl.draw_elements(mode, count, index_type);
                return Ok(());
            }
            Err(slot) => slot,
        };

        let gpu = Self::upload(gl, &hash, attrs, elements)?;
        let key = self.shapes.insert_with_key(|key| ShapeData {
            hash,
            gpu,
            prev: key,
            next: key,
        });
        self.link_most_recent(key);
        self.table[slot] = Some(key);

        let (buffers, bytes) = hash.buffer_count_and_size();
        self.buffer_count += buffers;
        self.bytes_used += bytes;

        gl.draw_elements(mode, count, index_type);
        Ok(())
    }

    /// Replaces the eviction budgets. Takes effect on the next shrink.
    pub fn set_cache_limits(&mut self, limits: CacheLimits) {
        self.limits = limits;
    }

    fn within_limits(&self) -> bool {
        self.shapes.len() < self.limits.max_shapes
            && self.buffer_count < self.limits.max_buffers
            && self.bytes_used < self.limits.max_bytes
    }

    /// Evicts least recently used shapes until every counter is below its
    /// budget, or everything when `delete_all` is set. Returns the number of
    /// evicted shapes.
    pub fn shrink_cache(&mut self, gl: &G, delete_all: bool) -> usize {
        let mut evicted = 0;
        while let Some(last) = self.last {
            if !delete_all && self.within_limits() {
                break;
            }
            let victim = self.shapes[last].next;
            self.unlink(victim);
            let Some(shape) = self.shapes.remove(victim) else {
                break;
            };
            let (buffers, bytes) = shape.hash.buffer_count_and_size();
            self.buffer_count -= buffers;
            self.bytes_used -= bytes;
            Self::destroy(gl, shape);
            evicted += 1;
        }

        if evicted > 0 {
            log::debug!("Evicted {evicted} shapes from the geometry cache");
            self.rehash();
        }
        evicted
    }

    /// Evicts every shape.
    pub fn flush_cache(&mut self, gl: &G) -> usize {
        self.shrink_cache(gl, true)
    }
}
