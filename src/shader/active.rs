//! Active Program
//!
//! [`ActiveProgram`] is the borrowed view of the program currently bound on
//! the context. It resolves uniform locations through the program's cache and
//! forwards typed values to the driver.
//!
//! Setters taking a name look the location up first; `*_at` setters take a
//! location obtained from [`ActiveProgram::location`] or
//! [`ActiveProgram::location_args`]. Writing to [`NO_LOCATION`] is a no-op.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::gl::{GraphicsApi, NO_LOCATION, UniformValue};

use super::ShaderId;
use super::program::Program;
use super::uniforms::pack_args;

/// Longest boolean array accepted by [`ActiveProgram::set_bool_array_at`].
pub const MAX_BOOL_ARRAY: usize = 64;

// ─── Texture binding collaborator ────────────────────────────────────────────

/// Wrap mode requested for a bound texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexClampMode {
    ClampSClampT,
    ClampSWrapT,
    WrapSClampT,
    #[default]
    WrapSWrapT,
    MirroredSMirroredT,
}

impl TexClampMode {
    /// Decodes the packed clamp field used by material properties.
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::ClampSClampT,
            1 => Self::ClampSWrapT,
            2 => Self::WrapSClampT,
            4 => Self::MirroredSMirroredT,
            _ => Self::WrapSWrapT,
        }
    }
}

/// Binds textures for a material on the active texture unit.
pub trait TextureBinder {
    /// Binds texture `name`. `is_fallback` marks generated placeholder
    /// textures such as `#FFFFFFFF`. Returns `false` when nothing was bound.
    fn bind(&mut self, name: &str, is_fallback: bool, clamp: TexClampMode) -> bool;

    /// File name stored in texture slot `slot` of the material, if any.
    fn file_name(&self, slot: u32) -> Option<String>;

    /// Version of the file the material comes from.
    fn bs_version(&self) -> u32;
}

/// Placeholder textures bound when a slot has no usable file.
pub mod fallback {
    pub const WHITE: &str = "#FFFFFFFF";
    pub const BLACK: &str = "#FF000000";
    pub const NORMAL: &str = "#FFFF8080";
    pub const NORMAL_SPECULAR: &str = "#FFFF8080n";
    pub const REFLECTIVITY: &str = "#FF0A0A0A";
    pub const LIGHTING: &str = "#FF00F040";

    /// Placeholder for texture slot `slot` of a file with version `bs_version`.
    #[must_use]
    pub fn for_slot(slot: Option<u32>, bs_version: u32) -> &'static str {
        match slot {
            Some(0) => WHITE,
            Some(1) if bs_version < 151 => NORMAL,
            Some(1) => NORMAL_SPECULAR,
            Some(8) if bs_version >= 151 => REFLECTIVITY,
            Some(9..) if bs_version >= 151 => LIGHTING,
            _ => BLACK,
        }
    }
}

/// What to bind for one sampler uniform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerRequest<'a> {
    /// Material texture slot to read the file name from.
    pub slot: Option<u32>,
    /// Tried when the slot is empty or fails to bind.
    pub alternate: Option<&'a str>,
    pub clamp: TexClampMode,
    /// Overrides the slot; bound as a fallback texture.
    pub forced: Option<&'a str>,
}

// ─── Colour helpers ──────────────────────────────────────────────────────────

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Expands the RGB channels of an sRGB colour to linear; alpha is kept.
#[must_use]
pub fn srgb_expand(v: Vec4) -> Vec4 {
    Vec4::new(srgb_to_linear(v.x), srgb_to_linear(v.y), srgb_to_linear(v.z), v.w)
}

/// Unpacks `0xAABBGGRR` into normalised floats.
#[must_use]
pub fn unpack_rgba8(c: u32) -> Vec4 {
    Vec4::from_array(c.to_le_bytes().map(f32::from)) / 255.0
}

// ─── ActiveProgram ───────────────────────────────────────────────────────────

/// The bound program, borrowed from the registry.
pub struct ActiveProgram<'a, G: GraphicsApi> {
    gl: &'a G,
    id: ShaderId,
    name: &'static str,
    program: &'a mut Program<G>,
    max_texture_units: u32,
}

impl<'a, G: GraphicsApi> ActiveProgram<'a, G> {
    pub(crate) fn new(
        gl: &'a G,
        id: ShaderId,
        name: &'static str,
        program: &'a mut Program<G>,
        max_texture_units: u32,
    ) -> Self {
        Self {
            gl,
            id,
            name,
            program,
            max_texture_units,
        }
    }

    #[must_use]
    pub fn id(&self) -> ShaderId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn program(&self) -> &Program<G> {
        self.program
    }

    // ---- Locations ----

    pub fn location(&mut self, name: &str) -> i32 {
        self.program.location(self.gl, name)
    }

    /// Location of a `%d` pattern filled with `x` and then `y`.
    pub fn location_args(&mut self, pattern: &str, x: u16, y: u16) -> i32 {
        self.program.location_args(self.gl, pattern, pack_args(x, y))
    }

    #[inline]
    fn set(&self, l: i32, value: UniformValue<'_>) {
        self.gl.set_uniform(l, value);
    }

    // ---- By name ----

    pub fn set_i32(&mut self, name: &str, x: i32) {
        let l = self.location(name);
        self.set(l, UniformValue::Int(x));
    }

    pub fn set_f32(&mut self, name: &str, x: f32) {
        let l = self.location(name);
        self.set(l, UniformValue::Float(x));
    }

    pub fn set_vec2(&mut self, name: &str, v: Vec2) {
        let l = self.location(name);
        self.set(l, UniformValue::Vec2(v));
    }

    pub fn set_vec3(&mut self, name: &str, v: Vec3) {
        let l = self.location(name);
        self.set(l, UniformValue::Vec3(v));
    }

    pub fn set_vec4(&mut self, name: &str, v: Vec4) {
        let l = self.location(name);
        self.set(l, UniformValue::Vec4(v));
    }

    pub fn set_mat3(&mut self, name: &str, m: &Mat3) {
        let l = self.location(name);
        self.set(l, UniformValue::Mat3(*m));
    }

    pub fn set_mat4(&mut self, name: &str, m: &Mat4) {
        let l = self.location(name);
        self.set(l, UniformValue::Mat4(*m));
    }

    // ---- By location ----

    pub fn set_bool_at(&self, l: i32, x: bool) {
        self.set(l, UniformValue::Int(i32::from(x)));
    }

    pub fn set_i32_at(&self, l: i32, x: i32) {
        self.set(l, UniformValue::Int(x));
    }

    pub fn set_f32_at(&self, l: i32, x: f32) {
        self.set(l, UniformValue::Float(x));
    }

    pub fn set_vec2_at(&self, l: i32, v: Vec2) {
        self.set(l, UniformValue::Vec2(v));
    }

    pub fn set_vec3_at(&self, l: i32, v: Vec3) {
        self.set(l, UniformValue::Vec3(v));
    }

    pub fn set_vec4_at(&self, l: i32, v: Vec4) {
        self.set(l, UniformValue::Vec4(v));
    }

    /// Writes an sRGB colour converted to linear.
    pub fn set_srgb_at(&self, l: i32, v: Vec4) {
        self.set(l, UniformValue::Vec4(srgb_expand(v)));
    }

    /// Writes a packed RGBA8 colour (red in the low byte).
    pub fn set_color_at(&self, l: i32, rgba8: u32, is_srgb: bool) {
        let mut v = unpack_rgba8(rgba8);
        if is_srgb {
            v = srgb_expand(v);
        }
        self.set(l, UniformValue::Vec4(v));
    }

    /// At most [`MAX_BOOL_ARRAY`] elements are written.
    pub fn set_bool_array_at(&self, l: i32, values: &[bool]) {
        let ints: SmallVec<[i32; MAX_BOOL_ARRAY]> = values
            .iter()
            .take(MAX_BOOL_ARRAY)
            .map(|&b| i32::from(b))
            .collect();
        self.set(l, UniformValue::IntArray(&ints));
    }

    pub fn set_i32_array_at(&self, l: i32, values: &[i32]) {
        self.set(l, UniformValue::IntArray(values));
    }

    pub fn set_f32_array_at(&self, l: i32, values: &[f32]) {
        self.set(l, UniformValue::FloatArray(values));
    }

    pub fn set_vec4_array_at(&self, l: i32, values: &[Vec4]) {
        self.set(l, UniformValue::Vec4Array(values));
    }

    pub fn set_mat3_at(&self, l: i32, m: &Mat3) {
        self.set(l, UniformValue::Mat3(*m));
    }

    pub fn set_mat4_at(&self, l: i32, m: &Mat4) {
        self.set(l, UniformValue::Mat4(*m));
    }

    /// Fills a sampler array with consecutive units starting at `first_unit`.
    ///
    /// `array_size` is clamped to the unit limit and `count` to `array_size`;
    /// the remaining elements repeat `first_unit`.
    pub fn set_samplers_at(&self, l: i32, first_unit: i32, count: usize, array_size: usize) {
        let array_size = array_size.min(self.max_texture_units as usize);
        let count = count.min(array_size);
        let units: SmallVec<[i32; 32]> = (0..array_size)
            .map(|i| if i < count { first_unit + i as i32 } else { first_unit })
            .collect();
        self.set(l, UniformValue::IntArray(&units));
    }

    // ---- Samplers ----

    fn activate_texture_unit(&self, unit: u32) -> bool {
        if unit >= self.max_texture_units {
            log::warn!(
                "Texture unit {unit} exceeds the maximum of {} units",
                self.max_texture_units
            );
            return false;
        }
        self.gl.active_texture(unit);
        true
    }

    /// Binds a texture for sampler `name` on texture unit `*unit` and
    /// advances the unit.
    ///
    /// Candidates are tried in order: the forced texture, the slot's file,
    /// the alternate, then the slot's placeholder. Returns `true` without
    /// binding when the program has no such sampler, and `false` when the
    /// unit is out of range or nothing could be bound.
    pub fn bind_sampler<T: TextureBinder + ?Sized>(
        &mut self,
        textures: &mut T,
        name: &str,
        request: &SamplerRequest<'_>,
        unit: &mut u32,
    ) -> bool {
        let l = self.location(name);
        if l == NO_LOCATION {
            return true;
        }
        if !self.activate_texture_unit(*unit) {
            return false;
        }

        let bound = request
            .forced
            .is_some_and(|forced| textures.bind(forced, true, request.clamp))
            || request
                .slot
                .and_then(|slot| textures.file_name(slot))
                .filter(|f| !f.is_empty())
                .is_some_and(|file| textures.bind(&file, false, request.clamp))
            || request
                .alternate
                .is_some_and(|alt| textures.bind(alt, false, TexClampMode::WrapSWrapT))
            || {
                let placeholder = fallback::for_slot(request.slot, textures.bs_version());
                textures.bind(placeholder, true, TexClampMode::WrapSWrapT)
            };
        if !bound {
            return false;
        }

        self.set(l, UniformValue::Int(*unit as i32));
        *unit += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_unpacks_red_from_low_byte() {
        let v = unpack_rgba8(0x80FF_0000);
        assert_eq!(v.x, 0.0);
        assert_eq!(v.y, 0.0);
        assert_eq!(v.z, 1.0);
        assert!((v.w - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn srgb_expand_keeps_alpha() {
        let v = srgb_expand(Vec4::new(1.0, 0.5, 0.0, 0.5));
        assert!((v.x - 1.0).abs() < 1e-6);
        assert!((v.y - 0.214_041).abs() < 1e-4);
        assert_eq!(v.z, 0.0);
        assert_eq!(v.w, 0.5);
    }

    #[test]
    fn placeholder_per_slot() {
        assert_eq!(fallback::for_slot(Some(0), 100), fallback::WHITE);
        assert_eq!(fallback::for_slot(Some(1), 130), fallback::NORMAL);
        assert_eq!(fallback::for_slot(Some(1), 155), fallback::NORMAL_SPECULAR);
        assert_eq!(fallback::for_slot(Some(8), 155), fallback::REFLECTIVITY);
        assert_eq!(fallback::for_slot(Some(9), 172), fallback::LIGHTING);
        assert_eq!(fallback::for_slot(Some(8), 130), fallback::BLACK);
        assert_eq!(fallback::for_slot(None, 155), fallback::BLACK);
    }
}
