//! Shape Content Hashing
//!
//! A draw is identified by the bytes it would upload. [`ShapeDataHash`]
//! fingerprints the vertex count, attribute layout, index size and every
//! uploaded byte with a seeded 128-bit XXH3; the seed is drawn once per
//! process so fingerprints cannot be precomputed from outside.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use xxhash_rust::xxh3::Xxh3;

use crate::errors::GeometryError;

/// Number of attribute slots described by an [`AttributeMask`].
pub const MAX_ATTRIBUTES: usize = 16;

const COMPONENT_BITS: u64 = 0x7;
const CONSTANT_BIT: u64 = 0x8;

/// Packed per-attribute layout, one nibble per slot.
///
/// Bits 0..=2 of a nibble hold the component count (0 = slot unused), bit 3
/// marks a constant attribute that binds one value instead of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttributeMask(pub u64);

/// One used slot of an [`AttributeMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSlot {
    pub index: usize,
    pub components: u32,
    pub constant: bool,
}

impl AttributeSlot {
    /// Floats read from the attribute's data slice.
    #[inline]
    #[must_use]
    pub fn float_count(&self, num_verts: u32) -> usize {
        if self.constant {
            self.components as usize
        } else {
            self.components as usize * num_verts as usize
        }
    }
}

impl AttributeMask {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Sets slot `index` to a per-vertex attribute with `components` floats.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`MAX_ATTRIBUTES`].
    #[must_use]
    pub const fn with(self, index: usize, components: u32) -> Self {
        assert!(index < MAX_ATTRIBUTES, "attribute slot out of range");
        let shift = index * 4;
        Self((self.0 & !(0xF << shift)) | (((components as u64) & COMPONENT_BITS) << shift))
    }

    /// Sets slot `index` to a constant attribute of `components` floats.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`MAX_ATTRIBUTES`].
    #[must_use]
    pub const fn with_constant(self, index: usize, components: u32) -> Self {
        let shift = index * 4;
        Self(self.with(index, components).0 | (CONSTANT_BIT << shift))
    }

    #[inline]
    #[must_use]
    pub fn components(self, index: usize) -> u32 {
        ((self.0 >> (index * 4)) & COMPONENT_BITS) as u32
    }

    #[inline]
    #[must_use]
    pub fn is_constant(self, index: usize) -> bool {
        (self.0 >> (index * 4)) & CONSTANT_BIT != 0
    }

    /// Used slots in index order.
    pub fn slots(self) -> impl Iterator<Item = AttributeSlot> {
        (0..MAX_ATTRIBUTES).filter_map(move |index| {
            let components = self.components(index);
            (components != 0).then(|| AttributeSlot {
                index,
                components,
                constant: self.is_constant(index),
            })
        })
    }

    /// Buffers and bytes a shape with this layout occupies on the GPU.
    ///
    /// Every per-vertex attribute gets one buffer, plus one index buffer.
    #[must_use]
    pub fn buffer_count_and_size(self, num_verts: u32, element_bytes: u32) -> (usize, usize) {
        self.slots()
            .filter(|s| !s.constant)
            .fold((1, element_bytes as usize), |(count, bytes), s| {
                (count + 1, bytes + s.float_count(num_verts) * size_of::<f32>())
            })
    }

    /// Checks that every used slot has enough data.
    pub fn validate(self, num_verts: u32, attrs: &[&[f32]]) -> Result<(), GeometryError> {
        for slot in self.slots() {
            let Some(data) = attrs.get(slot.index) else {
                return Err(GeometryError::MissingAttribute { index: slot.index });
            };
            let expected = slot.float_count(num_verts);
            if data.len() < expected {
                return Err(GeometryError::AttributeTooShort {
                    index: slot.index,
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(())
    }
}

// ─── Per-process seed ────────────────────────────────────────────────────────

static SEED: OnceLock<u64> = OnceLock::new();

#[cfg(target_arch = "x86_64")]
fn timestamp_counter() -> u64 {
    // SAFETY: RDTSC is available on every x86_64 CPU.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(not(target_arch = "x86_64"))]
fn timestamp_counter() -> u64 {
    0
}

fn fallback_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64);
    nanos ^ timestamp_counter().rotate_left(32)
}

/// Seed of every shape fingerprint in this process.
pub fn hash_seed() -> u64 {
    *SEED.get_or_init(|| {
        getrandom::u64().unwrap_or_else(|e| {
            log::warn!("OS random source unavailable ({e}), seeding shape hashes from the clock");
            fallback_seed()
        })
    })
}

// ─── ShapeDataHash ───────────────────────────────────────────────────────────

/// Content fingerprint of one draw's vertex and index data.
///
/// Two draws with equal fingerprints share their GPU objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeDataHash {
    pub digest: u128,
    pub attr_mask: AttributeMask,
    pub num_verts: u32,
    pub element_bytes: u32,
}

impl ShapeDataHash {
    /// Fingerprints validated draw data. Slices longer than the layout
    /// requires are hashed only up to the used length.
    #[must_use]
    pub fn new(
        num_verts: u32,
        attr_mask: AttributeMask,
        attrs: &[&[f32]],
        elements: &[u8],
    ) -> Self {
        let element_bytes = elements.len() as u32;
        let mut hasher = Xxh3::with_seed(hash_seed());
        hasher.update(&num_verts.to_le_bytes());
        hasher.update(&attr_mask.0.to_le_bytes());
        hasher.update(&element_bytes.to_le_bytes());
        for slot in attr_mask.slots() {
            if let Some(data) = attrs.get(slot.index) {
                let n = slot.float_count(num_verts).min(data.len());
                hasher.update(bytemuck::cast_slice(&data[..n]));
            }
        }
        hasher.update(elements);

        Self {
            digest: hasher.digest128(),
            attr_mask,
            num_verts,
            element_bytes,
        }
    }

    /// Open-addressing bucket hash.
    #[inline]
    #[must_use]
    pub fn bucket(&self) -> u32 {
        self.digest as u32
    }

    /// See [`AttributeMask::buffer_count_and_size`].
    #[must_use]
    pub fn buffer_count_and_size(&self) -> (usize, usize) {
        self.attr_mask.buffer_count_and_size(self.num_verts, self.element_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_nibbles() {
        let mask = AttributeMask::new().with(0, 3).with_constant(2, 4).with(5, 2);
        assert_eq!(mask.0, 0x20_0C03);
        assert_eq!(mask.components(0), 3);
        assert!(mask.is_constant(2));
        assert!(!mask.is_constant(5));
        assert_eq!(mask.slots().count(), 3);
    }

    #[test]
    fn last_slot_is_addressable() {
        let mask = AttributeMask::new().with_constant(MAX_ATTRIBUTES - 1, 4);
        assert_eq!(mask.components(MAX_ATTRIBUTES - 1), 4);
        assert!(mask.is_constant(MAX_ATTRIBUTES - 1));
        assert_eq!(mask.components(0), 0);
    }

    #[test]
    #[should_panic(expected = "attribute slot out of range")]
    fn slot_past_limit_panics() {
        let _ = AttributeMask::new().with(MAX_ATTRIBUTES, 3);
    }

    #[test]
    fn buffer_count_skips_constant_attributes() {
        // position (3) + uv (2) per vertex, colour constant
        let mask = AttributeMask::new().with(0, 3).with(1, 2).with_constant(2, 4);
        let (buffers, bytes) = mask.buffer_count_and_size(10, 60);
        assert_eq!(buffers, 3);
        assert_eq!(bytes, (3 + 2) * 4 * 10 + 60);
    }

    #[test]
    fn validate_reports_short_and_missing_slots() {
        let mask = AttributeMask::new().with(0, 3).with(1, 2);
        let pos = [0.0f32; 9];
        let uv = [0.0f32; 5];
        assert!(matches!(
            mask.validate(3, &[&pos, &uv]),
            Err(GeometryError::AttributeTooShort {
                index: 1,
                expected: 6,
                actual: 5
            })
        ));
        assert!(matches!(
            mask.validate(3, &[&pos]),
            Err(GeometryError::MissingAttribute { index: 1 })
        ));
    }

    #[test]
    fn seed_is_stable_within_process() {
        assert_eq!(hash_seed(), hash_seed());
    }

    #[test]
    fn identical_bytes_hash_equal() {
        let mask = AttributeMask::new().with(0, 3);
        let pos = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let idx = bytemuck::cast_slice::<u16, u8>(&[0, 1, 2]).to_vec();
        let a = ShapeDataHash::new(3, mask, &[&pos], &idx);
        let b = ShapeDataHash::new(3, mask, &[&pos.to_vec()], &idx);
        assert_eq!(a, b);
        let mut moved = pos;
        moved[4] = 0.5;
        assert_ne!(a, ShapeDataHash::new(3, mask, &[&moved], &idx));
    }
}
