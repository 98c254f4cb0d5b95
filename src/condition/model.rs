//! Model accessor boundary.
//!
//! Conditions never see the file-format model directly; they go through
//! [`ModelAccess`], which exposes typed fields by name and the block type
//! hierarchy.

use std::borrow::Cow;

/// Typed value of a model field, as seen by condition evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    /// Any string-like field.
    String(Cow<'a, str>),
    /// Unsigned integer counts, flags and enums.
    Count(u64),
    /// Floating point fields.
    Float(f32),
    /// Packed file version (`0xAABBCCDD`).
    FileVersion(u32),
    /// Packed vertex descriptor; carries the already extracted flag word.
    VertexFlags(u32),
    /// Every other kind. Conditions on it are always false.
    Other,
}

/// Read access to the model data conditions are evaluated against.
pub trait ModelAccess {
    /// Handle to a block or a field inside a block.
    type Index: Clone;

    /// Root of the document header region.
    fn header(&self) -> Option<Self::Index>;

    /// Named child field or sub-structure of `parent`.
    fn child(&self, parent: &Self::Index, name: &str) -> Option<Self::Index>;

    /// Whether `block` is of type `type_name` or inherits from it.
    fn block_inherits(&self, block: &Self::Index, type_name: &str) -> bool;

    /// Typed value at `index`, `None` when the index does not hold a field.
    fn field(&self, index: &Self::Index) -> Option<FieldValue<'_>>;

    /// Version number the literal `BSVersion` compares against.
    fn bs_version(&self) -> u32;
}
