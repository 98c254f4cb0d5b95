//! Uniform Location Cache
//!
//! Each program keeps an open-addressing table from [`UniformKey`] to the
//! location returned by the driver. A key is the interned name pattern plus
//! a packed argument word, so parameterised names like `lights[%d].color`
//! resolve without building a string on every lookup.
//!
//! # Name patterns
//!
//! | Sequence | Expansion |
//! |----------|-----------|
//! | `%d` | next argument: first the low 16 bits, then the high 16 bits |
//! | `%%` | a literal `%` |
//! | `%` + anything else | ends the name |
//!
//! Arguments are written with at most two digits.

use std::hash::Hasher;

use rustc_hash::FxHasher;
use smallvec::SmallVec;

use crate::gl::NO_LOCATION;
use crate::utils::Symbol;
use crate::utils::interner;

const INITIAL_SLOTS: usize = 64;

/// Longest expanded name, in bytes.
pub const MAX_NAME_LEN: usize = 254;

/// Packs two pattern arguments into one key word.
#[inline]
#[must_use]
pub fn pack_args(x: u16, y: u16) -> u32 {
    u32::from(x) | (u32::from(y) << 16)
}

/// Identity of a cached uniform lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformKey {
    pub symbol: Symbol,
    pub args: u32,
}

impl UniformKey {
    #[must_use]
    pub fn new(pattern: &str, args: u32) -> Self {
        Self {
            symbol: interner::intern(pattern),
            args,
        }
    }

    #[inline]
    fn bucket_hash(self) -> usize {
        let mut hasher = FxHasher::default();
        let symbol = u64::from(interner::symbol_bits(self.symbol));
        hasher.write_u64(symbol | (u64::from(self.args) << 32));
        hasher.finish() as usize
    }

    /// Expands the pattern with this key's arguments.
    #[must_use]
    pub fn expand(self) -> String {
        let name = expand_name(interner::resolve(self.symbol), self.args);
        String::from_utf8_lossy(&name).into_owned()
    }
}

/// Writes `pattern` with its `%d` placeholders filled in.
fn expand_name(pattern: &str, args: u32) -> SmallVec<[u8; 256]> {
    let mut out = SmallVec::new();
    let mut next_arg = args & 0xFFFF;
    let mut bytes = pattern.bytes();

    while out.len() < MAX_NAME_LEN {
        let Some(c) = bytes.next() else {
            break;
        };
        if c != b'%' {
            out.push(c);
            continue;
        }
        match bytes.next() {
            Some(b'd') => {
                let mut n = next_arg;
                next_arg = args >> 16;
                if n >= 10 {
                    out.push(b'0' | ((n / 10) & 15) as u8);
                    n %= 10;
                }
                out.push(b'0' | (n & 15) as u8);
            }
            Some(b'%') => out.push(b'%'),
            _ => break,
        }
    }
    out.truncate(MAX_NAME_LEN);
    out
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    key: UniformKey,
    location: i32,
}

/// Open-addressing map from uniform key to location.
///
/// Misses are cached too: a name the linker dropped resolves to
/// [`NO_LOCATION`] once and never reaches the driver again.
#[derive(Debug, Clone)]
pub struct UniformLocationCache {
    slots: Vec<Option<Slot>>,
    len: usize,
}

impl Default for UniformLocationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformLocationCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![None; INITIAL_SLOTS],
            len: 0,
        }
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots in the table.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Forgets every location. Called when the program is relinked.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.len = 0;
    }

    fn probe(&self, key: UniformKey) -> Result<i32, usize> {
        let mask = self.mask();
        let mut i = key.bucket_hash() & mask;
        while let Some(slot) = &self.slots[i] {
            if slot.key == key {
                return Ok(slot.location);
            }
            i = (i + 1) & mask;
        }
        Err(i)
    }

    /// Cached location of `key`, if it was looked up before.
    #[must_use]
    pub fn get(&self, key: UniformKey) -> Option<i32> {
        self.probe(key).ok()
    }

    /// Returns the cached location or resolves the expanded name with
    /// `resolve` and stores the result.
    pub fn get_or_resolve(&mut self, key: UniformKey, resolve: impl FnOnce(&str) -> i32) -> i32 {
        let free = match self.probe(key) {
            Ok(location) => return location,
            Err(free) => free,
        };

        let name = expand_name(interner::resolve(key.symbol), key.args);
        let name = String::from_utf8_lossy(&name);
        let location = resolve(&name);
        if cfg!(debug_assertions) && location == NO_LOCATION {
            log::warn!("Uniform '{name}' not found");
        }

        self.slots[free] = Some(Slot { key, location });
        self.len += 1;
        if self.len * 3 > self.mask() * 2 {
            self.grow();
        }
        location
    }

    fn grow(&mut self) {
        let mask = (self.mask() << 1) | 0xFF;
        let old = std::mem::replace(&mut self.slots, vec![None; mask + 1]);
        for slot in old.into_iter().flatten() {
            let mut i = slot.key.bucket_hash() & mask;
            while self.slots[i].is_some() {
                i = (i + 1) & mask;
            }
            self.slots[i] = Some(slot);
        }
        log::debug!("Uniform location table grown to {} slots", mask + 1);
    }
}
