//! Source Preprocessor
//!
//! Expands `#include "file"` directives recursively before a stage is handed
//! to the driver, and substitutes the texture-unit macro.
//!
//! A directive is recognised only when the `#` is preceded on its line by
//! nothing but spaces or tabs. The directive line (including its indentation,
//! excluding the newline) is replaced by the expanded content of the included
//! file, which is read through the same [`ShaderSource`].

use crate::errors::ShaderError;

use super::source::ShaderSource;

/// Maximum `#include` nesting. A file at this depth may not include another.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Macro replaced by the number of texture units available to materials.
pub const TEXTURE_UNITS_MACRO: &str = "SF_NUM_TEXTURE_UNITS";

/// Texture units kept back by the renderer for its own use.
pub const RESERVED_TEXTURE_UNITS: u32 = 2;

#[inline]
fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Parses the tail of an include directive, starting right after `include`.
///
/// Returns the file name and the offset of the terminating newline (or the
/// end of `rest`).
fn parse_include_target(rest: &[u8]) -> Option<(&[u8], usize)> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        BeforeName,
        InName,
        AfterName,
    }

    let mut state = State::BeforeName;
    let mut name_start = 0;
    let mut name_end = 0;
    for (i, &c) in rest.iter().enumerate() {
        match (c, state) {
            (b'"', State::BeforeName) => {
                state = State::InName;
                name_start = i + 1;
            }
            (b'"', State::InName) => {
                state = State::AfterName;
                name_end = i;
            }
            (b'\n', State::AfterName) => return Some((&rest[name_start..name_end], i)),
            (b'\n' | b'"', _) => return None,
            (_, State::InName) => {}
            (b' ' | b'\t' | b'\r', _) => {}
            _ => return None,
        }
    }
    (state == State::AfterName).then(|| (&rest[name_start..name_end], rest.len()))
}

/// Reads `path` from `source` and expands its includes.
///
/// `depth` is the nesting level of `path` itself; top-level callers pass 0.
pub fn load_shader_file<S: ShaderSource + ?Sized>(
    source: &S,
    path: &str,
    depth: usize,
) -> Result<Vec<u8>, ShaderError> {
    let mut data = source.read(path)?;

    let mut n = 0;
    while let Some(offset) = data[n..].iter().position(|&c| c == b'#') {
        let hash = n + offset;
        n = hash + 1;

        let line_start = data[..hash]
            .iter()
            .rposition(|&c| c == b'\n')
            .map_or(0, |p| p + 1);
        if !data[line_start..hash].iter().copied().all(is_blank) {
            continue;
        }

        while n < data.len() && is_blank(data[n]) {
            n += 1;
        }
        if !data[n..].starts_with(b"include") {
            continue;
        }
        n += "include".len();

        let (name, line_len) = parse_include_target(&data[n..])
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| ShaderError::InvalidInclude(path.to_string()))?;
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(ShaderError::IncludeDepth(path.to_string()));
        }
        let name = String::from_utf8_lossy(name).into_owned();
        let line_end = n + line_len;

        let included = load_shader_file(source, &name, depth + 1)?;
        let included_len = included.len();
        data.splice(line_start..line_end, included);
        n = line_start + included_len;
    }

    Ok(data)
}

/// Replaces every occurrence of [`TEXTURE_UNITS_MACRO`] with
/// `num_texture_units - RESERVED_TEXTURE_UNITS`.
#[must_use]
pub fn substitute_texture_units(text: &str, num_texture_units: u32) -> String {
    let available = num_texture_units.saturating_sub(RESERVED_TEXTURE_UNITS);
    text.replace(TEXTURE_UNITS_MACRO, &available.to_string())
}

/// Loads a stage and produces the final text handed to the compiler.
pub fn preprocess<S: ShaderSource + ?Sized>(
    source: &S,
    path: &str,
    num_texture_units: u32,
) -> Result<String, ShaderError> {
    let data = load_shader_file(source, path, 0)?;
    let text = String::from_utf8(data).map_err(|_| ShaderError::InvalidUtf8(path.to_string()))?;
    Ok(substitute_texture_units(&text, num_texture_units))
}
