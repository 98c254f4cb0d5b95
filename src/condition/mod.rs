//! Condition Model
//!
//! Small boolean expressions that gate which program variant applies to the
//! model data being drawn. A program definition builds a tree of
//! [`Condition`]s from `check` and `checkgroup` lines; the renderer evaluates
//! it against the blocks of the shape about to be drawn.
//!
//! ```text
//! checkgroup begin or
//!     check BSShaderPPLightingProperty
//!     check BSVersion >= 130
//! checkgroup end
//! check not HEADER/Version == 0x14020007
//! ```

use std::fmt;

pub mod model;

pub use model::{FieldValue, ModelAccess};

/// Left operand that compares the model's version instead of a field.
pub const BS_VERSION: &str = "BSVersion";

/// Path prefix that addresses the document header instead of a block.
pub const HEADER_PREFIX: &str = "HEADER/";

/// Comparison operator of a [`ConditionSingle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    /// `a & b != 0`
    And,
    /// `a & b == 0`
    Nand,
    /// No operator: the condition only tests that the left operand exists.
    None,
}

const SPELLINGS: [(&str, Comparator); 8] = [
    ("==", Comparator::Eq),
    ("!=", Comparator::Ne),
    ("<=", Comparator::Le),
    (">=", Comparator::Ge),
    ("!&", Comparator::Nand),
    ("<", Comparator::Lt),
    (">", Comparator::Gt),
    ("&", Comparator::And),
];

impl Comparator {
    #[must_use]
    pub fn spelling(self) -> &'static str {
        SPELLINGS
            .iter()
            .find(|(_, c)| *c == self)
            .map_or("", |(s, _)| s)
    }

    fn integer(self, a: u64, b: u64) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Le => a <= b,
            Self::Ge => a >= b,
            Self::Lt => a < b,
            Self::Gt => a > b,
            Self::And => a & b != 0,
            Self::Nand => a & b == 0,
            Self::None => true,
        }
    }

    #[allow(clippy::float_cmp)]
    fn float(self, a: f32, b: f32) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Le => a <= b,
            Self::Ge => a >= b,
            Self::Lt => a < b,
            Self::Gt => a > b,
            Self::And | Self::Nand | Self::None => true,
        }
    }

    fn string(self, a: &str, b: &str) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            _ => false,
        }
    }
}

/// Parses an unsigned integer with C-style base detection: `0x` hex, leading
/// `0` octal, decimal otherwise. Unparsable input yields 0.
fn parse_uint(s: &str) -> u64 {
    let s = s.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse()
    };
    parsed.unwrap_or(0)
}

fn parse_u32(s: &str) -> u64 {
    let v = parse_uint(s);
    if v > u64::from(u32::MAX) { 0 } else { v }
}

fn parse_float(s: &str) -> f32 {
    s.trim().parse::<f64>().unwrap_or(0.0) as f32
}

/// Leaf predicate: `left <op> right`, optionally inverted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSingle {
    left: String,
    right: String,
    comp: Comparator,
    invert: bool,
}

impl ConditionSingle {
    /// Parses the expression part of a `check` line.
    ///
    /// The line is split at the earliest operator (longest spelling wins on a
    /// tie). Without an operator the whole line becomes an "exists" test.
    #[must_use]
    pub fn parse(line: &str, invert: bool) -> Self {
        let found = SPELLINGS
            .iter()
            .filter_map(|&(spelling, comp)| {
                line.match_indices(spelling)
                    .map(|(pos, _)| pos)
                    .find(|&pos| pos > 0)
                    .map(|pos| (pos, spelling, comp))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())));

        let Some((pos, spelling, comp)) = found else {
            return Self {
                left: line.trim().to_string(),
                right: String::new(),
                comp: Comparator::None,
                invert,
            };
        };

        let left = line[..pos].trim();
        let mut right = line[pos + spelling.len()..].trim();
        if right.len() >= 2 && right.starts_with('"') && right.ends_with('"') {
            right = &right[1..right.len() - 1];
        }

        Self {
            left: left.to_string(),
            right: right.to_string(),
            comp,
            invert,
        }
    }

    #[must_use]
    pub fn left(&self) -> &str {
        &self.left
    }

    #[must_use]
    pub fn right(&self) -> &str {
        &self.right
    }

    #[must_use]
    pub fn comparator(&self) -> Comparator {
        self.comp
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Resolves the left operand path against the candidate blocks.
    fn resolve<M: ModelAccess>(&self, model: &M, blocks: &[M::Index]) -> Option<M::Index> {
        if let Some(rest) = self.left.strip_prefix(HEADER_PREFIX) {
            let mut index = model.header()?;
            for segment in rest.split('/') {
                index = model.child(&index, segment)?;
            }
            return Some(index);
        }

        let (block_type, child) = match self.left.split_once('/') {
            Some((block, child)) if !block.is_empty() => (block, Some(child)),
            _ => (self.left.as_str(), None),
        };

        let block = blocks.iter().find(|b| model.block_inherits(b, block_type))?;
        let Some(child) = child else {
            return Some(block.clone());
        };
        let mut index = block.clone();
        for segment in child.split('/') {
            index = model.child(&index, segment)?;
        }
        Some(index)
    }

    pub fn eval<M: ModelAccess>(&self, model: &M, blocks: &[M::Index]) -> bool {
        if self.left == BS_VERSION {
            let version = u64::from(model.bs_version());
            return self.comp.integer(version, parse_u32(&self.right)) ^ self.invert;
        }

        let Some(index) = self.resolve(model, blocks) else {
            return self.invert;
        };

        if self.comp == Comparator::None {
            return !self.invert;
        }

        let Some(value) = model.field(&index) else {
            return false;
        };

        let result = match value {
            FieldValue::String(s) => self.comp.string(&s, &self.right),
            FieldValue::Count(n) => self.comp.integer(n, parse_uint(&self.right)),
            FieldValue::Float(f) => self.comp.float(f, parse_float(&self.right)),
            FieldValue::FileVersion(v) | FieldValue::VertexFlags(v) => {
                self.comp.integer(u64::from(v), parse_u32(&self.right))
            }
            FieldValue::Other => return false,
        };
        result ^ self.invert
    }
}

impl fmt::Display for ConditionSingle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            f.write_str("not ")?;
        }
        if self.comp == Comparator::None {
            return f.write_str(&self.left);
        }
        write!(f, "{} {} {}", self.left, self.comp.spelling(), self.right)
    }
}

/// Ordered set of conditions combined with AND, or with OR for `or` groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionGroup {
    conditions: Vec<Condition>,
    or_group: bool,
}

impl ConditionGroup {
    #[must_use]
    pub fn new(or_group: bool) -> Self {
        Self {
            conditions: Vec::new(),
            or_group,
        }
    }

    #[must_use]
    pub fn is_or_group(&self) -> bool {
        self.or_group
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn add(&mut self, condition: impl Into<Condition>) {
        self.conditions.push(condition.into());
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Empty groups are true.
    pub fn eval<M: ModelAccess>(&self, model: &M, blocks: &[M::Index]) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        if self.or_group {
            self.conditions.iter().any(|c| c.eval(model, blocks))
        } else {
            self.conditions.iter().all(|c| c.eval(model, blocks))
        }
    }

    /// Follows a path of child indices from this group down to a nested group.
    pub(crate) fn group_at_mut(&mut self, path: &[usize]) -> &mut ConditionGroup {
        let mut group = self;
        for &i in path {
            group = match &mut group.conditions[i] {
                Condition::Group(g) => g,
                Condition::Single(_) => unreachable!("group path points at a leaf"),
            };
        }
        group
    }
}

/// Node of a condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Single(ConditionSingle),
    Group(ConditionGroup),
}

impl Condition {
    pub fn eval<M: ModelAccess>(&self, model: &M, blocks: &[M::Index]) -> bool {
        match self {
            Self::Single(c) => c.eval(model, blocks),
            Self::Group(g) => g.eval(model, blocks),
        }
    }
}

impl From<ConditionSingle> for Condition {
    fn from(c: ConditionSingle) -> Self {
        Self::Single(c)
    }
}

impl From<ConditionGroup> for Condition {
    fn from(g: ConditionGroup) -> Self {
        Self::Group(g)
    }
}

/// Stack-based builder used while parsing a program definition.
///
/// `begin` opens a group inside the current one, `end` closes it; checks are
/// appended to the innermost open group.
#[derive(Debug)]
pub struct ConditionParser<'a> {
    root: &'a mut ConditionGroup,
    stack: Vec<usize>,
}

impl<'a> ConditionParser<'a> {
    pub fn new(root: &'a mut ConditionGroup) -> Self {
        Self {
            root,
            stack: Vec::new(),
        }
    }

    fn top(&mut self) -> &mut ConditionGroup {
        self.root.group_at_mut(&self.stack)
    }

    pub fn begin(&mut self, or_group: bool) {
        let top = self.top();
        top.add(ConditionGroup::new(or_group));
        let index = top.conditions.len() - 1;
        self.stack.push(index);
    }

    /// Returns `false` when there is no open group to close.
    pub fn end(&mut self) -> bool {
        self.stack.pop().is_some()
    }

    pub fn check(&mut self, condition: ConditionSingle) {
        self.top().add(condition);
    }

    /// Number of groups still open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
