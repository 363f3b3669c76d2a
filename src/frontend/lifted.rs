//! Records describing a lifted region.
//!
//! The region lifter hands over, per basic block, the surrounding loops, the
//! guard conditions and the memory references with their subscripts already
//! extracted. Everything here is plain data; turning it into polyhedra is
//! the job of the SCoP builder.

use crate::ir::PdrKind;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::fmt;

/// An affine form `constant + sum(coeff * name)` over iterators and parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftedAffine {
    #[serde(default)]
    pub coeffs: BTreeMap<String, i64>,
    #[serde(default)]
    pub constant: i64,
}

impl LiftedAffine {
    pub fn constant(value: i64) -> Self {
        Self { coeffs: BTreeMap::new(), constant: value }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::constant(0).plus(name, 1)
    }

    /// Add `coeff * name`.
    pub fn plus(mut self, name: impl Into<String>, coeff: i64) -> Self {
        *self.coeffs.entry(name.into()).or_insert(0) += coeff;
        self
    }

    pub fn offset(mut self, constant: i64) -> Self {
        self.constant += constant;
        self
    }
}

impl fmt::Display for LiftedAffine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, &c) in self.coeffs.iter().filter(|(_, c)| **c != 0) {
            if !first {
                write!(f, " {} ", if c < 0 { "-" } else { "+" })?;
            } else if c < 0 {
                write!(f, "-")?;
            }
            if c.abs() != 1 {
                write!(f, "{}*", c.abs())?;
            }
            write!(f, "{}", name)?;
            first = false;
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant > 0 {
            write!(f, " + {}", self.constant)
        } else if self.constant < 0 {
            write!(f, " - {}", -self.constant)
        } else {
            Ok(())
        }
    }
}

/// Comparison of an affine form against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOp {
    /// `expr >= 0`
    Ge,
    /// `expr == 0`
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftedConstraint {
    pub expr: LiftedAffine,
    pub op: ConstraintOp,
}

impl fmt::Display for LiftedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            ConstraintOp::Ge => write!(f, "{} >= 0", self.expr),
            ConstraintOp::Eq => write!(f, "{} == 0", self.expr),
        }
    }
}

/// A guard condition or context constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftedCondition {
    Affine(LiftedConstraint),
    /// Not expressible as an affine constraint; the text is kept for reports
    NonAffine(String),
}

impl fmt::Display for LiftedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiftedCondition::Affine(c) => write!(f, "{}", c),
            LiftedCondition::NonAffine(text) => write!(f, "{}", text),
        }
    }
}

/// A loop bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftedBound {
    Affine(LiftedAffine),
    NonAffine(String),
}

/// One loop around a block: `for iterator in lower..upper`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftedLoop {
    pub iterator: String,
    /// Inclusive lower bound
    pub lower: LiftedBound,
    /// Exclusive upper bound
    pub upper: LiftedBound,
}

impl LiftedLoop {
    pub fn range(iterator: impl Into<String>, lower: LiftedAffine, upper: LiftedAffine) -> Self {
        Self {
            iterator: iterator.into(),
            lower: LiftedBound::Affine(lower),
            upper: LiftedBound::Affine(upper),
        }
    }
}

/// One subscript of a memory reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftedSubscript {
    Affine(LiftedAffine),
    /// Some location in `lower..=upper`; the access is then inexact
    Range { lower: LiftedAffine, upper: LiftedAffine },
    NonAffine(String),
}

/// One memory reference of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftedAccess {
    pub kind: PdrKind,
    pub base: String,
    /// Alias set of the base object; zero when it aliases nothing else
    #[serde(default)]
    pub alias_set: u32,
    #[serde(default)]
    pub subscripts: Vec<LiftedSubscript>,
    /// Extent of each subscript, over parameters; `null` when unknown
    #[serde(default)]
    pub extents: Vec<Option<LiftedAffine>>,
    /// Source text of the reference
    #[serde(default)]
    pub text: Option<String>,
}

impl LiftedAccess {
    pub fn new(kind: PdrKind, base: impl Into<String>, subscripts: Vec<LiftedAffine>) -> Self {
        Self {
            kind,
            base: base.into(),
            alias_set: 0,
            subscripts: subscripts.into_iter().map(LiftedSubscript::Affine).collect(),
            extents: Vec::new(),
            text: None,
        }
    }

    pub fn with_extents(mut self, extents: Vec<Option<LiftedAffine>>) -> Self {
        self.extents = extents;
        self
    }

    pub fn with_alias_set(mut self, alias_set: u32) -> Self {
        self.alias_set = alias_set;
        self
    }

    /// The reference as text, synthesized from the subscripts when the
    /// lifter gave none.
    pub fn describe(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        let mut out = self.base.clone();
        for s in &self.subscripts {
            let sub = match s {
                LiftedSubscript::Affine(e) => e.to_string(),
                LiftedSubscript::Range { lower, upper } => format!("{}..={}", lower, upper),
                LiftedSubscript::NonAffine(text) => text.clone(),
            };
            out.push_str(&format!("[{}]", sub));
        }
        out
    }
}

/// One basic block of the region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftedBlock {
    /// Basic block index
    pub index: u32,
    /// Surrounding loops, outermost first
    #[serde(default)]
    pub loops: Vec<LiftedLoop>,
    /// Static position: textual order at each loop level, `loops.len() + 1` entries
    pub position: Vec<i64>,
    #[serde(default)]
    pub conditions: Vec<LiftedCondition>,
    #[serde(default)]
    pub cases: Vec<String>,
    #[serde(default)]
    pub accesses: Vec<LiftedAccess>,
    #[serde(default)]
    pub is_reduction: bool,
    #[serde(default)]
    pub body: Option<String>,
}

impl LiftedBlock {
    pub fn new(index: u32, loops: Vec<LiftedLoop>, position: Vec<i64>) -> Self {
        Self {
            index,
            loops,
            position,
            conditions: Vec::new(),
            cases: Vec::new(),
            accesses: Vec::new(),
            is_reduction: false,
            body: None,
        }
    }

    pub fn with_access(mut self, access: LiftedAccess) -> Self {
        self.accesses.push(access);
        self
    }

    pub fn with_condition(mut self, condition: LiftedCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn depth(&self) -> usize {
        self.loops.len()
    }

    pub fn iterators(&self) -> Vec<String> {
        self.loops.iter().map(|l| l.iterator.clone()).collect()
    }

    /// Whether the original schedules of the two blocks can never order
    /// their instances: the positions agree up to the shallower depth.
    pub fn shares_position_with(&self, other: &LiftedBlock) -> bool {
        let common = self.depth().min(other.depth()) + 1;
        match (self.position.get(..common), other.position.get(..common)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// A structured region with its blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftedRegion {
    pub name: String,
    pub entry: u32,
    pub exit: u32,
    #[serde(default)]
    pub params: Vec<String>,
    /// Constraints known to hold on the parameters
    #[serde(default)]
    pub context: Vec<LiftedCondition>,
    pub blocks: Vec<LiftedBlock>,
}

impl LiftedRegion {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            entry: 0,
            exit: 0,
            params,
            context: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, block: LiftedBlock) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_context(mut self, condition: LiftedCondition) -> Self {
        self.context.push(condition);
        self
    }
}
