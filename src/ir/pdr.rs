//! Polyhedral data references.

use crate::ir::ids::{DataRefId, PdrId};
use crate::polyhedral::{AffineExpr, BasicRelation, IntegerSet};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Kind of memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdrKind {
    Read,
    Write,
    /// A write that may or may not happen (e.g. through a pointer)
    MayWrite,
}

impl PdrKind {
    /// Writes and may-writes both modify memory.
    pub fn is_write(self) -> bool {
        !matches!(self, PdrKind::Read)
    }
}

impl fmt::Display for PdrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PdrKind::Read => "read",
            PdrKind::Write => "write",
            PdrKind::MayWrite => "may_write",
        };
        write!(f, "{}", name)
    }
}

/// One memory access of a statement.
///
/// `accesses` relates the iteration vector of the owning statement to the
/// subscript vector of the accessed object; its input dimension count always
/// equals the statement's depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pdr {
    pub id: PdrId,
    pub kind: PdrKind,
    pub accesses: BasicRelation,
    /// Bounds of each subscript (array extents)
    pub subscript_sizes: IntegerSet,
    /// Descriptor in the owning region's data references
    pub data_ref: DataRefId,
    pub nb_subscripts: usize,
}

impl Pdr {
    pub fn new(
        id: PdrId,
        kind: PdrKind,
        accesses: BasicRelation,
        subscript_sizes: IntegerSet,
        data_ref: DataRefId,
    ) -> Self {
        let nb_subscripts = accesses.n_out();
        debug_assert_eq!(subscript_sizes.dim(), nb_subscripts);
        Self { id, kind, accesses, subscript_sizes, data_ref, nb_subscripts }
    }

    pub fn is_read(&self) -> bool {
        self.kind == PdrKind::Read
    }

    pub fn is_write(&self) -> bool {
        self.kind.is_write()
    }

    /// Whether every subscript is an affine function of the iteration vector.
    pub fn is_exact(&self) -> bool {
        self.accesses.is_single_valued()
    }

    /// The affine function subscript `k` is pinned to, if any.
    pub fn subscript_expr(&self, k: usize) -> Option<AffineExpr> {
        self.accesses.output_expr(k)
    }
}
