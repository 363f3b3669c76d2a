//! Loop interchange as a permutation of schedule loop levels.
//!
//! In a 2d+1 schedule `[b0, i0, b1, i1, ..., bd]` the loop dimensions sit at
//! odd positions. A permutation reorders them and keeps the static
//! positions in place:
//! ```text
//! { S[i, j] -> [0, i, 0, j, 0] }
//! ```
//! becomes (after `[1, 0]`):
//! ```text
//! { S[i, j] -> [0, j, 0, i, 0] }
//! ```

use crate::polyhedral::AffineMap;
use crate::utils::errors::{PolyhedralResult, TransformError, TransformErrorKind};
use serde::{Serialize, Deserialize};
use std::fmt;

/// A reordering of loop levels: level `k` of the result is level `order[k]`
/// of the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation {
    order: Vec<usize>,
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Self { order: (0..n).collect() }
    }

    /// Create a permutation, checking that `order` is one.
    pub fn new(order: Vec<usize>) -> Result<Self, TransformError> {
        let mut seen = vec![false; order.len()];
        for &p in &order {
            match seen.get_mut(p) {
                Some(s) if !*s => *s = true,
                _ => {
                    return Err(TransformError::new(
                        TransformErrorKind::NotApplicable,
                        format!("{:?} is not a permutation", order),
                        "interchange",
                    ))
                }
            }
        }
        Ok(Self { order })
    }

    /// Swap loop levels `a` and `b` of an `n`-deep nest.
    pub fn interchange(n: usize, a: usize, b: usize) -> Result<Self, TransformError> {
        let mut order: Vec<usize> = (0..n).collect();
        if a >= n || b >= n {
            return Err(TransformError::new(
                TransformErrorKind::NotApplicable,
                format!("cannot swap levels {} and {} of a {}-deep nest", a, b, n),
                "interchange",
            ));
        }
        order.swap(a, b);
        Ok(Self { order })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(k, &p)| k == p)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// The permutation seen by a nest of `depth` loops, if its levels are
    /// closed under it. Levels past `len()` stay in place.
    pub fn restricted(&self, depth: usize) -> Option<Vec<usize>> {
        let order: Vec<usize> = (0..depth)
            .map(|k| self.order.get(k).copied().unwrap_or(k))
            .collect();
        order.iter().all(|&p| p < depth).then_some(order)
    }

    /// Permute the loop levels of a 2d+1 schedule. A schedule whose loops are
    /// not closed under the permutation is returned unchanged.
    pub fn apply(&self, schedule: &AffineMap) -> PolyhedralResult<AffineMap> {
        let depth = schedule.n_out() / 2;
        match self.restricted(depth) {
            Some(order) => schedule.permute_loops(&order),
            None => Ok(schedule.clone()),
        }
    }

    /// Every permutation of `n` levels in lexicographic order, identity first.
    pub fn all(n: usize) -> Vec<Permutation> {
        let mut order: Vec<usize> = (0..n).collect();
        let mut out = vec![Self { order: order.clone() }];
        while next_permutation(&mut order) {
            out.push(Self { order: order.clone() });
        }
        out
    }
}

/// Advance to the next lexicographic permutation; false after the last one.
fn next_permutation(v: &mut [usize]) -> bool {
    let Some(i) = (1..v.len()).rev().find(|&i| v[i - 1] < v[i]) else {
        return false;
    };
    let pivot = i - 1;
    let Some(j) = (i..v.len()).rev().find(|&j| v[j] > v[pivot]) else {
        return false;
    };
    v.swap(pivot, j);
    v[i..].reverse();
    true
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (k, p) in self.order.iter().enumerate() {
            if k > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}
