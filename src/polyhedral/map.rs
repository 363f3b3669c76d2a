//! Affine maps for schedules.

use crate::polyhedral::space::Space;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::relation::BasicRelation;
use crate::polyhedral::set::write_params;
use crate::utils::errors::{PolyhedralError, PolyhedralResult};
use serde::{Serialize, Deserialize};
use std::cmp::Ordering;
use std::fmt;

/// An affine map from one space to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffineMap {
    pub space: Space,
    /// Output expressions (one per output dimension)
    pub outputs: Vec<AffineExpr>,
}

impl AffineMap {
    /// Create an identity map of given dimension.
    pub fn identity(n_dim: usize) -> Self {
        Self::identity_with_params(n_dim, 0)
    }

    pub fn identity_with_params(n_dim: usize, n_param: usize) -> Self {
        let space = Space::map_with_params(n_dim, n_dim, n_param);
        let outputs = (0..n_dim)
            .map(|i| AffineExpr::var(i, n_dim, n_param))
            .collect();
        Self { space, outputs }
    }

    /// Create from output expressions over `n_in` dimensions.
    pub fn from_outputs(n_in: usize, n_param: usize, outputs: Vec<AffineExpr>) -> Self {
        debug_assert!(outputs.iter().all(|e| e.n_dim() == n_in && e.n_param() == n_param));
        let n_out = outputs.len();
        Self {
            space: Space::map_with_params(n_in, n_out, n_param),
            outputs,
        }
    }

    /// The 2d+1 schedule `[b0, i0, b1, ..., i(d-1), bd]` of a statement at
    /// static position `betas` (one entry per loop level plus one).
    pub fn original_schedule(betas: &[i64], n_param: usize) -> Self {
        let depth = betas.len().saturating_sub(1);
        let mut outputs = Vec::with_capacity(2 * depth + 1);
        for (k, &beta) in betas.iter().enumerate() {
            outputs.push(AffineExpr::constant(beta, depth, n_param));
            if k < depth {
                outputs.push(AffineExpr::var(k, depth, n_param));
            }
        }
        Self::from_outputs(depth, n_param, outputs)
    }

    /// Get input dimensions.
    pub fn n_in(&self) -> usize { self.space.n_in }

    /// Get output dimensions.
    pub fn n_out(&self) -> usize { self.space.n_dim }

    /// Get number of parameters.
    pub fn n_param(&self) -> usize { self.space.n_param }

    pub fn with_tuples(mut self, input: impl Into<String>, output: Option<String>) -> Self {
        self.space.in_tuple = Some(input.into());
        self.space.out_tuple = output;
        self
    }

    pub fn with_in_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_in_names(names);
        self
    }

    pub fn with_param_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_param_names(names);
        self
    }

    /// Apply the map to a point.
    pub fn apply(&self, input: &[i64], params: &[i64]) -> PolyhedralResult<Vec<i64>> {
        self.outputs.iter()
            .map(|expr| expr.evaluate(input, params))
            .collect()
    }

    /// Compose two maps: self after other.
    pub fn compose(&self, other: &AffineMap) -> PolyhedralResult<AffineMap> {
        if self.n_in() != other.n_out() || self.n_param() != other.n_param() {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "cannot compose {} after {}", self.space, other.space
            )));
        }
        let n_in = other.n_in();
        let outputs = self.outputs.iter().map(|out_expr| {
            let mut result = AffineExpr::zero(n_in, self.n_param());
            result.constant = out_expr.constant;
            result.param_coeffs = out_expr.param_coeffs.clone();
            // Substitute other's outputs into this expression
            for (i, &coeff) in out_expr.coeffs.iter().enumerate() {
                if coeff != 0 {
                    result = result.checked_combine(1, &other.outputs[i], coeff)?;
                }
            }
            Ok(result)
        }).collect::<PolyhedralResult<Vec<_>>>()?;

        let mut map = AffineMap::from_outputs(n_in, self.n_param(), outputs);
        map.space.in_tuple = other.space.in_tuple.clone();
        map.space.in_names = other.space.in_names.clone();
        map.space.out_tuple = self.space.out_tuple.clone();
        map.space.param_names = self.space.param_names.clone();
        Ok(map)
    }

    /// The graph `{ [i] -> [o] : o = f(i) }` as a relation with `n_param`
    /// parameters. A parameter-free map can be embedded in any parameter
    /// space.
    pub fn to_relation(&self, n_param: usize) -> PolyhedralResult<BasicRelation> {
        if self.n_param() != n_param && self.n_param() != 0 {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "map with {} parameters used with {}", self.n_param(), n_param
            )));
        }
        let n_in = self.n_in();
        let n_var = n_in + self.n_out();
        let mut sys = ConstraintSystem::new(n_var, n_param);
        for (k, out) in self.outputs.iter().enumerate() {
            let mut f = out.lift(0, n_var);
            f.param_coeffs.resize(n_param, 0);
            let o = AffineExpr::var(n_in + k, n_var, n_param);
            sys.add(Constraint::eq(o, f));
        }
        let mut space = self.space.clone();
        space.n_param = n_param;
        Ok(BasicRelation::from_constraints(space, sys))
    }

    /// `{ i -> j : self(i) and other(j) agree on outputs 0..level, then compare
    /// at level }`. `Ordering::Equal` requires agreement at `level` too.
    pub fn order_at(&self, other: &AffineMap, level: usize, order: Ordering) -> PolyhedralResult<BasicRelation> {
        if self.n_param() != other.n_param() || level >= self.n_out().min(other.n_out()) {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "cannot order {} against {} at level {}", self.space, other.space, level
            )));
        }
        let (n_s, n_t) = (self.n_in(), other.n_in());
        let n_var = n_s + n_t;
        let mut space = Space::map_with_params(n_s, n_t, self.n_param())
            .with_in_names(self.space.in_names.clone())
            .with_dim_names(other.space.in_names.clone())
            .with_param_names(self.space.param_names.clone());
        space.in_tuple = self.space.in_tuple.clone();
        space.out_tuple = other.space.in_tuple.clone();

        let mut rel = BasicRelation::universe(space);
        for m in 0..=level {
            let src = self.outputs[m].lift(0, n_var);
            let tgt = other.outputs[m].lift(n_s, n_var);
            let c = match (m < level, order) {
                (true, _) | (false, Ordering::Equal) => Constraint::eq(src, tgt),
                (false, Ordering::Less) => Constraint::lt(src, tgt),
                (false, Ordering::Greater) => Constraint::lt(tgt, src),
            };
            rel.add_constraint(c);
        }
        Ok(rel)
    }

    /// The pieces of `{ i -> j : self(i) << other(j) }` (strict lexicographic
    /// precedence over the common outputs), one per deciding level.
    pub fn lex_lt_pieces(&self, other: &AffineMap) -> PolyhedralResult<Vec<BasicRelation>> {
        let common = self.n_out().min(other.n_out());
        (0..common).map(|k| self.order_at(other, k, Ordering::Less)).collect()
    }

    /// The pieces of `{ i -> j : self(i) >>= other(j) }` over the common
    /// outputs.
    pub fn lex_ge_pieces(&self, other: &AffineMap) -> PolyhedralResult<Vec<BasicRelation>> {
        let common = self.n_out().min(other.n_out());
        let mut pieces = (0..common)
            .map(|k| self.order_at(other, k, Ordering::Greater))
            .collect::<PolyhedralResult<Vec<_>>>()?;
        if common > 0 {
            pieces.push(self.order_at(other, common - 1, Ordering::Equal)?);
        }
        Ok(pieces)
    }

    /// Swap two output dimensions.
    pub fn interchange(&self, dim1: usize, dim2: usize) -> Self {
        assert!(dim1 < self.n_out() && dim2 < self.n_out());
        let mut outputs = self.outputs.clone();
        outputs.swap(dim1, dim2);
        Self {
            space: self.space.clone(),
            outputs,
        }
    }

    /// Reorder the loop dimensions (odd positions) of a 2d+1 schedule:
    /// loop level `k` of the result is loop level `perm[k]` of `self`.
    pub fn permute_loops(&self, perm: &[usize]) -> PolyhedralResult<Self> {
        let loops = self.n_out() / 2;
        if perm.len() > loops || perm.iter().any(|&p| p >= perm.len()) {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "permutation {:?} of a schedule with {} loops", perm, loops
            )));
        }
        let mut outputs = self.outputs.clone();
        for (k, &p) in perm.iter().enumerate() {
            outputs[2 * k + 1] = self.outputs[2 * p + 1].clone();
        }
        Ok(Self {
            space: self.space.clone(),
            outputs,
        })
    }

    /// Check if this is an identity map.
    pub fn is_identity(&self) -> bool {
        if self.n_in() != self.n_out() {
            return false;
        }
        for (i, expr) in self.outputs.iter().enumerate() {
            if expr.constant != 0 || expr.param_coeffs.iter().any(|&c| c != 0) {
                return false;
            }
            for (j, &coeff) in expr.coeffs.iter().enumerate() {
                let expected = if i == j { 1 } else { 0 };
                if coeff != expected {
                    return false;
                }
            }
        }
        true
    }
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names = self.space.all_in_names();
        let param_names = self.space.all_param_names();
        write_params(f, &self.space)?;
        write!(f, "{{ {}[{}] -> {}[",
            self.space.in_tuple.as_deref().unwrap_or(""),
            dim_names.join(", "),
            self.space.out_tuple.as_deref().unwrap_or(""))?;
        for (i, expr) in self.outputs.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{}", expr.to_string_with_names(&dim_names, &param_names))?;
        }
        write!(f, "] }}")
    }
}
