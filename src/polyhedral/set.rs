//! Integer sets (polyhedra) for iteration domains and parameter contexts.

use crate::polyhedral::space::Space;
use crate::polyhedral::constraint::{Constraint, ConstraintSystem, ConstraintKind};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::AffineMap;
use crate::polyhedral::operations;
use crate::utils::errors::{PolyhedralError, PolyhedralResult};
use serde::{Serialize, Deserialize};
use std::fmt;

/// An integer set defined by a conjunction of affine constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerSet {
    pub space: Space,
    pub constraints: ConstraintSystem,
}

impl IntegerSet {
    /// The set of all integer points of a space.
    pub fn universe(space: Space) -> Self {
        let constraints = ConstraintSystem::new(space.n_dim, space.n_param);
        Self { space, constraints }
    }

    /// A set with no points.
    pub fn empty(space: Space) -> Self {
        let mut set = Self::universe(space);
        let expr = AffineExpr::constant(-1, set.dim(), set.n_param());
        set.add_constraint(Constraint::ge_zero(expr));
        set
    }

    /// Build a set from an existing constraint system.
    pub fn from_constraints(space: Space, constraints: ConstraintSystem) -> Self {
        assert_eq!(space.n_dim, constraints.n_dim);
        assert_eq!(space.n_param, constraints.n_param);
        Self { space, constraints }
    }

    /// The box `{ [i0, ...] : 0 <= ik < bounds[k] }`.
    pub fn rectangular(bounds: &[i64]) -> Self {
        let n_dim = bounds.len();
        let mut set = Self::universe(Space::set(n_dim));
        for (i, &bound) in bounds.iter().enumerate() {
            set.add_constraint(Constraint::lower_bound(i, 0, n_dim, 0));
            set.add_constraint(Constraint::strict_upper_bound(i, bound, n_dim, 0));
        }
        set
    }

    pub fn dim(&self) -> usize { self.space.n_dim }
    pub fn n_param(&self) -> usize { self.space.n_param }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.add(constraint);
    }

    pub fn contains(&self, point: &[i64], params: &[i64]) -> bool {
        point.len() == self.dim() && self.constraints.is_satisfied(point, params)
    }

    /// Cheap syntactic check for a constant contradiction.
    pub fn is_obviously_empty(&self) -> bool {
        for c in &self.constraints.constraints {
            if c.expr.is_constant() {
                let val = c.expr.constant;
                match c.kind {
                    ConstraintKind::Inequality if val < 0 => return true,
                    ConstraintKind::Equality if val != 0 => return true,
                    _ => {}
                }
            }
        }
        false
    }

    pub fn intersect(&self, other: &IntegerSet) -> IntegerSet {
        assert!(self.space.is_compatible(&other.space));
        let mut result = self.clone();
        for c in &other.constraints.constraints {
            result.add_constraint(c.clone());
        }
        result
    }

    /// Exact emptiness test over all parameter values.
    pub fn is_empty(&self) -> PolyhedralResult<bool> {
        if self.is_obviously_empty() {
            return Ok(true);
        }
        operations::is_empty(&self.constraints)
    }

    pub fn is_subset(&self, other: &IntegerSet) -> PolyhedralResult<bool> {
        self.check_compatible(other)?;
        operations::is_subset(&self.constraints, &other.constraints)
    }

    pub fn is_equal(&self, other: &IntegerSet) -> PolyhedralResult<bool> {
        Ok(self.is_subset(other)? && other.is_subset(self)?)
    }

    fn check_compatible(&self, other: &IntegerSet) -> PolyhedralResult<()> {
        if self.space.is_compatible(&other.space) {
            Ok(())
        } else {
            Err(PolyhedralError::DimensionMismatch(format!(
                "sets over {} and {}", self.space, other.space
            )))
        }
    }

    /// Remove `n` dimensions starting at `first`.
    pub fn project_out(&self, first: usize, n: usize) -> PolyhedralResult<IntegerSet> {
        let dims: Vec<usize> = (first..first + n).collect();
        let mut space = self.space.clone();
        space.n_dim -= n;
        if space.dim_names.len() >= first + n {
            space.dim_names.drain(first..first + n);
        }
        match operations::project_out(&self.constraints, &dims)? {
            Some(constraints) => Ok(Self::from_constraints(space, constraints)),
            None => Ok(Self::empty(space)),
        }
    }

    /// The image of this set under an affine map.
    pub fn apply(&self, map: &AffineMap) -> PolyhedralResult<IntegerSet> {
        if map.n_in() != self.dim() {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "map with {} inputs applied to a {}-dimensional set", map.n_in(), self.dim()
            )));
        }
        let relation = map.to_relation(self.n_param())?;
        relation.intersect_domain(self)?.range()
    }

    fn fixed(&self, params: &[i64]) -> PolyhedralResult<ConstraintSystem> {
        if params.len() != self.n_param() {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "{} parameter values for a set with {} parameters", params.len(), self.n_param()
            )));
        }
        operations::fix_params(&self.constraints, params)
    }

    /// Enumerate up to `limit` points in lexicographic order for fixed
    /// parameter values.
    pub fn points(&self, params: &[i64], limit: usize) -> PolyhedralResult<Vec<Vec<i64>>> {
        operations::scan(&self.fixed(params)?, limit, false)
    }

    /// Lexicographic minimum for fixed parameter values.
    pub fn lexmin(&self, params: &[i64]) -> PolyhedralResult<Option<Vec<i64>>> {
        Ok(operations::scan(&self.fixed(params)?, 1, false)?.into_iter().next())
    }

    /// Lexicographic maximum for fixed parameter values.
    pub fn lexmax(&self, params: &[i64]) -> PolyhedralResult<Option<Vec<i64>>> {
        Ok(operations::scan(&self.fixed(params)?, 1, true)?.into_iter().next())
    }

    /// Minimum and maximum of one dimension for fixed parameter values.
    pub fn dim_bounds(&self, dim: usize, params: &[i64]) -> PolyhedralResult<Option<(i64, i64)>> {
        operations::dim_bounds(&self.fixed(params)?, dim)
    }

    pub fn dim_names(&self) -> Vec<String> { self.space.all_dim_names() }
    pub fn param_names(&self) -> Vec<String> { self.space.all_param_names() }

    pub fn with_dim_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_dim_names(names);
        self
    }

    pub fn with_param_names(mut self, names: Vec<String>) -> Self {
        self.space = self.space.with_param_names(names);
        self
    }

    pub fn with_tuple(mut self, name: impl Into<String>) -> Self {
        self.space = self.space.with_tuple(name);
        self
    }
}

/// Write `[N, M] -> ` when the space has parameters.
pub(crate) fn write_params(f: &mut fmt::Formatter<'_>, space: &Space) -> fmt::Result {
    if space.n_param > 0 {
        write!(f, "[{}] -> ", space.all_param_names().join(", "))?;
    }
    Ok(())
}

/// Write `name[d0, d1]`.
pub(crate) fn write_tuple(f: &mut fmt::Formatter<'_>, name: Option<&str>, dims: &[String]) -> fmt::Result {
    write!(f, "{}[{}]", name.unwrap_or(""), dims.join(", "))
}

/// Write ` : c0 and c1` for a non-empty conjunction.
pub(crate) fn write_constraints(
    f: &mut fmt::Formatter<'_>,
    sys: &ConstraintSystem,
    dim_names: &[String],
    param_names: &[String],
) -> fmt::Result {
    for (i, c) in sys.constraints.iter().enumerate() {
        write!(f, "{}", if i == 0 { " : " } else { " and " })?;
        write!(f, "{}", c.to_string_with_names(dim_names, param_names))?;
    }
    Ok(())
}

impl fmt::Display for IntegerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names = self.dim_names();
        let param_names = self.param_names();
        write_params(f, &self.space)?;
        write!(f, "{{ ")?;
        if self.dim() > 0 || self.space.out_tuple.is_some() {
            write_tuple(f, self.space.out_tuple.as_deref(), &dim_names)?;
        } else if self.constraints.is_empty() {
            write!(f, "[]")?;
        }
        write_constraints(f, &self.constraints, &dim_names, &param_names)?;
        write!(f, " }}")
    }
}
