//! Linear constraints for polyhedral representation.
//!
//! A constraint is a linear inequality or equality:
//! - Inequality: expr >= 0
//! - Equality: expr = 0

use crate::polyhedral::expr::AffineExpr;
use serde::{Serialize, Deserialize};
use std::fmt;

/// A linear constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Constraint {
    /// Kind of constraint
    pub kind: ConstraintKind,
    /// The affine expression (constraint is: expr >= 0 or expr = 0)
    pub expr: AffineExpr,
}

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Equal: expr = 0
    Equality,
    /// Greater than or equal: expr >= 0
    Inequality,
}

/// Outcome of normalizing a constraint over the integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Holds for every point; can be dropped.
    Trivial,
    /// Holds for no integer point.
    Infeasible,
    /// The tightened constraint.
    Constraint(Constraint),
}

impl Constraint {
    /// Create a new constraint.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { kind, expr }
    }

    /// Create an inequality constraint: expr >= 0
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// Create an equality constraint: expr = 0
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a constraint: lhs >= rhs
    pub fn ge(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(lhs - rhs)
    }

    /// Create a constraint: lhs <= rhs
    pub fn le(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(rhs - lhs)
    }

    /// Create a constraint: lhs < rhs (i.e. rhs - lhs - 1 >= 0)
    pub fn lt(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        let mut expr = rhs - lhs;
        expr.constant -= 1;
        Self::ge_zero(expr)
    }

    /// Create a constraint: lhs = rhs
    pub fn eq(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::eq_zero(lhs - rhs)
    }

    /// Create a lower bound constraint: var >= lower
    pub fn lower_bound(dim: usize, lower: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = AffineExpr::var(dim, n_dim, n_param);
        expr.constant = -lower;
        Self::ge_zero(expr)
    }

    /// Create an upper bound constraint: var <= upper
    pub fn upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = -AffineExpr::var(dim, n_dim, n_param);
        expr.constant = upper;
        Self::ge_zero(expr)
    }

    /// Create a strict upper bound constraint: var < upper
    pub fn strict_upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        Self::upper_bound(dim, upper - 1, n_dim, n_param)
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check if this is an inequality constraint.
    pub fn is_inequality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Inequality)
    }

    /// Check if this constraint is satisfied by the given point. A point
    /// whose evaluation overflows `i64` satisfies nothing.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        match (self.kind, self.expr.evaluate(dim_values, param_values)) {
            (_, Err(_)) => false,
            (ConstraintKind::Inequality, Ok(value)) => value >= 0,
            (ConstraintKind::Equality, Ok(value)) => value == 0,
        }
    }

    /// Negate an inequality: `expr >= 0` becomes `-expr - 1 >= 0`.
    ///
    /// The negation of an equality is a disjunction; it is returned as the
    /// two inequalities `expr - 1 >= 0` and `-expr - 1 >= 0`.
    pub fn negate(&self) -> Vec<Constraint> {
        let mut below = -self.expr.clone();
        below.constant -= 1;
        match self.kind {
            ConstraintKind::Inequality => vec![Self::ge_zero(below)],
            ConstraintKind::Equality => {
                let mut above = self.expr.clone();
                above.constant -= 1;
                vec![Self::ge_zero(above), Self::ge_zero(below)]
            }
        }
    }

    /// Tighten the constraint over the integers.
    ///
    /// Inequalities are divided by the gcd of their coefficients with the
    /// constant rounded down; equalities whose constant is not a multiple of
    /// that gcd have no integer solution.
    pub fn normalize(&self) -> Normalized {
        let g = self.expr.coeff_gcd();
        if g == 0 {
            let holds = match self.kind {
                ConstraintKind::Inequality => self.expr.constant >= 0,
                ConstraintKind::Equality => self.expr.constant == 0,
            };
            return if holds { Normalized::Trivial } else { Normalized::Infeasible };
        }
        let mut expr = self.expr.clone();
        match self.kind {
            ConstraintKind::Inequality => {
                if g > 1 {
                    expr.coeffs.iter_mut().for_each(|c| *c /= g);
                    expr.param_coeffs.iter_mut().for_each(|c| *c /= g);
                    expr.constant = num_integer::Integer::div_floor(&expr.constant, &g);
                }
                Normalized::Constraint(Self::ge_zero(expr))
            }
            ConstraintKind::Equality => {
                if expr.constant % g != 0 {
                    return Normalized::Infeasible;
                }
                expr = expr.floor_div(g).unwrap_or(expr);
                // Canonical sign: first non-zero coefficient positive.
                let first = expr.coeffs.iter()
                    .chain(expr.param_coeffs.iter())
                    .copied()
                    .find(|&c| c != 0)
                    .unwrap_or(1);
                if first < 0 {
                    expr = -expr;
                }
                Normalized::Constraint(Self::eq_zero(expr))
            }
        }
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.expr.n_dim()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.expr.n_param()
    }

    /// Embed the dimensions at `offset` in a space of `n_total` dimensions.
    pub fn lift(&self, offset: usize, n_total: usize) -> Self {
        Self::new(self.expr.lift(offset, n_total), self.kind)
    }

    /// Convert to string with given names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let expr_str = self.expr.to_string_with_names(dim_names, param_names);
        match self.kind {
            ConstraintKind::Inequality => format!("{} >= 0", expr_str),
            ConstraintKind::Equality => format!("{} = 0", expr_str),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}

/// A system of constraints (a conjunction).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSystem {
    /// All constraints in the system
    pub constraints: Vec<Constraint>,
    /// Number of dimensions (constraint columns)
    pub n_dim: usize,
    /// Number of parameters
    pub n_param: usize,
}

impl ConstraintSystem {
    /// Create an empty constraint system.
    pub fn new(n_dim: usize, n_param: usize) -> Self {
        Self {
            constraints: Vec::new(),
            n_dim,
            n_param,
        }
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: Constraint) {
        assert_eq!(constraint.n_dim(), self.n_dim);
        assert_eq!(constraint.n_param(), self.n_param);
        self.constraints.push(constraint);
    }

    /// Add multiple constraints.
    pub fn add_all(&mut self, constraints: impl IntoIterator<Item = Constraint>) {
        for c in constraints {
            self.add(c);
        }
    }

    /// Get all equality constraints.
    pub fn equalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_equality())
    }

    /// Get all inequality constraints.
    pub fn inequalities(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_inequality())
    }

    /// Check if a point satisfies all constraints.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(dim_values, param_values))
    }

    /// Check if the system has no constraints.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Get the number of constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Drop duplicate constraints, keeping the first occurrence.
    pub fn dedup(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.constraints.retain(|c| seen.insert(c.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_bound() {
        let c = Constraint::lower_bound(0, 0, 2, 0);
        assert!(c.is_satisfied(&[0, 0], &[]));
        assert!(c.is_satisfied(&[5, 0], &[]));
        assert!(!c.is_satisfied(&[-1, 0], &[]));
    }

    #[test]
    fn test_upper_bound() {
        let c = Constraint::upper_bound(0, 10, 2, 0);
        assert!(c.is_satisfied(&[10, 0], &[]));
        assert!(!c.is_satisfied(&[11, 0], &[]));
    }

    #[test]
    fn test_overflowing_point_not_satisfied() {
        // 2i >= 0 holds for every non-negative i that fits
        let c = Constraint::ge_zero(AffineExpr::var(0, 1, 0).scale(2));
        assert!(c.is_satisfied(&[i64::MAX / 2], &[]));
        assert!(!c.is_satisfied(&[i64::MAX], &[]));
    }

    #[test]
    fn test_normalize_tightens_inequality() {
        // 2i - 3 >= 0  ==>  i - 2 >= 0
        let mut expr = AffineExpr::var(0, 1, 0).scale(2);
        expr.constant = -3;
        match Constraint::ge_zero(expr).normalize() {
            Normalized::Constraint(c) => {
                assert_eq!(c.expr.coeffs, vec![1]);
                assert_eq!(c.expr.constant, -2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_normalize_equality_gcd_test() {
        // 2i - 1 = 0 has no integer solution
        let mut expr = AffineExpr::var(0, 1, 0).scale(2);
        expr.constant = -1;
        assert_eq!(Constraint::eq_zero(expr).normalize(), Normalized::Infeasible);
    }

    #[test]
    fn test_negate_equality() {
        let c = Constraint::eq_zero(AffineExpr::var(0, 1, 0));
        let neg = c.negate();
        assert_eq!(neg.len(), 2);
        assert!(neg.iter().any(|n| n.is_satisfied(&[1], &[])));
        assert!(neg.iter().all(|n| !n.is_satisfied(&[0], &[])));
    }

    #[test]
    fn test_constraint_system() {
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(Constraint::lower_bound(0, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(0, 10, 2, 0));
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(1, 10, 2, 0));
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.dedup();
        assert_eq!(sys.len(), 4);

        assert!(sys.is_satisfied(&[0, 0], &[]));
        assert!(sys.is_satisfied(&[9, 9], &[]));
        assert!(!sys.is_satisfied(&[10, 0], &[]));
        assert!(!sys.is_satisfied(&[-1, 0], &[]));
    }
}
