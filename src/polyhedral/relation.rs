//! Affine relations: access relations and dependence relations.
//!
//! A [`BasicRelation`] is one conjunction over the columns `[in..., out...]`;
//! a [`Relation`] is a finite union of basic relations in a single space.

use crate::polyhedral::space::Space;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::constraint::{Constraint, ConstraintSystem};
use crate::polyhedral::set::{IntegerSet, write_constraints, write_params, write_tuple};
use crate::polyhedral::operations;
use crate::utils::errors::{PolyhedralError, PolyhedralResult};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Move every column `k` of a constraint to column `mapping[k]`.
fn remap(c: &Constraint, mapping: &[usize], n_total: usize) -> Constraint {
    let mut expr = AffineExpr::zero(n_total, c.expr.n_param());
    expr.constant = c.expr.constant;
    expr.param_coeffs = c.expr.param_coeffs.clone();
    for (k, &coeff) in c.expr.coeffs.iter().enumerate() {
        expr.coeffs[mapping[k]] += coeff;
    }
    Constraint::new(expr, c.kind)
}

fn mismatch(what: &str, a: &Space, b: &Space) -> PolyhedralError {
    PolyhedralError::DimensionMismatch(format!("{}: {} vs {}", what, a, b))
}

/// A conjunction of affine constraints relating input and output tuples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicRelation {
    pub space: Space,
    pub constraints: ConstraintSystem,
}

impl BasicRelation {
    pub fn universe(space: Space) -> Self {
        let constraints = ConstraintSystem::new(space.n_var(), space.n_param);
        Self { space, constraints }
    }

    pub fn empty(space: Space) -> Self {
        let mut rel = Self::universe(space);
        let expr = AffineExpr::constant(-1, rel.space.n_var(), rel.n_param());
        rel.add_constraint(Constraint::ge_zero(expr));
        rel
    }

    pub fn from_constraints(space: Space, constraints: ConstraintSystem) -> Self {
        assert_eq!(space.n_var(), constraints.n_dim);
        assert_eq!(space.n_param, constraints.n_param);
        Self { space, constraints }
    }

    pub fn n_in(&self) -> usize { self.space.n_in }
    pub fn n_out(&self) -> usize { self.space.n_dim }
    pub fn n_param(&self) -> usize { self.space.n_param }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.add(constraint);
    }

    pub fn intersect(&self, other: &BasicRelation) -> PolyhedralResult<BasicRelation> {
        if !self.space.is_compatible(&other.space) {
            return Err(mismatch("intersect", &self.space, &other.space));
        }
        let mut result = self.clone();
        result.constraints.add_all(other.constraints.constraints.iter().cloned());
        Ok(result)
    }

    /// Restrict the input tuple to `set`.
    pub fn intersect_domain(&self, set: &IntegerSet) -> PolyhedralResult<BasicRelation> {
        if set.dim() != self.n_in() || set.n_param() != self.n_param() {
            return Err(mismatch("intersect_domain", &self.space, &set.space));
        }
        let mut result = self.clone();
        let n_var = self.space.n_var();
        for c in &set.constraints.constraints {
            result.add_constraint(c.lift(0, n_var));
        }
        Ok(result)
    }

    /// Restrict the output tuple to `set`.
    pub fn intersect_range(&self, set: &IntegerSet) -> PolyhedralResult<BasicRelation> {
        if set.dim() != self.n_out() || set.n_param() != self.n_param() {
            return Err(mismatch("intersect_range", &self.space, &set.space));
        }
        let mut result = self.clone();
        let n_var = self.space.n_var();
        for c in &set.constraints.constraints {
            result.add_constraint(c.lift(self.n_in(), n_var));
        }
        Ok(result)
    }

    /// Swap the input and output tuples.
    pub fn reverse(&self) -> BasicRelation {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let mapping: Vec<usize> = (0..n_in).map(|k| n_out + k).chain(0..n_out).collect();
        let n_var = n_in + n_out;
        let mut result = Self::universe(self.space.reverse());
        for c in &self.constraints.constraints {
            result.add_constraint(remap(c, &mapping, n_var));
        }
        result
    }

    /// Compose with `other`: `{ a -> c : exists b. a -> b in self, b -> c in other }`.
    pub fn apply_range(&self, other: &BasicRelation) -> PolyhedralResult<BasicRelation> {
        if self.n_out() != other.n_in() || self.n_param() != other.n_param() {
            return Err(mismatch("apply_range", &self.space, &other.space));
        }
        let (n_a, n_b, n_c) = (self.n_in(), self.n_out(), other.n_out());
        let n_total = n_a + n_b + n_c;

        // Columns are laid out as [a, c, b] so that b can be projected last.
        let left: Vec<usize> = (0..n_a).chain(n_a + n_c..n_total).collect();
        let right: Vec<usize> = (n_a + n_c..n_total).chain(n_a..n_a + n_c).collect();
        let mut sys = ConstraintSystem::new(n_total, self.n_param());
        for c in &self.constraints.constraints {
            sys.add(remap(c, &left, n_total));
        }
        for c in &other.constraints.constraints {
            sys.add(remap(c, &right, n_total));
        }

        let mut space = Space::map_with_params(n_a, n_c, self.n_param())
            .with_in_names(self.space.in_names.clone())
            .with_dim_names(other.space.dim_names.clone())
            .with_param_names(self.space.param_names.clone());
        space.in_tuple = self.space.in_tuple.clone();
        space.out_tuple = other.space.out_tuple.clone();

        let hidden: Vec<usize> = (n_a + n_c..n_total).collect();
        match operations::project_out(&sys, &hidden)? {
            Some(constraints) => Ok(Self::from_constraints(space, constraints)),
            None => Ok(Self::empty(space)),
        }
    }

    /// Flatten into the set of `[in, out]` pairs.
    pub fn wrap(&self) -> IntegerSet {
        IntegerSet::from_constraints(self.space.wrap(), self.constraints.clone())
    }

    /// The projection onto the input tuple.
    pub fn domain(&self) -> PolyhedralResult<IntegerSet> {
        let mut set = self.wrap().project_out(self.n_in(), self.n_out())?;
        set.space = self.space.domain();
        Ok(set)
    }

    /// The projection onto the output tuple.
    pub fn range(&self) -> PolyhedralResult<IntegerSet> {
        let mut set = self.wrap().project_out(0, self.n_in())?;
        set.space = self.space.range();
        Ok(set)
    }

    pub fn is_empty(&self) -> PolyhedralResult<bool> {
        self.wrap().is_empty()
    }

    pub fn contains(&self, input: &[i64], output: &[i64], params: &[i64]) -> bool {
        if input.len() != self.n_in() || output.len() != self.n_out() {
            return false;
        }
        let point: Vec<i64> = input.iter().chain(output).copied().collect();
        self.constraints.is_satisfied(&point, params)
    }

    /// The affine function of the inputs that output `k` is pinned to, if an
    /// equality of the relation determines it.
    pub fn output_expr(&self, k: usize) -> Option<AffineExpr> {
        let n_in = self.n_in();
        let col = n_in + k;
        self.constraints.equalities()
            .filter(|c| {
                let a = c.expr.coeff(col);
                (a == 1 || a == -1)
                    && (0..self.n_out()).all(|m| m == k || c.expr.coeff(n_in + m) == 0)
            })
            .map(|c| c.expr.restrict_dims(0..n_in).scale(-c.expr.coeff(col)))
            .next()
    }

    /// Whether every output is an affine function of the inputs.
    pub fn is_single_valued(&self) -> bool {
        (0..self.n_out()).all(|k| self.output_expr(k).is_some())
    }

    /// Enumerate up to `limit` pairs for fixed parameter values.
    pub fn points(&self, params: &[i64], limit: usize) -> PolyhedralResult<Vec<(Vec<i64>, Vec<i64>)>> {
        let n_in = self.n_in();
        Ok(self.wrap().points(params, limit)?
            .into_iter()
            .map(|mut p| {
                let out = p.split_off(n_in);
                (p, out)
            })
            .collect())
    }

    fn write_body(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_names = self.space.all_in_names();
        let out_names = self.space.all_dim_names();
        write_tuple(f, self.space.in_tuple.as_deref(), &in_names)?;
        write!(f, " -> ")?;
        write_tuple(f, self.space.out_tuple.as_deref(), &out_names)?;
        write_constraints(f, &self.constraints, &self.space.all_var_names(), &self.space.all_param_names())
    }
}

impl fmt::Display for BasicRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_params(f, &self.space)?;
        write!(f, "{{ ")?;
        self.write_body(f)?;
        write!(f, " }}")
    }
}

/// A finite union of basic relations over one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub space: Space,
    pub basics: Vec<BasicRelation>,
}

impl Relation {
    pub fn empty(space: Space) -> Self {
        Self { space, basics: Vec::new() }
    }

    pub fn from_basic(basic: BasicRelation) -> Self {
        Self { space: basic.space.clone(), basics: vec![basic] }
    }

    pub fn n_basic(&self) -> usize {
        self.basics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BasicRelation> {
        self.basics.iter()
    }

    /// Add one more disjunct.
    pub fn add_basic(&mut self, basic: BasicRelation) -> PolyhedralResult<()> {
        if !self.space.is_compatible(&basic.space) {
            return Err(mismatch("union", &self.space, &basic.space));
        }
        if !self.basics.contains(&basic) {
            self.basics.push(basic);
        }
        Ok(())
    }

    pub fn union(&self, other: &Relation) -> PolyhedralResult<Relation> {
        let mut result = self.clone();
        for b in &other.basics {
            result.add_basic(b.clone())?;
        }
        Ok(result)
    }

    pub fn is_empty(&self) -> PolyhedralResult<bool> {
        for b in &self.basics {
            if !b.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn contains(&self, input: &[i64], output: &[i64], params: &[i64]) -> bool {
        self.basics.iter().any(|b| b.contains(input, output, params))
    }

    pub fn reverse(&self) -> Relation {
        Relation {
            space: self.space.reverse(),
            basics: self.basics.iter().map(|b| b.reverse()).collect(),
        }
    }

    pub fn intersect_domain(&self, set: &IntegerSet) -> PolyhedralResult<Relation> {
        Ok(Relation {
            space: self.space.clone(),
            basics: self.basics.iter()
                .map(|b| b.intersect_domain(set))
                .collect::<PolyhedralResult<_>>()?,
        })
    }

    pub fn intersect_range(&self, set: &IntegerSet) -> PolyhedralResult<Relation> {
        Ok(Relation {
            space: self.space.clone(),
            basics: self.basics.iter()
                .map(|b| b.intersect_range(set))
                .collect::<PolyhedralResult<_>>()?,
        })
    }

    /// All pairs of the union for fixed parameter values, sorted.
    pub fn points(&self, params: &[i64], limit: usize) -> PolyhedralResult<Vec<(Vec<i64>, Vec<i64>)>> {
        let mut all = Vec::new();
        for b in &self.basics {
            all.extend(b.points(params, limit)?);
        }
        all.sort();
        all.dedup();
        all.truncate(limit);
        Ok(all)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_params(f, &self.space)?;
        write!(f, "{{ ")?;
        for (i, b) in self.basics.iter().enumerate() {
            if i > 0 { write!(f, "; ")?; }
            b.write_body(f)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyhedral::map::AffineMap;

    /// `{ S[i] -> A[i + shift] }`
    fn access(shift: i64) -> BasicRelation {
        let mut out = AffineExpr::var(0, 1, 0);
        out.constant = shift;
        AffineMap::from_outputs(1, 0, vec![out])
            .with_tuples("S", Some("A".to_string()))
            .to_relation(0)
            .unwrap()
    }

    #[test]
    fn test_reverse() {
        let rel = access(1);
        assert!(rel.contains(&[2], &[3], &[]));
        let rev = rel.reverse();
        assert!(rev.contains(&[3], &[2], &[]));
        assert_eq!(rev.space.in_tuple.as_deref(), Some("A"));
    }

    #[test]
    fn test_apply_range_conflict() {
        // { S[i] -> S[j] : i + 1 = j }
        let conflict = access(1).apply_range(&access(0).reverse()).unwrap();
        assert_eq!(conflict.n_in(), 1);
        assert_eq!(conflict.n_out(), 1);
        assert!(conflict.contains(&[4], &[5], &[]));
        assert!(!conflict.contains(&[4], &[4], &[]));
        assert_eq!(conflict.output_expr(0).map(|e| e.constant), Some(1));
    }

    #[test]
    fn test_domain_and_range() {
        let rel = access(2).intersect_domain(&IntegerSet::rectangular(&[5])).unwrap();
        let range = rel.range().unwrap();
        assert_eq!(range.dim_bounds(0, &[]).unwrap(), Some((2, 6)));
        let domain = rel.domain().unwrap();
        assert_eq!(domain.dim_bounds(0, &[]).unwrap(), Some((0, 4)));
    }

    #[test]
    fn test_single_valued() {
        assert!(access(0).is_single_valued());
        let mut loose = BasicRelation::universe(Space::map(1, 1));
        loose.add_constraint(Constraint::ge_zero(AffineExpr::var(1, 2, 0)));
        assert!(!loose.is_single_valued());
    }

    #[test]
    fn test_union_points() {
        let dom = IntegerSet::rectangular(&[2]);
        let mut rel = Relation::from_basic(access(0).intersect_domain(&dom).unwrap());
        rel.add_basic(access(1).intersect_domain(&dom).unwrap()).unwrap();
        let pts = rel.points(&[], 100).unwrap();
        assert_eq!(pts.len(), 4);
        assert!(!rel.is_empty().unwrap());
        assert!(Relation::empty(Space::map(1, 1)).is_empty().unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(access(0).to_string(), "{ S[i0] -> A[o0] : -i0 + o0 = 0 }");
    }
}
