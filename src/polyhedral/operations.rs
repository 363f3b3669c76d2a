//! Polyhedral operations: elimination, emptiness, projection and scanning.
//!
//! Everything here works on raw [`ConstraintSystem`]s; [`IntegerSet`] and the
//! relation types wrap these with space bookkeeping.
//!
//! Elimination is Fourier-Motzkin with two integer refinements: equalities
//! are used for substitution whenever a variable occurs in one, and every
//! derived constraint is tightened by the gcd of its coefficients. A system
//! reported empty has no integer point; a system reported non-empty has at
//! least a rational point, which is the conservative direction for
//! dependence analysis.
//!
//! [`IntegerSet`]: crate::polyhedral::IntegerSet

use crate::polyhedral::constraint::{Constraint, ConstraintKind, ConstraintSystem, Normalized};
use crate::polyhedral::expr::AffineExpr;
use crate::utils::errors::{PolyhedralError, PolyhedralResult};
use num_integer::Integer;
use std::cell::Cell;

/// Default bound on the number of constraints an elimination may produce.
pub const DEFAULT_CONSTRAINT_LIMIT: usize = 4096;

thread_local! {
    static CONSTRAINT_LIMIT: Cell<usize> = Cell::new(DEFAULT_CONSTRAINT_LIMIT);
}

/// Set the bound on intermediate constraint counts for the current thread.
pub fn set_constraint_limit(limit: usize) {
    CONSTRAINT_LIMIT.with(|l| l.set(limit.max(1)));
}

/// Current bound on intermediate constraint counts of this thread.
pub fn constraint_limit() -> usize {
    CONSTRAINT_LIMIT.with(|l| l.get())
}

/// Normalize every constraint of a system over the integers.
///
/// Returns `None` when some constraint has no integer solution.
pub fn normalize(sys: &ConstraintSystem) -> Option<ConstraintSystem> {
    let mut out = ConstraintSystem::new(sys.n_dim, sys.n_param);
    for c in &sys.constraints {
        match c.normalize() {
            Normalized::Trivial => {}
            Normalized::Infeasible => return None,
            Normalized::Constraint(c) => out.constraints.push(c),
        }
    }
    out.dedup();
    if has_opposite_strict_pair(&out) {
        return None;
    }
    Some(out)
}

/// Detect `e >= 0` together with `-e - k >= 0` for some `k > 0`.
fn has_opposite_strict_pair(sys: &ConstraintSystem) -> bool {
    let ineqs: Vec<&Constraint> = sys.inequalities().collect();
    for (i, a) in ineqs.iter().enumerate() {
        for b in &ineqs[i + 1..] {
            let opposite = a.expr.coeffs.iter().zip(&b.expr.coeffs).all(|(x, y)| *x == -*y)
                && a.expr.param_coeffs.iter().zip(&b.expr.param_coeffs).all(|(x, y)| *x == -*y);
            if opposite && a.expr.constant.checked_add(b.expr.constant).map_or(false, |s| s < 0) {
                return true;
            }
        }
    }
    false
}

/// Move the parameters of a system into trailing dimension columns.
pub fn params_as_dims(sys: &ConstraintSystem) -> ConstraintSystem {
    let n = sys.n_dim + sys.n_param;
    let mut out = ConstraintSystem::new(n, 0);
    for c in &sys.constraints {
        let mut coeffs = c.expr.coeffs.clone();
        coeffs.extend_from_slice(&c.expr.param_coeffs);
        let expr = AffineExpr { constant: c.expr.constant, coeffs, param_coeffs: Vec::new() };
        out.constraints.push(Constraint::new(expr, c.kind));
    }
    out
}

/// Substitute concrete parameter values into a system.
pub fn fix_params(sys: &ConstraintSystem, params: &[i64]) -> PolyhedralResult<ConstraintSystem> {
    let mut out = ConstraintSystem::new(sys.n_dim, 0);
    for c in &sys.constraints {
        out.constraints.push(Constraint::new(c.expr.fix_params(params)?, c.kind));
    }
    Ok(out)
}

fn remove_column(sys: &ConstraintSystem, dim: usize) -> ConstraintSystem {
    let mut out = ConstraintSystem::new(sys.n_dim - 1, sys.n_param);
    for c in &sys.constraints {
        debug_assert_eq!(c.expr.coeff(dim), 0);
        let mut expr = c.expr.clone();
        expr.coeffs.remove(dim);
        out.constraints.push(Constraint::new(expr, c.kind));
    }
    out
}

/// Eliminate dimension `dim`, returning a system over the remaining
/// dimensions, or `None` if infeasibility was detected on the way.
pub fn eliminate_dim(sys: &ConstraintSystem, dim: usize) -> PolyhedralResult<Option<ConstraintSystem>> {
    if dim >= sys.n_dim {
        return Err(PolyhedralError::DimensionMismatch(format!(
            "cannot eliminate dimension {} of a {}-dimensional system", dim, sys.n_dim
        )));
    }
    let sys = match normalize(sys) {
        Some(s) => s,
        None => return Ok(None),
    };

    // Prefer an equality with a unit coefficient: the substitution is exact.
    let pivot = sys.constraints.iter()
        .filter(|c| c.is_equality() && c.expr.coeff(dim) != 0)
        .min_by_key(|c| c.expr.coeff(dim).abs())
        .cloned();

    let mut derived = ConstraintSystem::new(sys.n_dim, sys.n_param);
    if let Some(eq) = pivot {
        let a = eq.expr.coeff(dim);
        for c in &sys.constraints {
            if *c == eq {
                continue;
            }
            let b = c.expr.coeff(dim);
            if b == 0 {
                derived.constraints.push(c.clone());
                continue;
            }
            let expr = c.expr.checked_combine(a.abs(), &eq.expr, -a.signum() * b)?;
            derived.constraints.push(Constraint::new(expr, c.kind));
        }
    } else {
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        for c in &sys.constraints {
            match c.expr.coeff(dim).signum() {
                1 => lower.push(c),
                -1 => upper.push(c),
                _ => derived.constraints.push(c.clone()),
            }
        }
        let count = derived.len() + lower.len() * upper.len();
        let limit = constraint_limit();
        if count > limit {
            return Err(PolyhedralError::TooComplex { count, limit });
        }
        for l in &lower {
            let a = l.expr.coeff(dim);
            for u in &upper {
                let b = -u.expr.coeff(dim);
                let expr = l.expr.checked_combine(b, &u.expr, a)?;
                derived.constraints.push(Constraint::ge_zero(expr));
            }
        }
    }

    match normalize(&derived) {
        Some(s) => Ok(Some(remove_column(&s, dim))),
        None => Ok(None),
    }
}

/// Eliminate several dimensions; the result keeps the other columns in order.
pub fn project_out(sys: &ConstraintSystem, dims: &[usize]) -> PolyhedralResult<Option<ConstraintSystem>> {
    let mut dims: Vec<usize> = dims.to_vec();
    dims.sort_unstable();
    dims.dedup();
    let mut current = sys.clone();
    for &d in dims.iter().rev() {
        current = match eliminate_dim(&current, d)? {
            Some(s) => s,
            None => return Ok(None),
        };
    }
    Ok(Some(current))
}

/// Pick the cheapest column to eliminate next.
fn pick_column(sys: &ConstraintSystem) -> usize {
    let mut best = 0;
    let mut best_cost = usize::MAX;
    for d in 0..sys.n_dim {
        let mut pos = 0usize;
        let mut neg = 0usize;
        let mut in_eq = false;
        for c in &sys.constraints {
            let v = c.expr.coeff(d);
            if v == 0 {
                continue;
            }
            if c.is_equality() {
                in_eq = true;
            } else if v > 0 {
                pos += 1;
            } else {
                neg += 1;
            }
        }
        let cost = if in_eq { 0 } else { pos * neg + 1 };
        if cost < best_cost {
            best = d;
            best_cost = cost;
        }
    }
    best
}

/// Check whether a system has no integer point for any parameter value.
pub fn is_empty(sys: &ConstraintSystem) -> PolyhedralResult<bool> {
    let mut current = match normalize(&params_as_dims(sys)) {
        Some(s) => s,
        None => return Ok(true),
    };
    while current.n_dim > 0 {
        if current.is_empty() {
            return Ok(false);
        }
        let col = pick_column(&current);
        current = match eliminate_dim(&current, col)? {
            Some(s) => s,
            None => return Ok(true),
        };
    }
    Ok(normalize(&current).is_none())
}

/// Check `a ⊆ b` for two systems over the same columns.
pub fn is_subset(a: &ConstraintSystem, b: &ConstraintSystem) -> PolyhedralResult<bool> {
    for c in &b.constraints {
        for neg in c.negate() {
            let mut trial = a.clone();
            trial.constraints.push(neg);
            if !is_empty(&trial)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Integer bounds of dimension `dim` given the values of the preceding
/// dimensions. `Ok(None)` means no value fits.
fn bounds_at(
    sys: &ConstraintSystem,
    dim: usize,
    prefix: &[i64],
) -> PolyhedralResult<Option<(i64, i64)>> {
    let mut lo: Option<i64> = None;
    let mut hi: Option<i64> = None;
    for c in &sys.constraints {
        let mut rest = c.expr.constant;
        for (m, &v) in prefix.iter().enumerate() {
            rest = c.expr.coeff(m).checked_mul(v)
                .and_then(|t| rest.checked_add(t))
                .ok_or(PolyhedralError::Overflow("scanning points"))?;
        }
        let a = c.expr.coeff(dim);
        match (c.kind, a.signum()) {
            (ConstraintKind::Inequality, 0) => {
                if rest < 0 {
                    return Ok(None);
                }
            }
            (ConstraintKind::Equality, 0) => {
                if rest != 0 {
                    return Ok(None);
                }
            }
            (ConstraintKind::Equality, _) => {
                if rest % a != 0 {
                    return Ok(None);
                }
                let v = -rest / a;
                lo = Some(lo.map_or(v, |l| l.max(v)));
                hi = Some(hi.map_or(v, |h| h.min(v)));
            }
            (ConstraintKind::Inequality, 1) => {
                // a*x + rest >= 0  ==>  x >= ceil(-rest / a)
                let v = Integer::div_ceil(&-rest, &a);
                lo = Some(lo.map_or(v, |l| l.max(v)));
            }
            (ConstraintKind::Inequality, _) => {
                // -b*x + rest >= 0  ==>  x <= floor(rest / b)
                let v = Integer::div_floor(&rest, &-a);
                hi = Some(hi.map_or(v, |h| h.min(v)));
            }
        }
    }
    match (lo, hi) {
        (Some(l), Some(h)) if l <= h => Ok(Some((l, h))),
        (Some(_), Some(_)) => Ok(None),
        _ => Err(PolyhedralError::Unbounded(dim)),
    }
}

/// Enumerate the integer points of a parameter-free system in lexicographic
/// order (or reverse order), stopping after `limit` points.
pub fn scan(sys: &ConstraintSystem, limit: usize, reverse: bool) -> PolyhedralResult<Vec<Vec<i64>>> {
    let n = sys.n_dim;
    let full = match normalize(sys) {
        Some(s) => s,
        None => return Ok(Vec::new()),
    };
    if n == 0 {
        return Ok(vec![Vec::new()]);
    }

    // projections[k] constrains dimensions 0..=k only.
    let mut projections = vec![full.clone()];
    let mut current = full;
    for k in (1..n).rev() {
        current = match eliminate_dim(&current, k)? {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };
        projections.push(current.clone());
    }
    projections.reverse();

    let mut points = Vec::new();
    let mut prefix = Vec::with_capacity(n);
    scan_level(&projections, 0, &mut prefix, &mut points, limit, reverse)?;
    Ok(points)
}

fn scan_level(
    projections: &[ConstraintSystem],
    k: usize,
    prefix: &mut Vec<i64>,
    points: &mut Vec<Vec<i64>>,
    limit: usize,
    reverse: bool,
) -> PolyhedralResult<()> {
    let (lo, hi) = match bounds_at(&projections[k], k, prefix)? {
        Some(b) => b,
        None => return Ok(()),
    };
    let values: Box<dyn Iterator<Item = i64>> = if reverse {
        Box::new((lo..=hi).rev())
    } else {
        Box::new(lo..=hi)
    };
    for v in values {
        if points.len() >= limit {
            return Ok(());
        }
        prefix.push(v);
        if k + 1 == projections.len() {
            points.push(prefix.clone());
        } else {
            scan_level(projections, k + 1, prefix, points, limit, reverse)?;
        }
        prefix.pop();
    }
    Ok(())
}

/// Bounds of one dimension of a parameter-free system.
pub fn dim_bounds(sys: &ConstraintSystem, dim: usize) -> PolyhedralResult<Option<(i64, i64)>> {
    let others: Vec<usize> = (0..sys.n_dim).filter(|&d| d != dim).collect();
    match project_out(sys, &others)? {
        Some(line) => bounds_at(&line, 0, &[]),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_2d(n: i64) -> ConstraintSystem {
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(Constraint::lower_bound(0, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(0, n, 2, 0));
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::strict_upper_bound(1, n, 2, 0));
        sys
    }

    #[test]
    fn test_box_is_not_empty() {
        assert!(!is_empty(&box_2d(4)).unwrap());
    }

    #[test]
    fn test_contradiction_is_empty() {
        // i = j and i >= j + 1
        let mut sys = box_2d(4);
        sys.add(Constraint::eq(AffineExpr::var(0, 2, 0), AffineExpr::var(1, 2, 0)));
        sys.add(Constraint::lt(AffineExpr::var(1, 2, 0), AffineExpr::var(0, 2, 0)));
        assert!(is_empty(&sys).unwrap());
    }

    #[test]
    fn test_parametric_emptiness() {
        // { [i] : 0 <= i < N and N <= 0 } is empty
        let mut sys = ConstraintSystem::new(1, 1);
        sys.add(Constraint::ge_zero(AffineExpr::var(0, 1, 1)));
        let mut ub = AffineExpr::param(0, 1, 1) - AffineExpr::var(0, 1, 1);
        ub.constant = -1;
        sys.add(Constraint::ge_zero(ub));
        assert!(!is_empty(&sys).unwrap());
        sys.add(Constraint::ge_zero(-AffineExpr::param(0, 1, 1)));
        assert!(is_empty(&sys).unwrap());
    }

    #[test]
    fn test_integer_tightening() {
        // 1 <= 2i <= 1 has a rational but no integer solution
        let mut sys = ConstraintSystem::new(1, 0);
        let mut lo = AffineExpr::var(0, 1, 0).scale(2);
        lo.constant = -1;
        sys.add(Constraint::ge_zero(lo));
        let mut hi = AffineExpr::var(0, 1, 0).scale(-2);
        hi.constant = 1;
        sys.add(Constraint::ge_zero(hi));
        assert!(is_empty(&sys).unwrap());
    }

    #[test]
    fn test_scan_triangle() {
        // { [i, j] : 0 <= j <= i < 3 }
        let mut sys = ConstraintSystem::new(2, 0);
        sys.add(Constraint::lower_bound(1, 0, 2, 0));
        sys.add(Constraint::le(AffineExpr::var(1, 2, 0), AffineExpr::var(0, 2, 0)));
        sys.add(Constraint::strict_upper_bound(0, 3, 2, 0));
        let points = scan(&sys, usize::MAX, false).unwrap();
        assert_eq!(points.len(), 6);
        assert_eq!(points[0], vec![0, 0]);
        assert_eq!(points[5], vec![2, 2]);

        let rev = scan(&sys, 1, true).unwrap();
        assert_eq!(rev, vec![vec![2, 2]]);
    }

    #[test]
    fn test_scan_unbounded() {
        let mut sys = ConstraintSystem::new(1, 0);
        sys.add(Constraint::lower_bound(0, 0, 1, 0));
        assert!(matches!(scan(&sys, 10, false), Err(PolyhedralError::Unbounded(0))));
    }

    #[test]
    fn test_dim_bounds() {
        let sys = box_2d(7);
        assert_eq!(dim_bounds(&sys, 1).unwrap(), Some((0, 6)));
    }

    #[test]
    fn test_subset() {
        assert!(is_subset(&box_2d(3), &box_2d(5)).unwrap());
        assert!(!is_subset(&box_2d(5), &box_2d(3)).unwrap());
    }

    #[test]
    fn test_constraint_limit() {
        let mut sys = ConstraintSystem::new(2, 0);
        for k in 0..40 {
            let mut lo = AffineExpr::var(0, 2, 0) + AffineExpr::var(1, 2, 0).scale(k);
            lo.constant = k;
            sys.add(Constraint::ge_zero(lo));
            let mut hi = AffineExpr::var(1, 2, 0).scale(k + 1) - AffineExpr::var(0, 2, 0);
            hi.constant = 100 + k;
            sys.add(Constraint::ge_zero(hi));
        }
        let saved = constraint_limit();
        set_constraint_limit(10);
        let result = eliminate_dim(&sys, 0);
        set_constraint_limit(saved);
        assert!(matches!(result, Err(PolyhedralError::TooComplex { .. })));
    }
}
