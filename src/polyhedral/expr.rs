//! Affine expressions for polyhedral representation.
//!
//! An affine expression is a linear combination of variables plus a constant:
//! `aff(x) = c0 + c1*x1 + c2*x2 + ... + cn*xn + p1*N1 + ...`

use crate::utils::errors::{PolyhedralError, PolyhedralResult};
use num_integer::Integer;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::ops::{Add, Sub, Neg};

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(param_coeff[p] * param[p])
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each dimension (index = dimension index)
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create an expression for a single dimension variable.
    pub fn var(dim: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        if dim < n_dim {
            expr.coeffs[dim] = 1;
        }
        expr
    }

    /// Create an expression for a parameter.
    pub fn param(param_idx: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        if param_idx < n_param {
            expr.param_coeffs[param_idx] = 1;
        }
        expr
    }

    /// Check if this is a constant expression.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0) &&
        self.param_coeffs.iter().all(|&c| c == 0)
    }

    /// Get the number of dimensions.
    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Get coefficient for a dimension.
    pub fn coeff(&self, dim: usize) -> i64 {
        self.coeffs.get(dim).copied().unwrap_or(0)
    }

    /// Get coefficient for a parameter.
    pub fn param_coeff(&self, idx: usize) -> i64 {
        self.param_coeffs.get(idx).copied().unwrap_or(0)
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, dim_values: &[i64], param_values: &[i64]) -> PolyhedralResult<i64> {
        let dims = self.coeffs.iter().zip(dim_values);
        let params = self.param_coeffs.iter().zip(param_values);
        dims.chain(params).try_fold(self.constant, |acc, (&c, &v)| {
            c.checked_mul(v)
                .and_then(|t| acc.checked_add(t))
                .ok_or(PolyhedralError::Overflow("evaluating an affine expression"))
        })
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// Compute `a * self + b * other` with overflow checking.
    pub fn checked_combine(&self, a: i64, other: &AffineExpr, b: i64) -> PolyhedralResult<Self> {
        if self.n_dim() != other.n_dim() || self.n_param() != other.n_param() {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "cannot combine [{}; {}] with [{}; {}]",
                self.n_dim(), self.n_param(), other.n_dim(), other.n_param()
            )));
        }
        let lin = |x: i64, y: i64| -> PolyhedralResult<i64> {
            x.checked_mul(a)
                .and_then(|l| y.checked_mul(b).and_then(|r| l.checked_add(r)))
                .ok_or(PolyhedralError::Overflow("combining affine expressions"))
        };
        Ok(Self {
            constant: lin(self.constant, other.constant)?,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&x, &y)| lin(x, y))
                .collect::<PolyhedralResult<_>>()?,
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&x, &y)| lin(x, y))
                .collect::<PolyhedralResult<_>>()?,
        })
    }

    /// Floor division of the expression by a constant, exact only.
    pub fn floor_div(&self, divisor: i64) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        if self.constant % divisor != 0
            || self.coeffs.iter().any(|&c| c % divisor != 0)
            || self.param_coeffs.iter().any(|&c| c % divisor != 0)
        {
            return None;
        }
        Some(Self {
            constant: self.constant / divisor,
            coeffs: self.coeffs.iter().map(|&c| c / divisor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c / divisor).collect(),
        })
    }

    /// GCD of the variable and parameter coefficients (the constant excluded).
    /// Zero when the expression is constant.
    pub fn coeff_gcd(&self) -> i64 {
        self.coeffs.iter()
            .chain(self.param_coeffs.iter())
            .fold(0i64, |g, &c| g.gcd(&c))
    }

    /// Get GCD of all coefficients, the constant included.
    pub fn gcd(&self) -> i64 {
        let g = self.coeff_gcd().gcd(&self.constant);
        if g == 0 { 1 } else { g }
    }

    /// Normalize by dividing by GCD.
    pub fn normalize(&self) -> Self {
        let g = self.gcd();
        if g <= 1 {
            self.clone()
        } else {
            self.floor_div(g).unwrap_or_else(|| self.clone())
        }
    }

    /// Embed the dimensions of this expression at `offset` in a space of
    /// `n_total` dimensions.
    pub fn lift(&self, offset: usize, n_total: usize) -> Self {
        let mut coeffs = vec![0; n_total];
        for (i, &c) in self.coeffs.iter().enumerate() {
            if offset + i < n_total {
                coeffs[offset + i] = c;
            }
        }
        Self {
            constant: self.constant,
            coeffs,
            param_coeffs: self.param_coeffs.clone(),
        }
    }

    /// Keep only the dimensions `range`, dropping the others.
    pub fn restrict_dims(&self, range: std::ops::Range<usize>) -> Self {
        Self {
            constant: self.constant,
            coeffs: self.coeffs[range].to_vec(),
            param_coeffs: self.param_coeffs.clone(),
        }
    }

    /// Substitute dimension `dim` by `value` (an expression over the same space).
    pub fn substitute(&self, dim: usize, value: &AffineExpr) -> PolyhedralResult<Self> {
        let c = self.coeff(dim);
        if c == 0 {
            return Ok(self.clone());
        }
        let mut base = self.clone();
        base.coeffs[dim] = 0;
        base.checked_combine(1, value, c)
    }

    /// Fold concrete parameter values into the constant.
    pub fn fix_params(&self, params: &[i64]) -> PolyhedralResult<Self> {
        let mut constant = self.constant;
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            let v = params.get(i).copied().unwrap_or(0);
            constant = c.checked_mul(v)
                .and_then(|t| constant.checked_add(t))
                .ok_or(PolyhedralError::Overflow("fixing parameter values"))?;
        }
        Ok(Self {
            constant,
            coeffs: self.coeffs.clone(),
            param_coeffs: Vec::new(),
        })
    }

    /// Convert to string with given dimension and parameter names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let mut out = String::new();
        let push_term = |c: i64, name: &str, out: &mut String| {
            if c == 0 {
                return;
            }
            let sign = if c < 0 { "-" } else { "+" };
            if out.is_empty() {
                if c < 0 {
                    out.push('-');
                }
            } else {
                out.push(' ');
                out.push_str(sign);
                out.push(' ');
            }
            if c.abs() != 1 {
                out.push_str(&format!("{}*", c.abs()));
            }
            out.push_str(name);
        };

        for (i, &c) in self.coeffs.iter().enumerate() {
            let default_name = format!("d{}", i);
            let name = dim_names.get(i).map(|s| s.as_str()).unwrap_or(&default_name);
            push_term(c, name, &mut out);
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            let default_name = format!("p{}", i);
            let name = param_names.get(i).map(|s| s.as_str()).unwrap_or(&default_name);
            push_term(c, name, &mut out);
        }

        if out.is_empty() {
            return self.constant.to_string();
        }
        if self.constant > 0 {
            out.push_str(&format!(" + {}", self.constant));
        } else if self.constant < 0 {
            out.push_str(&format!(" - {}", -self.constant));
        }
        out
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&a, &b)| a + b).collect(),
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b).collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim_names: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let param_names: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dim_names, &param_names))
    }
}
