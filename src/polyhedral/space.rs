//! Polyhedral spaces define the dimensions of sets and relations.
//!
//! A space describes the structure of an iteration domain or relation:
//! - Input dimensions (for relations only)
//! - Output (or set) dimensions
//! - Parameter dimensions (symbolic constants shared by every object of a SCoP)
//!
//! Constraint columns are laid out as `[in..., out...]` for relations and
//! `[dims...]` for sets; parameters are kept in a separate coefficient vector.

use serde::{Serialize, Deserialize};
use std::fmt;

/// A polyhedral space describes the dimensionality and structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// Number of set/output dimensions
    pub n_dim: usize,
    /// Number of parameter dimensions
    pub n_param: usize,
    /// Number of input dimensions (for relations only)
    pub n_in: usize,
    /// Whether this is a relation space, even when `n_in` is zero
    pub is_map: bool,
    /// Tuple name of the set/output side (`S_3`, `A`)
    pub out_tuple: Option<String>,
    /// Tuple name of the input side
    pub in_tuple: Option<String>,
    /// Names of set/output dimensions (optional, for printing)
    pub dim_names: Vec<String>,
    /// Names of input dimensions (optional, for printing)
    pub in_names: Vec<String>,
    /// Names of parameters (optional)
    pub param_names: Vec<String>,
}

impl Space {
    /// Create a new set space with the given dimensions.
    pub fn set(n_dim: usize) -> Self {
        Self::set_with_params(n_dim, 0)
    }

    /// Create a new set space with parameters.
    pub fn set_with_params(n_dim: usize, n_param: usize) -> Self {
        Self {
            n_dim,
            n_param,
            n_in: 0,
            is_map: false,
            out_tuple: None,
            in_tuple: None,
            dim_names: Vec::new(),
            in_names: Vec::new(),
            param_names: Vec::new(),
        }
    }

    /// Create a new relation space.
    pub fn map(n_in: usize, n_out: usize) -> Self {
        Self::map_with_params(n_in, n_out, 0)
    }

    /// Create a new relation space with parameters.
    pub fn map_with_params(n_in: usize, n_out: usize, n_param: usize) -> Self {
        Self {
            n_dim: n_out,
            n_param,
            n_in,
            is_map: true,
            out_tuple: None,
            in_tuple: None,
            dim_names: Vec::new(),
            in_names: Vec::new(),
            param_names: Vec::new(),
        }
    }

    /// Check if this is a set space.
    pub fn is_set(&self) -> bool {
        !self.is_map
    }

    /// Get the number of output/set dimensions.
    pub fn dim(&self) -> usize {
        self.n_dim
    }

    /// Number of constraint columns (input plus output dimensions).
    pub fn n_var(&self) -> usize {
        self.n_in + self.n_dim
    }

    /// Set dimension names.
    pub fn with_dim_names(mut self, names: Vec<String>) -> Self {
        self.dim_names = names;
        self
    }

    /// Set input dimension names.
    pub fn with_in_names(mut self, names: Vec<String>) -> Self {
        self.in_names = names;
        self
    }

    /// Set parameter names.
    pub fn with_param_names(mut self, names: Vec<String>) -> Self {
        self.param_names = names;
        self
    }

    /// Set the tuple name of the set/output side.
    pub fn with_tuple(mut self, name: impl Into<String>) -> Self {
        self.out_tuple = Some(name.into());
        self
    }

    /// Set the tuple name of the input side.
    pub fn with_in_tuple(mut self, name: impl Into<String>) -> Self {
        self.in_tuple = Some(name.into());
        self
    }

    /// Get the name of a dimension.
    pub fn dim_name(&self, idx: usize) -> Option<&str> {
        self.dim_names.get(idx).map(|s| s.as_str())
    }

    /// Get all dimension names with defaults.
    pub fn all_dim_names(&self) -> Vec<String> {
        let prefix = if self.is_map { "o" } else { "i" };
        (0..self.n_dim)
            .map(|i| {
                self.dim_names.get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("{}{}", prefix, i))
            })
            .collect()
    }

    /// Get all input dimension names with defaults.
    pub fn all_in_names(&self) -> Vec<String> {
        (0..self.n_in)
            .map(|i| {
                self.in_names.get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("i{}", i))
            })
            .collect()
    }

    /// Names of every constraint column, inputs first.
    pub fn all_var_names(&self) -> Vec<String> {
        let mut names = self.all_in_names();
        names.extend(self.all_dim_names());
        names
    }

    /// Get all parameter names with defaults.
    pub fn all_param_names(&self) -> Vec<String> {
        (0..self.n_param)
            .map(|i| {
                self.param_names.get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("p{}", i))
            })
            .collect()
    }

    /// Create the domain space from a relation space.
    pub fn domain(&self) -> Space {
        let mut space = Space::set_with_params(self.n_in, self.n_param)
            .with_dim_names(self.in_names.clone())
            .with_param_names(self.param_names.clone());
        space.out_tuple = self.in_tuple.clone();
        space
    }

    /// Create the range space from a relation space.
    pub fn range(&self) -> Space {
        let mut space = Space::set_with_params(self.n_dim, self.n_param)
            .with_dim_names(self.dim_names.clone())
            .with_param_names(self.param_names.clone());
        space.out_tuple = self.out_tuple.clone();
        space
    }

    /// Build the relation space `self -> range` from two set spaces.
    pub fn map_from(domain: &Space, range: &Space) -> Space {
        let mut space = Space::map_with_params(domain.n_dim, range.n_dim, domain.n_param)
            .with_in_names(domain.dim_names.clone())
            .with_dim_names(range.dim_names.clone())
            .with_param_names(domain.param_names.clone());
        space.in_tuple = domain.out_tuple.clone();
        space.out_tuple = range.out_tuple.clone();
        space
    }

    /// Swap the input and output sides of a relation space.
    pub fn reverse(&self) -> Space {
        let mut space = Space::map_with_params(self.n_dim, self.n_in, self.n_param)
            .with_in_names(self.dim_names.clone())
            .with_dim_names(self.in_names.clone())
            .with_param_names(self.param_names.clone());
        space.in_tuple = self.out_tuple.clone();
        space.out_tuple = self.in_tuple.clone();
        space
    }

    /// Flatten a relation space into the set space of its `[in, out]` pairs.
    pub fn wrap(&self) -> Space {
        Space::set_with_params(self.n_var(), self.n_param)
            .with_dim_names(self.all_var_names())
            .with_param_names(self.param_names.clone())
    }

    /// Check that two spaces have the same shape, ignoring names.
    pub fn is_compatible(&self, other: &Space) -> bool {
        self.n_dim == other.n_dim
            && self.n_in == other.n_in
            && self.n_param == other.n_param
            && self.is_map == other.is_map
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_map {
            write!(f, "[{}] -> [{}]", self.n_in, self.n_dim)?;
        } else {
            write!(f, "[{}]", self.n_dim)?;
        }
        if self.n_param > 0 {
            write!(f, " : {} params", self.n_param)?;
        }
        Ok(())
    }
}
