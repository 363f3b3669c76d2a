//! Error types for the polyhedral layer.
//!
//! This module defines all error types used throughout the crate,
//! organized by the phase that produces them.

use thiserror::Error;
use std::fmt;

/// Top-level error type for the crate.
#[derive(Error, Debug)]
pub enum PolyScopError {
    /// Error while loading a lifted region
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Error during SCoP construction
    #[error("SCoP construction error: {0}")]
    Scop(#[from] ScoPError),

    /// Error inside the integer relation library
    #[error("Polyhedral error: {0}")]
    Polyhedral(#[from] PolyhedralError),

    /// Error during transformation
    #[error("Transformation error: {0}")]
    Transform(#[from] TransformError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of the integer relation library.
///
/// All of these mean the library gave up, never that an answer is wrong;
/// callers fall back to a conservative result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolyhedralError {
    /// Checked integer arithmetic overflowed
    #[error("integer overflow while {0}")]
    Overflow(&'static str),

    /// Elimination produced more constraints than allowed
    #[error("{count} constraints exceed the limit of {limit}")]
    TooComplex { count: usize, limit: usize },

    /// A dimension has no finite bound where one is required
    #[error("dimension {0} is unbounded")]
    Unbounded(usize),

    /// Operands live in incompatible spaces
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Error while reading a lifted region description.
#[derive(Error, Debug)]
pub enum InputError {
    /// The file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The description is not valid JSON for a lifted region
    #[error("malformed region description: {0}")]
    Json(#[from] serde_json::Error),

    /// Structurally valid JSON with inconsistent content
    #[error("invalid region: {0}")]
    Invalid(String),
}

/// Error during SCoP construction.
#[derive(Error, Debug, Clone)]
pub struct ScoPError {
    /// The error message
    pub message: String,
    /// Index of the offending block (if available)
    pub block: Option<u32>,
    /// The kind of SCoP error
    pub kind: ScoPErrorKind,
}

impl ScoPError {
    /// Create a new error for a block.
    pub fn new(kind: ScoPErrorKind, message: impl Into<String>, block: Option<u32>) -> Self {
        Self { message: message.into(), block, kind }
    }
}

impl fmt::Display for ScoPError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(block) = self.block {
            write!(f, "{} in block {}", self.message, block)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoPErrorKind {
    /// Non-affine loop bound
    NonAffineBound,
    /// Non-affine array subscript
    NonAffineSubscript,
    /// Non-affine conditional
    NonAffineCondition,
    /// Reference to a symbol the region does not declare
    UnknownSymbol,
    /// Static position inconsistent with the loop depth
    BadPosition,
    /// No block of the region can be represented
    NoScoPFound,
}

/// Error during transformation.
#[derive(Error, Debug, Clone)]
pub struct TransformError {
    /// The error message
    pub message: String,
    /// The kind of transformation error
    pub kind: TransformErrorKind,
    /// The transformation that failed
    pub transform: String,
}

impl TransformError {
    /// Create a new transformation error.
    pub fn new(kind: TransformErrorKind, message: impl Into<String>, transform: impl Into<String>) -> Self {
        Self { message: message.into(), kind, transform: transform.into() }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.message, self.transform)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// Transformation would violate dependencies
    IllegalTransform,
    /// Scheduling failed
    SchedulingFailed,
    /// Transformation not applicable
    NotApplicable,
}

/// Result type using PolyScopError.
pub type PolyResult<T> = Result<T, PolyScopError>;

/// Result type of the integer relation library.
pub type PolyhedralResult<T> = Result<T, PolyhedralError>;
