//! Polyhedral data structures and operations.
//!
//! This module is the integer relation library the rest of the crate is
//! built on:
//! - Affine expressions and constraints
//! - Integer sets (iteration domains, parameter contexts)
//! - Affine maps (schedules)
//! - Relations and unions of relations (accesses, dependences)
//! - Elimination, emptiness and scanning of constraint systems

pub mod space;
pub mod expr;
pub mod constraint;
pub mod set;
pub mod map;
pub mod relation;
pub mod operations;

pub use space::Space;
pub use expr::AffineExpr;
pub use constraint::{Constraint, ConstraintKind, ConstraintSystem};
pub use set::IntegerSet;
pub use map::AffineMap;
pub use relation::{BasicRelation, Relation};
pub use operations::{constraint_limit, set_constraint_limit, DEFAULT_CONSTRAINT_LIMIT};
