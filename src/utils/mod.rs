//! Utility modules for the polyhedral optimizer.
//!
//! - Error types
//! - SCoP printing

pub mod errors;
pub mod poly_print;

// Re-exports
pub use errors::*;
pub use poly_print::{print_dependences, print_schedules, print_scop, scop_to_string};
