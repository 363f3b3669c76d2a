//! Analysis passes for polyhedral optimization.

pub mod scop;
pub mod dependence;

#[cfg(test)]
pub(crate) mod fixtures;

pub use scop::{BuildReport, ScopBuilder};
pub use dependence::{
    compute_dependences, DependenceAnalysis, DependenceKind, DependenceMap, DependenceSet, Hazard,
    Precision, SourceTracking,
};

use crate::frontend::LiftedRegion;
use crate::ir::Scop;

/// Build the SCoP of a lifted region with the process-wide id allocator.
pub fn extract_scop(region: &LiftedRegion) -> (Option<Scop>, BuildReport) {
    ScopBuilder::new().build(region)
}

/// Compute the dependences of a SCoP and store them on it.
pub fn analyze_dependences(scop: &mut Scop) -> &DependenceSet {
    let deps = compute_dependences(scop);
    scop.dependences.insert(deps)
}
