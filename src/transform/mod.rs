//! Schedule transformations for polyhedral optimization.

pub mod interchange;
pub mod legality;
pub mod scheduler;

pub use interchange::Permutation;
pub use legality::{carried_dimensions, current_schedules, is_legal, ScheduleMap};
pub use scheduler::{ScheduleInfo, SchedulePolicy, Scheduler};

use crate::analysis::analyze_dependences;
use crate::ir::Scop;
use crate::utils::errors::TransformError;
use crate::OptimizationConfig;
use log::debug;

/// Compute the dependences of a SCoP if they are missing, then schedule it
/// under the configured policy. Returns whether a transform was produced.
pub fn apply_poly_transforms(scop: &mut Scop, config: &OptimizationConfig) -> Result<bool, TransformError> {
    if scop.dependences.is_none() {
        let id = scop.id;
        let deps = analyze_dependences(scop);
        debug!("{}: {} dependence relations", id, deps.summary().iter().map(|(_, n)| n).sum::<usize>());
    }
    Scheduler::new(config.policy)
        .with_max_depth(config.permutation_depth)
        .schedule(scop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures;

    #[test]
    fn test_apply_poly_transforms() {
        let mut scop = fixtures::copy_chain();
        let config = OptimizationConfig { policy: SchedulePolicy::Identity, ..Default::default() };
        assert!(apply_poly_transforms(&mut scop, &config).unwrap());
        assert!(scop.dependences.is_some());
        assert!(scop.is_optimized);
    }

    #[test]
    fn test_optimize_without_gain() {
        let mut scop = fixtures::copy_chain();
        assert!(!apply_poly_transforms(&mut scop, &OptimizationConfig::default()).unwrap());
        assert!(!scop.is_optimized);
    }
}
