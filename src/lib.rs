//! # PolyScop - Polyhedral Representation of Static Control Parts
//!
//! Builds the polyhedral model of a lifted loop region and works on it:
//! - SCoP construction (iteration domains, original schedules, access relations)
//! - Dependence analysis (RAW/WAR/WAW, must/may, with or without source)
//! - Scheduling by loop permutation under a legality check
//! - Two-phase schedule updates (propose, then commit or roll back)
//! - Deterministic text dumps
//!
//! ## Architecture
//!
//! ```text
//! Lifted region (JSON) → ScopBuilder → Scop → Dependences → Scheduler → commit / dump
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use polyscop::prelude::*;
//!
//! let region = polyscop::frontend::load_region(Path::new("copy.json"))?;
//! let mut scop = polyscop::build_scop(&region)?;
//! let changed = polyscop::optimize(&mut scop, &OptimizationConfig::default())?;
//! print!("{}", scop_to_string(&scop, 1));
//! ```

#![warn(clippy::all)]

pub mod frontend;
pub mod ir;
pub mod polyhedral;
pub mod analysis;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::frontend::{load_region, parse_region, LiftedRegion};
    pub use crate::ir::{IdAllocator, Pbb, PbbId, Pdr, PdrId, PdrKind, ScheduleState, Scop, ScopId};
    pub use crate::polyhedral::{
        AffineExpr, AffineMap, BasicRelation, Constraint, IntegerSet, Relation, Space,
    };
    pub use crate::analysis::{
        compute_dependences, BuildReport, DependenceKind, DependenceSet, Hazard, Precision,
        ScopBuilder, SourceTracking,
    };
    pub use crate::transform::{apply_poly_transforms, Permutation, SchedulePolicy, Scheduler};
    pub use crate::utils::poly_print::{print_scop, scop_to_string};
    pub use crate::utils::errors::*;
    pub use crate::OptimizationConfig;
}

use anyhow::{Context, Result};
use log::{info, warn};

/// Configuration for the optimization pipeline.
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Scheduling objective
    pub policy: transform::SchedulePolicy,
    /// Dump verbosity (0-2)
    pub verbosity: u8,
    /// Deepest loop nest whose loops the scheduler permutes
    pub permutation_depth: usize,
    /// Bound on intermediate constraint counts in the relation library
    pub constraint_limit: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            policy: transform::SchedulePolicy::Optimize,
            verbosity: 1,
            permutation_depth: 4,
            constraint_limit: polyhedral::DEFAULT_CONSTRAINT_LIMIT,
        }
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the SCoP of a lifted region. Fails when no block can be represented.
pub fn build_scop(region: &frontend::LiftedRegion) -> Result<ir::Scop> {
    let (scop, report) = analysis::extract_scop(region);
    for rejected in &report.rejected {
        info!("{}: {}", region.name, rejected);
    }
    match scop {
        Some(scop) => Ok(scop),
        None => {
            let err = report.rejected.last().cloned().map(utils::errors::PolyScopError::from);
            Err(err.unwrap_or_else(|| utils::errors::PolyScopError::Internal("empty build report".to_string())))
                .with_context(|| format!("no SCoP in region {}", region.name))
        }
    }
}

/// Run the optimization pipeline on a SCoP: dependences, scheduling, and
/// commit of the proposed schedules. Returns whether a transform was applied.
///
/// The configured constraint limit applies for the duration of the call; the
/// thread's previous limit is restored afterwards.
pub fn optimize(scop: &mut ir::Scop, config: &OptimizationConfig) -> Result<bool> {
    let previous = polyhedral::constraint_limit();
    polyhedral::set_constraint_limit(config.constraint_limit);
    let scheduled = transform::apply_poly_transforms(scop, config);
    polyhedral::set_constraint_limit(previous);

    let changed = scheduled
        .map_err(utils::errors::PolyScopError::from)
        .with_context(|| format!("scheduling {} under {}", scop.id, config.policy))?;
    if changed {
        let committed = scop.commit_all();
        info!("{}: committed {} schedules", scop.id, committed);
    } else {
        warn!("{}: no transform applied", scop.id);
    }
    Ok(changed)
}

/// Load a region file and build its SCoP.
pub fn load_scop(path: &std::path::Path) -> Result<ir::Scop> {
    let region = frontend::load_region(path)
        .map_err(utils::errors::PolyScopError::from)
        .with_context(|| format!("loading {}", path.display()))?;
    build_scop(&region)
}
