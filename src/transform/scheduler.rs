//! Polyhedral scheduler.
//!
//! Candidates are loop permutations applied to every statement's schedule.
//! Each legal candidate is scored for parallelism (outer loops with no
//! carried dependence weigh more) and for locality (the stride of the
//! innermost loop through every exact subscript). The policy decides which
//! score wins. The chosen schedules are proposed on the statements and
//! re-validated before the call reports success.

use crate::analysis::{compute_dependences, DependenceSet};
use crate::ir::{Pbb, Scop};
use crate::polyhedral::AffineMap;
use crate::transform::interchange::Permutation;
use crate::transform::legality::{carried_dimensions, current_schedules, is_legal, ScheduleMap};
use crate::utils::errors::{TransformError, TransformErrorKind};
use log::{debug, info, warn};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Which objective drives scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePolicy {
    /// Rewrite every schedule to an equal one, exercising the whole path
    Identity,
    /// Maximize the loops free of carried dependences
    ParallelizeAll,
    /// Minimize the locality cost
    #[default]
    Optimize,
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulePolicy::Identity => "identity",
            SchedulePolicy::ParallelizeAll => "parallelize-all",
            SchedulePolicy::Optimize => "optimize",
        };
        write!(f, "{}", name)
    }
}

/// What the last scheduling run decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub policy: SchedulePolicy,
    pub permutation: Permutation,
    /// Per time dimension of the new schedules: carries a dependence
    pub carried: Vec<bool>,
    pub parallel_score: usize,
    pub locality_cost: u64,
}

impl ScheduleInfo {
    /// Whether loop level `k` (time dimension `2k + 1`) can run in parallel.
    pub fn is_parallel_loop(&self, k: usize) -> bool {
        self.carried.get(2 * k + 1).is_some_and(|c| !c)
    }
}

/// One legal candidate with its scores.
struct Evaluation {
    permutation: Permutation,
    schedules: ScheduleMap,
    carried: Vec<bool>,
    parallel_score: usize,
    locality_cost: u64,
}

/// Polyhedral scheduler.
pub struct Scheduler {
    policy: SchedulePolicy,
    /// Deepest nest whose loops are permuted
    max_depth: usize,
}

impl Scheduler {
    pub fn new(policy: SchedulePolicy) -> Self {
        Self { policy, max_depth: 4 }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Schedule a SCoP. Returns whether a transform was produced; the new
    /// schedules are left proposed on the statements.
    pub fn schedule(&self, scop: &mut Scop) -> Result<bool, TransformError> {
        if scop.statements.is_empty() {
            info!("{} has no statements, nothing to schedule", scop.id);
            return Ok(false);
        }
        if scop.dependences.is_none() {
            scop.dependences = Some(compute_dependences(scop));
        }
        let Some(deps) = scop.dependences.as_ref() else {
            return Err(TransformError::new(
                TransformErrorKind::SchedulingFailed,
                "dependences unavailable",
                self.policy.to_string(),
            ));
        };

        let Some(chosen) = self.choose(scop, deps) else {
            warn!("{}: no legal schedule found, keeping the original", scop.id);
            return Ok(false);
        };
        let produced = match self.policy {
            SchedulePolicy::Identity | SchedulePolicy::ParallelizeAll => true,
            SchedulePolicy::Optimize => !chosen.permutation.is_identity(),
        };
        info!(
            "{}: {} chose {} (parallel score {}, locality cost {})",
            scop.id, self.policy, chosen.permutation, chosen.parallel_score, chosen.locality_cost
        );

        if produced {
            self.propose(scop, &chosen)?;
        }
        scop.schedule_info = Some(ScheduleInfo {
            policy: self.policy,
            permutation: chosen.permutation,
            carried: chosen.carried,
            parallel_score: chosen.parallel_score,
            locality_cost: chosen.locality_cost,
        });
        scop.is_optimized = produced;
        Ok(produced)
    }

    fn propose(&self, scop: &mut Scop, chosen: &Evaluation) -> Result<(), TransformError> {
        let mut failure = None;
        for pbb in &mut scop.statements {
            let Some(schedule) = chosen.schedules.get(&pbb.id) else { continue };
            if let Err(e) = pbb.propose(schedule.clone()) {
                failure = Some(e);
                break;
            }
        }
        if let Some(e) = failure {
            scop.rollback_all();
            return Err(TransformError::new(
                TransformErrorKind::SchedulingFailed,
                e.to_string(),
                chosen.permutation.to_string(),
            ));
        }

        let legal = match scop.dependences.as_ref() {
            Some(deps) => is_legal(scop, deps, &current_schedules(scop)),
            None => false,
        };
        if !legal {
            scop.rollback_all();
            return Err(TransformError::new(
                TransformErrorKind::IllegalTransform,
                format!("proposed schedules of {} violate a dependence", scop.id),
                chosen.permutation.to_string(),
            ));
        }
        Ok(())
    }

    fn candidates(&self, depth: usize) -> Vec<Permutation> {
        match self.policy {
            SchedulePolicy::Identity => vec![Permutation::identity(depth)],
            _ => Permutation::all(depth.min(self.max_depth)),
        }
    }

    fn choose(&self, scop: &Scop, deps: &DependenceSet) -> Option<Evaluation> {
        let depth = scop.statements.iter().map(Pbb::dim).max().unwrap_or(0);
        let current = current_schedules(scop);
        let mut best: Option<Evaluation> = None;

        for permutation in self.candidates(depth) {
            let schedules = match current.iter()
                .map(|(id, s)| permutation.apply(s).map(|t| (*id, t)))
                .collect::<Result<ScheduleMap, _>>()
            {
                Ok(s) => s,
                Err(e) => {
                    debug!("skipping {}: {}", permutation, e);
                    continue;
                }
            };
            if !is_legal(scop, deps, &schedules) {
                debug!("{} is illegal", permutation);
                continue;
            }
            let carried = carried_dimensions(scop, deps, &schedules);
            let parallel_score = parallel_score(&carried, depth);
            let locality_cost = locality_cost(scop, &schedules);
            debug!("{}: parallel score {}, locality cost {}", permutation, parallel_score, locality_cost);

            let candidate = Evaluation { permutation, schedules, carried, parallel_score, locality_cost };
            best = match best {
                Some(b) if !self.better(&candidate, &b) => Some(b),
                _ => Some(candidate),
            };
        }
        best
    }

    /// Strict preference; earlier candidates win ties.
    fn better(&self, a: &Evaluation, b: &Evaluation) -> bool {
        match self.policy {
            SchedulePolicy::Identity => false,
            SchedulePolicy::ParallelizeAll => {
                (a.parallel_score, b.locality_cost) > (b.parallel_score, a.locality_cost)
            }
            SchedulePolicy::Optimize => {
                (b.locality_cost, a.parallel_score) > (a.locality_cost, b.parallel_score)
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulePolicy::default())
    }
}

/// Loops without a carried dependence, outer loops weighing more.
fn parallel_score(carried: &[bool], depth: usize) -> usize {
    (0..depth)
        .filter(|k| carried.get(2 * k + 1).is_some_and(|c| !c))
        .map(|k| depth - k)
        .sum()
}

/// Stride cost of the innermost loop: nothing for temporal reuse, 1 for a
/// unit stride in the last subscript, more for longer strides, and a flat
/// penalty for strides in outer subscripts or inexact accesses.
///
/// The innermost loop of a statement is read from its candidate schedule, so
/// a candidate applied on top of a committed transform is scored as the
/// composed schedule it produces.
fn locality_cost(scop: &Scop, schedules: &ScheduleMap) -> u64 {
    let mut cost = 0u64;
    for pbb in &scop.statements {
        let Some(inner) = schedules.get(&pbb.id).and_then(|s| innermost_iterator(s, pbb.dim())) else {
            continue;
        };
        for pdr in &pbb.drs {
            if !pdr.is_exact() {
                cost += 4;
                continue;
            }
            let n = pdr.nb_subscripts;
            for k in 0..n {
                let Some(expr) = pdr.subscript_expr(k) else { continue };
                let stride = expr.coeff(inner).unsigned_abs();
                cost += match (k + 1 == n, stride) {
                    (_, 0) => 0,
                    (true, 1) => 1,
                    (true, s) => 2 * s,
                    (false, _) => 8,
                };
            }
        }
    }
    cost
}

/// The iterator driving the innermost time dimension `2d - 1` of a
/// depth-`d` schedule, when exactly one iterator does.
fn innermost_iterator(schedule: &AffineMap, depth: usize) -> Option<usize> {
    let time = schedule.outputs.get((2 * depth).checked_sub(1)?)?;
    let mut driving = (0..depth).filter(|&k| time.coeff(k) != 0);
    match (driving.next(), driving.next()) {
        (Some(k), None) => Some(k),
        _ => None,
    }
}
