//! Schedule legality against the dependence relations.
//!
//! A schedule assignment is legal when, for every constraining dependence
//! pair `(i, j)`, the new timestamp of `i` strictly precedes that of `j`.
//! Any failure of the relation library makes the answer "illegal".

use crate::analysis::{DependenceKind, DependenceSet};
use crate::ir::{PbbId, Scop};
use crate::polyhedral::{AffineMap, Relation};
use crate::utils::errors::PolyhedralResult;
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A schedule for every statement, keyed by id.
pub type ScheduleMap = BTreeMap<PbbId, AffineMap>;

/// The schedules currently in effect.
pub fn current_schedules(scop: &Scop) -> ScheduleMap {
    scop.statements.iter()
        .map(|pbb| (pbb.id, pbb.effective_schedule().clone()))
        .collect()
}

fn constraining<'d>(scop: &Scop, deps: &'d DependenceSet) -> Vec<(DependenceKind, PbbId, PbbId, &'d Relation)> {
    deps.constraining(|id| scop.pbb(id).is_some_and(|pbb| pbb.is_reduction))
}

/// Whether some pair of `rel` is not strictly ordered by the schedules.
fn violated(rel: &Relation, source: &AffineMap, target: &AffineMap) -> PolyhedralResult<bool> {
    let reversed = source.lex_ge_pieces(target)?;
    for basic in rel.iter() {
        for piece in &reversed {
            if !basic.intersect(piece)?.is_empty()? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Check `schedules` against every `Must` dependence and every `May`
/// dependence not between two reductions.
pub fn is_legal(scop: &Scop, deps: &DependenceSet, schedules: &ScheduleMap) -> bool {
    for (kind, s, t, rel) in constraining(scop, deps) {
        let (Some(ts), Some(tt)) = (schedules.get(&s), schedules.get(&t)) else {
            warn!("no schedule for {} or {}", s, t);
            return false;
        };
        match violated(rel, ts, tt) {
            Ok(false) => {}
            Ok(true) => {
                debug!("{} dependence {} -> {} violated", kind, s, t);
                return false;
            }
            Err(e) => {
                warn!("{} dependence {} -> {}: {}; assuming violated", kind, s, t, e);
                return false;
            }
        }
    }
    true
}

/// For each time dimension, whether some constraining dependence is carried
/// by it: its pairs agree on the outer dimensions and step forward here.
pub fn carried_dimensions(scop: &Scop, deps: &DependenceSet, schedules: &ScheduleMap) -> Vec<bool> {
    let n_time = schedules.values().map(AffineMap::n_out).max().unwrap_or(0);
    let mut carried = vec![false; n_time];
    for (kind, s, t, rel) in constraining(scop, deps) {
        let (Some(ts), Some(tt)) = (schedules.get(&s), schedules.get(&t)) else {
            continue;
        };
        let common = ts.n_out().min(tt.n_out());
        for (level, flag) in carried.iter_mut().enumerate().take(common) {
            if *flag {
                continue;
            }
            match carries(rel, ts, tt, level) {
                Ok(c) => *flag = c,
                Err(e) => {
                    warn!("{} dependence {} -> {} at level {}: {}", kind, s, t, level, e);
                    *flag = true;
                }
            }
        }
    }
    carried
}

fn carries(rel: &Relation, source: &AffineMap, target: &AffineMap, level: usize) -> PolyhedralResult<bool> {
    let forward = source.order_at(target, level, Ordering::Less)?;
    for basic in rel.iter() {
        if !basic.intersect(&forward)?.is_empty()? {
            return Ok(true);
        }
    }
    Ok(false)
}
