//! SCoP construction from a lifted region.
//!
//! Every block is lowered on its own. A block whose bounds, guards or
//! subscripts are not affine is excluded and the SCoP shrinks; that is a
//! normal outcome, reported but not an error. Ids are only allocated once a
//! block has passed all checks.

use crate::frontend::{
    ConstraintOp, LiftedAccess, LiftedAffine, LiftedBlock, LiftedBound, LiftedCondition,
    LiftedConstraint, LiftedRegion, LiftedSubscript,
};
use crate::ir::{BlackBox, DataRef, IdAllocator, Pbb, PdrKind, Pdr, Region, Scop};
use crate::polyhedral::{AffineExpr, AffineMap, BasicRelation, Constraint, IntegerSet, Space};
use crate::utils::errors::{ScoPError, ScoPErrorKind};
use log::{debug, info, warn};

/// What happened to the blocks of a region.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Indices of the blocks that became statements
    pub accepted: Vec<u32>,
    /// Why the other blocks were excluded
    pub rejected: Vec<ScoPError>,
}

/// Names visible in affine forms of one block.
struct Names<'b> {
    iterators: &'b [String],
    params: &'b [String],
}

impl Names<'_> {
    fn lower(&self, aff: &LiftedAffine, block: u32) -> Result<AffineExpr, ScoPError> {
        let mut expr = AffineExpr::constant(aff.constant, self.iterators.len(), self.params.len());
        for (name, &c) in &aff.coeffs {
            if let Some(pos) = self.iterators.iter().position(|it| it == name) {
                expr.coeffs[pos] += c;
            } else if let Some(pos) = self.params.iter().position(|p| p == name) {
                expr.param_coeffs[pos] += c;
            } else {
                return Err(ScoPError::new(
                    ScoPErrorKind::UnknownSymbol,
                    format!("unknown symbol {} in {}", name, aff),
                    Some(block),
                ));
            }
        }
        Ok(expr)
    }

    fn constraint(&self, c: &LiftedConstraint, block: u32) -> Result<Constraint, ScoPError> {
        let expr = self.lower(&c.expr, block)?;
        Ok(match c.op {
            ConstraintOp::Ge => Constraint::ge_zero(expr),
            ConstraintOp::Eq => Constraint::eq_zero(expr),
        })
    }
}

/// A block that passed every check.
struct LoweredBlock {
    domain: IntegerSet,
    schedule: AffineMap,
    accesses: Vec<LoweredAccess>,
}

struct LoweredAccess {
    kind: PdrKind,
    relation: BasicRelation,
    sizes: IntegerSet,
    data_ref: DataRef,
}

/// Builds SCoPs, drawing ids from an allocator.
pub struct ScopBuilder<'a> {
    ids: &'a IdAllocator,
}

impl ScopBuilder<'static> {
    /// A builder using the process-wide allocator.
    pub fn new() -> Self {
        Self { ids: IdAllocator::global() }
    }
}

impl Default for ScopBuilder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ScopBuilder<'a> {
    pub fn with_allocator(ids: &'a IdAllocator) -> Self {
        Self { ids }
    }

    /// Build the SCoP of a region. Returns `None` when no block survives.
    pub fn build(&self, lifted: &LiftedRegion) -> (Option<Scop>, BuildReport) {
        let mut report = BuildReport::default();
        let mut lowered: Vec<(&LiftedBlock, LoweredBlock)> = Vec::new();
        for block in &lifted.blocks {
            if let Some((other, _)) = lowered.iter().find(|(o, _)| o.shares_position_with(block)) {
                let e = ScoPError::new(
                    ScoPErrorKind::BadPosition,
                    format!("position {:?} is not ordered against block {}", block.position, other.index),
                    Some(block.index),
                );
                debug!("excluding block {} from {}: {}", block.index, lifted.name, e);
                report.rejected.push(e);
                continue;
            }
            match self.lower_block(lifted, block) {
                Ok(l) => lowered.push((block, l)),
                Err(e) => {
                    debug!("excluding block {} from {}: {}", block.index, lifted.name, e);
                    report.rejected.push(e);
                }
            }
        }

        if lowered.is_empty() {
            info!("no SCoP in {}: all {} blocks excluded", lifted.name, lifted.blocks.len());
            report.rejected.push(ScoPError::new(
                ScoPErrorKind::NoScoPFound,
                format!("no representable block in {}", lifted.name),
                None,
            ));
            return (None, report);
        }

        let region = Region::new(lifted.name.clone(), lifted.entry, lifted.exit, lifted.params.clone());
        let mut scop = Scop::new(self.ids.next_scop(), region);
        scop.param_context = self.context(lifted);

        for (block, lowered) in lowered {
            let black_box = BlackBox {
                bb_index: block.index,
                conditions: block.conditions.iter().map(|c| c.to_string()).collect(),
                cases: block.cases.clone(),
                body: block.body.clone(),
            };
            let mut pbb = Pbb::new(
                self.ids.next_pbb(),
                scop.id,
                black_box,
                block.iterators(),
                lowered.domain,
                lowered.schedule,
            );
            pbb.is_reduction = block.is_reduction;
            for acc in lowered.accesses {
                let data_ref = scop.region.add_data_ref(acc.data_ref);
                pbb.add_pdr(Pdr::new(self.ids.next_pdr(), acc.kind, acc.relation, acc.sizes, data_ref));
            }
            debug!("{} <- bb_{} ({} data references)", pbb.id, block.index, pbb.drs.len());
            report.accepted.push(block.index);
            scop.add_pbb(pbb);
        }

        info!(
            "built {} for {} with {} statements, {} blocks excluded",
            scop.id, lifted.name, scop.nb_statements(), report.rejected.len()
        );
        (Some(scop), report)
    }

    /// The parameter context; constraints that cannot be represented are
    /// dropped, which only weakens it.
    fn context(&self, lifted: &LiftedRegion) -> IntegerSet {
        let names = Names { iterators: &[], params: &lifted.params };
        let space = Space::set_with_params(0, lifted.params.len())
            .with_param_names(lifted.params.clone());
        let mut context = IntegerSet::universe(space);
        for cond in &lifted.context {
            match cond {
                LiftedCondition::Affine(c) => match names.constraint(c, 0) {
                    Ok(constraint) => context.add_constraint(constraint),
                    Err(e) => warn!("dropping context constraint {}: {}", c, e.message),
                },
                LiftedCondition::NonAffine(text) => {
                    warn!("dropping non-affine context constraint {}", text);
                }
            }
        }
        context
    }

    fn lower_block(&self, lifted: &LiftedRegion, block: &LiftedBlock) -> Result<LoweredBlock, ScoPError> {
        let depth = block.depth();
        let n_param = lifted.params.len();
        if block.position.len() != depth + 1 {
            return Err(ScoPError::new(
                ScoPErrorKind::BadPosition,
                format!("position of length {} at depth {}", block.position.len(), depth),
                Some(block.index),
            ));
        }

        let iterators = block.iterators();
        let names = Names { iterators: &iterators, params: &lifted.params };
        let tuple = format!("S_{}", block.index);

        let space = Space::set_with_params(depth, n_param)
            .with_dim_names(iterators.clone())
            .with_param_names(lifted.params.clone())
            .with_tuple(tuple.clone());
        let mut domain = IntegerSet::universe(space);

        for (k, l) in block.loops.iter().enumerate() {
            let it = AffineExpr::var(k, depth, n_param);
            match (&l.lower, &l.upper) {
                (LiftedBound::Affine(lower), LiftedBound::Affine(upper)) => {
                    domain.add_constraint(Constraint::ge(it.clone(), names.lower(lower, block.index)?));
                    domain.add_constraint(Constraint::lt(it, names.lower(upper, block.index)?));
                }
                (LiftedBound::NonAffine(text), _) | (_, LiftedBound::NonAffine(text)) => {
                    return Err(ScoPError::new(
                        ScoPErrorKind::NonAffineBound,
                        format!("bound {} of loop {} is not affine", text, l.iterator),
                        Some(block.index),
                    ));
                }
            }
        }

        for cond in &block.conditions {
            match cond {
                LiftedCondition::Affine(c) => domain.add_constraint(names.constraint(c, block.index)?),
                LiftedCondition::NonAffine(text) => {
                    return Err(ScoPError::new(
                        ScoPErrorKind::NonAffineCondition,
                        format!("condition {} is not affine", text),
                        Some(block.index),
                    ));
                }
            }
        }

        let schedule = AffineMap::original_schedule(&block.position, n_param)
            .with_tuples(tuple.clone(), None)
            .with_in_names(iterators.clone())
            .with_param_names(lifted.params.clone());

        let accesses = block.accesses.iter()
            .map(|acc| self.lower_access(lifted, block, &names, &tuple, acc))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LoweredBlock { domain, schedule, accesses })
    }

    fn lower_access(
        &self,
        lifted: &LiftedRegion,
        block: &LiftedBlock,
        names: &Names<'_>,
        tuple: &str,
        acc: &LiftedAccess,
    ) -> Result<LoweredAccess, ScoPError> {
        let depth = block.depth();
        let n_param = lifted.params.len();
        let n_sub = acc.subscripts.len();
        let n_var = depth + n_sub;

        let space = Space::map_with_params(depth, n_sub, n_param)
            .with_in_names(names.iterators.to_vec())
            .with_in_tuple(tuple)
            .with_tuple(acc.base.clone())
            .with_param_names(lifted.params.clone());
        let mut relation = BasicRelation::universe(space);

        for (k, sub) in acc.subscripts.iter().enumerate() {
            let o = AffineExpr::var(depth + k, n_var, n_param);
            match sub {
                LiftedSubscript::Affine(e) => {
                    let f = names.lower(e, block.index)?.lift(0, n_var);
                    relation.add_constraint(Constraint::eq(o, f));
                }
                LiftedSubscript::Range { lower, upper } => {
                    let lo = names.lower(lower, block.index)?.lift(0, n_var);
                    let hi = names.lower(upper, block.index)?.lift(0, n_var);
                    relation.add_constraint(Constraint::ge(o.clone(), lo));
                    relation.add_constraint(Constraint::le(o, hi));
                }
                LiftedSubscript::NonAffine(text) => {
                    return Err(ScoPError::new(
                        ScoPErrorKind::NonAffineSubscript,
                        format!("subscript {} of {} is not affine", text, acc.base),
                        Some(block.index),
                    ));
                }
            }
        }

        let params_only = Names { iterators: &[], params: &lifted.params };
        let sizes_space = Space::set_with_params(n_sub, n_param)
            .with_tuple(acc.base.clone())
            .with_param_names(lifted.params.clone());
        let mut sizes = IntegerSet::universe(sizes_space);
        for (k, extent) in acc.extents.iter().enumerate().take(n_sub) {
            if let Some(e) = extent {
                let bound = params_only.lower(e, block.index)?.lift(0, n_sub);
                sizes.add_constraint(Constraint::lower_bound(k, 0, n_sub, n_param));
                sizes.add_constraint(Constraint::lt(AffineExpr::var(k, n_sub, n_param), bound));
            }
        }

        Ok(LoweredAccess {
            kind: acc.kind,
            relation,
            sizes,
            data_ref: DataRef {
                base: acc.base.clone(),
                alias_set: acc.alias_set,
                text: acc.describe(),
                bb_index: block.index,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{LiftedAccess, LiftedLoop};

    fn n() -> LiftedAffine {
        LiftedAffine::var("N")
    }

    fn i() -> LiftedAffine {
        LiftedAffine::var("i")
    }

    fn region() -> LiftedRegion {
        LiftedRegion::new("f", vec!["N".to_string()])
            .with_block(
                LiftedBlock::new(3, vec![LiftedLoop::range("i", LiftedAffine::constant(0), n())], vec![0, 0])
                    .with_access(LiftedAccess::new(PdrKind::Write, "A", vec![i()]).with_extents(vec![Some(n())])),
            )
            .with_block(
                LiftedBlock::new(4, vec![LiftedLoop::range("i", LiftedAffine::constant(0), n())], vec![1, 0])
                    .with_access(LiftedAccess::new(PdrKind::Read, "A", vec![i()]))
                    .with_access(LiftedAccess::new(PdrKind::Write, "B", vec![i()])),
            )
    }

    #[test]
    fn test_build_two_statements() {
        let ids = IdAllocator::new();
        let (scop, report) = ScopBuilder::with_allocator(&ids).build(&region());
        let scop = scop.unwrap();
        assert_eq!(report.accepted, vec![3, 4]);
        assert_eq!(scop.nb_statements(), 2);
        assert_eq!(scop.statements[0].id.0, 0);
        assert_eq!(scop.statements[1].id.0, 1);
        assert_eq!(scop.statements[1].drs[1].id.0, 2);
        assert_eq!(scop.region.data_refs.len(), 3);

        let s0 = &scop.statements[0];
        assert_eq!(s0.domain.to_string(), "[N] -> { S_3[i] : i >= 0 and -i + N - 1 >= 0 }");
        assert_eq!(s0.schedule.apply(&[5], &[10]).unwrap(), vec![0, 5, 0]);
        assert!(s0.drs[0].is_exact());
        assert!(s0.drs[0].subscript_sizes.contains(&[9], &[10]));
        assert!(!s0.drs[0].subscript_sizes.contains(&[10], &[10]));
    }

    #[test]
    fn test_non_affine_block_is_excluded() {
        let mut lifted = region();
        lifted.blocks[1].accesses[0].subscripts[0] = LiftedSubscript::NonAffine("idx[i]".to_string());
        let ids = IdAllocator::new();
        let (scop, report) = ScopBuilder::with_allocator(&ids).build(&lifted);
        assert_eq!(scop.unwrap().nb_statements(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, ScoPErrorKind::NonAffineSubscript);
        assert_eq!(report.rejected[0].block, Some(4));
    }

    #[test]
    fn test_rejections() {
        let mut lifted = region();
        lifted.blocks[0].position = vec![0];
        lifted.blocks[1] = lifted.blocks[1].clone()
            .with_condition(LiftedCondition::NonAffine("i % 2 == 0".to_string()));
        let ids = IdAllocator::new();
        let (scop, report) = ScopBuilder::with_allocator(&ids).build(&lifted);
        assert!(scop.is_none());
        let kinds: Vec<_> = report.rejected.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![
            ScoPErrorKind::BadPosition,
            ScoPErrorKind::NonAffineCondition,
            ScoPErrorKind::NoScoPFound,
        ]);
        // Nothing was allocated for the excluded blocks
        assert_eq!(ids.next_pbb().0, 0);
    }

    #[test]
    fn test_shared_position_excluded() {
        let mut lifted = region();
        lifted.blocks[1].position = vec![0, 0];
        let ids = IdAllocator::new();
        let (scop, report) = ScopBuilder::with_allocator(&ids).build(&lifted);
        assert_eq!(scop.unwrap().nb_statements(), 1);
        assert_eq!(report.accepted, vec![3]);
        assert_eq!(report.rejected[0].kind, ScoPErrorKind::BadPosition);
        assert_eq!(report.rejected[0].block, Some(4));
    }

    #[test]
    fn test_unknown_symbol() {
        let mut lifted = region();
        lifted.blocks[0].accesses[0].subscripts[0] = LiftedSubscript::Affine(LiftedAffine::var("M"));
        let ids = IdAllocator::new();
        let (_, report) = ScopBuilder::with_allocator(&ids).build(&lifted);
        assert_eq!(report.rejected[0].kind, ScoPErrorKind::UnknownSymbol);
    }

    #[test]
    fn test_context_and_range_subscripts() {
        let mut lifted = region().with_context(LiftedCondition::Affine(LiftedConstraint {
            expr: n().offset(-1),
            op: ConstraintOp::Ge,
        }));
        lifted.blocks[1].accesses[0].subscripts[0] = LiftedSubscript::Range {
            lower: LiftedAffine::constant(0),
            upper: i(),
        };
        let ids = IdAllocator::new();
        let (scop, _) = ScopBuilder::with_allocator(&ids).build(&lifted);
        let scop = scop.unwrap();
        assert_eq!(scop.param_context.to_string(), "[N] -> {  : N - 1 >= 0 }");
        assert!(!scop.statements[1].drs[0].is_exact());
        assert!(scop.statements[1].drs[1].is_exact());
    }
}
