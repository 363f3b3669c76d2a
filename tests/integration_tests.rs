//! Integration tests for PolyScop
//!
//! These tests drive the public pipeline: lifted region in, SCoP built,
//! dependences computed, schedules proposed and committed, dumps printed.

use polyscop::analysis::ScopBuilder;
use polyscop::frontend::{LiftedAccess, LiftedAffine, LiftedBlock, LiftedLoop, LiftedRegion};
use polyscop::prelude::*;
use polyscop::transform::ScheduleInfo;
use polyscop::{build_scop, optimize};
use std::cmp::Ordering;

// ============================================================================
// Regions
// ============================================================================

const COPY_CHAIN_JSON: &str = r#"{
  "name": "init_then_copy", "entry": 2, "exit": 5, "params": ["N"],
  "blocks": [
    { "index": 3, "position": [0, 0],
      "loops": [{ "iterator": "i", "lower": { "affine": {} }, "upper": { "affine": { "coeffs": { "N": 1 } } } }],
      "accesses": [{ "kind": "write", "base": "A", "subscripts": [{ "affine": { "coeffs": { "i": 1 } } }] }],
      "body": "A[i] = 0;" },
    { "index": 4, "position": [1, 0],
      "loops": [{ "iterator": "i", "lower": { "affine": {} }, "upper": { "affine": { "coeffs": { "N": 1 } } } }],
      "accesses": [
        { "kind": "read", "base": "A", "subscripts": [{ "affine": { "coeffs": { "i": 1 } } }] },
        { "kind": "write", "base": "B", "subscripts": [{ "affine": { "coeffs": { "i": 1 } } }] }
      ],
      "body": "B[i] = A[i] + 1;" }
  ]
}"#;

fn n() -> LiftedAffine {
    LiftedAffine::var("N")
}

fn var(name: &str) -> LiftedAffine {
    LiftedAffine::var(name)
}

fn to_n(it: &str, lower: i64) -> LiftedLoop {
    LiftedLoop::range(it, LiftedAffine::constant(lower), n())
}

fn nest_region(name: &str, lower: i64, accesses: Vec<LiftedAccess>) -> LiftedRegion {
    let mut block = LiftedBlock::new(3, vec![to_n("i", lower), to_n("j", lower)], vec![0, 0, 0]);
    block.accesses = accesses;
    LiftedRegion::new(name, vec!["N".to_string()]).with_block(block)
}

/// `A[i][j] = A[i - 1][j] + A[i][j - 1]`
fn stencil() -> LiftedRegion {
    nest_region("stencil", 1, vec![
        LiftedAccess::new(PdrKind::Read, "A", vec![var("i").offset(-1), var("j")]),
        LiftedAccess::new(PdrKind::Read, "A", vec![var("i"), var("j").offset(-1)]),
        LiftedAccess::new(PdrKind::Write, "A", vec![var("i"), var("j")]),
    ])
}

/// `A[i + 1][j] = A[i][j + 1]`
fn skewed() -> LiftedRegion {
    nest_region("skewed", 0, vec![
        LiftedAccess::new(PdrKind::Read, "A", vec![var("i"), var("j").offset(1)]),
        LiftedAccess::new(PdrKind::Write, "A", vec![var("i").offset(1), var("j")]),
    ])
}

/// `A[j][i] += 1`
fn column_walk() -> LiftedRegion {
    nest_region("column_walk", 0, vec![
        LiftedAccess::new(PdrKind::Read, "A", vec![var("j"), var("i")]),
        LiftedAccess::new(PdrKind::Write, "A", vec![var("j"), var("i")]),
    ])
}

/// `A[i] = 0;` then `for i, j: B[i][j] = A[j];`
fn broadcast() -> LiftedRegion {
    LiftedRegion::new("broadcast", vec!["N".to_string()])
        .with_block(
            LiftedBlock::new(3, vec![to_n("i", 0)], vec![0, 0])
                .with_access(LiftedAccess::new(PdrKind::Write, "A", vec![var("i")])),
        )
        .with_block(
            LiftedBlock::new(4, vec![to_n("i", 0), to_n("j", 0)], vec![1, 0, 0])
                .with_access(LiftedAccess::new(PdrKind::Read, "A", vec![var("j")]))
                .with_access(LiftedAccess::new(PdrKind::Write, "B", vec![var("i"), var("j")])),
        )
}

fn build(region: &LiftedRegion) -> Scop {
    let ids = IdAllocator::new();
    let (scop, report) = ScopBuilder::with_allocator(&ids).build(region);
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    scop.expect("region has statements")
}

fn config(policy: SchedulePolicy) -> OptimizationConfig {
    OptimizationConfig { policy, ..Default::default() }
}

// ============================================================================
// Brute-force oracle
// ============================================================================

const SIZE: i64 = 4;

/// Concrete memory location of an exact access at one iteration.
fn location(pdr: &Pdr, point: &[i64], params: &[i64]) -> Vec<i64> {
    (0..pdr.nb_subscripts)
        .map(|k| pdr.subscript_expr(k).expect("exact access").evaluate(point, params).unwrap())
        .collect()
}

fn before(a: &[i64], b: &[i64]) -> bool {
    a.iter().zip(b).map(|(x, y)| x.cmp(y)).find(|o| *o != Ordering::Equal) == Some(Ordering::Less)
}

fn instances(pbb: &Pbb, params: &[i64]) -> Vec<Vec<i64>> {
    pbb.domain.points(params, 10_000).unwrap()
}

/// Every conflicting, ordered instance pair appears in exactly one relation
/// of its hazard, and that relation is a `Must` one.
fn check_against_oracle(scop: &Scop, deps: &DependenceSet) {
    let params = [SIZE];
    let mut found = 0;
    for s in &scop.statements {
        for t in &scop.statements {
            for x in instances(s, &params) {
                for y in instances(t, &params) {
                    if !before(&s.schedule.apply(&x, &params).unwrap(), &t.schedule.apply(&y, &params).unwrap()) {
                        continue;
                    }
                    for a in &s.drs {
                        for b in &t.drs {
                            let Some(hazard) = Hazard::of(a.kind, b.kind) else { continue };
                            if base(scop, a) != base(scop, b)
                                || location(a, &x, &params) != location(b, &y, &params)
                            {
                                continue;
                            }
                            let kinds: Vec<_> = deps
                                .kinds_relating(s.id, t.id, &x, &y, &params)
                                .into_iter()
                                .filter(|k| k.hazard == hazard)
                                .collect();
                            assert_eq!(kinds.len(), 1, "{:?} {:?} -> {:?} {:?}: {:?}", s.id, x, t.id, y, kinds);
                            assert!(kinds[0].is_must());
                            found += 1;
                        }
                    }
                }
            }
        }
    }
    assert!(found > 0);
}

fn base<'s>(scop: &'s Scop, pdr: &Pdr) -> &'s str {
    &scop.region.data_ref(pdr.data_ref).expect("registered data ref").base
}

/// Every constraining pair runs in order under the effective schedules.
fn check_schedule_respects(scop: &Scop) {
    let deps = scop.dependences.as_ref().expect("dependences computed");
    let params = [SIZE];
    let reduction = |id: PbbId| scop.pbb(id).is_some_and(|p: &Pbb| p.is_reduction);
    for (kind, s, t, rel) in deps.constraining(reduction) {
        let ts = scop.pbb(s).unwrap().effective_schedule();
        let tt = scop.pbb(t).unwrap().effective_schedule();
        for (x, y) in rel.points(&params, 100_000).unwrap() {
            assert!(
                before(&ts.apply(&x, &params).unwrap(), &tt.apply(&y, &params).unwrap()),
                "{} pair {:?} -> {:?} out of order",
                kind, x, y
            );
        }
    }
}

// ============================================================================
// Frontend
// ============================================================================

#[test]
fn test_parse_region() {
    let region = parse_region(COPY_CHAIN_JSON).unwrap();
    assert_eq!(region.name, "init_then_copy");
    assert_eq!(region.params, vec!["N".to_string()]);
    assert_eq!(region.blocks.len(), 2);
    assert_eq!(region.blocks[1].accesses.len(), 2);
    assert_eq!(region.blocks[1].body.as_deref(), Some("B[i] = A[i] + 1;"));
}

#[test]
fn test_parse_region_rejects_duplicate_blocks() {
    let json = r#"{ "name": "dup", "entry": 0, "exit": 1,
        "blocks": [{ "index": 3, "position": [0] }, { "index": 3, "position": [1] }] }"#;
    assert!(parse_region(json).is_err());
}

#[test]
fn test_parse_region_rejects_unordered_blocks() {
    // Writer and reader in the same slot of the same loop
    let json = COPY_CHAIN_JSON.replace(r#""position": [1, 0]"#, r#""position": [0, 0]"#);
    let err = parse_region(&json).unwrap_err();
    assert!(err.to_string().contains("share position"), "{}", err);

    // Built directly, the second block is excluded instead
    let mut region = parse_region(COPY_CHAIN_JSON).unwrap();
    region.blocks[1].position = vec![0, 0];
    let ids = IdAllocator::new();
    let (scop, report) = ScopBuilder::with_allocator(&ids).build(&region);
    assert_eq!(scop.unwrap().nb_statements(), 1);
    assert_eq!(report.accepted, vec![3]);
}

#[test]
fn test_parse_region_malformed() {
    assert!(parse_region("{ \"name\": ").is_err());
}

// ============================================================================
// SCoP construction
// ============================================================================

#[test]
fn test_build_copy_chain() {
    let scop = build_scop(&parse_region(COPY_CHAIN_JSON).unwrap()).unwrap();
    assert_eq!(scop.nb_statements(), 2);
    assert_eq!(scop.nb_params(), 1);
    for pbb in &scop.statements {
        assert_eq!(pbb.dim(), 1);
        assert_eq!(pbb.schedule.n_out(), 3);
        assert_eq!(pbb.scop, scop.id);
        assert!(pbb.drs.iter().all(|pdr| pdr.accesses.n_in() == pbb.dim()));
    }
    assert_eq!(scop.statements[1].nb_reads(), 1);
    assert_eq!(scop.statements[1].nb_writes(), 1);
    assert_eq!(instances(&scop.statements[0], &[SIZE]).len(), SIZE as usize);
}

#[test]
fn test_non_affine_block_excluded() {
    let json = r#"{
      "name": "partly", "entry": 0, "exit": 9, "params": ["N"],
      "blocks": [
        { "index": 3, "position": [0, 0],
          "loops": [{ "iterator": "i", "lower": { "affine": {} }, "upper": { "affine": { "coeffs": { "N": 1 } } } }] },
        { "index": 4, "position": [1, 0],
          "loops": [{ "iterator": "i", "lower": { "affine": {} }, "upper": { "non_affine": "N * N" } }] }
      ]
    }"#;
    let region = parse_region(json).unwrap();
    let ids = IdAllocator::new();
    let (scop, report) = ScopBuilder::with_allocator(&ids).build(&region);
    let scop = scop.unwrap();
    assert_eq!(scop.nb_statements(), 1);
    assert_eq!(scop.statements[0].index(), 3);
    assert_eq!(report.accepted, vec![3]);
    assert_eq!(report.rejected.len(), 1);
}

#[test]
fn test_ids_unique_and_increasing() {
    let ids = IdAllocator::new();
    let builder = ScopBuilder::with_allocator(&ids);
    let first = builder.build(&broadcast()).0.unwrap();
    let second = builder.build(&stencil()).0.unwrap();
    assert!(first.id < second.id);

    let pbbs: Vec<_> = first.statements.iter().chain(&second.statements).map(|p| p.id).collect();
    assert!(pbbs.windows(2).all(|w| w[0] < w[1]));

    let pdrs: Vec<_> = first.pdrs().chain(second.pdrs()).map(|(_, pdr)| pdr.id).collect();
    assert_eq!(pdrs.len(), 6);
    assert!(pdrs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_iteration_count_at_time() {
    let scop = build(&broadcast());
    let nest = &scop.statements[1];
    assert_eq!(nest.number_of_iterations_at_time(1, &[SIZE]).unwrap(), Some(SIZE));
    assert_eq!(nest.number_of_iterations_at_time(3, &[SIZE]).unwrap(), Some(SIZE));
    assert_eq!(nest.number_of_iterations_at_time(1, &[0]).unwrap(), None);
}

// ============================================================================
// Dependences
// ============================================================================

#[test]
fn test_copy_chain_dependences() {
    let scop = build(&parse_region(COPY_CHAIN_JSON).unwrap());
    let deps = compute_dependences(&scop);
    let (w, r) = (scop.statements[0].id, scop.statements[1].id);

    let raw = DependenceKind::new(Hazard::Raw, Precision::Must, SourceTracking::WithSource);
    let rel = deps.relation(raw, w, r).expect("must RAW from the writer to the reader");
    for i in 0..SIZE {
        assert!(rel.contains(&[i], &[i], &[SIZE]));
        assert!(!rel.contains(&[i], &[i + 1], &[SIZE]));
    }
    assert!(!rel.contains(&[SIZE], &[SIZE], &[SIZE]));

    let summary = deps.summary();
    let count = |k: DependenceKind| summary.iter().find(|(kind, _)| *kind == k).map(|(_, n)| *n).unwrap();
    assert_eq!(count(raw), 1);
    for kind in DependenceKind::all() {
        if kind.hazard != Hazard::Raw {
            assert_eq!(count(kind), 0, "{}", kind);
        }
    }
}

#[test]
fn test_dependences_match_oracle() {
    for region in [parse_region(COPY_CHAIN_JSON).unwrap(), stencil(), skewed(), broadcast()] {
        let scop = build(&region);
        check_against_oracle(&scop, &compute_dependences(&scop));
    }
}

#[test]
fn test_may_write_gives_may() {
    let scop = build(&nest_region("maybe", 0, vec![
        LiftedAccess::new(PdrKind::MayWrite, "A", vec![var("i")]),
        LiftedAccess::new(PdrKind::Read, "A", vec![var("i")]),
    ]));
    let deps = compute_dependences(&scop);
    assert!(!deps.is_empty());
    for (kind, map) in deps.iter() {
        if !map.is_empty() {
            assert!(!kind.is_must(), "{}", kind);
        }
    }
}

#[test]
fn test_aliasing_bases_no_source() {
    let region = LiftedRegion::new("alias", vec!["N".to_string()])
        .with_block(
            LiftedBlock::new(3, vec![to_n("i", 0)], vec![0, 0])
                .with_access(LiftedAccess::new(PdrKind::Write, "p", vec![var("i")]).with_alias_set(1)),
        )
        .with_block(
            LiftedBlock::new(4, vec![to_n("i", 0)], vec![1, 0])
                .with_access(LiftedAccess::new(PdrKind::Read, "q", vec![var("i")]).with_alias_set(1)),
        );
    let scop = build(&region);
    let deps = compute_dependences(&scop);
    let (w, r) = (scop.statements[0].id, scop.statements[1].id);
    let kinds = deps.kinds_relating(w, r, &[0], &[SIZE - 1], &[SIZE]);
    assert_eq!(
        kinds,
        vec![DependenceKind::new(Hazard::Raw, Precision::May, SourceTracking::NoSource)]
    );
}

#[test]
fn test_distinct_arrays_independent() {
    let scop = build(&nest_region("disjoint", 0, vec![
        LiftedAccess::new(PdrKind::Read, "A", vec![var("i"), var("j")]),
        LiftedAccess::new(PdrKind::Write, "B", vec![var("i"), var("j")]),
    ]));
    assert!(compute_dependences(&scop).is_empty());
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_parallelize_copy_chain() {
    let mut scop = build_scop(&parse_region(COPY_CHAIN_JSON).unwrap()).unwrap();
    assert!(optimize(&mut scop, &config(SchedulePolicy::ParallelizeAll)).unwrap());
    let info: &ScheduleInfo = scop.schedule_info.as_ref().unwrap();
    assert!(info.is_parallel_loop(0));

    // The writer still runs before the reader
    let (w, r) = (&scop.statements[0], &scop.statements[1]);
    for i in 0..SIZE {
        let tw = w.effective_schedule().apply(&[i], &[SIZE]).unwrap();
        let tr = r.effective_schedule().apply(&[i], &[SIZE]).unwrap();
        assert!(before(&tw, &tr));
    }
    check_schedule_respects(&scop);
}

#[test]
fn test_identity_idempotent() {
    let mut scop = build(&stencil());
    let identity = config(SchedulePolicy::Identity);
    assert!(optimize(&mut scop, &identity).unwrap());
    let once = scop_to_string(&scop, 2);
    assert!(optimize(&mut scop, &identity).unwrap());
    assert_eq!(scop_to_string(&scop, 2), once);
    for pbb in &scop.statements {
        assert_eq!(pbb.transformed(), Some(&pbb.schedule));
        assert!(matches!(pbb.state, ScheduleState::Committed { .. }));
    }
}

#[test]
fn test_optimize_interchanges_column_walk() {
    let mut scop = build(&column_walk());
    assert!(optimize(&mut scop, &OptimizationConfig::default()).unwrap());
    let info = scop.schedule_info.as_ref().unwrap();
    assert_eq!(info.permutation.as_slice(), &[1, 0]);
    assert!(scop.is_optimized);
    check_schedule_respects(&scop);
}

#[test]
fn test_optimize_twice_keeps_interchange() {
    let mut scop = build(&column_walk());
    assert!(optimize(&mut scop, &OptimizationConfig::default()).unwrap());
    let first = scop.statements[0].effective_schedule().clone();

    assert!(!optimize(&mut scop, &OptimizationConfig::default()).unwrap());
    assert_eq!(scop.statements[0].effective_schedule(), &first);
    assert_eq!(first.apply(&[1, 2], &[SIZE]).unwrap(), vec![0, 2, 0, 1, 0]);
    assert_eq!(scop.schedule_info.as_ref().unwrap().locality_cost, 2);
    check_schedule_respects(&scop);
}

#[test]
fn test_illegal_interchange_rejected() {
    let mut scop = build(&skewed());
    assert!(!optimize(&mut scop, &OptimizationConfig::default()).unwrap());
    assert!(scop.statements.iter().all(|pbb| pbb.state == ScheduleState::Original));

    let mut scop = build(&skewed());
    assert!(optimize(&mut scop, &config(SchedulePolicy::ParallelizeAll)).unwrap());
    let info = scop.schedule_info.as_ref().unwrap();
    assert!(info.permutation.is_identity());
    check_schedule_respects(&scop);
}

#[test]
fn test_schedules_stay_legal() {
    for policy in [SchedulePolicy::Identity, SchedulePolicy::ParallelizeAll, SchedulePolicy::Optimize] {
        for region in [stencil(), skewed(), column_walk(), broadcast()] {
            let mut scop = build(&region);
            optimize(&mut scop, &config(policy)).unwrap();
            check_schedule_respects(&scop);
        }
    }
}

#[test]
fn test_transformed_schedule_covers_domain() {
    let mut scop = build(&broadcast());
    optimize(&mut scop, &config(SchedulePolicy::ParallelizeAll)).unwrap();
    for pbb in &scop.statements {
        let schedule = pbb.effective_schedule();
        assert_eq!(schedule.n_in(), pbb.dim());
        let domain = instances(pbb, &[SIZE]);
        let image = pbb.domain.apply(schedule).unwrap().points(&[SIZE], 10_000).unwrap();
        assert_eq!(image.len(), domain.len());
    }
}

#[test]
fn test_empty_scop_not_scheduled() {
    let region = parse_region(COPY_CHAIN_JSON).unwrap();
    let mut scop = build(&region);
    scop.statements.clear();
    assert!(!Scheduler::new(SchedulePolicy::ParallelizeAll).schedule(&mut scop).unwrap());
    assert!(!scop.is_optimized);
}

#[test]
fn test_propose_then_rollback() {
    let mut scop = build(&column_walk());
    assert!(Scheduler::new(SchedulePolicy::Optimize).schedule(&mut scop).unwrap());
    assert!(scop.statements.iter().all(Pbb::is_proposed));

    assert_eq!(scop.rollback_all(), 1);
    assert!(!scop.is_optimized);
    let pbb = &scop.statements[0];
    assert_eq!(pbb.state, ScheduleState::Original);
    assert_eq!(pbb.effective_schedule(), &pbb.schedule);
}

#[test]
fn test_rollback_keeps_committed() {
    let mut scop = build(&column_walk());
    assert!(optimize(&mut scop, &OptimizationConfig::default()).unwrap());
    let committed = scop.statements[0].effective_schedule().clone();
    assert_ne!(committed, scop.statements[0].schedule);

    let original = scop.statements[0].schedule.clone();
    scop.statements[0].propose(original).unwrap();
    scop.rollback_all();
    assert_eq!(scop.statements[0].effective_schedule(), &committed);
}

// ============================================================================
// Printing
// ============================================================================

#[test]
fn test_dump_deterministic() {
    let mut scop = build(&parse_region(COPY_CHAIN_JSON).unwrap());
    optimize(&mut scop, &config(SchedulePolicy::ParallelizeAll)).unwrap();
    for verbosity in 0..=2 {
        let text = scop_to_string(&scop, verbosity);
        assert_eq!(text, scop_to_string(&scop.clone(), verbosity));
        assert!(text.trim_end().ends_with("#)"));
    }
    assert!(scop_to_string(&scop, 0).contains("S_4[i]"));
}

#[test]
fn test_dependence_dump_lists_all_kinds() {
    let scop = build(&stencil());
    let deps = compute_dependences(&scop);
    let mut out = String::new();
    polyscop::utils::poly_print::print_dependences(&mut out, &deps).unwrap();
    for kind in DependenceKind::all() {
        assert!(out.contains(&format!("\n{} ", kind.name())), "{}", kind);
    }
}
