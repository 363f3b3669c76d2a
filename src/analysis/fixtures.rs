//! Small SCoPs shared by unit tests.

use crate::analysis::ScopBuilder;
use crate::frontend::{LiftedAccess, LiftedAffine, LiftedBlock, LiftedLoop, LiftedRegion};
use crate::ir::{IdAllocator, PdrKind, Scop};

fn n() -> LiftedAffine {
    LiftedAffine::var("N")
}

fn var(name: &str) -> LiftedAffine {
    LiftedAffine::var(name)
}

fn loop_to_n(it: &str) -> LiftedLoop {
    LiftedLoop::range(it, LiftedAffine::constant(0), n())
}

pub fn build(region: &LiftedRegion) -> Scop {
    let ids = IdAllocator::new();
    let (scop, report) = ScopBuilder::with_allocator(&ids).build(region);
    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    scop.expect("fixture region has statements")
}

/// `for i: A[i] = 0;` then `for i: B[i] = A[i] + 1;`
pub fn copy_chain_region() -> LiftedRegion {
    LiftedRegion::new("copy_chain", vec!["N".to_string()])
        .with_block(
            LiftedBlock::new(3, vec![loop_to_n("i")], vec![0, 0])
                .with_access(LiftedAccess::new(PdrKind::Write, "A", vec![var("i")]).with_extents(vec![Some(n())]))
                .with_body("A[i] = 0;"),
        )
        .with_block(
            LiftedBlock::new(4, vec![loop_to_n("i")], vec![1, 0])
                .with_access(LiftedAccess::new(PdrKind::Read, "A", vec![var("i")]).with_extents(vec![Some(n())]))
                .with_access(LiftedAccess::new(PdrKind::Write, "B", vec![var("i")]).with_extents(vec![Some(n())]))
                .with_body("B[i] = A[i] + 1;"),
        )
}

pub fn copy_chain() -> Scop {
    build(&copy_chain_region())
}

/// One statement in `for i in 0..N` with the given accesses.
pub fn single_statement(accesses: Vec<LiftedAccess>) -> Scop {
    let mut block = LiftedBlock::new(3, vec![loop_to_n("i")], vec![0, 0]);
    block.accesses = accesses;
    build(&LiftedRegion::new("single", vec!["N".to_string()]).with_block(block))
}

/// One statement in `for i in 0..N, j in 0..N` with the given accesses.
pub fn nest(accesses: Vec<LiftedAccess>) -> Scop {
    let mut block = LiftedBlock::new(3, vec![loop_to_n("i"), loop_to_n("j")], vec![0, 0, 0]);
    block.accesses = accesses;
    build(&LiftedRegion::new("nest", vec!["N".to_string()]).with_block(block))
}

/// `for i: A[i] = 0;` then `for i, j: s += A[j];`
pub fn row_broadcast() -> Scop {
    let region = LiftedRegion::new("row_broadcast", vec!["N".to_string()])
        .with_block(
            LiftedBlock::new(3, vec![loop_to_n("i")], vec![0, 0])
                .with_access(LiftedAccess::new(PdrKind::Write, "A", vec![var("i")])),
        )
        .with_block(
            LiftedBlock::new(4, vec![loop_to_n("i"), loop_to_n("j")], vec![1, 0, 0])
                .with_access(LiftedAccess::new(PdrKind::Read, "A", vec![var("j")])),
        );
    build(&region)
}

/// `for i, j: A[j][i] += 1;` walks memory column-wise.
pub fn column_walk() -> Scop {
    nest(vec![
        LiftedAccess::new(PdrKind::Read, "A", vec![var("j"), var("i")]),
        LiftedAccess::new(PdrKind::Write, "A", vec![var("j"), var("i")]),
    ])
}

/// `for i, j: A[i + 1][j] = A[i][j + 1];` carries a `(1, -1)` dependence.
pub fn skewed_recurrence() -> Scop {
    nest(vec![
        LiftedAccess::new(PdrKind::Read, "A", vec![var("i"), var("j").offset(1)]),
        LiftedAccess::new(PdrKind::Write, "A", vec![var("i").offset(1), var("j")]),
    ])
}
