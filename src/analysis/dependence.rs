//! Dependence analysis for polyhedral programs.
//!
//! For every ordered pair of data references that may touch the same memory,
//! the analysis computes the pairs of statement instances `(i, j)` such that
//! the source instance `i` runs before the target instance `j` in the
//! original schedule and both access a common location. Relations are
//! classified by:
//! - hazard: read-after-write, write-after-read, write-after-write
//! - precision: `Must` when the conflict is certain, `May` when it is only
//!   possible
//! - source tracking: whether the relation came from the access functions
//!   (`WithSource`) or only from the iteration domains (`NoSource`)
//!
//! When the precise computation fails, the pair falls back to the coarse
//! `May`/`NoSource` relation, which over-approximates and keeps every later
//! legality check conservative.

use crate::ir::{Pbb, PbbId, Pdr, PdrKind, Scop};
use crate::polyhedral::{BasicRelation, Relation, Space};
use crate::utils::errors::PolyhedralResult;
use log::{debug, trace, warn};
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::fmt;

/// The order in which two accesses touch memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hazard {
    /// Read after write (flow)
    Raw,
    /// Write after read (anti)
    War,
    /// Write after write (output)
    Waw,
}

impl Hazard {
    /// The hazard between a source access and a later target access; reads
    /// after reads carry none.
    pub fn of(source: PdrKind, target: PdrKind) -> Option<Hazard> {
        match (source.is_write(), target.is_write()) {
            (true, false) => Some(Hazard::Raw),
            (false, true) => Some(Hazard::War),
            (true, true) => Some(Hazard::Waw),
            (false, false) => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Hazard::Raw => 0,
            Hazard::War => 1,
            Hazard::Waw => 2,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Hazard::Raw => "raw",
            Hazard::War => "war",
            Hazard::Waw => "waw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Precision {
    Must,
    May,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceTracking {
    WithSource,
    NoSource,
}

/// One of the twelve dependence classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependenceKind {
    pub hazard: Hazard,
    pub precision: Precision,
    pub source: SourceTracking,
}

impl DependenceKind {
    pub const fn new(hazard: Hazard, precision: Precision, source: SourceTracking) -> Self {
        Self { hazard, precision, source }
    }

    /// All kinds in reporting order: per hazard, must, may, must without
    /// source, may without source.
    pub fn all() -> [DependenceKind; 12] {
        let mut kinds = [DependenceKind::new(Hazard::Raw, Precision::Must, SourceTracking::WithSource); 12];
        for hazard in [Hazard::Raw, Hazard::War, Hazard::Waw] {
            for source in [SourceTracking::WithSource, SourceTracking::NoSource] {
                for precision in [Precision::Must, Precision::May] {
                    let kind = DependenceKind::new(hazard, precision, source);
                    kinds[kind.index()] = kind;
                }
            }
        }
        kinds
    }

    fn index(self) -> usize {
        let source = match self.source {
            SourceTracking::WithSource => 0,
            SourceTracking::NoSource => 2,
        };
        let precision = match self.precision {
            Precision::Must => 0,
            Precision::May => 1,
        };
        self.hazard.index() * 4 + source + precision
    }

    pub fn is_must(self) -> bool {
        self.precision == Precision::Must
    }

    /// Name such as `must_raw` or `may_waw_no_source`.
    pub fn name(self) -> String {
        let precision = if self.is_must() { "must" } else { "may" };
        match self.source {
            SourceTracking::WithSource => format!("{}_{}", precision, self.hazard.name()),
            SourceTracking::NoSource => format!("{}_{}_no_source", precision, self.hazard.name()),
        }
    }
}

impl fmt::Display for DependenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dependence relations of one kind, keyed by (source, target) statement.
pub type DependenceMap = BTreeMap<(PbbId, PbbId), Relation>;

/// The twelve dependence maps of a SCoP. Every kind is always present,
/// possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependenceSet {
    maps: Vec<DependenceMap>,
}

impl Default for DependenceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DependenceSet {
    pub fn new() -> Self {
        Self { maps: vec![DependenceMap::new(); 12] }
    }

    pub fn get(&self, kind: DependenceKind) -> &DependenceMap {
        &self.maps[kind.index()]
    }

    /// Add one piece to the relation of `kind` between two statements.
    pub fn record(
        &mut self,
        kind: DependenceKind,
        source: PbbId,
        target: PbbId,
        piece: BasicRelation,
    ) -> PolyhedralResult<()> {
        self.maps[kind.index()]
            .entry((source, target))
            .or_insert_with(|| Relation::empty(piece.space.clone()))
            .add_basic(piece)
    }

    pub fn relation(&self, kind: DependenceKind, source: PbbId, target: PbbId) -> Option<&Relation> {
        self.get(kind).get(&(source, target))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DependenceKind, &DependenceMap)> {
        DependenceKind::all().into_iter().map(move |kind| (kind, self.get(kind)))
    }

    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(|m| m.is_empty())
    }

    /// Number of basic relations per kind, in reporting order.
    pub fn summary(&self) -> Vec<(DependenceKind, usize)> {
        self.iter()
            .map(|(kind, map)| (kind, map.values().map(Relation::n_basic).sum()))
            .collect()
    }

    /// The kinds whose relation from `source` to `target` holds the instance
    /// pair `(input, output)` for the given parameter values.
    pub fn kinds_relating(
        &self,
        source: PbbId,
        target: PbbId,
        input: &[i64],
        output: &[i64],
        params: &[i64],
    ) -> Vec<DependenceKind> {
        self.iter()
            .filter(|(_, map)| {
                map.get(&(source, target))
                    .is_some_and(|rel| rel.contains(input, output, params))
            })
            .map(|(kind, _)| kind)
            .collect()
    }

    /// The relations a schedule must respect: all `Must` relations, and the
    /// `May` relations unless both ends are reductions.
    pub fn constraining(&self, is_reduction: impl Fn(PbbId) -> bool) -> Vec<(DependenceKind, PbbId, PbbId, &Relation)> {
        let mut out = Vec::new();
        for (kind, map) in self.iter() {
            for (&(s, t), rel) in map {
                if kind.is_must() || !(is_reduction(s) && is_reduction(t)) {
                    out.push((kind, s, t, rel));
                }
            }
        }
        out
    }
}

/// How the relation of an access pair is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pairing {
    /// Same object, same number of subscripts: compose the accesses
    Precise,
    /// Only the iteration domains are known to be involved
    Coarse(Precision),
}

/// Dependence analyzer over one SCoP.
pub struct DependenceAnalysis<'s> {
    scop: &'s Scop,
}

impl<'s> DependenceAnalysis<'s> {
    pub fn new(scop: &'s Scop) -> Self {
        Self { scop }
    }

    /// Compute the dependence relations of every ordered pair of data
    /// references, including a reference with itself.
    pub fn analyze(&self) -> DependenceSet {
        let mut deps = DependenceSet::new();
        for source in &self.scop.statements {
            for target in &self.scop.statements {
                for a in &source.drs {
                    for b in &target.drs {
                        self.analyze_pair(&mut deps, source, a, target, b);
                    }
                }
            }
        }
        for (kind, count) in deps.summary() {
            if count > 0 {
                debug!("{}: {} {} relation pieces", self.scop.id, count, kind);
            }
        }
        deps
    }

    fn analyze_pair(&self, deps: &mut DependenceSet, source: &Pbb, a: &Pdr, target: &Pbb, b: &Pdr) {
        let Some(hazard) = Hazard::of(a.kind, b.kind) else { return };
        let Some(pairing) = self.pairing(a, b) else { return };
        trace!("{}:{} -> {}:{} ({:?})", source.id, a.id, target.id, b.id, pairing);

        match pairing {
            Pairing::Precise => {
                let precision = if a.kind != PdrKind::MayWrite
                    && b.kind != PdrKind::MayWrite
                    && a.is_exact()
                    && b.is_exact()
                {
                    Precision::Must
                } else {
                    Precision::May
                };
                let kind = DependenceKind::new(hazard, precision, SourceTracking::WithSource);
                match self.precise_pieces(source, a, target, b) {
                    Ok(pieces) => {
                        for piece in pieces {
                            self.store(deps, kind, source, target, piece);
                        }
                    }
                    Err(e) => {
                        warn!("{} -> {}: {}; falling back to a coarse relation", a.id, b.id, e);
                        let kind = DependenceKind::new(hazard, Precision::May, SourceTracking::NoSource);
                        self.record_coarse(deps, kind, source, target);
                    }
                }
            }
            Pairing::Coarse(precision) => {
                let kind = DependenceKind::new(hazard, precision, SourceTracking::NoSource);
                self.record_coarse(deps, kind, source, target);
            }
        }
    }

    fn pairing(&self, a: &Pdr, b: &Pdr) -> Option<Pairing> {
        let ra = self.scop.region.data_ref(a.data_ref)?;
        let rb = self.scop.region.data_ref(b.data_ref)?;
        if ra.base == rb.base {
            if a.nb_subscripts == b.nb_subscripts {
                Some(Pairing::Precise)
            } else if a.kind != PdrKind::MayWrite && b.kind != PdrKind::MayWrite {
                Some(Pairing::Coarse(Precision::Must))
            } else {
                Some(Pairing::Coarse(Precision::May))
            }
        } else if ra.alias_set != 0 && ra.alias_set == rb.alias_set {
            Some(Pairing::Coarse(Precision::May))
        } else {
            None
        }
    }

    /// `{ i -> j : A_a(i) = A_b(j), i in D_s, j in D_t, i before j }`, one
    /// piece per deciding schedule level.
    fn precise_pieces(&self, source: &Pbb, a: &Pdr, target: &Pbb, b: &Pdr) -> PolyhedralResult<Vec<BasicRelation>> {
        let acc_a = a.accesses
            .intersect_domain(&source.domain)?
            .intersect_range(&a.subscript_sizes)?;
        let acc_b = b.accesses
            .intersect_domain(&target.domain)?
            .intersect_range(&b.subscript_sizes)?;
        let conflict = acc_a.apply_range(&acc_b.reverse())?;
        self.ordered_pieces(&self.with_context(conflict), source, target)
    }

    /// `{ i -> j : i in D_s, j in D_t }` restricted to the context.
    fn domain_product(&self, source: &Pbb, target: &Pbb) -> PolyhedralResult<BasicRelation> {
        let space = Space::map_from(&source.domain.space, &target.domain.space);
        let product = BasicRelation::universe(space)
            .intersect_domain(&source.domain)?
            .intersect_range(&target.domain)?;
        Ok(self.with_context(product))
    }

    fn record_coarse(&self, deps: &mut DependenceSet, kind: DependenceKind, source: &Pbb, target: &Pbb) {
        let pieces = self.domain_product(source, target)
            .and_then(|product| self.ordered_pieces(&product, source, target));
        match pieces {
            Ok(pieces) => {
                for piece in pieces {
                    self.store(deps, kind, source, target, piece);
                }
            }
            Err(e) => {
                // Without the precedence split, keep the whole product.
                warn!("{} -> {}: {}; keeping the unordered domain product", source.id, target.id, e);
                let space = Space::map_from(&source.domain.space, &target.domain.space);
                let product = BasicRelation::universe(space)
                    .intersect_domain(&source.domain)
                    .and_then(|p| p.intersect_range(&target.domain))
                    .map(|p| self.with_context(p));
                match product {
                    Ok(p) => self.store(deps, kind, source, target, p),
                    Err(e) => warn!("{} -> {}: dropping coarse relation: {}", source.id, target.id, e),
                }
            }
        }
    }

    fn with_context(&self, mut rel: BasicRelation) -> BasicRelation {
        let n_var = rel.space.n_var();
        for c in &self.scop.param_context.constraints.constraints {
            rel.add_constraint(c.lift(0, n_var));
        }
        rel
    }

    /// Split `base` by the level at which the original schedule of `source`
    /// strictly precedes that of `target`, keeping the non-empty pieces.
    fn ordered_pieces(&self, base: &BasicRelation, source: &Pbb, target: &Pbb) -> PolyhedralResult<Vec<BasicRelation>> {
        let mut pieces = Vec::new();
        for order in source.schedule.lex_lt_pieces(&target.schedule)? {
            let piece = base.intersect(&order)?;
            if !piece.is_empty()? {
                pieces.push(piece);
            }
        }
        Ok(pieces)
    }

    fn store(&self, deps: &mut DependenceSet, kind: DependenceKind, source: &Pbb, target: &Pbb, piece: BasicRelation) {
        trace!("{} {} -> {}: {}", kind, source.id, target.id, piece);
        if let Err(e) = deps.record(kind, source.id, target.id, piece) {
            warn!("{} {} -> {}: {}", kind, source.id, target.id, e);
        }
    }
}

/// Compute the dependences of a SCoP.
pub fn compute_dependences(scop: &Scop) -> DependenceSet {
    DependenceAnalysis::new(scop).analyze()
}
