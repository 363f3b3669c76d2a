//! Static control parts.

use crate::analysis::dependence::DependenceSet;
use crate::ir::ids::{DataRefId, PbbId, ScopId};
use crate::ir::pbb::Pbb;
use crate::ir::pdr::Pdr;
use crate::polyhedral::{IntegerSet, Space};
use crate::transform::scheduler::ScheduleInfo;
use serde::{Serialize, Deserialize};

/// Descriptor of one memory reference, as handed over by the lifter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRef {
    /// Base object (array or scalar) name
    pub base: String,
    /// Alias set; zero means "aliases nothing else"
    pub alias_set: u32,
    /// Source text of the reference
    pub text: String,
    /// Basic block containing the reference
    pub bb_index: u32,
}

/// The structured control region a SCoP covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    /// Entry basic block
    pub entry: u32,
    /// Exit basic block
    pub exit: u32,
    /// Symbolic parameters, in column order
    pub params: Vec<String>,
    pub data_refs: Vec<DataRef>,
}

impl Region {
    pub fn new(name: impl Into<String>, entry: u32, exit: u32, params: Vec<String>) -> Self {
        Self { name: name.into(), entry, exit, params, data_refs: Vec::new() }
    }

    /// Register a descriptor and return its id.
    pub fn add_data_ref(&mut self, data_ref: DataRef) -> DataRefId {
        self.data_refs.push(data_ref);
        DataRefId(self.data_refs.len() - 1)
    }

    pub fn data_ref(&self, id: DataRefId) -> Option<&DataRef> {
        self.data_refs.get(id.0)
    }
}

/// A static control part.
///
/// The SCoP owns its statements, and each statement owns its data
/// references. Statements keep the order in which they were added; that
/// order is the one printing and scheduling follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scop {
    pub id: ScopId,
    pub region: Region,
    /// Constraints known to hold on the parameters
    pub param_context: IntegerSet,
    /// Dependences, once computed
    pub dependences: Option<DependenceSet>,
    pub statements: Vec<Pbb>,
    /// Whether scheduling produced a transform
    pub is_optimized: bool,
    pub schedule_info: Option<ScheduleInfo>,
}

impl Scop {
    pub fn new(id: ScopId, region: Region) -> Self {
        let space = Space::set_with_params(0, region.params.len())
            .with_param_names(region.params.clone());
        Self {
            id,
            param_context: IntegerSet::universe(space),
            region,
            dependences: None,
            statements: Vec::new(),
            is_optimized: false,
            schedule_info: None,
        }
    }

    pub fn nb_params(&self) -> usize {
        self.region.params.len()
    }

    pub fn param_names(&self) -> &[String] {
        &self.region.params
    }

    pub fn nb_statements(&self) -> usize {
        self.statements.len()
    }

    pub fn add_pbb(&mut self, pbb: Pbb) {
        debug_assert_eq!(pbb.scop, self.id);
        self.statements.push(pbb);
    }

    pub fn pbb(&self, id: PbbId) -> Option<&Pbb> {
        self.statements.iter().find(|s| s.id == id)
    }

    pub fn pbb_mut(&mut self, id: PbbId) -> Option<&mut Pbb> {
        self.statements.iter_mut().find(|s| s.id == id)
    }

    /// All data references with their statements, in statement order.
    pub fn pdrs(&self) -> impl Iterator<Item = (&Pbb, &Pdr)> {
        self.statements.iter().flat_map(|pbb| pbb.drs.iter().map(move |pdr| (pbb, pdr)))
    }

    /// Commit every pending proposal; returns how many were committed.
    pub fn commit_all(&mut self) -> usize {
        self.statements.iter_mut().map(|pbb| pbb.commit()).filter(|&done| done).count()
    }

    /// Roll back every pending proposal and mark the SCoP untransformed.
    pub fn rollback_all(&mut self) -> usize {
        self.is_optimized = false;
        self.statements.iter_mut().map(|pbb| pbb.rollback()).filter(|&done| done).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::pbb::BlackBox;
    use crate::polyhedral::AffineMap;

    fn scop_with(n: u64) -> Scop {
        let mut scop = Scop::new(ScopId(7), Region::new("f", 2, 9, vec!["N".to_string()]));
        for k in 0..n {
            scop.add_pbb(Pbb::new(
                PbbId(k),
                ScopId(7),
                BlackBox { bb_index: 3 + k as u32, ..Default::default() },
                vec!["i".to_string()],
                IntegerSet::universe(Space::set_with_params(1, 1)),
                AffineMap::original_schedule(&[k as i64, 0], 1),
            ));
        }
        scop
    }

    #[test]
    fn test_new_scop() {
        let scop = scop_with(0);
        assert_eq!(scop.nb_params(), 1);
        assert_eq!(scop.param_context.n_param(), 1);
        assert!(!scop.is_optimized);
    }

    #[test]
    fn test_commit_and_rollback_all() {
        let mut scop = scop_with(2);
        for pbb in &mut scop.statements {
            let same = pbb.schedule.clone();
            pbb.propose(same).unwrap();
        }
        scop.is_optimized = true;
        assert_eq!(scop.rollback_all(), 2);
        assert!(!scop.is_optimized);
        assert_eq!(scop.commit_all(), 0);
    }

    #[test]
    fn test_data_refs() {
        let mut region = Region::new("f", 0, 1, Vec::new());
        let id = region.add_data_ref(DataRef {
            base: "A".to_string(),
            alias_set: 0,
            text: "A[i]".to_string(),
            bb_index: 3,
        });
        assert_eq!(id, DataRefId(0));
        assert_eq!(region.data_ref(id).map(|d| d.base.as_str()), Some("A"));
    }
}
