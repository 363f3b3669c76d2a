//! Polyhedral basic blocks: one statement of a SCoP.

use crate::ir::ids::{PbbId, ScopId};
use crate::ir::pdr::Pdr;
use crate::polyhedral::{AffineMap, IntegerSet};
use crate::utils::errors::{PolyhedralError, PolyhedralResult};
use serde::{Serialize, Deserialize};

/// What is known about the original basic block behind a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackBox {
    /// Index of the basic block in the enclosing function
    pub bb_index: u32,
    /// Guard conditions, as text
    pub conditions: Vec<String>,
    /// Switch cases leading to the block, as text
    pub cases: Vec<String>,
    /// Statement body, if the lifter provided one
    pub body: Option<String>,
}

/// The two-phase schedule protocol of a statement.
///
/// A transform is first proposed, which keeps the schedule in effect before
/// it as `saved`; it is then either committed or rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleState {
    /// Only the original schedule exists.
    #[default]
    Original,
    /// A candidate schedule awaits commit or rollback.
    Proposed { transformed: AffineMap, saved: AffineMap },
    /// The transformed schedule is final.
    Committed { transformed: AffineMap },
}

/// A polyhedral basic block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbb {
    pub id: PbbId,
    /// Owning SCoP
    pub scop: ScopId,
    pub black_box: BlackBox,
    /// Names of the surrounding loop iterators, outermost first
    pub iterators: Vec<String>,
    /// Iteration domain
    pub domain: IntegerSet,
    /// Original schedule
    pub schedule: AffineMap,
    pub state: ScheduleState,
    pub is_reduction: bool,
    /// Data references, in lifting order
    pub drs: Vec<Pdr>,
}

impl Pbb {
    pub fn new(
        id: PbbId,
        scop: ScopId,
        black_box: BlackBox,
        iterators: Vec<String>,
        domain: IntegerSet,
        schedule: AffineMap,
    ) -> Self {
        Self {
            id,
            scop,
            black_box,
            iterators,
            domain,
            schedule,
            state: ScheduleState::Original,
            is_reduction: false,
            drs: Vec::new(),
        }
    }

    /// Number of iteration-domain dimensions.
    pub fn dim(&self) -> usize {
        self.domain.dim()
    }

    /// Index of the underlying basic block.
    pub fn index(&self) -> u32 {
        self.black_box.bb_index
    }

    /// Tuple name used when printing the statement's objects.
    pub fn name(&self) -> String {
        format!("S_{}", self.index())
    }

    pub fn nb_reads(&self) -> usize {
        self.drs.iter().filter(|pdr| pdr.is_read()).count()
    }

    pub fn nb_writes(&self) -> usize {
        self.drs.iter().filter(|pdr| pdr.is_write()).count()
    }

    pub fn add_pdr(&mut self, pdr: Pdr) {
        debug_assert_eq!(pdr.accesses.n_in(), self.dim());
        self.drs.push(pdr);
    }

    /// The pending or committed transformed schedule.
    pub fn transformed(&self) -> Option<&AffineMap> {
        match &self.state {
            ScheduleState::Original => None,
            ScheduleState::Proposed { transformed, .. } => Some(transformed),
            ScheduleState::Committed { transformed } => Some(transformed),
        }
    }

    /// The schedule a pending proposal would replace.
    pub fn saved(&self) -> Option<&AffineMap> {
        match &self.state {
            ScheduleState::Proposed { saved, .. } => Some(saved),
            _ => None,
        }
    }

    /// The schedule in effect: transformed if any, original otherwise.
    pub fn effective_schedule(&self) -> &AffineMap {
        self.transformed().unwrap_or(&self.schedule)
    }

    pub fn is_proposed(&self) -> bool {
        matches!(self.state, ScheduleState::Proposed { .. })
    }

    /// Propose a new schedule. A second proposal replaces the first one but
    /// keeps the schedule saved by it.
    pub fn propose(&mut self, transformed: AffineMap) -> PolyhedralResult<()> {
        if transformed.n_in() != self.dim() {
            return Err(PolyhedralError::DimensionMismatch(format!(
                "schedule with {} inputs proposed for {} of depth {}",
                transformed.n_in(), self.id, self.dim()
            )));
        }
        let saved = match std::mem::take(&mut self.state) {
            ScheduleState::Proposed { saved, .. } => saved,
            ScheduleState::Committed { transformed } => transformed,
            ScheduleState::Original => self.schedule.clone(),
        };
        self.state = ScheduleState::Proposed { transformed, saved };
        Ok(())
    }

    /// Make the pending proposal final. Returns false if nothing was pending.
    pub fn commit(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            ScheduleState::Proposed { transformed, .. } => {
                self.state = ScheduleState::Committed { transformed };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Discard the pending proposal and restore the saved schedule.
    /// Returns false if nothing was pending.
    pub fn rollback(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            ScheduleState::Proposed { saved, .. } => {
                self.state = if saved == self.schedule {
                    ScheduleState::Original
                } else {
                    ScheduleState::Committed { transformed: saved }
                };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Number of iterations of the loop at time dimension `time_depth` of the
    /// effective schedule, for the given parameter values. `None` when the
    /// domain is empty.
    pub fn number_of_iterations_at_time(&self, time_depth: usize, params: &[i64]) -> PolyhedralResult<Option<i64>> {
        let image = self.domain.apply(self.effective_schedule())?;
        Ok(image.dim_bounds(time_depth, params)?.map(|(lo, hi)| hi - lo + 1))
    }
}
