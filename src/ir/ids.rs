//! Identifiers of SCoPs, statements and data references.
//!
//! Ids come from monotonically increasing atomic counters and are never
//! reused, even after the object carrying them is dropped, so debug output
//! stays stable within one process.

use once_cell::sync::Lazy;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for SCoPs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopId(pub u64);

/// A unique identifier for polyhedral basic blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PbbId(pub u64);

/// A unique identifier for polyhedral data references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PdrId(pub u64);

/// Index of a data-reference descriptor in its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataRefId(pub usize);

impl fmt::Display for ScopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scop_{}", self.0)
    }
}

impl fmt::Display for PbbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pbb_{}", self.0)
    }
}

impl fmt::Display for PdrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pdr_{}", self.0)
    }
}

impl fmt::Display for DataRefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dr_{}", self.0)
    }
}

static GLOBAL: Lazy<IdAllocator> = Lazy::new(IdAllocator::new);

/// Allocator for the three id spaces.
///
/// Statements and data references use separate counters. The process-wide
/// instance lives for the whole process and is never reset; independent
/// allocators can be created for isolated runs.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_scop: AtomicU64,
    next_pbb: AtomicU64,
    next_pdr: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide allocator.
    pub fn global() -> &'static IdAllocator {
        &GLOBAL
    }

    pub fn next_scop(&self) -> ScopId {
        ScopId(self.next_scop.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_pbb(&self) -> PbbId {
        PbbId(self.next_pbb.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_pdr(&self) -> PdrId {
        PdrId(self.next_pdr.fetch_add(1, Ordering::Relaxed))
    }
}
