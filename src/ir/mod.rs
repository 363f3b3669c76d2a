//! Polyhedral representation of a static control part.
//!
//! - `Scop`: a region with its parameters, statements and dependences
//! - `Pbb`: one statement with its iteration domain and schedule
//! - `Pdr`: one memory access of a statement

pub mod ids;
pub mod pdr;
pub mod pbb;
pub mod scop;

pub use ids::{DataRefId, IdAllocator, PbbId, PdrId, ScopId};
pub use pdr::{Pdr, PdrKind};
pub use pbb::{BlackBox, Pbb, ScheduleState};
pub use scop::{DataRef, Region, Scop};
