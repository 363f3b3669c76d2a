//! Frontend: lifted regions.
//!
//! The optimizer does not parse source code. Its input is a region already
//! lifted out of a compiler's CFG, written as JSON:
//!
//! ```text
//! {
//!   "name": "init_then_copy", "entry": 2, "exit": 5, "params": ["N"],
//!   "context": [{ "affine": { "expr": { "coeffs": { "N": 1 }, "constant": -1 }, "op": "ge" } }],
//!   "blocks": [{
//!     "index": 3, "position": [0, 0],
//!     "loops": [{ "iterator": "i",
//!                 "lower": { "affine": {} },
//!                 "upper": { "affine": { "coeffs": { "N": 1 } } } }],
//!     "accesses": [{ "kind": "write", "base": "A",
//!                    "subscripts": [{ "affine": { "coeffs": { "i": 1 } } }] }]
//!   }]
//! }
//! ```

pub mod lifted;

pub use lifted::*;

use crate::utils::errors::InputError;
use std::collections::HashSet;
use std::path::Path;

/// Parse a lifted region from its JSON text.
pub fn parse_region(source: &str) -> Result<LiftedRegion, InputError> {
    let region: LiftedRegion = serde_json::from_str(source)?;
    validate(&region)?;
    Ok(region)
}

/// Read and parse a lifted region file.
pub fn load_region(path: &Path) -> Result<LiftedRegion, InputError> {
    let source = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_region(&source)
}

/// Structural checks the JSON schema cannot express.
fn validate(region: &LiftedRegion) -> Result<(), InputError> {
    let mut params = HashSet::new();
    for p in &region.params {
        if !params.insert(p.as_str()) {
            return Err(InputError::Invalid(format!("parameter {} declared twice", p)));
        }
    }
    let mut blocks = HashSet::new();
    for (k, b) in region.blocks.iter().enumerate() {
        if !blocks.insert(b.index) {
            return Err(InputError::Invalid(format!("block {} listed twice", b.index)));
        }
        if let Some(other) = region.blocks[..k].iter().find(|o| o.shares_position_with(b)) {
            return Err(InputError::Invalid(format!(
                "blocks {} and {} share position {:?}", other.index, b.index, b.position
            )));
        }
        let mut iterators = HashSet::new();
        for l in &b.loops {
            if !iterators.insert(l.iterator.as_str()) || params.contains(l.iterator.as_str()) {
                return Err(InputError::Invalid(format!(
                    "iterator {} of block {} shadows another name", l.iterator, b.index
                )));
            }
        }
    }
    Ok(())
}
