//! Number and id list formatting shared by the writers.
//!
//! Floats use Rust's shortest round-trip `Display`, which never depends on
//! the process locale. Very small or very large magnitudes switch to
//! exponent notation so a value never spans more than a couple dozen
//! columns of a deck line.

use std::fmt;

use gmccx_model::{Vector, ccx_id};

/// Ids per line in `*NSET`/`*ELSET` blocks
pub const IDS_PER_LINE: usize = 16;

/// Node ids per line after the element id in `*ELEMENT` blocks
pub const ELEMENT_NODES_PER_LINE: usize = 15;

/// Smallest magnitude written in positional notation
const POSITIONAL_MIN: f64 = 1e-5;
/// Magnitudes from here on are written with an exponent
const POSITIONAL_MAX: f64 = 1e15;

/// A float as written to a deck field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Real(pub f64);

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.abs();
        if magnitude == 0.0 || (POSITIONAL_MIN..POSITIONAL_MAX).contains(&magnitude) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{:e}", self.0)
        }
    }
}

/// Comma separated id lines, 16 per line, every line but the last ending in
/// a comma. `external` shifts internal ids to solver ids.
pub fn ints_to_ccx(ids: &[usize], external: bool) -> Vec<String> {
    let chunks: Vec<&[usize]> = ids.chunks(IDS_PER_LINE).collect();
    let last = chunks.len().saturating_sub(1);
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = chunk
                .iter()
                .map(|&id| if external { ccx_id(id) } else { id }.to_string())
                .collect::<Vec<_>>()
                .join(",");
            if i != last {
                line.push(',');
            }
            line
        })
        .collect()
}

/// `x,y,z`
pub fn vector_to_ccx(v: &Vector) -> String {
    format!("{},{},{}", Real(v.x), Real(v.y), Real(v.z))
}
