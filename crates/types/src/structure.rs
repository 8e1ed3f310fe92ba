//! Crystal structure representations.
//!
//! The backend stores structures in AiiDA's attribute layout
//! ([`BackendStructure`]). Viewers and tables consume the flatter
//! [`CanonicalStructure`], where sites are split into parallel `symbols` and
//! `positions` sequences.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Structure attributes as returned by `GET /jobs-data/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendStructure {
    pub cell: [[f64; 3]; 3],
    pub pbc1: bool,
    pub pbc2: bool,
    pub pbc3: bool,
    pub kinds: Vec<BackendKind>,
    pub sites: Vec<BackendSite>,
}

/// Named species template. May list several symbols for alloyed kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendKind {
    pub name: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSite {
    pub kind_name: String,
    pub position: [f64; 3],
}

/// Normalised geometry consumed by downstream viewers.
///
/// `symbols[i]` and `positions[i]` describe the same site, and every symbol is
/// a key of `species`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CanonicalStructure {
    pub cell: [[f64; 3]; 3],
    pub pbc: [bool; 3],
    /// Kind name to element symbol.
    pub species: IndexMap<String, String>,
    /// Kind name of each site.
    pub symbols: Vec<String>,
    pub positions: Vec<[f64; 3]>,
}

impl CanonicalStructure {
    pub fn site_count(&self) -> usize {
        self.positions.len()
    }

    /// Element symbol of the site at `index`.
    pub fn element_of(&self, index: usize) -> Option<&str> {
        let kind = self.symbols.get(index)?;
        self.species.get(kind).map(String::as_str)
    }
}
