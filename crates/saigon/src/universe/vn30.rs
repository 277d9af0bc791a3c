//! VN30 basket and its benchmark.

use crate::universe::sector::Sector;
use std::collections::BTreeMap;

/// Benchmark index symbol.
pub const BENCHMARK: &str = "VNINDEX";

const CONSTITUENTS: [(&str, Sector); 30] = [
    ("ACB", Sector::Banks),
    ("BCM", Sector::RealEstate),
    ("BID", Sector::Banks),
    ("CTG", Sector::Banks),
    ("DGC", Sector::BasicMaterials),
    ("FPT", Sector::Technology),
    ("GAS", Sector::Utilities),
    ("GVR", Sector::BasicMaterials),
    ("HDB", Sector::Banks),
    ("HPG", Sector::BasicMaterials),
    ("LPB", Sector::Banks),
    ("MBB", Sector::Banks),
    ("MSN", Sector::ConsumerGoods),
    ("MWG", Sector::ConsumerServices),
    ("PLX", Sector::Energy),
    ("SAB", Sector::ConsumerGoods),
    ("SHB", Sector::Banks),
    ("SSB", Sector::Banks),
    ("SSI", Sector::FinancialServices),
    ("STB", Sector::Banks),
    ("TCB", Sector::Banks),
    ("TPB", Sector::Banks),
    ("VCB", Sector::Banks),
    ("VHM", Sector::RealEstate),
    ("VIB", Sector::Banks),
    ("VIC", Sector::RealEstate),
    ("VJC", Sector::ConsumerServices),
    ("VNM", Sector::ConsumerGoods),
    ("VPB", Sector::Banks),
    ("VRE", Sector::RealEstate),
];

/// VN30 constituent with its industry group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constituent {
    /// Stock symbol.
    pub symbol: String,
    /// Industry group.
    pub sector: Sector,
}

/// The thirty constituents of the VN30 index.
#[derive(Debug, Clone)]
pub struct Vn30Universe {
    constituents: Vec<Constituent>,
}

impl Default for Vn30Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl Vn30Universe {
    /// Basket in alphabetical order.
    pub fn new() -> Self {
        let constituents = CONSTITUENTS
            .iter()
            .map(|(symbol, sector)| Constituent {
                symbol: (*symbol).to_string(),
                sector: *sector,
            })
            .collect();
        Self { constituents }
    }

    /// Get all constituents.
    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    /// Get all symbols.
    pub fn symbols(&self) -> Vec<String> {
        self.constituents.iter().map(|c| c.symbol.clone()).collect()
    }

    /// Get the industry group of a symbol.
    pub fn sector(&self, symbol: &str) -> Option<Sector> {
        self.constituents
            .iter()
            .find(|c| c.symbol == symbol)
            .map(|c| c.sector)
    }

    /// Get the count of constituents per industry group.
    pub fn sector_counts(&self) -> BTreeMap<Sector, usize> {
        let mut counts = BTreeMap::new();
        for constituent in &self.constituents {
            *counts.entry(constituent.sector).or_insert(0) += 1;
        }
        counts
    }
}
