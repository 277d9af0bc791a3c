//! Industry groups of the VN30 constituents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Industry group, following the ICB industries used by HOSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sector {
    /// Banks
    Banks,

    /// Brokerage and other financial services
    FinancialServices,

    /// Real estate developers and operators
    RealEstate,

    /// Steel, chemicals, rubber
    BasicMaterials,

    /// Food, beverages, retail
    ConsumerGoods,

    /// Airlines, travel and leisure
    ConsumerServices,

    /// Oil and gas distribution
    Energy,

    /// Gas and power utilities
    Utilities,

    /// Software and IT services
    Technology,
}

impl Sector {
    /// Returns all sectors.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Banks,
            Self::FinancialServices,
            Self::RealEstate,
            Self::BasicMaterials,
            Self::ConsumerGoods,
            Self::ConsumerServices,
            Self::Energy,
            Self::Utilities,
            Self::Technology,
        ]
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Banks => "Banks",
            Self::FinancialServices => "Financial Services",
            Self::RealEstate => "Real Estate",
            Self::BasicMaterials => "Basic Materials",
            Self::ConsumerGoods => "Consumer Goods",
            Self::ConsumerServices => "Consumer Services",
            Self::Energy => "Energy",
            Self::Utilities => "Utilities",
            Self::Technology => "Technology",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
