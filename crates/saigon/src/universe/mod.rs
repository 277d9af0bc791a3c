//! Instrument universes.
//!
//! The default universe is the VN30 basket of the Ho Chi Minh City Stock
//! Exchange, benchmarked against the VN-Index.

pub mod sector;
pub mod vn30;

pub use sector::Sector;
pub use vn30::{BENCHMARK, Constituent, Vn30Universe};

/// Trait for stock universes.
pub trait Universe {
    /// Get all symbols in the universe.
    fn symbols(&self) -> Vec<String>;

    /// Benchmark index the universe is measured against.
    fn benchmark(&self) -> &str;

    /// Check if a symbol is in the universe.
    fn contains(&self, symbol: &str) -> bool {
        self.symbols().iter().any(|s| s == symbol)
    }

    /// Get the number of constituents.
    fn size(&self) -> usize {
        self.symbols().len()
    }
}

impl Universe for Vn30Universe {
    fn symbols(&self) -> Vec<String> {
        self.symbols()
    }

    fn benchmark(&self) -> &str {
        BENCHMARK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_trait() {
        let universe = Vn30Universe::new();

        assert!(universe.contains("VJC"));
        assert!(!universe.contains("NOTREAL"));
        assert_eq!(universe.size(), 30);
        assert_eq!(Universe::benchmark(&universe), "VNINDEX");
    }
}
