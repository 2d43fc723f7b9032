//! Normalized record types, one tagged shape per provider.
//!
//! Nothing loosely typed crosses the client boundary: every provider's
//! wire response is converted into one of these types before it is
//! cached or handed to the orchestrator.

pub mod cycle;
pub mod rankings;
pub mod tabular;

use serde::{Deserialize, Serialize};

pub use cycle::{CycleMetrics, CyclePhase, CycleReport, CycleSource, CycleState};
pub use rankings::{MeasureInfo, PopulationCategory, RankingPoint, Subpopulation};
pub use tabular::Table;

/// The normalized payload carried by a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ProviderRecords {
    /// Grouped aggregates from the tabular query service.
    Tabular(Table),
    /// Measure observations from the rankings service.
    Rankings(Vec<RankingPoint>),
    /// Row data downloaded from a completed bulk extract.
    Extract(Table),
    /// A single cycle-analysis report.
    Cycle(CycleReport),
}

impl ProviderRecords {
    /// Number of normalized records in the payload.
    pub fn len(&self) -> usize {
        match self {
            Self::Tabular(table) | Self::Extract(table) => table.rows.len(),
            Self::Rankings(points) => points.len(),
            Self::Cycle(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
