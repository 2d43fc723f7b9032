use serde::{Deserialize, Serialize};

/// One measure observation from the rankings service.
///
/// Field names follow the provider's GraphQL schema (camelCase on the
/// wire) so cached payloads and live responses deserialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingPoint {
    pub state: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub edition: Option<String>,
    pub measure: MeasureInfo,
    #[serde(default)]
    pub subpopulation: Option<Subpopulation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subpopulation {
    pub name: String,
    #[serde(default, rename = "populationCategory")]
    pub population_category: Option<PopulationCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationCategory {
    pub name: String,
}
