//! Environment-driven pipeline configuration.
//!
//! Every value has a `VITALSTAT_`-prefixed primary name and an
//! unprefixed fallback. Optional credentials enable their provider;
//! their absence is a silent skip, never an error.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_NCHS_DATA_DIR: &str = "/data/nchs/natality";
const DEFAULT_CALIBRATION_OUTPUT: &str = "./config/calibration_params.json";
const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 3_900;
const DEFAULT_MICRODATA_ROW_LIMIT: usize = 100_000;
const DEFAULT_MICRODATA_YEAR: u16 = 2023;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for natality microdata exports.
    pub nchs_data_dir: PathBuf,
    /// Path the calibration report artifact is written to.
    pub calibration_output: PathBuf,
    /// Enables the bulk-extract provider when present.
    pub ipums_api_key: Option<String>,
    /// Enables the remote cycle-analysis call when present; the local
    /// fallback needs no credential.
    pub datafenix_api_key: Option<String>,
    /// Event-date history for the cycle provider; the provider is
    /// skipped when empty.
    pub cycle_dates: Vec<String>,
    /// Year filter applied to the tabular queries.
    pub years: Vec<String>,
    /// Deadline applied to each provider fetch within a cycle.
    pub cycle_timeout: Duration,
    pub microdata_row_limit: usize,
    pub microdata_year: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            nchs_data_dir: PathBuf::from(DEFAULT_NCHS_DATA_DIR),
            calibration_output: PathBuf::from(DEFAULT_CALIBRATION_OUTPUT),
            ipums_api_key: None,
            datafenix_api_key: None,
            cycle_dates: Vec::new(),
            years: vec![
                String::from("2021"),
                String::from("2022"),
                String::from("2023"),
            ],
            cycle_timeout: Duration::from_secs(DEFAULT_CYCLE_TIMEOUT_SECS),
            microdata_row_limit: DEFAULT_MICRODATA_ROW_LIMIT,
            microdata_year: DEFAULT_MICRODATA_YEAR,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cycle_timeout = env_first(&["VITALSTAT_CYCLE_TIMEOUT_SECS", "CYCLE_TIMEOUT_SECS"])
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cycle_timeout);

        Self {
            nchs_data_dir: env_first(&["VITALSTAT_NCHS_DATA_DIR", "NCHS_DATA_DIR"])
                .map(PathBuf::from)
                .unwrap_or(defaults.nchs_data_dir),
            calibration_output: env_first(&[
                "VITALSTAT_CALIBRATION_OUTPUT_PATH",
                "CALIBRATION_OUTPUT_PATH",
            ])
            .map(PathBuf::from)
            .unwrap_or(defaults.calibration_output),
            ipums_api_key: env_first(&["VITALSTAT_IPUMS_API_KEY", "IPUMS_API_KEY"]),
            datafenix_api_key: env_first(&["VITALSTAT_DATAFENIX_API_KEY", "DATAFENIX_API_KEY"]),
            cycle_dates: env_first(&["VITALSTAT_CYCLE_DATES", "CYCLE_DATES"])
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            years: env_first(&["VITALSTAT_YEARS", "YEARS"])
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.years),
            cycle_timeout,
            microdata_row_limit: env_first(&["VITALSTAT_MICRODATA_ROW_LIMIT"])
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.microdata_row_limit),
            microdata_year: env_first(&["VITALSTAT_MICRODATA_YEAR"])
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.microdata_year),
        }
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}
