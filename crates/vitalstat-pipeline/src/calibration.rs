//! Calibration collaborator boundary.
//!
//! The pipeline hands over the acquisition bundle and the optional
//! microdata sample and propagates only the completion status; the
//! calibration algorithm itself lives behind the trait.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use vitalstat_core::{ProviderId, ProviderOutcome};

use crate::microdata::MicrodataSample;
use crate::orchestrator::AcquisitionBundle;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("calibration serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub succeeded: bool,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The persisted report artifact.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub cycle_id: uuid::Uuid,
    pub generated_at: String,
    pub microdata_rows: Option<usize>,
    pub sources: BTreeMap<ProviderId, SourceSummary>,
    pub output_path: PathBuf,
}

pub trait Calibrator: Send + Sync {
    fn calibrate(
        &self,
        microdata: Option<&MicrodataSample>,
        bundle: &AcquisitionBundle,
    ) -> Result<CalibrationReport, CalibrationError>;
}

/// Calibrator that summarizes the bundle and persists the report as
/// pretty-printed JSON at the configured output path.
#[derive(Debug, Clone)]
pub struct JsonReportCalibrator {
    output_path: PathBuf,
}

impl JsonReportCalibrator {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Calibrator for JsonReportCalibrator {
    fn calibrate(
        &self,
        microdata: Option<&MicrodataSample>,
        bundle: &AcquisitionBundle,
    ) -> Result<CalibrationReport, CalibrationError> {
        let sources = bundle
            .outcomes
            .iter()
            .map(|(id, outcome)| {
                let summary = match outcome {
                    ProviderOutcome::Success { records } => SourceSummary {
                        succeeded: true,
                        records: records.len(),
                        error: None,
                    },
                    ProviderOutcome::Failure { kind, message } => SourceSummary {
                        succeeded: false,
                        records: 0,
                        error: Some(format!("{}: {message}", kind.as_str())),
                    },
                };
                (*id, summary)
            })
            .collect();

        let report = CalibrationReport {
            cycle_id: bundle.cycle_id,
            generated_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            microdata_rows: microdata.map(|sample| sample.meta.rows_read),
            sources,
            output_path: self.output_path.clone(),
        };

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.output_path, serde_json::to_vec_pretty(&report)?)?;

        tracing::info!(path = %self.output_path.display(), "calibration report written");
        Ok(report)
    }
}
