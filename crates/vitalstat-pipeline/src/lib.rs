//! # Vitalstat Pipeline
//!
//! Orchestration layer over the acquisition clients: concurrent
//! provider fan-out with partial-failure isolation, microdata sampling,
//! and the hand-off to the calibration collaborator.
//!
//! ```rust,ignore
//! use vitalstat_pipeline::{Orchestrator, PipelineConfig};
//!
//! let config = PipelineConfig::from_env();
//! let orchestrator = Orchestrator::from_config(&config);
//! let report = orchestrator.run_cycle().await;
//! ```

pub mod calibration;
pub mod config;
pub mod microdata;
pub mod orchestrator;
pub mod schedule;

pub use calibration::{
    CalibrationError, CalibrationReport, Calibrator, JsonReportCalibrator, SourceSummary,
};
pub use config::PipelineConfig;
pub use microdata::{
    MicrodataError, MicrodataLoader, MicrodataMeta, MicrodataSample, NatalityLoader,
};
pub use orchestrator::{AcquisitionBundle, CycleStatus, Orchestrator, PipelineReport};
pub use schedule::run_on_interval;
