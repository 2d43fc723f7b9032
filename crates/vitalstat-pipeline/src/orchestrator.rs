//! Concurrent provider fan-out with partial-failure isolation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout_at;
use uuid::Uuid;
use vitalstat_core::{
    AhrClient, DataFenixClient, IpumsClient, ProviderId, ProviderOutcome, ReqwestHttpClient,
    ResponseCache, SourceErrorKind, StatSource, WonderClient,
};

use crate::calibration::{CalibrationReport, Calibrator, JsonReportCalibrator};
use crate::config::PipelineConfig;
use crate::microdata::{MicrodataLoader, MicrodataSample, NatalityLoader};

/// Overall flag for a completed bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    AllSucceeded,
    Partial,
    AllFailed,
    NoProviders,
}

/// Every attempted provider's outcome for one cycle. Skipped optional
/// providers do not appear.
#[derive(Debug, Serialize)]
pub struct AcquisitionBundle {
    pub cycle_id: Uuid,
    pub outcomes: BTreeMap<ProviderId, ProviderOutcome>,
    pub status: CycleStatus,
}

impl AcquisitionBundle {
    fn assemble(cycle_id: Uuid, outcomes: BTreeMap<ProviderId, ProviderOutcome>) -> Self {
        let succeeded = outcomes.values().filter(|o| o.is_success()).count();
        let status = if outcomes.is_empty() {
            CycleStatus::NoProviders
        } else if succeeded == outcomes.len() {
            CycleStatus::AllSucceeded
        } else if succeeded == 0 {
            CycleStatus::AllFailed
        } else {
            CycleStatus::Partial
        };
        Self {
            cycle_id,
            outcomes,
            status,
        }
    }

    pub fn outcome(&self, id: ProviderId) -> Option<&ProviderOutcome> {
        self.outcomes.get(&id)
    }
}

/// Result of a full cycle: the bundle plus the calibration completion
/// status. The orchestrator never inspects calibration output beyond
/// whether it completed.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub bundle: AcquisitionBundle,
    pub calibration: Option<CalibrationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_error: Option<String>,
}

impl PipelineReport {
    pub fn calibration_completed(&self) -> bool {
        self.calibration.is_some()
    }
}

/// Owns the lifecycle of each request cycle.
///
/// All configured sources are fetched concurrently; one provider's
/// failure, panic, or deadline overrun is captured as that provider's
/// `Failure` entry and never prevents the rest from completing. A
/// cycle always produces a bundle — total provider failure yields a
/// bundle of all-failure entries, so the calibrator always receives a
/// well-formed input.
pub struct Orchestrator {
    sources: Vec<Arc<dyn StatSource>>,
    microdata: Option<Box<dyn MicrodataLoader>>,
    microdata_row_limit: usize,
    calibrator: Box<dyn Calibrator>,
    cycle_timeout: Duration,
}

impl Orchestrator {
    pub fn new(calibrator: Box<dyn Calibrator>) -> Self {
        Self {
            sources: Vec::new(),
            microdata: None,
            microdata_row_limit: 100_000,
            calibrator,
            cycle_timeout: Duration::from_secs(3_900),
        }
    }

    /// Assemble the production orchestrator: shared transport and
    /// cache, the two always-on providers, and the optional providers
    /// for which configuration is present.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let http: Arc<dyn vitalstat_core::HttpClient> = Arc::new(ReqwestHttpClient::new());
        let cache = ResponseCache::in_memory();

        let mut orchestrator = Self::new(Box::new(JsonReportCalibrator::new(
            &config.calibration_output,
        )))
        .with_cycle_timeout(config.cycle_timeout)
        .with_microdata_row_limit(config.microdata_row_limit)
        .with_source(Arc::new(
            WonderClient::new(Arc::clone(&http), cache.clone()).with_years(config.years.clone()),
        ))
        .with_source(Arc::new(AhrClient::new(Arc::clone(&http), cache.clone())));

        match &config.ipums_api_key {
            Some(api_key) => {
                orchestrator = orchestrator
                    .with_source(Arc::new(IpumsClient::new(Arc::clone(&http), api_key.as_str())));
            }
            None => {
                tracing::info!("ipums credential absent; skipping extract provider");
            }
        }

        let history: Vec<time::Date> = config
            .cycle_dates
            .iter()
            .filter_map(|raw| match vitalstat_core::domain::cycle::parse_date(raw) {
                Ok(date) => Some(date),
                Err(error) => {
                    tracing::warn!(%error, "ignoring unparsable cycle date");
                    None
                }
            })
            .collect();
        if history.is_empty() {
            tracing::info!("no cycle history configured; skipping cycle provider");
        } else {
            orchestrator = orchestrator.with_source(Arc::new(
                DataFenixClient::new(Arc::clone(&http), config.datafenix_api_key.clone())
                    .with_history(history),
            ));
        }

        match NatalityLoader::discover(&config.nchs_data_dir, config.microdata_year) {
            Ok(loader) => orchestrator = orchestrator.with_microdata(Box::new(loader)),
            Err(error) => {
                tracing::warn!(%error, "no usable microdata; calibration will proceed without it");
            }
        }

        orchestrator
    }

    pub fn with_source(mut self, source: Arc<dyn StatSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_microdata(mut self, loader: Box<dyn MicrodataLoader>) -> Self {
        self.microdata = Some(loader);
        self
    }

    pub fn with_microdata_row_limit(mut self, row_limit: usize) -> Self {
        self.microdata_row_limit = row_limit;
        self
    }

    pub fn with_cycle_timeout(mut self, cycle_timeout: Duration) -> Self {
        self.cycle_timeout = cycle_timeout;
        self
    }

    /// Fan out to every configured provider and assemble the bundle.
    pub async fn acquire(&self) -> AcquisitionBundle {
        let cycle_id = Uuid::new_v4();
        tracing::info!(%cycle_id, providers = self.sources.len(), "starting acquisition cycle");

        let deadline = tokio::time::Instant::now() + self.cycle_timeout;
        let mut handles = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let source = Arc::clone(source);
            let id = source.id();
            handles.push((id, tokio::spawn(async move { source.fetch().await })));
        }

        let mut outcomes = BTreeMap::new();
        for (id, mut handle) in handles {
            let outcome = match timeout_at(deadline, &mut handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_error)) => {
                    tracing::error!(provider = %id, error = %join_error, "provider task aborted");
                    ProviderOutcome::Failure {
                        kind: SourceErrorKind::Transport,
                        message: format!("provider task aborted: {join_error}"),
                    }
                }
                Err(_) => {
                    handle.abort();
                    tracing::error!(provider = %id, "provider exceeded the cycle deadline");
                    ProviderOutcome::Failure {
                        kind: SourceErrorKind::Transport,
                        message: String::from("provider fetch exceeded the cycle deadline"),
                    }
                }
            };

            if let ProviderOutcome::Failure { kind, message } = &outcome {
                tracing::warn!(provider = %id, kind = kind.as_str(), error = %message, "provider failed");
            }
            outcomes.insert(id, outcome);
        }

        let bundle = AcquisitionBundle::assemble(cycle_id, outcomes);
        tracing::info!(%cycle_id, status = ?bundle.status, "acquisition cycle assembled");
        bundle
    }

    /// Run one full cycle: acquire, load microdata, calibrate.
    pub async fn run_cycle(&self) -> PipelineReport {
        let bundle = self.acquire().await;

        let microdata = self.load_microdata();

        match self.calibrator.calibrate(microdata.as_ref(), &bundle) {
            Ok(report) => PipelineReport {
                bundle,
                calibration: Some(report),
                calibration_error: None,
            },
            Err(error) => {
                tracing::error!(%error, "calibration failed");
                PipelineReport {
                    bundle,
                    calibration: None,
                    calibration_error: Some(error.to_string()),
                }
            }
        }
    }

    fn load_microdata(&self) -> Option<MicrodataSample> {
        let loader = self.microdata.as_ref()?;
        match loader.load(self.microdata_row_limit) {
            Ok(sample) => Some(sample),
            Err(error) => {
                tracing::error!(%error, "microdata load failed; continuing without it");
                None
            }
        }
    }
}
