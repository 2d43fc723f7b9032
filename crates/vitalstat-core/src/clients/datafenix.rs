//! Cycle-analysis client with a deterministic local fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::domain::cycle::{self, CycleMetrics, CycleReport, CycleSource, CycleState};
use crate::domain::ProviderRecords;
use crate::http_client::{HttpClient, HttpRequest};
use crate::source::{ProviderId, ProviderOutcome, SourceError, StatSource};

pub const DATAFENIX_BASE_URL: &str = "https://womens-health-menstrual-cycle.p.rapidapi.com/";
const RAPIDAPI_HOST: &str = "womens-health-menstrual-cycle.p.rapidapi.com";
const REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Remote analysis client that degrades to the local computation.
///
/// The composition is an explicit two-step contract: `try_remote`
/// returns a `Result`, and on any error — network, auth, non-2xx, or
/// an undecodable body — the caller computes the equivalent result
/// locally from the same input. Without a credential the remote step
/// is not attempted at all.
pub struct DataFenixClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: Option<String>,
    history: Vec<Date>,
}

impl DataFenixClient {
    pub fn new(http: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: String::from(DATAFENIX_BASE_URL),
            api_key,
            history: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Event-date history analyzed by this client's cycle fetch.
    pub fn with_history(mut self, history: Vec<Date>) -> Self {
        self.history = history;
        self
    }

    /// Analyze the given history as of `today`.
    pub async fn analyze(&self, history: &[Date], today: Date) -> Result<CycleReport, SourceError> {
        if let Some(api_key) = self.api_key.as_deref() {
            match self.try_remote(api_key, history).await {
                Ok(report) => return Ok(report),
                Err(error) if error.kind() == crate::source::SourceErrorKind::InsufficientData => {
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(%error, "remote cycle analysis failed; computing locally");
                }
            }
        }
        cycle::analyze(history, today)
    }

    async fn try_remote(
        &self,
        api_key: &str,
        history: &[Date],
    ) -> Result<CycleReport, SourceError> {
        let dates: Vec<String> = history.iter().copied().map(cycle::format_date).collect();
        let body = serde_json::json!({ "dates": dates });

        let request = HttpRequest::post(format!("{}analyze", self.base_url))
            .with_header("x-rapidapi-key", api_key)
            .with_header("x-rapidapi-host", RAPIDAPI_HOST)
            .with_json(&body)
            .with_timeout_ms(REQUEST_TIMEOUT_MS);

        let response = self.http.execute(request).await.map_err(|e| {
            SourceError::transport(format!("datafenix transport error: {}", e.message()))
        })?;

        if !response.is_success() {
            return Err(SourceError::transport(format!(
                "datafenix returned status {}",
                response.status
            )));
        }

        let remote: RemoteAnalysis = serde_json::from_slice(&response.body)
            .map_err(|e| SourceError::protocol(format!("unparsable analysis response: {e}")))?;

        if remote.status.as_deref() == Some("insufficient_data") {
            return Err(SourceError::insufficient_data(
                "remote analysis reported insufficient data",
            ));
        }

        match (remote.metrics, remote.current_state) {
            (Some(metrics), Some(current_state)) => Ok(CycleReport {
                source: CycleSource::Remote,
                metrics,
                current_state,
            }),
            _ => Err(SourceError::protocol("incomplete analysis payload")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteAnalysis {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    metrics: Option<CycleMetrics>,
    #[serde(default)]
    current_state: Option<CycleState>,
}

impl StatSource for DataFenixClient {
    fn id(&self) -> ProviderId {
        ProviderId::Datafenix
    }

    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProviderOutcome> + Send + 'a>> {
        Box::pin(async move {
            let today = OffsetDateTime::now_utc().date();
            let result = self
                .analyze(&self.history, today)
                .await
                .map(ProviderRecords::Cycle);
            ProviderOutcome::from_fetch(result)
        })
    }
}
