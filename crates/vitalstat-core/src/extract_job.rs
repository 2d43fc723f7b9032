//! Submit → poll → download state machine for the bulk-extract provider.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep, Instant};

use crate::domain::Table;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::source::SourceError;

pub const EXTRACT_BASE_URL: &str = "https://api.ipums.org/extracts/";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3_600);
const REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Extract job lifecycle states. Transitions are monotonic; a terminal
/// state is never left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractState {
    Submitted,
    Polling,
    Completed { download_url: String },
    Failed,
    TimedOut,
}

impl ExtractState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed | Self::TimedOut)
    }
}

/// Definition of the extract to request from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractDefinition {
    pub collection: String,
    pub description: String,
    pub samples: Vec<String>,
    pub variables: Vec<String>,
}

/// A submitted extract job tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractJob {
    pub number: u64,
    pub collection: String,
    pub state: ExtractState,
}

impl ExtractJob {
    fn advance(&mut self, next: ExtractState) {
        debug_assert!(!self.state.is_terminal(), "terminal extract state revisited");
        self.state = next;
    }
}

/// Drives an extract job from submission to a downloaded, decoded table.
///
/// The poll loop re-reads the wall clock on every iteration, so a slow
/// individual poll cannot stretch the effective timeout. The whole
/// future is cancellable; dropping it mid-poll leaves nothing running.
pub struct ExtractJobController {
    http: Arc<dyn HttpClient>,
    base_url: String,
    auth: HttpAuth,
    poll_interval: Duration,
    timeout: Duration,
}

impl ExtractJobController {
    pub fn new(http: Arc<dyn HttpClient>, auth: HttpAuth) -> Self {
        Self {
            http,
            base_url: String::from(EXTRACT_BASE_URL),
            auth,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Submit the extract definition. A job is returned in `Submitted`
    /// state; acceptance moves it to `Polling` when the poll loop starts.
    pub async fn submit(&self, definition: &ExtractDefinition) -> Result<ExtractJob, SourceError> {
        let url = format!("{}?collection={}", self.base_url, definition.collection);
        let body = serde_json::json!({
            "extract_definition": {
                "description": definition.description,
                "samples": empty_object_map(&definition.samples),
                "variables": empty_object_map(&definition.variables),
            }
        });

        let request = HttpRequest::post(&url)
            .with_auth(&self.auth)
            .with_json(&body)
            .with_timeout_ms(REQUEST_TIMEOUT_MS);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| SourceError::transport(format!("extract submit failed: {}", e.message())))?;

        if !response.is_success() {
            return Err(SourceError::transport(format!(
                "extract submit returned status {}",
                response.status
            )));
        }

        let submitted: SubmitResponse = serde_json::from_slice(&response.body)
            .map_err(|e| SourceError::protocol(format!("unparsable submit response: {e}")))?;

        tracing::info!(
            number = submitted.number,
            collection = %definition.collection,
            "extract submitted"
        );

        Ok(ExtractJob {
            number: submitted.number,
            collection: definition.collection.clone(),
            state: ExtractState::Submitted,
        })
    }

    /// Poll until the job reaches a terminal state, returning the
    /// download URL on completion.
    pub async fn poll_to_terminal(&self, job: &mut ExtractJob) -> Result<String, SourceError> {
        job.advance(ExtractState::Polling);
        let deadline = Instant::now() + self.timeout;
        let url = format!("{}{}?collection={}", self.base_url, job.number, job.collection);

        loop {
            if Instant::now() >= deadline {
                job.advance(ExtractState::TimedOut);
                return Err(SourceError::job_timed_out(format!(
                    "extract #{} did not complete within {:?}",
                    job.number, self.timeout
                )));
            }

            let request = HttpRequest::get(&url)
                .with_auth(&self.auth)
                .with_timeout_ms(REQUEST_TIMEOUT_MS);

            let response = self.http.execute(request).await.map_err(|e| {
                SourceError::transport(format!("extract status poll failed: {}", e.message()))
            })?;

            if !response.is_success() {
                return Err(SourceError::transport(format!(
                    "extract status poll returned status {}",
                    response.status
                )));
            }

            let status: StatusResponse = serde_json::from_slice(&response.body)
                .map_err(|e| SourceError::protocol(format!("unparsable status response: {e}")))?;

            match status.status.as_deref() {
                Some("completed") => {
                    let download_url = status
                        .download_links
                        .and_then(|links| links.data)
                        .ok_or_else(|| {
                            SourceError::protocol(format!(
                                "extract #{} completed without a download link",
                                job.number
                            ))
                        })?;
                    job.advance(ExtractState::Completed {
                        download_url: download_url.clone(),
                    });
                    tracing::info!(number = job.number, "extract completed");
                    return Ok(download_url);
                }
                Some("failed") => {
                    job.advance(ExtractState::Failed);
                    return Err(SourceError::job_failed(format!(
                        "extract #{} failed upstream",
                        job.number
                    )));
                }
                other => {
                    tracing::debug!(
                        number = job.number,
                        status = other.unwrap_or("unknown"),
                        "extract still in progress"
                    );
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Fetch the completed extract and decode its gzipped CSV payload.
    ///
    /// A corrupt or undecodable payload is a protocol error, distinct
    /// from the job itself having failed.
    pub async fn download(&self, download_url: &str) -> Result<Table, SourceError> {
        let request = HttpRequest::get(download_url)
            .with_auth(&self.auth)
            .with_timeout_ms(REQUEST_TIMEOUT_MS);

        let response = self.http.execute(request).await.map_err(|e| {
            SourceError::transport(format!("extract download failed: {}", e.message()))
        })?;

        if !response.is_success() {
            return Err(SourceError::transport(format!(
                "extract download returned status {}",
                response.status
            )));
        }

        let mut decoded = Vec::new();
        GzDecoder::new(response.body.as_slice())
            .read_to_end(&mut decoded)
            .map_err(|e| {
                SourceError::protocol(format!("extract payload could not be decoded: {e}"))
            })?;

        Table::from_delimited(&decoded, b',')
            .map_err(|e| SourceError::protocol(format!("extract payload is not valid CSV: {e}")))
    }

    /// Composite operation: submit, poll until terminal, download.
    pub async fn run(&self, definition: &ExtractDefinition) -> Result<Table, SourceError> {
        let mut job = self.submit(definition).await?;
        let download_url = self.poll_to_terminal(&mut job).await?;
        self.download(&download_url).await
    }
}

fn empty_object_map(names: &[String]) -> Value {
    let map: BTreeMap<&str, Value> = names
        .iter()
        .map(|name| (name.as_str(), Value::Object(serde_json::Map::new())))
        .collect();
    serde_json::to_value(map).unwrap_or(Value::Null)
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    download_links: Option<DownloadLinks>,
}

#[derive(Debug, Deserialize)]
struct DownloadLinks {
    #[serde(default)]
    data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_terminal() {
        assert!(ExtractState::Completed {
            download_url: String::from("https://example.test/data.gz")
        }
        .is_terminal());
        assert!(ExtractState::Failed.is_terminal());
        assert!(ExtractState::TimedOut.is_terminal());
        assert!(!ExtractState::Submitted.is_terminal());
        assert!(!ExtractState::Polling.is_terminal());
    }

    #[test]
    fn extract_definition_uses_empty_objects_for_samples_and_variables() {
        let value = empty_object_map(&[String::from("ih2022"), String::from("ih2023")]);
        assert_eq!(
            value,
            serde_json::json!({"ih2022": {}, "ih2023": {}})
        );
    }
}
