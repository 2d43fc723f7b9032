//! Bulk-extract client for the IPUMS API (NHIS collection).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{ProviderRecords, Table};
use crate::extract_job::{ExtractDefinition, ExtractJobController};
use crate::http_client::{HttpAuth, HttpClient};
use crate::source::{ProviderId, ProviderOutcome, SourceError, StatSource};

/// Client whose fetch is the composite extract operation: submit,
/// poll until terminal, download.
///
/// Construction requires an API key; without one the provider is
/// skipped at orchestration rather than constructed and failed.
pub struct IpumsClient {
    controller: ExtractJobController,
    definition: ExtractDefinition,
}

impl IpumsClient {
    pub fn new(http: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        let auth = HttpAuth::Header {
            name: String::from("authorization"),
            value: api_key.into(),
        };
        Self {
            controller: ExtractJobController::new(http, auth),
            definition: default_extract_definition(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.controller = self.controller.with_base_url(base_url);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.controller = self.controller.with_poll_interval(poll_interval);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.controller = self.controller.with_timeout(timeout);
        self
    }

    /// Extract definition submitted by this client's cycle fetch.
    pub fn with_extract_definition(mut self, definition: ExtractDefinition) -> Self {
        self.definition = definition;
        self
    }

    pub async fn run_extract(&self, definition: &ExtractDefinition) -> Result<Table, SourceError> {
        self.controller.run(definition).await
    }
}

fn default_extract_definition() -> ExtractDefinition {
    ExtractDefinition {
        collection: String::from("nhis"),
        description: String::from("vitalstat maternal health indicators"),
        samples: vec![String::from("ih2023")],
        variables: vec![
            String::from("AGE"),
            String::from("SEX"),
            String::from("PREGNOW"),
        ],
    }
}

impl StatSource for IpumsClient {
    fn id(&self) -> ProviderId {
        ProviderId::Ipums
    }

    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProviderOutcome> + Send + 'a>> {
        Box::pin(async move {
            let result = self
                .run_extract(&self.definition)
                .await
                .map(ProviderRecords::Extract);
            ProviderOutcome::from_fetch(result)
        })
    }
}
