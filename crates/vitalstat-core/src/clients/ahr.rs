//! GraphQL client for the America's Health Rankings API.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{fingerprint, CacheKey, ResponseCache};
use crate::domain::{ProviderRecords, RankingPoint};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source::{ProviderId, ProviderOutcome, SourceError, StatSource};

pub const AHR_BASE_URL: &str = "https://api.americashealthrankings.org/graphql";

/// Ranking editions change yearly; a week is conservative.
const AHR_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const REQUEST_TIMEOUT_MS: u64 = 30_000;

const MEASURE_BY_STATE_QUERY: &str = r#"
query($name: String!) {
  data_A(where: { measure: { name: { eq: $name } } }) {
    state
    value
    year
    edition
    measure {
      name
      description
    }
  }
}
"#;

const DISPARITIES_QUERY: &str = r#"
query($name: String!) {
  data_B(where: { measure: { name: { eq: $name } } }) {
    state
    value
    year
    subpopulation {
      name
      populationCategory {
        name
      }
    }
    measure {
      name
      description
    }
  }
}
"#;

const STATE_PROFILE_QUERY: &str = r#"
query($state: String!) {
  data_A(where: { state: { eq: $state } }) {
    state
    value
    year
    measure {
      name
      description
    }
  }
}
"#;

const DISPARITY_BRIEF_QUERY: &str = r#"
query {
  data_B(where: { edition: { eq: "2024 Maternal & Infant Health Disparities" } }) {
    state
    value
    year
    subpopulation {
      name
    }
    measure {
      name
    }
  }
}
"#;

const RANKINGS_QUERY: &str = r#"
query {
  data_A(where: { measure: { name: { eq: "Overall Ranking" } } }) {
    state
    value
    year
    measure {
      name
    }
  }
}
"#;

/// Client for the GraphQL ranking service.
pub struct AhrClient {
    http: Arc<dyn HttpClient>,
    cache: ResponseCache,
    base_url: String,
    measure: String,
}

impl AhrClient {
    pub fn new(http: Arc<dyn HttpClient>, cache: ResponseCache) -> Self {
        Self {
            http,
            cache,
            base_url: String::from(AHR_BASE_URL),
            measure: String::from("Maternal Mortality"),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Measure fetched by this client's cycle query.
    pub fn with_measure(mut self, measure: impl Into<String>) -> Self {
        self.measure = measure.into();
        self
    }

    /// Execute a GraphQL query and extract the named data field.
    ///
    /// A non-empty top-level `errors` array takes precedence over the
    /// HTTP status: it always yields an error, never partial data.
    pub async fn execute(
        &self,
        query: &str,
        variables: &BTreeMap<String, String>,
        dataset: &str,
    ) -> Result<Vec<RankingPoint>, SourceError> {
        let canonical_variables = serde_json::to_string(variables)
            .map_err(|e| SourceError::protocol(format!("unencodable variables: {e}")))?;
        let key = CacheKey::new(
            ProviderId::Ahr,
            &fingerprint(&[dataset, query, &canonical_variables]),
        );

        if let Some(hit) = self.cache.get(&key).await {
            match serde_json::from_str::<Vec<RankingPoint>>(&hit) {
                Ok(points) => {
                    tracing::debug!(key = %key, "ahr cache hit");
                    return Ok(points);
                }
                Err(error) => {
                    tracing::warn!(key = %key, %error, "discarding undecodable cache entry");
                }
            }
        }

        let body = serde_json::json!({ "query": query, "variables": variables });
        let request = HttpRequest::post(&self.base_url)
            .with_json(&body)
            .with_header("accept", "application/json")
            .with_timeout_ms(REQUEST_TIMEOUT_MS);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| SourceError::transport(format!("ahr transport error: {}", e.message())))?;

        if !response.is_success() {
            return Err(SourceError::transport(format!(
                "ahr returned status {}",
                response.status
            )));
        }

        let payload: GraphQlResponse = serde_json::from_slice(&response.body)
            .map_err(|e| SourceError::protocol(format!("unparsable graphql response: {e}")))?;

        if let Some(error) = payload.errors.first() {
            return Err(SourceError::protocol(format!(
                "graphql error: {}",
                error.message
            )));
        }

        let points = match payload.data.and_then(|mut data| data.remove(dataset)) {
            Some(value) => serde_json::from_value::<Vec<RankingPoint>>(value).map_err(|e| {
                SourceError::protocol(format!("unexpected shape for '{dataset}': {e}"))
            })?,
            None => Vec::new(),
        };

        if let Ok(payload) = serde_json::to_string(&points) {
            self.cache.put(&key, payload, AHR_TTL).await;
        }

        Ok(points)
    }

    pub async fn measure_by_state(&self, measure: &str) -> Result<Vec<RankingPoint>, SourceError> {
        let variables = BTreeMap::from([(String::from("name"), measure.to_owned())]);
        self.execute(MEASURE_BY_STATE_QUERY, &variables, "data_A").await
    }

    /// Measure values stratified by subpopulation.
    pub async fn measure_with_disparities(
        &self,
        measure: &str,
    ) -> Result<Vec<RankingPoint>, SourceError> {
        let variables = BTreeMap::from([(String::from("name"), measure.to_owned())]);
        self.execute(DISPARITIES_QUERY, &variables, "data_B").await
    }

    pub async fn state_profile(&self, state_abbr: &str) -> Result<Vec<RankingPoint>, SourceError> {
        let variables = BTreeMap::from([(String::from("state"), state_abbr.to_owned())]);
        self.execute(STATE_PROFILE_QUERY, &variables, "data_A").await
    }

    /// The stratified maternal & infant health disparities brief.
    pub async fn maternal_disparity_brief(&self) -> Result<Vec<RankingPoint>, SourceError> {
        self.execute(DISPARITY_BRIEF_QUERY, &BTreeMap::new(), "data_B")
            .await
    }

    pub async fn rankings(&self) -> Result<Vec<RankingPoint>, SourceError> {
        self.execute(RANKINGS_QUERY, &BTreeMap::new(), "data_A").await
    }
}

impl StatSource for AhrClient {
    fn id(&self) -> ProviderId {
        ProviderId::Ahr
    }

    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProviderOutcome> + Send + 'a>> {
        Box::pin(async move {
            let result = self
                .measure_by_state(&self.measure)
                .await
                .map(ProviderRecords::Rankings);
            ProviderOutcome::from_fetch(result)
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    errors: Vec<GraphQlError>,
    #[serde(default)]
    data: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}
