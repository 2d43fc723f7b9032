//! Tabular-aggregate client for the CDC WONDER XML request protocol.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{fingerprint, CacheKey, ResponseCache};
use crate::domain::{ProviderRecords, Table};
use crate::http_client::{HttpClient, HttpRequest};
use crate::source::{ProviderId, ProviderOutcome, SourceError, StatSource};

pub const WONDER_BASE_URL: &str = "https://wonder.cdc.gov/controller/datarequest/";

/// Tabular aggregates refresh daily at most.
const WONDER_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Builds the flat `<request-parameters>` XML document the service
/// expects.
///
/// Grouping fields are numbered `B_1`, `B_2`, … in call order; filters
/// become `F_<name>` parameters carrying one `<value>` per accepted
/// value; measures are emitted as `M_<field> = true` flags. Calling
/// `filter` again with the same name replaces that filter's value set
/// (the service treats duplicate filter names as overrides). Filters
/// are emitted in lexicographic name order, so two builders given the
/// same filters in different call orders produce identical documents.
///
/// Field identifiers are not validated here; an invalid field is a
/// provider-side error surfaced at call time.
#[derive(Debug, Clone, Default)]
pub struct WonderRequestBuilder {
    dataset_id: String,
    groups: Vec<String>,
    filters: BTreeMap<String, Vec<String>>,
    measures: Vec<String>,
}

impl WonderRequestBuilder {
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            ..Self::default()
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn set_measures<I, S>(mut self, measures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measures = measures.into_iter().map(Into::into).collect();
        self
    }

    /// Render the request document. Pure given the builder's state.
    pub fn build(&self) -> String {
        let mut doc = String::from("<request-parameters>");

        push_parameter(&mut doc, "accept_datause_restrictions", &["true"]);

        for (index, group) in self.groups.iter().enumerate() {
            push_parameter(&mut doc, &format!("B_{}", index + 1), &[group]);
        }

        for (name, values) in &self.filters {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            push_parameter(&mut doc, &format!("F_{name}"), &values);
        }

        for measure in &self.measures {
            push_parameter(&mut doc, &format!("M_{measure}"), &["true"]);
        }

        doc.push_str("</request-parameters>");
        doc
    }
}

fn push_parameter(doc: &mut String, name: &str, values: &[&str]) {
    doc.push_str("<parameter><name>");
    doc.push_str(&xml_escape(name));
    doc.push_str("</name>");
    for value in values {
        doc.push_str("<value>");
        doc.push_str(&xml_escape(value));
        doc.push_str("</value>");
    }
    doc.push_str("</parameter>");
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Client for the tabular-aggregate query service.
pub struct WonderClient {
    http: Arc<dyn HttpClient>,
    cache: ResponseCache,
    base_url: String,
    years: Vec<String>,
}

impl WonderClient {
    pub fn new(http: Arc<dyn HttpClient>, cache: ResponseCache) -> Self {
        Self {
            http,
            cache,
            base_url: String::from(WONDER_BASE_URL),
            years: Vec::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Year filter applied by this client's cycle query.
    pub fn with_years<I, S>(mut self, years: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.years = years.into_iter().map(Into::into).collect();
        self
    }

    /// Issue a query, consulting the cache first and writing it back
    /// only on a successful fetch.
    pub async fn query(&self, request: &WonderRequestBuilder) -> Result<Table, SourceError> {
        let document = request.build();
        let key = CacheKey::new(
            ProviderId::Wonder,
            &fingerprint(&[request.dataset_id(), &document]),
        );

        if let Some(hit) = self.cache.get(&key).await {
            match serde_json::from_str::<Table>(&hit) {
                Ok(table) => {
                    tracing::debug!(key = %key, "wonder cache hit");
                    return Ok(table);
                }
                Err(error) => {
                    tracing::warn!(key = %key, %error, "discarding undecodable cache entry");
                }
            }
        }

        let url = format!("{}{}", self.base_url, request.dataset_id());
        let http_request = HttpRequest::post(&url)
            .with_form(&[
                ("request_xml", document.as_str()),
                ("accept_datause_restrictions", "true"),
            ])
            .with_timeout_ms(REQUEST_TIMEOUT_MS);

        let response = self
            .http
            .execute(http_request)
            .await
            .map_err(|e| SourceError::transport(format!("wonder transport error: {}", e.message())))?;

        if !response.is_success() {
            return Err(SourceError::transport(format!(
                "wonder returned status {}",
                response.status
            )));
        }

        let table = parse_tabular_body(&response.body)?;

        if let Ok(payload) = serde_json::to_string(&table) {
            self.cache.put(&key, payload, WONDER_TTL).await;
        }

        Ok(table)
    }

    /// Severe maternal morbidity rates grouped by state and year.
    pub async fn maternal_morbidity_by_state(
        &self,
        years: &[String],
        morbidity_type: &str,
    ) -> Result<Table, SourceError> {
        let request = WonderRequestBuilder::new("D149")
            .group_by(["D149.V10", "D149.V1"])
            .filter("year", years.iter().map(String::as_str))
            .filter("maternal_morbidity", [morbidity_type])
            .set_measures(["D149.M1", "D149.M3"]);
        self.query(&request).await
    }

    /// Birth counts under an arbitrary grouping.
    pub async fn birth_demographics(
        &self,
        years: &[String],
        group_by: &[String],
    ) -> Result<Table, SourceError> {
        let request = WonderRequestBuilder::new("D66")
            .group_by(group_by.iter().map(String::as_str))
            .filter("year", years.iter().map(String::as_str))
            .set_measures(["Births"]);
        self.query(&request).await
    }

    /// Maternal mortality counts and crude rates by year and race.
    pub async fn maternal_mortality_rates(&self, years: &[String]) -> Result<Table, SourceError> {
        let request = WonderRequestBuilder::new("D76")
            .group_by(["D76.V1", "D76.V8"])
            .filter("year", years.iter().map(String::as_str))
            .set_measures(["Deaths", "Crude Rate"]);
        self.query(&request).await
    }

    /// Birth counts grouped by state and a single risk factor.
    pub async fn risk_factor_distributions(
        &self,
        years: &[String],
        risk_factor: &str,
    ) -> Result<Table, SourceError> {
        let request = WonderRequestBuilder::new("D149")
            .group_by(["D149.V1", risk_factor])
            .filter("year", years.iter().map(String::as_str))
            .set_measures(["Births"]);
        self.query(&request).await
    }
}

fn parse_tabular_body(body: &[u8]) -> Result<Table, SourceError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| SourceError::protocol(format!("wonder body is not UTF-8: {e}")))?;

    if text.trim_start().starts_with('<') {
        return Err(SourceError::protocol(
            "wonder returned a non-tabular body",
        ));
    }

    Table::from_delimited(text.as_bytes(), b'\t')
        .map_err(|e| SourceError::protocol(format!("wonder response is not parseable as TSV: {e}")))
}

impl StatSource for WonderClient {
    fn id(&self) -> ProviderId {
        ProviderId::Wonder
    }

    fn fetch<'a>(&'a self) -> Pin<Box<dyn Future<Output = ProviderOutcome> + Send + 'a>> {
        Box::pin(async move {
            let result = self
                .maternal_morbidity_by_state(&self.years, "at_least_one")
                .await
                .map(ProviderRecords::Tabular);
            ProviderOutcome::from_fetch(result)
        })
    }
}
