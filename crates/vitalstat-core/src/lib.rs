//! # Vitalstat Core
//!
//! Multi-protocol acquisition layer for population health statistics.
//!
//! Four upstream providers are wrapped behind one fetch contract:
//!
//! - **CDC WONDER** — tabular aggregates via an XML request document
//!   POSTed form-encoded, TSV response ([`clients::wonder`])
//! - **America's Health Rankings** — GraphQL over JSON POST
//!   ([`clients::ahr`])
//! - **IPUMS** — asynchronous bulk extracts: submit, poll, download
//!   ([`clients::ipums`], [`extract_job`])
//! - **DataFenix** — REST cycle analysis with a deterministic local
//!   fallback ([`clients::datafenix`], [`domain::cycle`])
//!
//! Every client converts transport, serialization, and
//! provider-declared errors into a [`ProviderOutcome::Failure`];
//! nothing escapes the fetch boundary. Successful responses are
//! normalized into per-provider typed records ([`domain`]) and cached
//! by content fingerprint with a per-provider TTL ([`cache`]).
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vitalstat_core::{ReqwestHttpClient, ResponseCache, WonderClient};
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let cache = ResponseCache::in_memory();
//! let wonder = WonderClient::new(http, cache);
//!
//! let table = wonder
//!     .maternal_mortality_rates(&[String::from("2023")])
//!     .await?;
//! ```

pub mod cache;
pub mod clients;
pub mod domain;
pub mod extract_job;
pub mod http_client;
pub mod source;

// Re-export commonly used types at crate root for convenience

pub use cache::{fingerprint, CacheKey, ResponseCache};

pub use clients::{AhrClient, DataFenixClient, IpumsClient, WonderClient, WonderRequestBuilder};

pub use domain::{
    CycleMetrics, CyclePhase, CycleReport, CycleSource, CycleState, MeasureInfo, ProviderRecords,
    RankingPoint, Subpopulation, Table,
};

pub use extract_job::{ExtractDefinition, ExtractJob, ExtractJobController, ExtractState};

pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

pub use source::{ProviderId, ProviderOutcome, SourceError, SourceErrorKind, StatSource};
