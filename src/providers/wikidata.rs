//! Identifier resolution via the Wikidata query service.
//!
//! One SPARQL query maps an IMDb id (P345) to the AniList (P8729), MAL
//! (P4086) and Rotten Tomatoes (P1258) ids in a single round trip. Results
//! ride the resilient client's cache with the long resolution TTL, so each
//! item is resolved once per TTL window no matter how often it re-renders.

use crate::http_client::ResilientClient;
use crate::shared::errors::{EngineError, EngineResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SPARQL_ENDPOINT: &str = "https://query.wikidata.org/sparql";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIds {
    pub anilist: Option<String>,
    pub mal: Option<String>,
    pub rotten_tomatoes: Option<String>,
}

pub struct WikidataResolver {
    client: Arc<ResilientClient>,
    ttl: Duration,
}

#[derive(Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

#[derive(Deserialize, Default)]
struct SparqlBinding {
    anilist: Option<SparqlValue>,
    mal: Option<SparqlValue>,
    rt: Option<SparqlValue>,
}

#[derive(Deserialize)]
struct SparqlValue {
    value: String,
}

impl WikidataResolver {
    pub fn new(client: Arc<ResilientClient>, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    pub async fn resolve(&self, imdb_id: &str) -> EngineResult<ResolvedIds> {
        let query = format!(
            "SELECT ?anilist ?mal ?rt WHERE {{ \
               ?item wdt:P345 \"{}\" . \
               OPTIONAL {{ ?item wdt:P8729 ?anilist }} \
               OPTIONAL {{ ?item wdt:P4086 ?mal }} \
               OPTIONAL {{ ?item wdt:P1258 ?rt }} \
             }} LIMIT 1",
            imdb_id
        );
        let url = format!(
            "{}?format=json&query={}",
            SPARQL_ENDPOINT,
            urlencoding::encode(&query)
        );

        let outcome = match self.client.fetch_json(&url, self.ttl).await {
            Ok(outcome) => outcome,
            Err(EngineError::NotFound(_)) => return Ok(ResolvedIds::default()),
            Err(e) => return Err(e),
        };

        let response: SparqlResponse = serde_json::from_value(outcome.data)
            .map_err(|e| EngineError::Parse(format!("wikidata response: {}", e)))?;
        let binding = response.results.bindings.into_iter().next().unwrap_or_default();

        let ids = ResolvedIds {
            anilist: binding.anilist.map(|v| v.value),
            mal: binding.mal.map(|v| v.value),
            rotten_tomatoes: binding.rt.map(|v| normalize_rt_path(&v.value)),
        };
        debug!("resolved {} -> {:?}", imdb_id, ids);
        Ok(ids)
    }
}

/// P1258 values are sometimes full URLs; keep only the site-relative path.
fn normalize_rt_path(value: &str) -> String {
    let stripped = value
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let stripped = stripped
        .strip_prefix("www.rottentomatoes.com/")
        .or_else(|| stripped.strip_prefix("rottentomatoes.com/"))
        .unwrap_or(stripped);
    stripped.trim_matches('/').to_string()
}
