//! DBpedia client over synchronous HTTP.
//!
//! Uses `ureq` with one agent per timeout class: a short probe agent, a fast
//! Lookup agent and a slower SPARQL agent. Strategies are always called
//! sequentially.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExternalError, ExternalResult};

use super::lookup::{parse_ask, parse_bindings, parse_lookup, parse_property_rows};
use super::{sparql, ExternalRecord, ExternalSource};

/// Maximum error-body excerpt kept in diagnostics.
const ERROR_EXCERPT: usize = 300;

/// Endpoint and timeout settings for [`DbpediaClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExternalConfig {
    /// Lookup-style search endpoint.
    pub lookup_url: String,
    /// SPARQL endpoint.
    pub sparql_url: String,
    pub fast_timeout_secs: u64,
    pub structured_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Results requested from the Lookup endpoint.
    pub fast_limit: usize,
    /// Default row limit for label and category queries.
    pub structured_limit: usize,
    /// Default row limit for class instance queries.
    pub class_limit: usize,
    /// Abstracts longer than this many characters are cut and marked with `...`.
    pub abstract_max_chars: usize,
    pub user_agent: String,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            lookup_url: "https://lookup.dbpedia.org/api/search".into(),
            sparql_url: "https://dbpedia.org/sparql".into(),
            fast_timeout_secs: 10,
            structured_timeout_secs: 30,
            probe_timeout_secs: 3,
            fast_limit: 10,
            structured_limit: 10,
            class_limit: 20,
            abstract_max_chars: 300,
            user_agent: concat!("ontolens/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// HTTP client for DBpedia Lookup and SPARQL.
pub struct DbpediaClient {
    config: ExternalConfig,
    probe: ureq::Agent,
    fast: ureq::Agent,
    structured: ureq::Agent,
}

impl DbpediaClient {
    pub fn new(config: ExternalConfig) -> Self {
        let agent = |secs: u64| {
            ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(secs))
                .user_agent(&config.user_agent)
                .build()
        };
        Self {
            probe: agent(config.probe_timeout_secs),
            fast: agent(config.fast_timeout_secs),
            structured: agent(config.structured_timeout_secs),
            config,
        }
    }

    pub fn config(&self) -> &ExternalConfig {
        &self.config
    }

    /// Run a SPARQL query and return the raw JSON body.
    fn sparql_body(&self, query: &str) -> ExternalResult<String> {
        let endpoint = &self.config.sparql_url;
        tracing::debug!(endpoint = %endpoint, query_len = query.len(), "issuing SPARQL query");
        let result = self
            .structured
            .get(endpoint)
            .set("Accept", "application/sparql-results+json")
            .query("query", query)
            .query("format", "application/sparql-results+json")
            .call();
        read_body(result, endpoint, self.config.structured_timeout_secs, true)
    }

    /// Run a SELECT query and decode rows into records.
    fn select_records(&self, query: &str) -> ExternalResult<Vec<ExternalRecord>> {
        let body = self.sparql_body(query)?;
        parse_bindings(&body, self.config.abstract_max_chars).map_err(|e| ExternalError::Decode {
            endpoint: self.config.sparql_url.clone(),
            message: e.to_string(),
        })
    }

    /// Predicate/value pairs describing a resource (at most 50).
    pub fn resource_properties(&self, uri: &str) -> ExternalResult<Vec<(String, String)>> {
        let query = sparql::resource_properties(uri, 50)?;
        let body = self.sparql_body(&query)?;
        parse_property_rows(&body).map_err(|e| ExternalError::Decode {
            endpoint: self.config.sparql_url.clone(),
            message: e.to_string(),
        })
    }
}

impl ExternalSource for DbpediaClient {
    fn connectivity_check(&self) -> bool {
        let result = self
            .probe
            .get(&self.config.sparql_url)
            .set("Accept", "application/sparql-results+json")
            .query("query", sparql::PROBE)
            .call();
        match result {
            Ok(resp) if resp.status() == 200 => {
                // A 200 that is not a SPARQL answer (captive portal etc.) still counts as online;
                // only transport and status failures mean offline.
                if let Ok(body) = resp.into_string() {
                    if parse_ask(&body).is_err() {
                        tracing::debug!("connectivity probe returned a non-SPARQL body");
                    }
                }
                true
            }
            Ok(resp) => {
                tracing::debug!(status = resp.status(), "connectivity probe failed");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "connectivity probe failed");
                false
            }
        }
    }

    fn fast_search(&self, term: &str) -> ExternalResult<Vec<ExternalRecord>> {
        let endpoint = &self.config.lookup_url;
        tracing::debug!(endpoint = %endpoint, term, "issuing lookup search");
        let result = self
            .fast
            .get(endpoint)
            .set("Accept", "application/json")
            .query("query", term)
            .query("format", "JSON")
            .query("maxResults", &self.config.fast_limit.to_string())
            .call();
        let body = read_body(result, endpoint, self.config.fast_timeout_secs, false)?;
        parse_lookup(&body, self.config.abstract_max_chars).map_err(|e| ExternalError::Decode {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })
    }

    fn structured_search(&self, term: &str, limit: usize) -> ExternalResult<Vec<ExternalRecord>> {
        let exact = self.select_records(&sparql::exact_label(term, limit))?;
        if !exact.is_empty() {
            return Ok(exact);
        }
        self.select_records(&sparql::label_contains(term, limit))
    }

    fn instances_of_class(
        &self,
        class_name: &str,
        limit: usize,
    ) -> ExternalResult<Vec<ExternalRecord>> {
        self.select_records(&sparql::instances_of_class(class_name, limit))
    }

    fn instances_related_to(&self, term: &str) -> ExternalResult<Vec<ExternalRecord>> {
        self.select_records(&sparql::related_to(term, self.config.structured_limit))
    }

    fn by_category(&self, category: &str) -> ExternalResult<Vec<ExternalRecord>> {
        self.select_records(&sparql::by_category(category, self.config.class_limit))
    }
}

/// Turn a ureq result into a body string or a typed failure.
///
/// `sparql` enables SPARQL-specific classification: HTTP 400 is a malformed
/// query and Virtuoso reports its own execution timeouts in the error body.
fn read_body(
    result: Result<ureq::Response, ureq::Error>,
    endpoint: &str,
    timeout_secs: u64,
    sparql: bool,
) -> ExternalResult<String> {
    match result {
        Ok(response) => response.into_string().map_err(|e| {
            if is_timeout_io(&e) {
                ExternalError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_secs,
                }
            } else {
                ExternalError::Decode {
                    endpoint: endpoint.to_string(),
                    message: format!("failed to read body: {e}"),
                }
            }
        }),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(classify_status(endpoint, status, &body, timeout_secs, sparql))
        }
        Err(ureq::Error::Transport(transport)) => {
            let timed_out = std::error::Error::source(&transport)
                .and_then(|s| s.downcast_ref::<std::io::Error>())
                .is_some_and(is_timeout_io)
                || transport.to_string().contains("timed out");
            if timed_out {
                Err(ExternalError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_secs,
                })
            } else {
                Err(ExternalError::Transport {
                    endpoint: endpoint.to_string(),
                    message: transport.to_string(),
                })
            }
        }
    }
}

fn is_timeout_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

/// Map a non-success HTTP status to the error taxonomy.
pub(crate) fn classify_status(
    endpoint: &str,
    status: u16,
    body: &str,
    timeout_secs: u64,
    sparql: bool,
) -> ExternalError {
    let excerpt = crate::normalize::truncate_chars(body.trim(), ERROR_EXCERPT);
    let lower = body.to_lowercase();
    if status == 408 || status == 504 || (sparql && lower.contains("timeout")) {
        ExternalError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_secs,
        }
    } else if sparql && status == 400 {
        ExternalError::MalformedQuery {
            endpoint: endpoint.to_string(),
            message: excerpt,
        }
    } else {
        ExternalError::Endpoint {
            endpoint: endpoint.to_string(),
            status,
            message: excerpt,
        }
    }
}
