//! External linked-data source (DBpedia).
//!
//! The reconciler depends only on the [`ExternalSource`] trait; [`DbpediaClient`]
//! is the HTTP implementation. Two query strategies exist: a fast Lookup-style
//! search and a slower SPARQL graph-pattern search.

pub mod client;
pub mod lookup;
pub mod sparql;

use serde::{Deserialize, Serialize};

use crate::error::ExternalResult;
use crate::normalize::{normalize, normalize_opt};

pub use client::{DbpediaClient, ExternalConfig};

/// An entity returned by the external knowledge base.
///
/// Records are never mutated after creation; caching and importing copy them.
/// Serialized as a flat JSON object in the offline cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub uri: String,
    pub label: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extended_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(alias = "date", default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(alias = "website", default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl ExternalRecord {
    /// Minimal record with identity and label.
    pub fn new(uri: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
            abstract_text: String::new(),
            categories: Vec::new(),
            thumbnail: None,
            type_tag: None,
            extended_types: Vec::new(),
            creator: None,
            release_date: None,
            homepage: None,
        }
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    /// Copy with every free-text field passed through the normalizer.
    pub fn normalized(&self) -> Self {
        Self {
            uri: self.uri.clone(),
            label: normalize(&self.label),
            abstract_text: normalize(&self.abstract_text),
            categories: normalize_all(&self.categories),
            thumbnail: self.thumbnail.clone(),
            type_tag: normalize_opt(self.type_tag.as_deref()),
            extended_types: normalize_all(&self.extended_types),
            creator: normalize_opt(self.creator.as_deref()),
            release_date: normalize_opt(self.release_date.as_deref()),
            homepage: self.homepage.clone(),
        }
    }
}

fn normalize_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| normalize(v))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Trailing segment of a URI (`http://dbpedia.org/resource/Bitcoin` → `Bitcoin`).
pub fn uri_local_name(uri: &str) -> &str {
    uri.rsplit(['/', '#']).next().unwrap_or(uri)
}

/// Contract of the remote knowledge service.
///
/// Implementations are called sequentially from a single thread; the
/// reconciler never issues two calls concurrently.
pub trait ExternalSource {
    /// Short probe of the endpoint. Never errors: any failure means offline.
    fn connectivity_check(&self) -> bool;

    /// Lookup-style search with bounded latency. Zero matches is `Ok(vec![])`.
    fn fast_search(&self, term: &str) -> ExternalResult<Vec<ExternalRecord>>;

    /// Graph-pattern search: exact label match first, substring match second.
    fn structured_search(&self, term: &str, limit: usize) -> ExternalResult<Vec<ExternalRecord>>;

    /// Resources typed `class_name`, or typed by a class whose label contains it.
    fn instances_of_class(
        &self,
        class_name: &str,
        limit: usize,
    ) -> ExternalResult<Vec<ExternalRecord>>;

    /// Looser relevance query over labels and subject categories.
    fn instances_related_to(&self, term: &str) -> ExternalResult<Vec<ExternalRecord>>;

    /// Resources whose subject category contains `category`.
    fn by_category(&self, category: &str) -> ExternalResult<Vec<ExternalRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_of_uri() {
        assert_eq!(uri_local_name("http://dbpedia.org/resource/Bitcoin"), "Bitcoin");
        assert_eq!(uri_local_name("http://example.org/onto#Ethereum"), "Ethereum");
        assert_eq!(uri_local_name("plain"), "plain");
    }

    #[test]
    fn normalized_strips_markup_from_every_text_field() {
        let mut record = ExternalRecord::new("http://dbpedia.org/resource/Bitcoin", "<B>Bitcoin</B>")
            .with_abstract("A <i>decentralized</i>   currency");
        record.categories = vec!["<B>Crypto</B>currencies".into(), "<br/>".into()];
        record.type_tag = Some("<span></span>".into());

        let clean = record.normalized();
        assert_eq!(clean.label, "**Bitcoin**");
        assert_eq!(clean.abstract_text, "A decentralized currency");
        assert_eq!(clean.categories, vec!["**Crypto**currencies".to_string()]);
        assert_eq!(clean.type_tag, None);
        assert_eq!(clean.uri, record.uri);
    }

    #[test]
    fn serializes_as_flat_mapping() {
        let record = ExternalRecord::new("http://dbpedia.org/resource/Ethereum", "Ethereum")
            .with_abstract("Smart contract platform");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["label"], "Ethereum");
        assert_eq!(json["abstract"], "Smart contract platform");
        assert_eq!(json["uri"], "http://dbpedia.org/resource/Ethereum");
        assert!(json.get("thumbnail").is_none());
    }

    #[test]
    fn reads_website_and_date_keys() {
        let json = r#"{
            "uri": "http://dbpedia.org/resource/Bitcoin",
            "label": "Bitcoin",
            "abstract": "Peer-to-peer cash",
            "thumbnail": "",
            "website": "https://bitcoin.org",
            "creator": "Satoshi Nakamoto",
            "date": "2009-01-03"
        }"#;
        let record: ExternalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.homepage.as_deref(), Some("https://bitcoin.org"));
        assert_eq!(record.release_date.as_deref(), Some("2009-01-03"));
        assert_eq!(record.creator.as_deref(), Some("Satoshi Nakamoto"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["homepage"], "https://bitcoin.org");
        assert_eq!(json["release_date"], "2009-01-03");
    }
}
