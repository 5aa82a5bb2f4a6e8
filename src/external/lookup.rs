//! Decoding of DBpedia Lookup and SPARQL JSON result payloads.

use std::collections::HashMap;

use serde::Deserialize;

use crate::normalize::{normalize, truncate_chars};

use super::{uri_local_name, ExternalRecord};

/// Response body of the Lookup search API. Every field is an array of strings.
#[derive(Debug, Default, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub docs: Vec<LookupDoc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupDoc {
    #[serde(default)]
    pub resource: Vec<String>,
    #[serde(default)]
    pub label: Vec<String>,
    #[serde(default)]
    pub comment: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default, rename = "type")]
    pub types: Vec<String>,
    #[serde(default)]
    pub type_name: Vec<String>,
    #[serde(default)]
    pub thumbnail: Vec<String>,
}

impl LookupDoc {
    /// Convert into a record, truncating the abstract to `abstract_max` chars.
    /// Docs without a resource URI are skipped.
    pub fn into_record(self, abstract_max: usize) -> Option<ExternalRecord> {
        let uri = self.resource.into_iter().next()?;
        let label = self
            .label
            .into_iter()
            .next()
            .unwrap_or_else(|| uri_local_name(&uri).replace('_', " "));
        let abstract_text = self
            .comment
            .first()
            .map(|c| truncate_chars(&normalize(c), abstract_max))
            .unwrap_or_default();

        let mut type_names: Vec<String> = if self.type_name.is_empty() {
            self.types.iter().map(|t| uri_local_name(t).to_string()).collect()
        } else {
            self.type_name
        };
        let type_tag = if type_names.is_empty() {
            None
        } else {
            Some(type_names.remove(0))
        };

        let mut record = ExternalRecord::new(uri, label).with_abstract(abstract_text);
        record.categories = self.category.iter().map(|c| category_name(c)).collect();
        record.thumbnail = self.thumbnail.into_iter().next();
        record.type_tag = type_tag;
        record.extended_types = type_names;
        Some(record)
    }
}

/// Human-readable category (`…/Category:Digital_currencies` → `Digital currencies`).
pub fn category_name(category: &str) -> String {
    let local = uri_local_name(category);
    local
        .strip_prefix("Category:")
        .unwrap_or(local)
        .replace('_', " ")
}

/// Decode a Lookup response body into records.
pub fn parse_lookup(body: &str, abstract_max: usize) -> serde_json::Result<Vec<ExternalRecord>> {
    let response: LookupResponse = serde_json::from_str(body)?;
    Ok(response
        .docs
        .into_iter()
        .filter_map(|doc| doc.into_record(abstract_max))
        .collect())
}

/// SPARQL 1.1 JSON results (`application/sparql-results+json`).
#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
    #[serde(default)]
    pub results: SparqlResults,
}

#[derive(Debug, Default, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub bindings: Vec<HashMap<String, SparqlBinding>>,
}

#[derive(Debug, Deserialize)]
pub struct SparqlBinding {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: String,
}

/// Decode SELECT bindings into one record per distinct resource, keeping the
/// first row for each resource and merging categories from later rows.
pub fn parse_bindings(body: &str, abstract_max: usize) -> serde_json::Result<Vec<ExternalRecord>> {
    let response: SparqlResponse = serde_json::from_str(body)?;
    let mut records: Vec<ExternalRecord> = Vec::new();

    for row in response.results.bindings {
        let Some(uri) = row.get("resource").map(|b| b.value.clone()) else {
            continue;
        };
        let category = row.get("subject").map(|b| category_name(&b.value));

        if let Some(existing) = records.iter_mut().find(|r| r.uri == uri) {
            if let Some(cat) = category {
                if !existing.categories.contains(&cat) {
                    existing.categories.push(cat);
                }
            }
            continue;
        }

        let value = |key: &str| row.get(key).map(|b| b.value.clone());
        let label = value("label").unwrap_or_else(|| uri_local_name(&uri).replace('_', " "));
        let abstract_text = value("abstract")
            .or_else(|| value("comment"))
            .map(|a| truncate_chars(&normalize(&a), abstract_max))
            .unwrap_or_default();

        let mut record = ExternalRecord::new(uri, label).with_abstract(abstract_text);
        record.thumbnail = value("thumbnail");
        record.homepage = value("homepage");
        record.creator = value("creator");
        record.release_date = value("date");
        record.type_tag = row.get("type").map(|b| uri_local_name(&b.value).to_string());
        record.categories = category.into_iter().collect();
        records.push(record);
    }

    Ok(records)
}

/// Decode `?property ?value` rows into `(predicate local name, value)` pairs.
pub fn parse_property_rows(body: &str) -> serde_json::Result<Vec<(String, String)>> {
    let response: SparqlResponse = serde_json::from_str(body)?;
    Ok(response
        .results
        .bindings
        .into_iter()
        .filter_map(|row| {
            let property = row.get("property")?;
            let value = row.get("value")?;
            let shown = if value.kind == "uri" {
                uri_local_name(&value.value).replace('_', " ")
            } else {
                normalize(&value.value)
            };
            Some((uri_local_name(&property.value).to_string(), shown))
        })
        .collect())
}

/// Decode the boolean of an ASK response.
pub fn parse_ask(body: &str) -> serde_json::Result<bool> {
    #[derive(Deserialize)]
    struct Ask {
        boolean: bool,
    }
    serde_json::from_str::<Ask>(body).map(|a| a.boolean)
}
