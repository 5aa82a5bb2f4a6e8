//! Write-back of external records as new ontology individuals.
//!
//! An import never touches the caller's loaded [`Ontology`]: the file is parsed
//! again, the new triples are added to that fresh graph, and the graph is
//! serialized back in place. Callers observe the individual after
//! [`Ontology::reload`].

use oxigraph::model::vocab::{rdf, rdfs, xsd};
use oxigraph::model::{Literal, NamedNode};
use serde::Serialize;

use crate::error::{ImportError, ImportResult};
use crate::external::ExternalRecord;
use crate::normalize::normalize;
use crate::ontology::{owl, LocalCatalog, Ontology, OntologyStore, PropertyKind};

/// Candidate local property names per copied field, in preference order.
const DESCRIPTION: &[&str] = &["descripcion", "description", "abstract", "comment"];
const HOMEPAGE: &[&str] = &["sitioWeb", "homepage", "website", "url"];
const RELEASE_DATE: &[&str] = &["fechaLanzamiento", "releaseDate", "launchDate", "date"];
const CREATOR: &[&str] = &["creador", "creator", "fundador", "founder"];

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub identifier: String,
    pub iri: String,
    pub class: String,
    /// Local property names that received a value.
    pub copied_properties: Vec<String>,
    /// The caller's ontology handle is stale and must be reloaded.
    pub reload_required: bool,
}

/// Materializes external records under a default class.
#[derive(Debug, Clone)]
pub struct EntityImporter {
    default_class: String,
}

impl EntityImporter {
    pub fn new(default_class: impl Into<String>) -> Self {
        Self {
            default_class: default_class.into(),
        }
    }

    pub fn default_class(&self) -> &str {
        &self.default_class
    }

    fn class_node(&self, iri: String) -> ImportResult<NamedNode> {
        NamedNode::new(iri.clone()).map_err(|_| ImportError::InvalidClass {
            class: self.default_class.clone(),
            iri,
        })
    }

    /// Add `record` to the ontology file behind `ontology`.
    pub fn import(&self, record: &ExternalRecord, ontology: &Ontology) -> ImportResult<ImportOutcome> {
        if !ontology.is_writable() {
            return Err(ImportError::ReadOnly {
                path: ontology.path().display().to_string(),
            });
        }

        let label = normalize(&record.label);
        let identifier = derive_identifier(&label).ok_or_else(|| ImportError::InvalidLabel {
            label: record.label.clone(),
        })?;
        if ontology.individual_named(&identifier).is_some() {
            return Err(ImportError::AlreadyExists { identifier });
        }

        let namespace = ontology.namespace();
        let subject = NamedNode::new(format!("{namespace}{identifier}")).map_err(|_| {
            ImportError::InvalidLabel {
                label: record.label.clone(),
            }
        })?;

        let graph = OntologyStore::load(ontology.path())?;
        if graph.query_ask(&format!("ASK {{ {subject} ?p ?o }}"))? {
            return Err(ImportError::AlreadyExists { identifier });
        }

        let class = match ontology.resolve_class(&self.default_class) {
            Some(class) => self.class_node(class.iri)?,
            None => {
                let class = self.class_node(format!("{namespace}{}", self.default_class))?;
                tracing::info!(class = %class, "declaring missing import class");
                graph.insert(&class, rdf::TYPE, owl::CLASS.into_owned())?;
                graph.insert(&class, rdfs::LABEL, Literal::new_simple_literal(&self.default_class))?;
                class
            }
        };

        graph.insert(&subject, rdf::TYPE, owl::NAMED_INDIVIDUAL.into_owned())?;
        graph.insert(&subject, rdf::TYPE, class.clone())?;
        graph.insert(&subject, rdfs::LABEL, Literal::new_simple_literal(label.replace("**", "")))?;

        let fields = [
            (DESCRIPTION, Some(normalize(&record.abstract_text))),
            (HOMEPAGE, record.homepage.clone()),
            (RELEASE_DATE, record.release_date.clone()),
            (CREATOR, record.creator.as_deref().map(normalize)),
        ];
        let mut copied_properties = Vec::new();
        for (candidates, value) in fields {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let Some(property) = candidates
                .iter()
                .filter_map(|name| ontology.property_named(name))
                .find(|p| p.kind == PropertyKind::Data)
            else {
                continue;
            };
            let predicate = NamedNode::new(property.iri.clone()).map_err(|e| {
                crate::error::OntologyError::Query {
                    message: format!("invalid property IRI {}: {e}", property.iri),
                }
            })?;
            let literal = if candidates == RELEASE_DATE {
                date_literal(&value)
            } else {
                Literal::new_simple_literal(value)
            };
            graph.insert(&subject, predicate.as_ref(), literal)?;
            copied_properties.push(property.name.clone());
        }

        graph.persist(ontology.path(), ontology.format())?;
        tracing::info!(
            identifier = %identifier,
            class = %class,
            copied = copied_properties.len(),
            "imported external record"
        );

        Ok(ImportOutcome {
            identifier,
            iri: subject.into_string(),
            class: crate::ontology::local_name(class.as_str()).to_string(),
            copied_properties,
            reload_required: true,
        })
    }
}

/// Local identifier for a label: lowercased, runs of whitespace, hyphens and
/// underscores collapsed to one `_`, anything else non-alphanumeric dropped.
/// `None` when nothing usable is left.
pub fn derive_identifier(label: &str) -> Option<String> {
    let mut out = String::with_capacity(label.len());
    let mut pending_separator = false;
    for c in label.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() || c == '-' || c == '_' {
            pending_separator = true;
        } else if c.is_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c);
        }
    }
    (!out.is_empty()).then_some(out)
}

/// `xsd:date` literal when the text starts with `YYYY-MM-DD`, plain text otherwise.
fn date_literal(value: &str) -> Literal {
    let head = value.get(..10).unwrap_or_default();
    let is_date = head.len() == 10
        && head.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });
    if is_date {
        Literal::new_typed_literal(head, xsd::DATE)
    } else {
        Literal::new_simple_literal(value)
    }
}
