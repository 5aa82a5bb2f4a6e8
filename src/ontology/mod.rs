//! Local OWL ontology: loading, indexing and read-only lookup.
//!
//! The ontology file is parsed into an in-memory oxigraph store
//! ([`store::OntologyStore`]) and indexed once per load into plain Rust
//! values ([`Ontology`]). Everything that has a name implements [`Named`];
//! optional attributes such as labels are `Option`s.

pub mod accessor;
pub mod store;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

pub use accessor::{Ontology, OntologyStats};
pub use store::OntologyStore;

/// IRI of `owl:` terms used when reading and writing ontologies.
pub mod owl {
    use oxigraph::model::NamedNodeRef;

    pub const CLASS: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Class");
    pub const NAMED_INDIVIDUAL: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#NamedIndividual");
    pub const OBJECT_PROPERTY: NamedNodeRef<'static> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#ObjectProperty");
}

/// Anything in the ontology with an IRI and a short name.
pub trait Named {
    /// Local name: the IRI segment after the last `#` or `/`.
    fn name(&self) -> &str;
    fn iri(&self) -> &str;
}

/// Local name of an IRI.
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().unwrap_or(iri)
}

/// A class, also used as the handle returned by class resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OntologyClass {
    pub iri: String,
    pub name: String,
    pub label: Option<String>,
}

impl Named for OntologyClass {
    fn name(&self) -> &str {
        &self.name
    }
    fn iri(&self) -> &str {
        &self.iri
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyKind {
    Data,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OntologyProperty {
    pub iri: String,
    pub name: String,
    pub kind: PropertyKind,
}

impl Named for OntologyProperty {
    fn name(&self) -> &str {
        &self.name
    }
    fn iri(&self) -> &str {
        &self.iri
    }
}

/// A property value on an individual.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    /// Lexical `xsd:date` / `xsd:dateTime` value.
    Date(String),
    /// Name of another individual or resource.
    Reference(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Date(s) | Self::Reference(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// A named instance of one or more classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OntologyIndividual {
    pub iri: String,
    pub name: String,
    pub label: Option<String>,
    /// Declared class names (`is_a`).
    pub types: Vec<String>,
    /// Declared class IRIs, parallel to `types`.
    #[serde(skip)]
    pub type_iris: Vec<String>,
    /// Property name → values, in a stable per-load order.
    pub properties: Vec<(String, Vec<PropertyValue>)>,
}

impl Named for OntologyIndividual {
    fn name(&self) -> &str {
        &self.name
    }
    fn iri(&self) -> &str {
        &self.iri
    }
}

/// Read access to the local ontology, as needed by the reconciler.
pub trait LocalCatalog {
    /// Class names, sorted.
    fn all_classes(&self) -> BTreeSet<String>;

    fn all_individuals(&self) -> &[OntologyIndividual];

    /// (data property names, object property names).
    fn all_properties(&self) -> (Vec<String>, Vec<String>);

    /// Resolve by IRI suffix, then `rdfs:label`, then a scan by name.
    fn resolve_class(&self, name: &str) -> Option<OntologyClass>;

    /// Individuals typed by `class` or one of its subclasses.
    fn instances_of(&self, class: &OntologyClass) -> Vec<&OntologyIndividual>;

    /// Individuals whose name contains `term`, ignoring case.
    fn filter_by_name_substring(&self, term: &str) -> Vec<&OntologyIndividual>;

    /// Every property with at least one value; multiple values are comma-joined.
    fn properties_of(&self, individual: &OntologyIndividual) -> Vec<(String, String)> {
        individual
            .properties
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(name, values)| {
                let text = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                (name.clone(), text)
            })
            .collect()
    }
}
