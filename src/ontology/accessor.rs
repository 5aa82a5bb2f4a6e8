//! Indexed, read-only view of a loaded ontology.
//!
//! The index is built once per load with SPARQL queries against the
//! [`OntologyStore`]; orderings come from `ORDER BY` clauses, so the same file
//! always yields the same order. Mutations go through the importer, after
//! which the caller takes a fresh handle with [`Ontology::reload`].

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use oxigraph::io::RdfFormat;
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, Term};
use serde::Serialize;

use crate::error::OntologyResult;

use super::store::{format_for_path, OntologyStore, Row};
use super::{
    local_name, LocalCatalog, OntologyClass, OntologyIndividual, OntologyProperty, PropertyKind,
    PropertyValue,
};

const PREFIXES: &str = "\
PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
";

/// Namespace for new individuals when the document declares no ontology IRI
/// and has no classes to borrow a namespace from.
const FALLBACK_NAMESPACE: &str = "http://ontolens.local/ontology#";

/// Counts shown in the overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OntologyStats {
    pub classes: usize,
    pub data_properties: usize,
    pub object_properties: usize,
    pub individuals: usize,
}

/// A loaded ontology file and its index.
#[derive(Debug)]
pub struct Ontology {
    path: PathBuf,
    format: RdfFormat,
    writable: bool,
    store: OntologyStore,
    ontology_iri: Option<String>,
    classes: Vec<OntologyClass>,
    /// Class IRI → direct subclass IRIs.
    subclasses: HashMap<String, Vec<String>>,
    properties: Vec<OntologyProperty>,
    individuals: Vec<OntologyIndividual>,
}

impl Ontology {
    /// Load an ontology that imports may write back to.
    pub fn open(path: impl AsRef<Path>) -> OntologyResult<Self> {
        Self::load(path.as_ref(), true)
    }

    /// Load an ontology that is never written.
    pub fn open_read_only(path: impl AsRef<Path>) -> OntologyResult<Self> {
        Self::load(path.as_ref(), false)
    }

    fn load(path: &Path, writable: bool) -> OntologyResult<Self> {
        let store = OntologyStore::load(path)?;
        let mut ontology = Self {
            path: path.to_path_buf(),
            format: format_for_path(path),
            writable,
            store,
            ontology_iri: None,
            classes: Vec::new(),
            subclasses: HashMap::new(),
            properties: Vec::new(),
            individuals: Vec::new(),
        };
        ontology.build_index()?;
        tracing::info!(
            path = %path.display(),
            classes = ontology.classes.len(),
            properties = ontology.properties.len(),
            individuals = ontology.individuals.len(),
            "ontology indexed"
        );
        Ok(ontology)
    }

    /// Load the backing file again and return a fresh handle.
    pub fn reload(&self) -> OntologyResult<Self> {
        Self::load(&self.path, self.writable)
    }

    fn build_index(&mut self) -> OntologyResult<()> {
        self.ontology_iri = self
            .store
            .query_select(&format!(
                "{PREFIXES}SELECT ?o WHERE {{ ?o a owl:Ontology . FILTER(isIRI(?o)) }} ORDER BY ?o LIMIT 1"
            ))?
            .first()
            .and_then(|row| iri_of(row, "o"));

        let class_rows = self.store.query_select(&format!(
            "{PREFIXES}SELECT ?c (SAMPLE(?l) AS ?label) WHERE {{
  {{ ?c a owl:Class }} UNION {{ ?c a rdfs:Class }}
  FILTER(isIRI(?c))
  OPTIONAL {{ ?c rdfs:label ?l }}
}} GROUP BY ?c ORDER BY ?c"
        ))?;
        let mut classes: Vec<OntologyClass> = class_rows
            .iter()
            .filter_map(|row| {
                let iri = iri_of(row, "c")?;
                Some(OntologyClass {
                    name: local_name(&iri).to_string(),
                    label: literal_of(row, "label"),
                    iri,
                })
            })
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.iri.cmp(&b.iri)));
        self.classes = classes;

        self.subclasses.clear();
        for row in self.store.query_select(&format!(
            "{PREFIXES}SELECT ?sub ?sup WHERE {{ ?sub rdfs:subClassOf ?sup . FILTER(isIRI(?sub) && isIRI(?sup)) }} ORDER BY ?sup ?sub"
        ))? {
            if let (Some(sub), Some(sup)) = (iri_of(&row, "sub"), iri_of(&row, "sup")) {
                self.subclasses.entry(sup).or_default().push(sub);
            }
        }

        self.properties = self
            .store
            .query_select(&format!(
                "{PREFIXES}SELECT DISTINCT ?p ?kind WHERE {{
  ?p a ?kind .
  VALUES ?kind {{ owl:DatatypeProperty owl:ObjectProperty }}
  FILTER(isIRI(?p))
}} ORDER BY ?p"
            ))?
            .iter()
            .filter_map(|row| {
                let iri = iri_of(row, "p")?;
                let kind = if iri_of(row, "kind")? == super::owl::OBJECT_PROPERTY.as_str() {
                    PropertyKind::Object
                } else {
                    PropertyKind::Data
                };
                Some(OntologyProperty {
                    name: local_name(&iri).to_string(),
                    iri,
                    kind,
                })
            })
            .collect();

        self.individuals = self.index_individuals()?;
        Ok(())
    }

    fn index_individuals(&self) -> OntologyResult<Vec<OntologyIndividual>> {
        let class_iris: HashSet<&str> = self.classes.iter().map(|c| c.iri.as_str()).collect();

        let mut individuals: Vec<OntologyIndividual> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();
        let ids = self.store.query_select(&format!(
            "{PREFIXES}SELECT DISTINCT ?i WHERE {{
  {{ ?i a owl:NamedIndividual }} UNION {{ ?i a ?c . {{ ?c a owl:Class }} UNION {{ ?c a rdfs:Class }} }}
  FILTER(isIRI(?i))
}} ORDER BY ?i"
        ))?;
        for row in &ids {
            let Some(iri) = iri_of(row, "i") else { continue };
            // Classes punned as individuals stay classes.
            if class_iris.contains(iri.as_str()) {
                continue;
            }
            position.insert(iri.clone(), individuals.len());
            individuals.push(OntologyIndividual {
                name: local_name(&iri).to_string(),
                iri,
                label: None,
                types: Vec::new(),
                type_iris: Vec::new(),
                properties: Vec::new(),
            });
        }

        let values = self.store.query_select(&format!(
            "{PREFIXES}SELECT ?i ?p ?v WHERE {{ ?i ?p ?v . FILTER(isIRI(?i)) }} ORDER BY ?i ?p ?v"
        ))?;
        for row in &values {
            let (Some(iri), Some(predicate), Some(value)) =
                (iri_of(row, "i"), iri_of(row, "p"), row.get("v"))
            else {
                continue;
            };
            let Some(&idx) = position.get(&iri) else {
                continue;
            };
            let individual = &mut individuals[idx];

            if predicate == oxigraph::model::vocab::rdf::TYPE.as_str() {
                if let Term::NamedNode(class) = value {
                    if class.as_str() != super::owl::NAMED_INDIVIDUAL.as_str() {
                        individual.types.push(local_name(class.as_str()).to_string());
                        individual.type_iris.push(class.as_str().to_string());
                    }
                }
                continue;
            }
            if predicate == oxigraph::model::vocab::rdfs::LABEL.as_str() && individual.label.is_none()
            {
                if let Term::Literal(l) = value {
                    individual.label = Some(l.value().to_string());
                }
            }

            let Some(value) = property_value(value) else {
                continue;
            };
            let name = local_name(&predicate);
            match individual.properties.iter_mut().find(|(n, _)| n == name) {
                Some((_, vals)) => vals.push(value),
                None => individual.properties.push((name.to_string(), vec![value])),
            }
        }

        Ok(individuals)
    }

    /// Class IRI plus every transitive subclass IRI.
    fn class_closure(&self, root: &str) -> HashSet<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([root.to_string()]);
        while let Some(iri) = queue.pop_front() {
            if !seen.insert(iri.clone()) {
                continue;
            }
            if let Some(subs) = self.subclasses.get(&iri) {
                queue.extend(subs.iter().cloned());
            }
        }
        seen
    }

    pub fn classes(&self) -> &[OntologyClass] {
        &self.classes
    }

    pub fn properties(&self) -> &[OntologyProperty] {
        &self.properties
    }

    /// Property lookup by local name, ignoring case.
    pub fn property_named(&self, name: &str) -> Option<&OntologyProperty> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Individual lookup by name, ignoring case.
    pub fn individual_named(&self, name: &str) -> Option<&OntologyIndividual> {
        let lower = name.to_lowercase();
        self.individuals
            .iter()
            .find(|i| i.name.to_lowercase() == lower)
    }

    pub fn stats(&self) -> OntologyStats {
        let data_properties = self
            .properties
            .iter()
            .filter(|p| p.kind == PropertyKind::Data)
            .count();
        OntologyStats {
            classes: self.classes.len(),
            data_properties,
            object_properties: self.properties.len() - data_properties,
            individuals: self.individuals.len(),
        }
    }

    /// IRI declared by `owl:Ontology`, if any.
    pub fn ontology_iri(&self) -> Option<&str> {
        self.ontology_iri.as_deref()
    }

    /// Namespace (ending in `#` or `/`) under which new individuals are minted.
    pub fn namespace(&self) -> String {
        if let Some(iri) = &self.ontology_iri {
            return if iri.ends_with('#') || iri.ends_with('/') {
                iri.clone()
            } else {
                format!("{iri}#")
            };
        }
        self.classes
            .first()
            .map(|c| c.iri[..c.iri.len() - c.name.len()].to_string())
            .filter(|ns| ns.ends_with('#') || ns.ends_with('/'))
            .unwrap_or_else(|| FALLBACK_NAMESPACE.to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> RdfFormat {
        self.format
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl LocalCatalog for Ontology {
    fn all_classes(&self) -> BTreeSet<String> {
        self.classes.iter().map(|c| c.name.clone()).collect()
    }

    fn all_individuals(&self) -> &[OntologyIndividual] {
        &self.individuals
    }

    fn all_properties(&self) -> (Vec<String>, Vec<String>) {
        let mut data = Vec::new();
        let mut object = Vec::new();
        for p in &self.properties {
            match p.kind {
                PropertyKind::Data => data.push(p.name.clone()),
                PropertyKind::Object => object.push(p.name.clone()),
            }
        }
        data.sort();
        object.sort();
        (data, object)
    }

    fn resolve_class(&self, name: &str) -> Option<OntologyClass> {
        if name.is_empty() {
            return None;
        }
        let by_suffix = || {
            self.classes.iter().find(|c| {
                c.iri
                    .strip_suffix(name)
                    .is_some_and(|head| head.ends_with('#') || head.ends_with('/'))
            })
        };
        let by_label = || {
            self.classes
                .iter()
                .find(|c| c.label.as_deref() == Some(name))
        };
        let by_scan = || self.classes.iter().find(|c| c.name == name);

        by_suffix().or_else(by_label).or_else(by_scan).cloned()
    }

    fn instances_of(&self, class: &OntologyClass) -> Vec<&OntologyIndividual> {
        let closure = self.class_closure(&class.iri);
        self.individuals
            .iter()
            .filter(|i| i.type_iris.iter().any(|t| closure.contains(t)))
            .collect()
    }

    fn filter_by_name_substring(&self, term: &str) -> Vec<&OntologyIndividual> {
        let needle = term.to_lowercase();
        self.individuals
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .collect()
    }
}

fn iri_of(row: &Row, var: &str) -> Option<String> {
    match row.get(var)? {
        Term::NamedNode(n) => Some(n.as_str().to_string()),
        _ => None,
    }
}

fn literal_of(row: &Row, var: &str) -> Option<String> {
    match row.get(var)? {
        Term::Literal(l) => Some(l.value().to_string()),
        _ => None,
    }
}

/// Convert an object term into a typed property value. Blank nodes are skipped.
fn property_value(term: &Term) -> Option<PropertyValue> {
    match term {
        Term::NamedNode(n) => Some(PropertyValue::Reference(local_name(n.as_str()).to_string())),
        Term::Literal(l) => Some(literal_value(l)),
        _ => None,
    }
}

fn literal_value(literal: &Literal) -> PropertyValue {
    let lexical = literal.value();
    let datatype = literal.datatype();
    let integer_types = [
        xsd::INTEGER,
        xsd::INT,
        xsd::LONG,
        xsd::SHORT,
        xsd::NON_NEGATIVE_INTEGER,
        xsd::POSITIVE_INTEGER,
        xsd::UNSIGNED_INT,
        xsd::UNSIGNED_LONG,
    ];
    if integer_types.contains(&datatype) {
        if let Ok(n) = lexical.trim().parse() {
            return PropertyValue::Integer(n);
        }
    } else if [xsd::DECIMAL, xsd::DOUBLE, xsd::FLOAT].contains(&datatype) {
        if let Ok(n) = lexical.trim().parse() {
            return PropertyValue::Decimal(n);
        }
    } else if datatype == xsd::BOOLEAN {
        match lexical.trim() {
            "true" | "1" => return PropertyValue::Boolean(true),
            "false" | "0" => return PropertyValue::Boolean(false),
            _ => {}
        }
    } else if [xsd::DATE, xsd::DATE_TIME, xsd::G_YEAR].contains(&datatype) {
        return PropertyValue::Date(lexical.to_string());
    }
    PropertyValue::Text(lexical.to_string())
}
