//! SPARQL query construction for the DBpedia endpoint.
//!
//! User text never reaches the query unescaped: search terms become string
//! literals through [`string_literal`], class names must pass [`local_name`],
//! and resource URIs must parse as absolute IRIs ([`iri_ref`]).
//! Substring filters use `CONTAINS` on lower-cased text so regex
//! metacharacters in a term carry no meaning.

use oxigraph::model::NamedNode;

use crate::error::{ExternalError, ExternalResult};

const PREFIXES: &str = "\
PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX foaf: <http://xmlns.com/foaf/0.1/>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
";

/// Quote `text` as a SPARQL string literal, escaping everything that could
/// terminate the literal or change its meaning.
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Lower-cased string literal for case-insensitive comparisons.
fn lower_literal(text: &str) -> String {
    string_literal(&text.to_lowercase())
}

/// Validate a class name for use as a `dbo:` prefixed name.
pub fn local_name(name: &str) -> ExternalResult<&str> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(ExternalError::RejectedInput {
            input: name.to_string(),
            reason: "not a valid ontology class name".into(),
        })
    }
}

/// Validate and bracket an absolute IRI.
pub fn iri_ref(uri: &str) -> ExternalResult<String> {
    let node = NamedNode::new(uri).map_err(|e| ExternalError::RejectedInput {
        input: uri.to_string(),
        reason: format!("not an absolute IRI: {e}"),
    })?;
    Ok(format!("<{}>", node.as_str()))
}

/// English label equal to `term`, ignoring case.
pub fn exact_label(term: &str, limit: usize) -> String {
    format!(
        "{PREFIXES}
SELECT DISTINCT ?resource ?label ?abstract ?thumbnail ?homepage WHERE {{
  ?resource rdfs:label ?label .
  FILTER(LANG(?label) = \"en\")
  FILTER(LCASE(STR(?label)) = {term})
  OPTIONAL {{ ?resource dbo:abstract ?abstract . FILTER(LANG(?abstract) = \"en\") }}
  OPTIONAL {{ ?resource dbo:thumbnail ?thumbnail }}
  OPTIONAL {{ ?resource foaf:homepage ?homepage }}
}}
LIMIT {limit}",
        term = lower_literal(term),
    )
}

/// English label containing `term`, ignoring case.
pub fn label_contains(term: &str, limit: usize) -> String {
    format!(
        "{PREFIXES}
SELECT DISTINCT ?resource ?label ?abstract WHERE {{
  ?resource rdfs:label ?label .
  FILTER(LANG(?label) = \"en\")
  FILTER(CONTAINS(LCASE(STR(?label)), {term}))
  OPTIONAL {{ ?resource dbo:abstract ?abstract . FILTER(LANG(?abstract) = \"en\") }}
}}
LIMIT {limit}",
        term = lower_literal(term),
    )
}

/// Resources typed `dbo:<class>` or typed by any class whose label contains
/// `class_name`. The exact branch is omitted when the name is not a valid
/// local name.
pub fn instances_of_class(class_name: &str, limit: usize) -> String {
    let exact = match local_name(class_name) {
        Ok(name) => format!("{{ ?resource rdf:type dbo:{name} . }}\n  UNION\n  "),
        Err(_) => String::new(),
    };
    format!(
        "{PREFIXES}
SELECT DISTINCT ?resource ?label ?abstract WHERE {{
  {exact}{{
    ?resource rdf:type ?type .
    ?type rdfs:label ?typeLabel .
    FILTER(CONTAINS(LCASE(STR(?typeLabel)), {term}))
  }}
  ?resource rdfs:label ?label .
  FILTER(LANG(?label) = \"en\")
  OPTIONAL {{ ?resource dbo:abstract ?abstract . FILTER(LANG(?abstract) = \"en\") }}
}}
LIMIT {limit}",
        term = lower_literal(class_name),
    )
}

/// Label or subject category text containing `term`.
pub fn related_to(term: &str, limit: usize) -> String {
    format!(
        "{PREFIXES}
SELECT DISTINCT ?resource ?label ?abstract WHERE {{
  {{
    ?resource rdfs:label ?label .
    FILTER(CONTAINS(LCASE(STR(?label)), {term}))
  }}
  UNION
  {{
    ?resource dct:subject ?subject .
    FILTER(CONTAINS(LCASE(STR(?subject)), {term}))
    ?resource rdfs:label ?label .
  }}
  FILTER(LANG(?label) = \"en\")
  OPTIONAL {{ ?resource dbo:abstract ?abstract . FILTER(LANG(?abstract) = \"en\") }}
}}
LIMIT {limit}",
        term = lower_literal(term),
    )
}

/// Resources with a `dct:subject` containing `category`.
pub fn by_category(category: &str, limit: usize) -> String {
    // Category IRIs use underscores where labels use spaces.
    let needle = category.trim().replace(' ', "_");
    format!(
        "{PREFIXES}
SELECT DISTINCT ?resource ?label ?abstract ?subject WHERE {{
  ?resource dct:subject ?subject .
  FILTER(CONTAINS(LCASE(STR(?subject)), {term}))
  ?resource rdfs:label ?label .
  FILTER(LANG(?label) = \"en\")
  OPTIONAL {{ ?resource dbo:abstract ?abstract . FILTER(LANG(?abstract) = \"en\") }}
}}
LIMIT {limit}",
        term = lower_literal(&needle),
    )
}

/// Up to `limit` predicate/value pairs of a single resource.
pub fn resource_properties(uri: &str, limit: usize) -> ExternalResult<String> {
    let subject = iri_ref(uri)?;
    Ok(format!(
        "SELECT ?property ?value WHERE {{
  {subject} ?property ?value .
  FILTER(!isLiteral(?value) || LANG(?value) = \"\" || LANG(?value) = \"en\")
}}
LIMIT {limit}"
    ))
}

/// Cheapest possible query, used by the connectivity probe.
pub const PROBE: &str = "ASK { ?s ?p ?o }";
