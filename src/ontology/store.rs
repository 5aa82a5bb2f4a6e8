//! In-memory RDF graph of the ontology file, backed by oxigraph.
//!
//! Parses the file into an oxigraph [`Store`], answers SPARQL queries for the
//! index built in [`super::accessor`], and serializes the graph back to disk
//! after an import.

use std::collections::HashMap;
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{GraphNameRef, NamedNode, NamedNodeRef, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::{OntologyError, OntologyResult};

/// One row of SELECT bindings, keyed by variable name.
pub type Row = HashMap<String, Term>;

/// Pick the RDF syntax from a file extension. Unknown extensions (including
/// `.owl`) are treated as RDF/XML, the format Protégé writes by default.
pub fn format_for_path(path: &Path) -> RdfFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "ttl" => RdfFormat::Turtle,
        "nt" => RdfFormat::NTriples,
        "n3" => RdfFormat::N3,
        _ => RdfFormat::RdfXml,
    }
}

/// SPARQL-capable graph holding one ontology document.
pub struct OntologyStore {
    store: Store,
}

impl OntologyStore {
    /// Create an empty store.
    pub fn in_memory() -> OntologyResult<Self> {
        let store = Store::new().map_err(|e| OntologyError::Query {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self { store })
    }

    /// Parse the ontology file at `path`.
    pub fn load(path: &Path) -> OntologyResult<Self> {
        let path_display = path.display().to_string();
        if !path.exists() {
            return Err(OntologyError::Missing { path: path_display });
        }
        let data = std::fs::read(path).map_err(|source| OntologyError::Read {
            path: path_display.clone(),
            source,
        })?;

        let format = format_for_path(path);
        // Relative IRIs resolve against the file location unless the document sets its own base.
        let parser = match std::fs::canonicalize(path) {
            Ok(abs) => RdfParser::from_format(format)
                .with_base_iri(format!("file://{}", abs.display()))
                .unwrap_or_else(|_| RdfParser::from_format(format)),
            Err(_) => RdfParser::from_format(format),
        };

        let this = Self::in_memory()?;
        this.store
            .load_from_reader(parser, data.as_slice())
            .map_err(|e| OntologyError::Parse {
                path: path_display.clone(),
                message: e.to_string(),
            })?;
        tracing::info!(path = %path_display, triples = this.len()?, "ontology loaded");
        Ok(this)
    }

    /// Add a triple to the default graph.
    pub fn insert(
        &self,
        subject: &NamedNode,
        predicate: NamedNodeRef<'_>,
        object: impl Into<Term>,
    ) -> OntologyResult<()> {
        let quad = Quad::new(
            subject.clone(),
            predicate.into_owned(),
            object,
            GraphNameRef::DefaultGraph,
        );
        self.store.insert(&quad).map_err(|e| OntologyError::Query {
            message: format!("insert failed: {e}"),
        })?;
        Ok(())
    }

    /// Serialize the default graph to `path` in `format`, replacing the file.
    pub fn persist(&self, path: &Path, format: RdfFormat) -> OntologyResult<()> {
        let write_err = |message: String| OntologyError::Write {
            path: path.display().to_string(),
            message,
        };
        let bytes = self
            .store
            .dump_graph_to_writer(GraphNameRef::DefaultGraph, format, Vec::new())
            .map_err(|e| write_err(format!("serialize: {e}")))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, bytes).map_err(|e| write_err(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| write_err(e.to_string()))?;
        tracing::info!(path = %path.display(), "ontology written");
        Ok(())
    }

    /// Execute a SELECT query and collect the bindings.
    pub fn query_select(&self, sparql: &str) -> OntologyResult<Vec<Row>> {
        let results = self.store.query(sparql).map_err(|e| OntologyError::Query {
            message: format!("SPARQL query failed: {e}"),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| OntologyError::Query {
                        message: format!("solution error: {e}"),
                    })?;
                    let row = solution
                        .iter()
                        .map(|(var, term)| (var.as_str().to_string(), term.clone()))
                        .collect();
                    rows.push(row);
                }
                Ok(rows)
            }
            _ => Err(OntologyError::Query {
                message: "expected SELECT solutions".into(),
            }),
        }
    }

    /// Execute an ASK query.
    pub fn query_ask(&self, sparql: &str) -> OntologyResult<bool> {
        let results = self.store.query(sparql).map_err(|e| OntologyError::Query {
            message: format!("SPARQL query failed: {e}"),
        })?;
        match results {
            QueryResults::Boolean(b) => Ok(b),
            _ => Err(OntologyError::Query {
                message: "expected boolean result from ASK query".into(),
            }),
        }
    }

    /// Number of triples in the graph.
    pub fn len(&self) -> OntologyResult<usize> {
        self.store.len().map_err(|e| OntologyError::Query {
            message: format!("count failed: {e}"),
        })
    }

    pub fn is_empty(&self) -> OntologyResult<bool> {
        self.len().map(|n| n == 0)
    }
}

impl std::fmt::Debug for OntologyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OntologyStore").finish()
    }
}
