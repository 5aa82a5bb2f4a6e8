//! Rich diagnostic error types for ontolens.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Absent classes, individuals and cache keys are not errors: lookups return
//! `None` or an empty collection instead.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for ontolens.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ExplorerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Ontology errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OntologyError {
    #[error("ontology file not found: {path}")]
    #[diagnostic(
        code(ontolens::ontology::missing),
        help(
            "Check the path passed with --ontology or the `ontology_path` config key. \
             Relative paths are resolved against the current directory."
        )
    )]
    Missing { path: String },

    #[error("failed to read ontology file: {path}")]
    #[diagnostic(
        code(ontolens::ontology::read),
        help("Ensure the file is readable by the current user.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ontology document {path}: {message}")]
    #[diagnostic(
        code(ontolens::ontology::parse),
        help(
            "The file is not valid RDF/XML, Turtle or N-Triples. \
             Re-export it from your ontology editor (e.g. Protégé as RDF/XML)."
        )
    )]
    Parse { path: String, message: String },

    #[error("failed to write ontology file {path}: {message}")]
    #[diagnostic(
        code(ontolens::ontology::write),
        help("Check write permissions on the ontology file and its directory.")
    )]
    Write { path: String, message: String },

    #[error("ontology graph query failed: {message}")]
    #[diagnostic(
        code(ontolens::ontology::query),
        help("The in-memory ontology graph rejected a query. This is a bug; please report it.")
    )]
    Query { message: String },
}

pub type OntologyResult<T> = std::result::Result<T, OntologyError>;

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("failed to read cache file {path}: {message}")]
    #[diagnostic(
        code(ontolens::cache::read),
        help("The cache will start empty. Delete or fix the file to silence this warning.")
    )]
    Read { path: String, message: String },

    #[error("failed to write cache file {path}")]
    #[diagnostic(
        code(ontolens::cache::write),
        help(
            "Check that the cache directory exists and is writable. \
             Results are still returned but will not be available offline."
        )
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize cache: {message}")]
    #[diagnostic(code(ontolens::cache::serialize))]
    Serialize { message: String },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

// ---------------------------------------------------------------------------
// External source errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExternalError {
    #[error("{endpoint} timed out after {timeout_secs}s")]
    #[diagnostic(
        code(ontolens::external::timeout),
        help("DBpedia is slow or unreachable. Retry later or use --mode local.")
    )]
    Timeout { endpoint: String, timeout_secs: u64 },

    #[error("{endpoint} returned HTTP {status}: {message}")]
    #[diagnostic(
        code(ontolens::external::endpoint),
        help("The remote service reported an error. It may be overloaded; retry later.")
    )]
    Endpoint {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("could not reach {endpoint}: {message}")]
    #[diagnostic(
        code(ontolens::external::transport),
        help("Check your network connection. Cached results are used while offline.")
    )]
    Transport { endpoint: String, message: String },

    #[error("unexpected response from {endpoint}: {message}")]
    #[diagnostic(
        code(ontolens::external::decode),
        help("The remote service answered with a payload that could not be decoded.")
    )]
    Decode { endpoint: String, message: String },

    #[error("malformed query sent to {endpoint}: {message}")]
    #[diagnostic(
        code(ontolens::external::malformed_query),
        help("Query text is built from escaped terms, so this indicates a bug. Please report it.")
    )]
    MalformedQuery { endpoint: String, message: String },

    #[error("rejected search input \"{input}\": {reason}")]
    #[diagnostic(
        code(ontolens::external::rejected_input),
        help("Class names may only contain letters, digits and underscores.")
    )]
    RejectedInput { input: String, reason: String },
}

impl ExternalError {
    /// Whether the failure was a timeout rather than an endpoint or transport error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type ExternalResult<T> = std::result::Result<T, ExternalError>;

// ---------------------------------------------------------------------------
// Import errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("individual \"{identifier}\" already exists in the ontology")]
    #[diagnostic(
        code(ontolens::import::already_exists),
        help("Imports never overwrite existing individuals. Edit it in your ontology editor instead.")
    )]
    AlreadyExists { identifier: String },

    #[error("cannot derive an identifier from label \"{label}\"")]
    #[diagnostic(
        code(ontolens::import::invalid_label),
        help("The external record needs a label containing at least one letter or digit.")
    )]
    InvalidLabel { label: String },

    #[error("import class \"{class}\" does not form a valid IRI: {iri}")]
    #[diagnostic(
        code(ontolens::import::invalid_class),
        help("Set `import_class` to a plain class name without spaces or angle brackets.")
    )]
    InvalidClass { class: String, iri: String },

    #[error("ontology {path} is opened read-only")]
    #[diagnostic(
        code(ontolens::import::read_only),
        help("Drop --read-only (or set `read_only = false`) to enable imports.")
    )]
    ReadOnly { path: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ontology(#[from] OntologyError),
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(ontolens::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(ontolens::config::parse),
        help("Check the TOML syntax. Unknown keys are rejected.")
    )]
    Parse { path: String, message: String },

    #[error("cannot determine home directory")]
    #[diagnostic(
        code(ontolens::config::no_home),
        help("Set the HOME environment variable or pass explicit --ontology/--cache paths.")
    )]
    NoHome,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for functions returning ontolens results.
pub type ExplorerResult<T> = std::result::Result<T, ExplorerError>;
