// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ontolens
//!
//! Explore an OWL ontology and enrich it with DBpedia, with an offline cache
//! for when the network is unavailable.
//!
//! ## Architecture
//!
//! - **Normalizer** (`normalize`): strips markup from external text
//! - **Offline cache** (`cache`): JSON file of term → first external record
//! - **External source** (`external`): DBpedia Lookup + SPARQL over `ureq`
//! - **Local ontology** (`ontology`): oxigraph-backed, indexed per load
//! - **Reconciler** (`reconcile`): local/external/hybrid search with warnings
//! - **Importer** (`import`): writes external records back as individuals
//! - **Explorer** (`explorer`): caller-owned facade over all of the above
//!
//! ## Library usage
//!
//! ```no_run
//! use ontolens::config::ExplorerConfig;
//! use ontolens::explorer::Explorer;
//! use ontolens::reconcile::QueryMode;
//!
//! let config = ExplorerConfig::default();
//! let mut explorer = Explorer::open(&config, "dbpedia_cache.json").unwrap();
//! let outcome = explorer.search("bitcoin", QueryMode::Hybrid);
//! for result in &outcome.results {
//!     println!("{} ({:?})", result.display_name(), result.origin());
//! }
//! for warning in &outcome.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod explorer;
pub mod external;
pub mod import;
pub mod normalize;
pub mod ontology;
pub mod paths;
pub mod reconcile;
