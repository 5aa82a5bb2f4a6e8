//! Explorer facade: top-level API for ontolens.
//!
//! The `Explorer` owns the loaded ontology, the external source and the
//! offline cache, and exposes the caller-facing query surface. It is an
//! explicit, caller-owned handle: after an import the ontology is reloaded in
//! place, and [`Explorer::reload`] picks up edits made by other tools.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::cache::OfflineCache;
use crate::config::ExplorerConfig;
use crate::error::ExplorerResult;
use crate::external::{DbpediaClient, ExternalRecord, ExternalSource};
use crate::import::{EntityImporter, ImportOutcome};
use crate::ontology::{LocalCatalog, Ontology, OntologyClass, OntologyStats};
use crate::reconcile::{
    LocalView, QueryMode, ReconcileOptions, Reconciler, SearchOutcome, SearchWarning,
};

/// Ontology exploration with DBpedia enrichment.
pub struct Explorer<E: ExternalSource = DbpediaClient> {
    ontology: Ontology,
    external: E,
    cache: OfflineCache,
    importer: EntityImporter,
    options: ReconcileOptions,
}

impl Explorer<DbpediaClient> {
    /// Open the configured ontology and cache with the HTTP DBpedia client.
    pub fn open(config: &ExplorerConfig, cache_path: impl Into<PathBuf>) -> ExplorerResult<Self> {
        let client = DbpediaClient::new(config.external.clone());
        Self::with_source(config, cache_path, client)
    }
}

impl<E: ExternalSource> Explorer<E> {
    /// Open with any external source implementation.
    ///
    /// Fails only when the ontology cannot be loaded; a corrupt cache is
    /// reported through [`startup_warnings`](Self::startup_warnings).
    pub fn with_source(
        config: &ExplorerConfig,
        cache_path: impl Into<PathBuf>,
        external: E,
    ) -> ExplorerResult<Self> {
        let ontology = if config.read_only {
            Ontology::open_read_only(&config.ontology_path)?
        } else {
            Ontology::open(&config.ontology_path)?
        };
        let cache = OfflineCache::open(cache_path);
        let options = ReconcileOptions {
            writable: ontology.is_writable(),
            structured_limit: config.external.structured_limit,
            class_limit: config.external.class_limit,
        };
        tracing::info!(
            ontology = %ontology.path().display(),
            cache = %cache.path().display(),
            writable = options.writable,
            "explorer ready"
        );
        Ok(Self {
            ontology,
            external,
            cache,
            importer: EntityImporter::new(config.import_class.clone()),
            options,
        })
    }

    fn reconciler(&mut self) -> Reconciler<'_, Ontology, E> {
        Reconciler::new(&self.ontology, &self.external, &mut self.cache, self.options)
    }

    pub fn search(&mut self, term: &str, mode: QueryMode) -> SearchOutcome {
        self.reconciler().search(term, mode)
    }

    /// Classes sorted by name.
    pub fn list_classes(&self) -> &[OntologyClass] {
        self.ontology.classes()
    }

    /// (data property names, object property names), each sorted.
    pub fn list_properties(&self) -> (Vec<String>, Vec<String>) {
        self.ontology.all_properties()
    }

    /// All individuals, or those whose name contains `filter`.
    pub fn list_individuals(&self, filter: Option<&str>) -> Vec<LocalView> {
        let individuals: Vec<_> = match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(f) => self.ontology.filter_by_name_substring(f),
            None => self.ontology.all_individuals().iter().collect(),
        };
        individuals
            .into_iter()
            .map(|i| LocalView::new(&self.ontology, i))
            .collect()
    }

    pub fn instances_of_local_class(&mut self, name: &str) -> SearchOutcome {
        self.reconciler().instances_of_local_class(name)
    }

    pub fn instances_of_external_class(&mut self, name: &str) -> SearchOutcome {
        self.reconciler().instances_of_external_class(name)
    }

    pub fn category_search(&mut self, category: &str) -> SearchOutcome {
        self.reconciler().category_search(category)
    }

    /// Import `record` as a new individual, then reload the ontology so the
    /// individual is visible to subsequent queries.
    pub fn import_external(&mut self, record: &ExternalRecord) -> ExplorerResult<ImportOutcome> {
        let outcome = self.importer.import(record, &self.ontology)?;
        if outcome.reload_required {
            self.reload()?;
        }
        Ok(outcome)
    }

    /// Replace the ontology handle with a fresh load of the same file.
    pub fn reload(&mut self) -> ExplorerResult<()> {
        self.ontology = self.ontology.reload()?;
        Ok(())
    }

    pub fn stats(&self) -> OntologyStats {
        self.ontology.stats()
    }

    pub fn is_online(&self) -> bool {
        self.external.connectivity_check()
    }

    /// Conditions detected while opening that callers should show once.
    pub fn startup_warnings(&self) -> Vec<SearchWarning> {
        self.cache
            .load_warning()
            .map(|e| SearchWarning::CacheLoadFailed {
                error: e.to_string(),
            })
            .into_iter()
            .collect()
    }

    pub fn info(&self) -> ExplorerInfo {
        ExplorerInfo {
            ontology_path: self.ontology.path().display().to_string(),
            ontology_iri: self.ontology.ontology_iri().map(str::to_string),
            writable: self.ontology.is_writable(),
            stats: self.stats(),
            cache_path: self.cache.path().display().to_string(),
            cache_entries: self.cache.len(),
        }
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    pub fn external(&self) -> &E {
        &self.external
    }
}

impl<E: ExternalSource> fmt::Debug for Explorer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explorer")
            .field("ontology", &self.ontology.path())
            .field("cache", &self.cache.path())
            .field("options", &self.options)
            .finish()
    }
}

/// Overview of the loaded ontology and cache.
#[derive(Debug, Clone, Serialize)]
pub struct ExplorerInfo {
    pub ontology_path: String,
    pub ontology_iri: Option<String>,
    pub writable: bool,
    pub stats: OntologyStats,
    pub cache_path: String,
    pub cache_entries: usize,
}

impl fmt::Display for ExplorerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ontolens")?;
        writeln!(f, "  ontology:           {}", self.ontology_path)?;
        if let Some(iri) = &self.ontology_iri {
            writeln!(f, "  iri:                {iri}")?;
        }
        writeln!(f, "  writable:           {}", self.writable)?;
        writeln!(f, "  classes:            {}", self.stats.classes)?;
        writeln!(f, "  data properties:    {}", self.stats.data_properties)?;
        writeln!(f, "  object properties:  {}", self.stats.object_properties)?;
        writeln!(f, "  individuals:        {}", self.stats.individuals)?;
        writeln!(f, "  cache:              {}", self.cache_path)?;
        writeln!(f, "  cached terms:       {}", self.cache_entries)?;
        Ok(())
    }
}
