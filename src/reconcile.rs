//! Result reconciliation: runs the local and external branches of a query and
//! merges them into one ordered list of [`UnifiedResult`]s.
//!
//! Local results always come first, external results second, never
//! interleaved. Failures on the external branch degrade to a
//! [`SearchWarning`] plus an empty external list; they never abort the local
//! branch. Zero results is a valid outcome and produces no warning.

use std::fmt;

use serde::Serialize;

use crate::cache::OfflineCache;
use crate::error::ExternalError;
use crate::external::{uri_local_name, ExternalRecord, ExternalSource};
use crate::normalize::normalize;
use crate::ontology::{LocalCatalog, OntologyIndividual};

/// Which branches a search activates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Local,
    External,
    #[default]
    Hybrid,
}

impl QueryMode {
    pub fn includes_local(self) -> bool {
        self != Self::External
    }

    pub fn includes_external(self) -> bool {
        self != Self::Local
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::External => "external",
            Self::Hybrid => "hybrid",
        })
    }
}

impl std::str::FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "external" => Ok(Self::External),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown query mode \"{other}\" (expected local, external or hybrid)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Local,
    External,
}

/// Local individual as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalView {
    pub name: String,
    pub iri: String,
    pub types: Vec<String>,
    pub properties: Vec<(String, String)>,
}

impl LocalView {
    pub fn new<L: LocalCatalog + ?Sized>(catalog: &L, individual: &OntologyIndividual) -> Self {
        Self {
            name: individual.name.clone(),
            iri: individual.iri.clone(),
            types: individual.types.clone(),
            properties: catalog
                .properties_of(individual)
                .into_iter()
                .map(|(name, value)| (name, normalize(&value)))
                .filter(|(_, value)| !value.is_empty())
                .collect(),
        }
    }
}

/// External record as shown to callers. The record is always normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalView {
    pub record: ExternalRecord,
    pub importable: bool,
}

impl ExternalView {
    pub fn new(record: &ExternalRecord, importable: bool) -> Self {
        Self {
            record: record.normalized(),
            importable,
        }
    }
}

/// One row of a search result, local or external.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum UnifiedResult {
    Local(LocalView),
    External(ExternalView),
}

impl UnifiedResult {
    pub fn origin(&self) -> Origin {
        match self {
            Self::Local(_) => Origin::Local,
            Self::External(_) => Origin::External,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Local(v) => &v.name,
            Self::External(v) if v.record.label.is_empty() => uri_local_name(&v.record.uri),
            Self::External(v) => &v.record.label,
        }
    }

    pub fn type_labels(&self) -> Vec<String> {
        match self {
            Self::Local(v) => v.types.clone(),
            Self::External(v) => v
                .record
                .type_tag
                .iter()
                .chain(&v.record.extended_types)
                .cloned()
                .collect(),
        }
    }

    /// Ordered `(name, text)` pairs. Empty fields are left out.
    pub fn properties(&self) -> Vec<(String, String)> {
        match self {
            Self::Local(v) => v.properties.clone(),
            Self::External(v) => {
                let r = &v.record;
                let fields = [
                    ("uri", Some(r.uri.clone())),
                    ("abstract", Some(r.abstract_text.clone())),
                    ("categories", Some(r.categories.join(", "))),
                    ("creator", r.creator.clone()),
                    ("release_date", r.release_date.clone()),
                    ("homepage", r.homepage.clone()),
                    ("thumbnail", r.thumbnail.clone()),
                ];
                fields
                    .into_iter()
                    .filter_map(|(name, value)| {
                        value
                            .filter(|v| !v.is_empty())
                            .map(|v| (name.to_string(), v))
                    })
                    .collect()
            }
        }
    }

    /// True only for external rows when the ontology can be written.
    pub fn import_available(&self) -> bool {
        matches!(self, Self::External(v) if v.importable)
    }

    pub fn as_external(&self) -> Option<&ExternalRecord> {
        match self {
            Self::External(v) => Some(&v.record),
            Self::Local(_) => None,
        }
    }
}

/// External call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalStage {
    StructuredSearch,
    RelatedInstances,
    ClassInstances,
    Category,
}

impl fmt::Display for ExternalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StructuredSearch => "structured search",
            Self::RelatedInstances => "related-instances query",
            Self::ClassInstances => "class-instances query",
            Self::Category => "category query",
        })
    }
}

/// What the structured fallback produced after the fast search failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FallbackOutcome {
    Recovered { results: usize },
    Empty,
    Failed { error: String, timed_out: bool },
}

/// Non-fatal condition attached to a [`SearchOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum SearchWarning {
    /// The external source was unreachable; results come from the offline cache.
    OfflineMode { cached: usize },
    ExternalFailed {
        stage: ExternalStage,
        error: String,
        timed_out: bool,
    },
    FastSearchFallback {
        error: String,
        timed_out: bool,
        fallback: FallbackOutcome,
    },
    CacheWriteFailed { key: String, error: String },
    CacheLoadFailed { error: String },
    ClassNotFound { name: String },
}

impl SearchWarning {
    fn external_failed(stage: ExternalStage, error: &ExternalError) -> Self {
        Self::ExternalFailed {
            stage,
            error: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }
}

impl fmt::Display for SearchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OfflineMode { cached } => write!(
                f,
                "offline mode: DBpedia is unreachable, showing {cached} cached result(s)"
            ),
            Self::ExternalFailed {
                stage,
                error,
                timed_out: true,
            } => write!(f, "external {stage} timed out: {error}"),
            Self::ExternalFailed { stage, error, .. } => {
                write!(f, "external {stage} failed: {error}")
            }
            Self::FastSearchFallback {
                error,
                timed_out,
                fallback,
            } => {
                let what = if *timed_out { "timed out" } else { "failed" };
                write!(f, "fast search {what} ({error}); ")?;
                match fallback {
                    FallbackOutcome::Recovered { results } => {
                        write!(f, "structured search returned {results} result(s)")
                    }
                    FallbackOutcome::Empty => f.write_str("structured search found nothing"),
                    FallbackOutcome::Failed { error, .. } => {
                        write!(f, "structured search also failed: {error}")
                    }
                }
            }
            Self::CacheWriteFailed { key, error } => {
                write!(f, "could not cache result for \"{key}\": {error}")
            }
            Self::CacheLoadFailed { error } => {
                write!(f, "offline cache was unreadable and started empty: {error}")
            }
            Self::ClassNotFound { name } => write!(f, "class \"{name}\" not found in the ontology"),
        }
    }
}

/// Results plus the warnings collected while producing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<UnifiedResult>,
    pub warnings: Vec<SearchWarning>,
    /// Set whenever the offline cache stood in for the network.
    pub offline: bool,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn local(&self) -> impl Iterator<Item = &LocalView> {
        self.results.iter().filter_map(|r| match r {
            UnifiedResult::Local(v) => Some(v),
            UnifiedResult::External(_) => None,
        })
    }

    pub fn external(&self) -> impl Iterator<Item = &ExternalView> {
        self.results.iter().filter_map(|r| match r {
            UnifiedResult::External(v) => Some(v),
            UnifiedResult::Local(_) => None,
        })
    }
}

/// Per-call knobs for the reconciler.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Whether external rows offer import.
    pub writable: bool,
    pub structured_limit: usize,
    pub class_limit: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            writable: false,
            structured_limit: 10,
            class_limit: 20,
        }
    }
}

/// Orchestrates one query against the local catalog, the external source and
/// the offline cache. Borrowed per call; holds no state of its own.
pub struct Reconciler<'a, L: ?Sized, E: ?Sized> {
    local: &'a L,
    external: &'a E,
    cache: &'a mut OfflineCache,
    options: ReconcileOptions,
}

impl<'a, L, E> Reconciler<'a, L, E>
where
    L: LocalCatalog + ?Sized,
    E: ExternalSource + ?Sized,
{
    pub fn new(
        local: &'a L,
        external: &'a E,
        cache: &'a mut OfflineCache,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            local,
            external,
            cache,
            options,
        }
    }

    /// Run `term` through the branches selected by `mode`.
    pub fn search(&mut self, term: &str, mode: QueryMode) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let term = term.trim();
        if term.is_empty() {
            return outcome;
        }
        tracing::debug!(term, %mode, "search");

        if mode.includes_local() {
            let hits = self.local.filter_by_name_substring(term);
            outcome.results.extend(
                hits.into_iter()
                    .map(|i| UnifiedResult::Local(LocalView::new(self.local, i))),
            );
        }

        if mode.includes_external() {
            let records = if self.external.connectivity_check() {
                let records = self.online_search(term, &mut outcome);
                self.remember(term, &records, &mut outcome);
                records
            } else {
                self.from_cache(term, &mut outcome)
            };
            self.push_external(&records, &mut outcome);
        }

        outcome
    }

    /// Fast search, with one structured retry on failure. Always leaves
    /// exactly one warning behind when the fast search fails.
    fn online_search(&self, term: &str, outcome: &mut SearchOutcome) -> Vec<ExternalRecord> {
        let fast_err = match self.external.fast_search(term) {
            Ok(records) => return records,
            Err(e) => e,
        };
        tracing::warn!(term, error = %fast_err, "fast search failed, trying structured search");

        let (records, fallback) =
            match self.external.structured_search(term, self.options.structured_limit) {
                Ok(records) if records.is_empty() => (records, FallbackOutcome::Empty),
                Ok(records) => {
                    let results = records.len();
                    (records, FallbackOutcome::Recovered { results })
                }
                Err(e) => {
                    tracing::warn!(term, error = %e, "structured search failed");
                    (
                        Vec::new(),
                        FallbackOutcome::Failed {
                            error: e.to_string(),
                            timed_out: e.is_timeout(),
                        },
                    )
                }
            };
        outcome.warnings.push(SearchWarning::FastSearchFallback {
            error: fast_err.to_string(),
            timed_out: fast_err.is_timeout(),
            fallback,
        });
        records
    }

    /// Individuals of a local class (including subclasses).
    pub fn instances_of_local_class(&self, name: &str) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let name = name.trim();
        if name.is_empty() {
            return outcome;
        }
        match self.local.resolve_class(name) {
            Some(class) => outcome.results.extend(
                self.local
                    .instances_of(&class)
                    .into_iter()
                    .map(|i| UnifiedResult::Local(LocalView::new(self.local, i))),
            ),
            None => outcome.warnings.push(SearchWarning::ClassNotFound {
                name: name.to_string(),
            }),
        }
        outcome
    }

    /// External resources related to, or typed by, `class_name`.
    pub fn instances_of_external_class(&mut self, class_name: &str) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return outcome;
        }

        let records = if self.external.connectivity_check() {
            let related = match self.external.instances_related_to(class_name) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(class = class_name, error = %e, "related-instances query failed");
                    outcome
                        .warnings
                        .push(SearchWarning::external_failed(ExternalStage::RelatedInstances, &e));
                    Vec::new()
                }
            };
            let records = if related.is_empty() {
                match self
                    .external
                    .instances_of_class(class_name, self.options.class_limit)
                {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!(class = class_name, error = %e, "class-instances query failed");
                        outcome
                            .warnings
                            .push(SearchWarning::external_failed(ExternalStage::ClassInstances, &e));
                        Vec::new()
                    }
                }
            } else {
                related
            };
            self.remember(class_name, &records, &mut outcome);
            records
        } else {
            self.from_cache(class_name, &mut outcome)
        };

        self.push_external(&records, &mut outcome);
        outcome
    }

    /// External resources filed under a subject category.
    pub fn category_search(&mut self, category: &str) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let category = category.trim();
        if category.is_empty() {
            return outcome;
        }

        let records = if self.external.connectivity_check() {
            match self.external.by_category(category) {
                Ok(records) => {
                    self.remember(category, &records, &mut outcome);
                    records
                }
                Err(e) => {
                    tracing::warn!(category, error = %e, "category query failed");
                    outcome
                        .warnings
                        .push(SearchWarning::external_failed(ExternalStage::Category, &e));
                    Vec::new()
                }
            }
        } else {
            self.from_cache(category, &mut outcome)
        };

        self.push_external(&records, &mut outcome);
        outcome
    }

    fn from_cache(&self, term: &str, outcome: &mut SearchOutcome) -> Vec<ExternalRecord> {
        let records = self.cache.search(term);
        tracing::warn!(term, cached = records.len(), "external source offline, using cache");
        outcome.offline = true;
        outcome.warnings.push(SearchWarning::OfflineMode {
            cached: records.len(),
        });
        if let Some(e) = self.cache.load_warning() {
            outcome.warnings.push(SearchWarning::CacheLoadFailed {
                error: e.to_string(),
            });
        }
        records
    }

    /// Cache the first online hit under the literal term.
    fn remember(&mut self, term: &str, records: &[ExternalRecord], outcome: &mut SearchOutcome) {
        let Some(first) = records.first() else {
            return;
        };
        if let Err(e) = self.cache.put(term, first.normalized()) {
            tracing::warn!(term, error = %e, "cache write failed");
            outcome.warnings.push(SearchWarning::CacheWriteFailed {
                key: term.to_string(),
                error: e.to_string(),
            });
        }
    }

    fn push_external(&self, records: &[ExternalRecord], outcome: &mut SearchOutcome) {
        outcome.results.extend(
            records
                .iter()
                .map(|r| UnifiedResult::External(ExternalView::new(r, self.options.writable))),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;

    use super::*;
    use crate::error::ExternalResult;
    use crate::ontology::{OntologyClass, PropertyValue};

    #[derive(Default)]
    struct StubLocal {
        individuals: Vec<OntologyIndividual>,
        calls: Cell<usize>,
    }

    impl StubLocal {
        fn with(names: &[&str]) -> Self {
            let individuals = names
                .iter()
                .map(|name| OntologyIndividual {
                    iri: format!("http://example.org/cripto#{name}"),
                    name: name.to_string(),
                    label: None,
                    types: vec!["Criptomoneda".into()],
                    type_iris: vec!["http://example.org/cripto#Criptomoneda".into()],
                    properties: vec![(
                        "descripcion".into(),
                        vec![PropertyValue::Text(format!("<b>{name}</b>  coin"))],
                    )],
                })
                .collect();
            Self {
                individuals,
                calls: Cell::new(0),
            }
        }

        fn hit(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    impl LocalCatalog for StubLocal {
        fn all_classes(&self) -> BTreeSet<String> {
            self.hit();
            BTreeSet::from(["Criptomoneda".to_string()])
        }
        fn all_individuals(&self) -> &[OntologyIndividual] {
            self.hit();
            &self.individuals
        }
        fn all_properties(&self) -> (Vec<String>, Vec<String>) {
            self.hit();
            (Vec::new(), Vec::new())
        }
        fn resolve_class(&self, name: &str) -> Option<OntologyClass> {
            self.hit();
            (name == "Criptomoneda").then(|| OntologyClass {
                iri: "http://example.org/cripto#Criptomoneda".into(),
                name: "Criptomoneda".into(),
                label: None,
            })
        }
        fn instances_of(&self, _class: &OntologyClass) -> Vec<&OntologyIndividual> {
            self.hit();
            self.individuals.iter().collect()
        }
        fn filter_by_name_substring(&self, term: &str) -> Vec<&OntologyIndividual> {
            self.hit();
            let needle = term.to_lowercase();
            self.individuals
                .iter()
                .filter(|i| i.name.to_lowercase().contains(&needle))
                .collect()
        }
    }

    #[derive(Default)]
    struct StubExternal {
        online: bool,
        fast: Vec<ExternalRecord>,
        fast_fails: bool,
        structured: Vec<ExternalRecord>,
        structured_fails: bool,
        related: Vec<ExternalRecord>,
        related_fails: bool,
        class_hits: Vec<ExternalRecord>,
        class_fails: bool,
        calls: RefCell<Vec<&'static str>>,
    }

    impl StubExternal {
        fn online() -> Self {
            Self {
                online: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }

        fn network_calls(&self) -> usize {
            self.calls().iter().filter(|c| **c != "probe").count()
        }

        fn server_error() -> ExternalError {
            ExternalError::Endpoint {
                endpoint: "https://lookup.dbpedia.org/api/search".into(),
                status: 500,
                message: "Internal Server Error".into(),
            }
        }
    }

    impl ExternalSource for StubExternal {
        fn connectivity_check(&self) -> bool {
            self.calls.borrow_mut().push("probe");
            self.online
        }
        fn fast_search(&self, _term: &str) -> ExternalResult<Vec<ExternalRecord>> {
            self.calls.borrow_mut().push("fast");
            if self.fast_fails {
                return Err(Self::server_error());
            }
            Ok(self.fast.clone())
        }
        fn structured_search(&self, _term: &str, _limit: usize) -> ExternalResult<Vec<ExternalRecord>> {
            self.calls.borrow_mut().push("structured");
            if self.structured_fails {
                return Err(ExternalError::Timeout {
                    endpoint: "https://dbpedia.org/sparql".into(),
                    timeout_secs: 30,
                });
            }
            Ok(self.structured.clone())
        }
        fn instances_of_class(&self, _class: &str, _limit: usize) -> ExternalResult<Vec<ExternalRecord>> {
            self.calls.borrow_mut().push("class");
            if self.class_fails {
                return Err(Self::server_error());
            }
            Ok(self.class_hits.clone())
        }
        fn instances_related_to(&self, _term: &str) -> ExternalResult<Vec<ExternalRecord>> {
            self.calls.borrow_mut().push("related");
            if self.related_fails {
                return Err(Self::server_error());
            }
            Ok(self.related.clone())
        }
        fn by_category(&self, _category: &str) -> ExternalResult<Vec<ExternalRecord>> {
            self.calls.borrow_mut().push("category");
            Ok(self.fast.clone())
        }
    }

    fn record(label: &str) -> ExternalRecord {
        ExternalRecord::new(format!("http://dbpedia.org/resource/{label}"), label)
            .with_abstract(format!("<b>{label}</b> is a   cryptocurrency"))
    }

    fn cache() -> (tempfile::TempDir, OfflineCache) {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = OfflineCache::open(dir.path().join("cache.json"));
        (dir, cache)
    }

    fn writable() -> ReconcileOptions {
        ReconcileOptions {
            writable: true,
            ..ReconcileOptions::default()
        }
    }

    #[test]
    fn local_mode_makes_no_external_calls() {
        let local = StubLocal::with(&["Bitcoin", "bitcoin_cash", "Ethereum"]);
        let external = StubExternal::online();
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("bitcoin", QueryMode::Local);
        assert!(external.calls().is_empty());
        let names: Vec<&str> = outcome.results.iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec!["Bitcoin", "bitcoin_cash"]);
        assert!(outcome.results.iter().all(|r| r.origin() == Origin::Local));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn external_mode_makes_no_local_calls() {
        let local = StubLocal::with(&["Bitcoin"]);
        let external = StubExternal {
            fast: vec![record("Bitcoin")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("Bitcoin", QueryMode::External);
        assert_eq!(local.calls.get(), 0);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(external.calls(), vec!["probe", "fast"]);
    }

    #[test]
    fn hybrid_places_local_before_external() {
        let local = StubLocal::with(&["Bitcoin", "bitcoin_cash"]);
        let external = StubExternal {
            fast: vec![record("Bitcoin"), record("Bitcoin Gold")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("bitcoin", QueryMode::Hybrid);
        let origins: Vec<Origin> = outcome.results.iter().map(UnifiedResult::origin).collect();
        assert_eq!(
            origins,
            vec![Origin::Local, Origin::Local, Origin::External, Origin::External]
        );
        assert_eq!(outcome.local().count(), 2);
        assert_eq!(outcome.external().count(), 2);
    }

    #[test]
    fn blank_term_issues_no_calls() {
        let local = StubLocal::with(&["Bitcoin"]);
        let external = StubExternal::online();
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("   ", QueryMode::Hybrid);
        assert!(outcome.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(local.calls.get(), 0);
        assert!(external.calls().is_empty());
    }

    #[test]
    fn offline_search_uses_cache_only() {
        let local = StubLocal::default();
        let external = StubExternal::default();
        let (_dir, mut cache) = cache();
        cache.put("Ethereum", record("Ethereum")).unwrap();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("Ethereum", QueryMode::External);
        assert_eq!(external.network_calls(), 0);
        assert!(outcome.offline);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].display_name(), "Ethereum");
        assert_eq!(outcome.warnings, vec![SearchWarning::OfflineMode { cached: 1 }]);
        assert!(outcome.warnings[0].to_string().contains("offline"));
    }

    #[test]
    fn fast_failure_falls_back_once_with_one_warning() {
        let local = StubLocal::default();
        let external = StubExternal {
            fast_fails: true,
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("Dogecoin", QueryMode::External);
        assert_eq!(external.calls(), vec!["probe", "fast", "structured"]);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        match &outcome.warnings[0] {
            SearchWarning::FastSearchFallback {
                error, fallback, ..
            } => {
                assert!(error.contains("500"));
                assert_eq!(*fallback, FallbackOutcome::Empty);
            }
            other => panic!("unexpected warning: {other:?}"),
        }
    }

    #[test]
    fn fallback_results_are_returned_and_cached() {
        let local = StubLocal::default();
        let external = StubExternal {
            fast_fails: true,
            structured: vec![record("Litecoin")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("Litecoin", QueryMode::External);
        assert_eq!(outcome.results.len(), 1);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [SearchWarning::FastSearchFallback {
                fallback: FallbackOutcome::Recovered { results: 1 },
                ..
            }]
        ));
        assert_eq!(cache.get("Litecoin").unwrap().label, "Litecoin");
    }

    #[test]
    fn both_strategies_failing_is_one_distinct_warning() {
        let local = StubLocal::with(&["Bitcoin"]);
        let external = StubExternal {
            fast_fails: true,
            structured_fails: true,
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.search("bitcoin", QueryMode::Hybrid);
        // Local branch survives the external failure.
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        let text = outcome.warnings[0].to_string();
        assert!(text.contains("also failed"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn online_hit_is_cached_under_literal_term() {
        let local = StubLocal::default();
        let external = StubExternal {
            fast: vec![record("Ethereum"), record("Ethereum Classic")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());
        r.search("ethereum", QueryMode::External);

        assert_eq!(cache.len(), 1);
        let cached = cache.get("ethereum").unwrap();
        assert_eq!(cached.label, "Ethereum");
        assert_eq!(cached.abstract_text, "**Ethereum** is a cryptocurrency");
    }

    #[test]
    fn external_views_are_normalized_and_importable() {
        let local = StubLocal::with(&["Bitcoin"]);
        let external = StubExternal {
            fast: vec![record("Bitcoin")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());
        let outcome = r.search("bitcoin", QueryMode::Hybrid);

        for result in &outcome.results {
            for (_, value) in result.properties() {
                assert!(!value.contains('<'), "markup left in {value:?}");
            }
        }
        assert!(!outcome.results[0].import_available());
        assert!(outcome.results[1].import_available());
    }

    #[test]
    fn read_only_disables_import() {
        let local = StubLocal::default();
        let external = StubExternal {
            fast: vec![record("Bitcoin")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, ReconcileOptions::default());
        let outcome = r.search("Bitcoin", QueryMode::External);
        assert!(!outcome.results[0].import_available());
    }

    #[test]
    fn cache_write_failure_becomes_warning() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        let mut cache = OfflineCache::open(&path);

        let local = StubLocal::default();
        let external = StubExternal {
            fast: vec![record("Monero")],
            ..StubExternal::online()
        };
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());
        let outcome = r.search("Monero", QueryMode::External);

        assert_eq!(outcome.results.len(), 1);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [SearchWarning::CacheWriteFailed { .. }]
        ));
    }

    #[test]
    fn zero_results_everywhere_is_warning_free() {
        let local = StubLocal::with(&["Bitcoin"]);
        let external = StubExternal::online();
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());
        let outcome = r.search("zzz", QueryMode::Hybrid);
        assert!(outcome.is_empty());
        assert!(outcome.warnings.is_empty());
        assert!(!outcome.offline);
    }

    #[test]
    fn unknown_local_class_is_a_warning() {
        let local = StubLocal::with(&["Bitcoin"]);
        let external = StubExternal::online();
        let (_dir, mut cache) = cache();
        let r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.instances_of_local_class("Moneda");
        assert!(outcome.is_empty());
        assert_eq!(
            outcome.warnings,
            vec![SearchWarning::ClassNotFound {
                name: "Moneda".into()
            }]
        );

        let found = r.instances_of_local_class("Criptomoneda");
        assert_eq!(found.results.len(), 1);
        assert!(found.warnings.is_empty());
    }

    #[test]
    fn external_class_prefers_related_then_falls_back_to_class() {
        let local = StubLocal::default();
        let external = StubExternal {
            class_hits: vec![record("Bitcoin"), record("Ethereum")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.instances_of_external_class("Cryptocurrency");
        assert_eq!(external.calls(), vec!["probe", "related", "class"]);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(cache.get("Cryptocurrency").unwrap().label, "Bitcoin");
    }

    #[test]
    fn external_class_skips_fallback_when_related_has_hits() {
        let local = StubLocal::default();
        let external = StubExternal {
            related: vec![record("Bitcoin")],
            class_hits: vec![record("Ethereum")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.instances_of_external_class("Cryptocurrency");
        assert_eq!(external.calls(), vec!["probe", "related"]);
        assert_eq!(outcome.results[0].display_name(), "Bitcoin");
    }

    #[test]
    fn external_class_offline_reads_cache() {
        let local = StubLocal::default();
        let external = StubExternal::default();
        let (_dir, mut cache) = cache();
        cache.put("Cryptocurrency", record("Bitcoin")).unwrap();
        cache.put("Exchange", record("Binance")).unwrap();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.instances_of_external_class("cryptocurrency");
        assert!(outcome.offline);
        assert_eq!(external.network_calls(), 0);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].display_name(), "Bitcoin");
        assert!(matches!(
            outcome.warnings.as_slice(),
            [SearchWarning::OfflineMode { cached: 1 }]
        ));
    }

    #[test]
    fn external_class_related_failure_falls_back_with_warning() {
        let local = StubLocal::default();
        let external = StubExternal {
            related_fails: true,
            class_hits: vec![record("Bitcoin")],
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.instances_of_external_class("Cryptocurrency");
        assert_eq!(external.calls(), vec!["probe", "related", "class"]);
        assert_eq!(outcome.results.len(), 1);
        assert!(!outcome.offline);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [SearchWarning::ExternalFailed {
                stage: ExternalStage::RelatedInstances,
                timed_out: false,
                ..
            }]
        ));
        assert_eq!(cache.get("Cryptocurrency").unwrap().label, "Bitcoin");
    }

    #[test]
    fn external_class_both_queries_failing_yields_two_warnings() {
        let local = StubLocal::default();
        let external = StubExternal {
            related_fails: true,
            class_fails: true,
            ..StubExternal::online()
        };
        let (_dir, mut cache) = cache();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.instances_of_external_class("Cryptocurrency");
        assert!(outcome.results.is_empty());
        assert!(matches!(
            outcome.warnings.as_slice(),
            [
                SearchWarning::ExternalFailed { stage: ExternalStage::RelatedInstances, .. },
                SearchWarning::ExternalFailed { stage: ExternalStage::ClassInstances, .. },
            ]
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn offline_category_reads_cache() {
        let local = StubLocal::default();
        let external = StubExternal::default();
        let (_dir, mut cache) = cache();
        cache.put("Cryptocurrencies", record("Bitcoin")).unwrap();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());

        let outcome = r.category_search("cryptocurrencies");
        assert!(outcome.offline);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(external.network_calls(), 0);
    }

    #[test]
    fn corrupt_cache_is_surfaced_when_used_offline() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let mut cache = OfflineCache::open(&path);

        let local = StubLocal::default();
        let external = StubExternal::default();
        let mut r = Reconciler::new(&local, &external, &mut cache, writable());
        let outcome = r.search("Ethereum", QueryMode::External);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(matches!(outcome.warnings[1], SearchWarning::CacheLoadFailed { .. }));
    }

    #[test]
    fn query_mode_parses_case_insensitively() {
        assert_eq!("LOCAL".parse::<QueryMode>().unwrap(), QueryMode::Local);
        assert_eq!("hybrid".parse::<QueryMode>().unwrap(), QueryMode::Hybrid);
        assert!("both".parse::<QueryMode>().is_err());
        assert_eq!(QueryMode::default(), QueryMode::Hybrid);
    }

    #[test]
    fn warnings_have_distinct_messages() {
        let warnings = [
            SearchWarning::OfflineMode { cached: 0 },
            SearchWarning::ExternalFailed {
                stage: ExternalStage::Category,
                error: "x".into(),
                timed_out: false,
            },
            SearchWarning::ExternalFailed {
                stage: ExternalStage::Category,
                error: "x".into(),
                timed_out: true,
            },
            SearchWarning::FastSearchFallback {
                error: "x".into(),
                timed_out: false,
                fallback: FallbackOutcome::Empty,
            },
            SearchWarning::CacheWriteFailed {
                key: "k".into(),
                error: "x".into(),
            },
            SearchWarning::CacheLoadFailed { error: "x".into() },
            SearchWarning::ClassNotFound { name: "x".into() },
        ];
        let texts: std::collections::HashSet<String> =
            warnings.iter().map(ToString::to_string).collect();
        assert_eq!(texts.len(), warnings.len());
    }
}
