//! ontolens CLI: explore an OWL ontology with DBpedia enrichment.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use ontolens::config::ExplorerConfig;
use ontolens::explorer::Explorer;
use ontolens::external::{DbpediaClient, ExternalSource};
use ontolens::paths::LensPaths;
use ontolens::reconcile::{LocalView, QueryMode, SearchOutcome, SearchWarning, UnifiedResult};

#[derive(Parser)]
#[command(name = "ontolens", version, about = "Crypto ontology explorer with DBpedia enrichment")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/ontolens/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ontology document (RDF/XML, Turtle or N-Triples).
    #[arg(long, global = true)]
    ontology: Option<PathBuf>,

    /// Offline cache file.
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Never write to the ontology.
    #[arg(long, global = true)]
    read_only: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search individuals locally, on DBpedia, or both.
    Search {
        term: String,

        #[arg(long, value_enum, default_value_t = QueryMode::Hybrid)]
        mode: QueryMode,
    },

    /// List ontology classes.
    Classes,

    /// List data and object properties.
    Properties,

    /// List individuals, optionally filtered by name.
    Individuals {
        /// Case-insensitive substring of the individual name.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show instances of a class.
    Instances {
        class: String,

        /// Query DBpedia instead of the local ontology.
        #[arg(long)]
        external: bool,
    },

    /// Search DBpedia resources by subject category.
    Category { name: String },

    /// Search DBpedia for a term and import the first result.
    Import { term: String },

    /// Show ontology and cache statistics.
    Stats,

    /// Show the DBpedia properties of a resource.
    Describe {
        /// Absolute resource URI, e.g. http://dbpedia.org/resource/Bitcoin.
        uri: String,
    },

    /// Check whether DBpedia is reachable.
    Probe,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // HOME may be unset in minimal environments; explicit flags still work.
    let paths = LensPaths::resolve().ok();
    let mut config = match (&cli.config, &paths) {
        (Some(path), _) => ExplorerConfig::load(path)?,
        (None, Some(paths)) => ExplorerConfig::discover(paths)?,
        (None, None) => ExplorerConfig::default(),
    };
    if let Some(ontology) = cli.ontology.clone() {
        config.ontology_path = ontology;
    }
    if let Some(cache) = cli.cache.clone() {
        config.cache_path = Some(cache);
    }
    config.read_only |= cli.read_only;

    if let Commands::Describe { uri } = &cli.command {
        let client = DbpediaClient::new(config.external.clone());
        let rows = client.resource_properties(uri)?;
        if cli.json {
            print_json(&rows)?;
        } else if rows.is_empty() {
            println!("No properties found for {uri}.");
        } else {
            println!("{uri}:");
            for (name, value) in &rows {
                println!("    {name}: {value}");
            }
        }
        return Ok(());
    }

    if let Commands::Probe = cli.command {
        let client = DbpediaClient::new(config.external.clone());
        let online = client.connectivity_check();
        if cli.json {
            print_json(&serde_json::json!({ "online": online }))?;
        } else if online {
            println!("DBpedia is reachable ({})", config.external.sparql_url);
        } else {
            println!("[offline] DBpedia is unreachable; cached results will be used");
        }
        return Ok(());
    }

    let cache_path = config.resolved_cache_path(paths.as_ref());
    let mut explorer = Explorer::open(&config, cache_path)?;
    print_warnings(&explorer.startup_warnings());

    match cli.command {
        Commands::Search { term, mode } => {
            let outcome = explorer.search(&term, mode);
            print_outcome(&outcome, cli.json)?;
        }

        Commands::Classes => {
            let classes = explorer.list_classes();
            if cli.json {
                print_json(&classes)?;
            } else {
                println!("Classes ({}):", classes.len());
                for class in classes {
                    match &class.label {
                        Some(label) if *label != class.name => {
                            println!("  {} ({label})", class.name)
                        }
                        _ => println!("  {}", class.name),
                    }
                }
            }
        }

        Commands::Properties => {
            let (data, object) = explorer.list_properties();
            if cli.json {
                print_json(&serde_json::json!({ "data": data, "object": object }))?;
            } else {
                println!("Data properties ({}):", data.len());
                for name in &data {
                    println!("  {name}");
                }
                println!("Object properties ({}):", object.len());
                for name in &object {
                    println!("  {name}");
                }
            }
        }

        Commands::Individuals { filter } => {
            let individuals = explorer.list_individuals(filter.as_deref());
            if cli.json {
                print_json(&individuals)?;
            } else if individuals.is_empty() {
                println!("No individuals found.");
            } else {
                println!("Individuals ({}):", individuals.len());
                for view in &individuals {
                    print_local(view);
                }
            }
        }

        Commands::Instances { class, external } => {
            let outcome = if external {
                explorer.instances_of_external_class(&class)
            } else {
                explorer.instances_of_local_class(&class)
            };
            print_outcome(&outcome, cli.json)?;
        }

        Commands::Category { name } => {
            let outcome = explorer.category_search(&name);
            print_outcome(&outcome, cli.json)?;
        }

        Commands::Import { term } => {
            let outcome = explorer.search(&term, QueryMode::External);
            print_warnings(&outcome.warnings);
            let record = outcome
                .results
                .iter()
                .find_map(UnifiedResult::as_external)
                .ok_or_else(|| miette::miette!("no DBpedia result for \"{term}\" to import"))?;
            let imported = explorer.import_external(record)?;
            if cli.json {
                print_json(&imported)?;
            } else {
                println!(
                    "Imported \"{}\" as {} ({})",
                    record.label, imported.identifier, imported.class
                );
                if !imported.copied_properties.is_empty() {
                    println!("  copied: {}", imported.copied_properties.join(", "));
                }
                println!("{}", explorer.info());
            }
        }

        Commands::Stats => {
            let info = explorer.info();
            if cli.json {
                print_json(&info)?;
            } else {
                println!("{info}");
            }
        }

        Commands::Probe | Commands::Describe { .. } => {}
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn print_warnings(warnings: &[SearchWarning]) {
    for warning in warnings {
        match warning {
            SearchWarning::OfflineMode { .. } => eprintln!("[offline] {warning}"),
            _ => eprintln!("warning: {warning}"),
        }
    }
}

fn print_outcome(outcome: &SearchOutcome, json: bool) -> Result<()> {
    if json {
        print_json(outcome)?;
        return Ok(());
    }
    print_warnings(&outcome.warnings);
    if outcome.results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for result in &outcome.results {
        match result {
            UnifiedResult::Local(view) => print_local(view),
            UnifiedResult::External(_) => {
                let marker = if result.import_available() {
                    " [importable]"
                } else {
                    ""
                };
                println!(
                    "[dbpedia] {} {}{marker}",
                    result.display_name(),
                    type_suffix(&result.type_labels())
                );
                for (name, value) in result.properties() {
                    println!("    {name}: {value}");
                }
            }
        }
    }
    Ok(())
}

fn print_local(view: &LocalView) {
    println!("[local] {} {}", view.name, type_suffix(&view.types));
    for (name, value) in &view.properties {
        println!("    {name}: {value}");
    }
}

fn type_suffix(types: &[String]) -> String {
    if types.is_empty() {
        String::new()
    } else {
        format!("({})", types.join(", "))
    }
}
