//! sitesearch CLI entry point

use clap::{Parser, Subcommand};
use sitesearch::{
    commands::{
        cmd_crawl, cmd_init, cmd_search, cmd_status, print_crawl_outcomes, print_search_results,
        print_status, InitOptions, SearchOptions, SearchResponse,
    },
    config::Config,
    error::Result,
    lemma::Lemmatizer,
    manager::CrawlManager,
    search::SearchService,
    store::Store,
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sitesearch")]
#[command(version, about = "Crawl sites into a lemma index and search them", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize sitesearch configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Crawl and index configured sites
    Crawl {
        /// Site names or root URLs to crawl (all configured sites if omitted)
        sites: Vec<String>,
    },

    /// Search indexed sites
    Search {
        /// The search query
        query: String,

        /// Restrict the search to one site root URL
        #[arg(short, long)]
        site: Option<String>,

        /// Number of pages to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show crawl status of configured sites
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        return handle_init(cli.config, force).await;
    }

    let config = load_config(cli.config.as_deref()).await?;
    let store = Store::connect(&config.paths.db_file).await?;
    let lemmatizer = Lemmatizer::from_config(&config.lemmatizer)?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Crawl { sites } => {
            let manager = CrawlManager::new(
                store,
                lemmatizer,
                config.crawl.clone(),
                config.index.clone(),
            );
            spawn_interrupt_handler(manager.clone());

            let outcomes = cmd_crawl(&config, &manager, &sites).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
            } else {
                print_crawl_outcomes(&outcomes);
            }
        }

        Commands::Search {
            query,
            site,
            offset,
            limit,
        } => {
            let service = SearchService::new(store, lemmatizer, config.search.clone());
            let options = SearchOptions {
                site,
                offset,
                limit,
            };

            let outcome = cmd_search(&service, &query, options).await?;

            if cli.json {
                let response = SearchResponse::from(&outcome);
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_search_results(&outcome);
            }
        }

        Commands::Status => {
            let manager = CrawlManager::new(
                store.clone(),
                lemmatizer,
                config.crawl.clone(),
                config.index.clone(),
            );
            let status = cmd_status(&config, &manager, &store).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

/// Stop every running crawl on the first Ctrl-C
fn spawn_interrupt_handler(manager: CrawlManager) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
            return;
        }
        let stopped = manager.stop_all().await;
        info!("Interrupted; stopping {} crawl jobs", stopped);
    });
}

async fn handle_init(config: Option<PathBuf>, force: bool) -> Result<()> {
    // A .toml path names the config file; anything else is the base directory
    let (base_dir, config_path) = match config {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        }
        Some(dir) => (dir.clone(), dir.join("config.toml")),
        None => {
            let base = Config::default_base_dir();
            (base.clone(), base.join("config.toml"))
        }
    };

    if config_path.exists() && !force {
        eprintln!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
        std::process::exit(1);
    }

    let config = cmd_init(InitOptions {
        base_dir,
        config_path: config_path.clone(),
        force,
    })
    .await?;

    println!("✓ sitesearch initialized successfully");
    println!("  Config: {}", config_path.display());
    println!("  Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!("  1. Add [[sites]] entries (url, name) to the config file");
    println!("  2. Crawl them: sitesearch crawl");
    println!("  3. Search: sitesearch search \"your query\"");

    Ok(())
}

async fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'sitesearch init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
