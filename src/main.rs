use clap::{Parser, Subcommand};
use eqtble_nlq::{config::CacheConfig, TranslationCache};
use log::{error, info};
use std::process;

#[derive(Parser)]
#[command(
    name = "eqtble-nlq",
    about = "Inspect and edit the natural-language query translation cache"
)]
struct Cli {
    /// Cache file; overrides TRANSLATION_CACHE_PATH
    #[arg(long)]
    cache_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cached translation of a question
    Get { model: String, query: String },
    /// Store a translation
    Put {
        model: String,
        query: String,
        #[arg(long)]
        query_json: String,
        #[arg(long)]
        semantic_layer_json: String,
    },
    /// List cached questions
    List,
    /// Report metrics, dimensions and filters the semantic layer cannot resolve
    Check,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = CacheConfig::new().map_err(|e| {
        error!("Failed to initialize cache config: {}", e);
        e
    })?;
    if let Some(cache_path) = cli.cache_path {
        config.cache_path = cache_path;
    }

    let cache = TranslationCache::from_config(&config).map_err(|e| {
        error!("Failed to open cache at {}: {}", config.cache_path, e);
        e
    })?;

    match cli.command {
        Command::Get { model, query } => match cache.get(&model, &query) {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => {
                info!("No cached translation for {}: {:?}", model, query);
                process::exit(1);
            }
        },
        Command::Put {
            model,
            query,
            query_json,
            semantic_layer_json,
        } => {
            let query_json = serde_json::from_str(&query_json)?;
            let semantic_layer_json = serde_json::from_str(&semantic_layer_json)?;
            cache
                .put(&model, &query, query_json, semantic_layer_json)
                .map_err(|e| {
                    error!("Failed to cache translation: {}", e);
                    e
                })?;
            info!("Cached translation for {}: {:?}", model, query);
        }
        Command::List => {
            for key in cache.keys() {
                println!("{}\t{}", key.model(), key.query());
            }
        }
        Command::Check => {
            let mut found = 0;
            for (key, entry) in cache.entries() {
                for inconsistency in entry.inconsistencies() {
                    println!("{}: {}", key, inconsistency);
                    found += 1;
                }
            }
            if found > 0 {
                error!("{} unresolved references in {}", found, config.cache_path);
                process::exit(1);
            }
        }
    }

    Ok(())
}
