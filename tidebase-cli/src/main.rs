use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tidebase_core::{DocumentListing, FileSnapshot, Store, TideBaseError};

#[derive(Parser)]
#[command(name = "tidebase")]
#[command(about = "TideBase CLI - versioned document store with a change feed")]
#[command(version)]
struct Cli {
    /// Snapshot file backing the store
    #[arg(long, global = true, default_value = "tidebase.json")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new version of a document
    Put {
        collection: String,
        key: String,
        /// Document value as JSON
        value: String,
    },
    /// Fetch the latest live version, or an exact version
    Get {
        collection: String,
        key: String,
        #[arg(long)]
        version: Option<u64>,
    },
    /// Soft-delete a document (appends a tombstone)
    Delete { collection: String, key: String },
    /// Hard-remove a document's entire history (advances the rollback watermark)
    Evict { collection: String, key: String },
    /// List a collection's documents
    List {
        collection: String,
        /// Only the latest live version of each key
        #[arg(long)]
        latest_only: bool,
    },
    /// Filter a collection with a single-clause predicate, e.g. "value.age > 25"
    Query {
        collection: String,
        r#where: String,
        #[arg(long)]
        latest_only: bool,
    },
    /// Tail the change feed after a transaction id
    Changes {
        #[arg(long, default_value_t = 0)]
        start: u64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        r#where: Option<String>,
        #[arg(long)]
        collection: Option<String>,
    },
    /// Prune old versions from every log
    Gc {
        #[arg(long, default_value_t = 1)]
        max_versions: usize,
        #[arg(long)]
        max_age_seconds: Option<f64>,
    },
    /// Store statistics
    Stats,
    /// Bulk-load documents from a JSON file
    /// Format: { "collection": [ {"key": "...", "value": ...}, ... ], ... }
    Import { file: PathBuf },
    /// Dump the full version history to a JSON file
    Export {
        file: PathBuf,
        /// Export only this collection
        #[arg(long)]
        collection: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = Store::open(&cli.db);

    match cli.command {
        Commands::Put {
            collection,
            key,
            value,
        } => {
            let value: Value = serde_json::from_str(&value)
                .with_context(|| format!("value is not valid JSON: {}", value))?;
            let record = store.upsert(&collection, &key, value)?;
            print_json(&record)
        }
        Commands::Get {
            collection,
            key,
            version,
        } => match store.get(&collection, &key, version) {
            Some(record) => print_json(&record),
            None => bail!(TideBaseError::DocumentNotFound(format!(
                "{}/{}",
                collection, key
            ))),
        },
        Commands::Delete { collection, key } => {
            if !store.delete(&collection, &key)? {
                bail!(TideBaseError::DocumentNotFound(format!(
                    "{}/{}",
                    collection, key
                )));
            }
            println!("deleted {}/{}", collection, key);
            Ok(())
        }
        Commands::Evict { collection, key } => {
            if !store.evict(&collection, &key)? {
                bail!(TideBaseError::DocumentNotFound(format!(
                    "{}/{}",
                    collection, key
                )));
            }
            println!(
                "evicted {}/{} (rollback watermark: {})",
                collection,
                key,
                store.rollback_watermark()
            );
            Ok(())
        }
        Commands::List {
            collection,
            latest_only,
        } => print_json(&store.list_documents(&collection, latest_only)),
        Commands::Query {
            collection,
            r#where,
            latest_only,
        } => print_json(&store.query_documents(&collection, &r#where, latest_only)?),
        Commands::Changes {
            start,
            limit,
            r#where,
            collection,
        } => print_json(&store.get_changes_after(
            start,
            limit,
            r#where.as_deref(),
            collection.as_deref(),
        )?),
        Commands::Gc {
            max_versions,
            max_age_seconds,
        } => {
            let removed = store.garbage_collect(max_versions, max_age_seconds)?;
            println!("removed {} record(s)", removed);
            Ok(())
        }
        Commands::Stats => print_json(&store.stats()),
        Commands::Import { file } => import_documents(&store, &file),
        Commands::Export { file, collection } => {
            export_documents(&store, &file, collection.as_deref())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Bulk-load documents. Each entry becomes one upsert, so imports appear
/// on the change feed like any other write.
fn import_documents(store: &Store<FileSnapshot>, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("failed to read file: {}", file.display()))?;
    let data: serde_json::Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON in file: {}", file.display()))?;

    let mut total = 0;
    for (collection, documents) in data {
        let docs = documents
            .as_array()
            .with_context(|| format!("collection '{}' must be an array", collection))?;
        for doc in docs {
            let key = doc
                .get("key")
                .and_then(Value::as_str)
                .with_context(|| format!("document in '{}' is missing a 'key'", collection))?;
            let value = doc
                .get("value")
                .with_context(|| format!("document '{}/{}' is missing a 'value'", collection, key))?;
            store.upsert(&collection, key, value.clone())?;
            total += 1;
        }
    }
    println!("imported {} document(s)", total);
    Ok(())
}

/// Dump full version history as { collection: { key: [records] } }.
fn export_documents(
    store: &Store<FileSnapshot>,
    file: &Path,
    only_collection: Option<&str>,
) -> Result<()> {
    let names = store.collection_names();
    if let Some(wanted) = only_collection {
        if !names.iter().any(|name| name == wanted) {
            bail!(TideBaseError::CollectionNotFound(wanted.to_string()));
        }
    }

    let mut dump = serde_json::Map::new();
    for name in names {
        if let Some(wanted) = only_collection {
            if name != wanted {
                continue;
            }
        }
        let listing = store.list_documents(&name, false);
        if let DocumentListing::Full(map) = listing {
            dump.insert(name, serde_json::to_value(map)?);
        }
    }

    let content = serde_json::to_string_pretty(&Value::Object(dump))?;
    fs::write(file, content)
        .with_context(|| format!("failed to write file: {}", file.display()))?;
    println!("exported to {}", file.display());
    Ok(())
}
