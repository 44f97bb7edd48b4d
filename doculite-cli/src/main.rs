use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use doculite_core::{Collection, DoculiteConfig};
use owo_colors::OwoColorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "doculite")]
#[command(version = "0.1.0")]
#[command(about = "In-memory document collection with a MongoDB-style query engine")]
struct Cli {
    /// Path to the NDJSON backing file, or `:memory:` for no persistence.
    #[arg(short, long, default_value = ":memory:", global = true)]
    db: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query documents. Each positional argument is a JSON filter
    /// fragment; fragments are merged into one filter object.
    Find {
        filters: Vec<String>,
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
        /// Print only primary-key values.
        #[arg(long)]
        id: bool,
        /// Pretty-print matched documents. Mutually exclusive with --id.
        #[arg(long)]
        indent: bool,
    },
    /// Insert a document, assigning a fresh id if it has none.
    Insert { document: String },
    /// Fetch a document by id.
    Get { id: String },
    /// Delete a document by id.
    Delete { id: String },
    /// Write every document to stdout as NDJSON, in insertion order.
    Dump,
    /// Interactive shell over the same operations.
    Shell,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = DoculiteConfig::load();
    let mut collection = Collection::open(&cli.db, Some(&config.primary_key))
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("failed to open collection")?;

    let result = run(&cli.command, &mut collection);
    collection
        .close()
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("failed to close collection")?;
    result
}

fn run(command: &Commands, collection: &mut Collection) -> Result<()> {
    match command {
        Commands::Find {
            filters,
            limit,
            id,
            indent,
        } => {
            if *id && *indent {
                bail!("--id and --indent are mutually exclusive");
            }
            let filter = merge_filters(filters)?;
            let ids = collection
                .find(&filter, *limit)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            for doc_id in ids {
                if *id {
                    println!("{}", doc_id);
                    continue;
                }
                let doc = collection
                    .get(&doc_id)
                    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
                let value = Value::Object(doc);
                if *indent {
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else {
                    println!("{}", serde_json::to_string(&value)?);
                }
            }
        }
        Commands::Insert { document } => {
            let value: Value = serde_json::from_str(document).context("invalid JSON document")?;
            let id = collection
                .insert_one(value)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("{}", id.green());
        }
        Commands::Get { id } => match collection.get(id) {
            Ok(doc) => println!("{}", serde_json::to_string(&Value::Object(doc))?),
            Err(e) => bail!(e.to_string()),
        },
        Commands::Delete { id } => {
            collection
                .delete(id)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("{}", "deleted".green());
        }
        Commands::Dump => {
            let mut out = std::io::stdout();
            collection
                .dump(&mut out)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Commands::Shell => run_shell(collection)?,
    }
    Ok(())
}

/// Merge positional JSON-object fragments into a single filter object, the
/// way repeated `--filter` flags would in a flatter CLI.
fn merge_filters(fragments: &[String]) -> Result<Value> {
    if fragments.is_empty() {
        return Ok(Value::Null);
    }
    let mut merged = serde_json::Map::new();
    for fragment in fragments {
        let parsed: Value =
            serde_json::from_str(fragment).context("invalid JSON filter fragment")?;
        let obj = parsed
            .as_object()
            .context("filter fragment must be a JSON object")?;
        for (key, value) in obj {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(merged))
}

fn run_shell(collection: &mut Collection) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history_file = ".doculite_history";
    let _ = rl.load_history(history_file);

    println!("doculite shell. Type 'exit' to quit.");

    loop {
        match rl.readline("doculite> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let parts: Vec<&str> = line.splitn(2, ' ').collect();
                if parts.is_empty() || parts[0].is_empty() {
                    continue;
                }
                match parts[0] {
                    "exit" | "quit" => break,
                    "find" => {
                        let arg = parts.get(1).copied().unwrap_or("{}");
                        match serde_json::from_str::<Value>(arg) {
                            Ok(filter) => match collection.find(&filter, 0) {
                                Ok(ids) => ids.iter().for_each(|id| println!("{}", id)),
                                Err(e) => println!("{}: {}", "error".red(), e),
                            },
                            Err(e) => println!("{}: {}", "invalid filter".red(), e),
                        }
                    }
                    "insert" => {
                        let arg = parts.get(1).copied().unwrap_or("{}");
                        match serde_json::from_str::<Value>(arg) {
                            Ok(doc) => match collection.insert_one(doc) {
                                Ok(id) => println!("{}", id.green()),
                                Err(e) => println!("{}: {}", "error".red(), e),
                            },
                            Err(e) => println!("{}: {}", "invalid document".red(), e),
                        }
                    }
                    "get" => {
                        let id = parts.get(1).copied().unwrap_or("");
                        match collection.get(id) {
                            Ok(doc) => {
                                println!("{}", serde_json::to_string(&Value::Object(doc))?)
                            }
                            Err(e) => println!("{}: {}", "error".red(), e),
                        }
                    }
                    "del" => {
                        let id = parts.get(1).copied().unwrap_or("");
                        match collection.delete(id) {
                            Ok(()) => println!("{}", "ok".green()),
                            Err(e) => println!("{}: {}", "error".red(), e),
                        }
                    }
                    "flush" => match collection.flush() {
                        Ok(()) => println!("{}", "flushed".green()),
                        Err(e) => println!("{}: {}", "error".red(), e),
                    },
                    "help" => {
                        println!("Available commands:");
                        println!("  find <json-filter>  - query documents");
                        println!("  insert <json-doc>   - insert a document");
                        println!("  get <id>            - fetch a document");
                        println!("  del <id>            - delete a document");
                        println!("  flush               - flush to the backing file");
                        println!("  help                - show this help");
                        println!("  exit/quit           - exit shell");
                    }
                    _ => println!("Unknown command. Type 'help' for available commands."),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(history_file)?;
    Ok(())
}
