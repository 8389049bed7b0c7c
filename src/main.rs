//! patricia CLI - Command line interface for patricia_db
//!
//! Each invocation opens the store file, applies one command and records
//! the resulting root digest in the file header.

use clap::{Parser, Subcommand};
use patricia_db::{FileStore, Hash, MerkleTrie, Node, NodeStore};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "patricia")]
#[command(about = "A content-addressed Merkle Patricia trie store")]
#[command(version)]
struct Cli {
    /// Path to the store file
    #[arg(short, long, env = "PATRICIA_DB", default_value = "trie.patricia")]
    database: PathBuf,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty store
    Init,

    /// Insert or update a key
    Put {
        /// The key
        key: String,
        /// The value
        value: String,
    },

    /// Get the value stored under a key
    Get {
        /// The key
        key: String,
    },

    /// Remove a key
    Delete {
        /// The key
        key: String,
    },

    /// List keys, optionally restricted to a prefix
    List {
        /// Key prefix
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Print the root digest
    Root,

    /// Decode and print a stored node
    Show {
        /// Node digest (hex)
        hash: String,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(database = %cli.database.display(), "starting");

    match cli.command {
        Commands::Init => {
            let store = FileStore::create(&cli.database)?;
            store.sync()?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "message": format!("Created store at {}", cli.database.display())
                }),
            );
        }

        Commands::Put { key, value } => {
            let store = FileStore::open_or_create(&cli.database)?;
            let mut trie = MerkleTrie::from_root(&store, store.root())?;
            let root = trie.insert(key.as_bytes(), value.as_bytes())?;
            store.set_root(root);
            store.sync()?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "root": root.to_hex()
                }),
            );
        }

        Commands::Get { key } => {
            let store = FileStore::open_or_create(&cli.database)?;
            let trie = MerkleTrie::from_root(&store, store.root())?;
            match trie.get(key.as_bytes())? {
                Some(value) => output(
                    cli.format,
                    &serde_json::json!({
                        "key": key,
                        "value": String::from_utf8_lossy(&value)
                    }),
                ),
                None => return Ok(not_found(cli.format, &key)),
            }
        }

        Commands::Delete { key } => {
            let store = FileStore::open_or_create(&cli.database)?;
            let mut trie = MerkleTrie::from_root(&store, store.root())?;
            if trie.remove(key.as_bytes())?.is_none() {
                return Ok(not_found(cli.format, &key));
            }
            store.set_root(trie.root_hash());
            store.sync()?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "root": trie.root_hash().to_hex()
                }),
            );
        }

        Commands::List { prefix } => {
            let store = FileStore::open_or_create(&cli.database)?;
            let trie = MerkleTrie::from_root(&store, store.root())?;
            let entries: Vec<_> = trie
                .list_prefix(prefix.as_bytes())?
                .into_iter()
                .map(|(k, v)| {
                    serde_json::json!({
                        "key": String::from_utf8_lossy(&k),
                        "value": String::from_utf8_lossy(&v)
                    })
                })
                .collect();
            output(
                cli.format,
                &serde_json::json!({
                    "count": entries.len(),
                    "entries": entries
                }),
            );
        }

        Commands::Root => {
            let store = FileStore::open_or_create(&cli.database)?;
            output(
                cli.format,
                &serde_json::json!({
                    "root": store.root().to_hex(),
                    "nodes": store.object_count()
                }),
            );
        }

        Commands::Show { hash } => {
            let store = FileStore::open_or_create(&cli.database)?;
            let hash = Hash::from_hex(&hash)
                .map_err(|_| anyhow::anyhow!("Invalid digest: {}", hash))?;
            let node = store.get(&hash)?;
            output(cli.format, &describe(&node));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn describe(node: &Node) -> serde_json::Value {
    match node {
        Node::Branch(branch) => {
            let slots: serde_json::Map<String, serde_json::Value> = branch
                .slots()
                .map(|(byte, child)| {
                    (
                        format!("{:02x}", byte),
                        serde_json::Value::String(child.to_hex()),
                    )
                })
                .collect();
            serde_json::json!({
                "kind": "branch",
                "hash": node.hash().to_hex(),
                "slots": slots,
                "value": hex::encode(branch.value())
            })
        }
        Node::Path(path) => serde_json::json!({
            "kind": path.kind(),
            "hash": node.hash().to_hex(),
            "path": hex::encode(path.path()),
            "value": hex::encode(path.value())
        }),
    }
}

fn not_found(format: OutputFormat, key: &str) -> ExitCode {
    output(
        format,
        &serde_json::json!({
            "status": "error",
            "message": format!("Key not found: {}", key)
        }),
    );
    ExitCode::FAILURE
}

fn output(format: OutputFormat, value: &serde_json::Value) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value),
        OutputFormat::Text => serde_json::to_string_pretty(value),
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}
