//! Trixdb command line
//!
//! Inspects and edits a store file. Configuration comes from the `TRIX_*`
//! environment variables (see [`StoreConfig::from_env`]); `--file` and
//! `--plain` override the file and encryption mode.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trixdb::crypto::{CipherAlgorithm, CipherMaterial};
use trixdb::{Database, MathOp, Outcome, StoreConfig, Value};

#[derive(Parser)]
#[command(name = "trixdb")]
#[command(about = "Embedded JSON key-value store", long_about = None)]
struct Cli {
    /// Backing file (overrides TRIX_FILENAME)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Treat the backing file as unencrypted JSON
    #[arg(long)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get { key: String },

    /// Store a value (parsed as JSON, or taken as a string)
    Set { key: String, value: String },

    /// Remove a key
    Delete { key: String },

    /// Append a value to the array under a key
    Push { key: String, value: String },

    /// Apply + - * / to a numeric value
    Math {
        key: String,
        op: String,
        #[arg(allow_hyphen_values = true)]
        operand: f64,
    },

    /// Print the whole document
    Dump,

    /// Write an unencrypted copy of the document
    Backup { path: PathBuf },

    /// Remove every key
    Reset,

    /// Print a fresh hex key and iv for TRIX_KEY / TRIX_IV
    Keygen {
        #[arg(short, long, default_value = "aes-256-cbc")]
        algorithm: String,
    },
}

fn main() -> Result<()> {
    // Defaults to "warn" so command output stays clean; override with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trixdb=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Keygen { algorithm } = &cli.command {
        let algorithm: CipherAlgorithm = algorithm.parse()?;
        let material = CipherMaterial::generate(algorithm);
        println!("TRIX_ALGORITHM={}", algorithm);
        println!("TRIX_KEY={}", hex::encode(material.key()));
        println!("TRIX_IV={}", hex::encode(material.iv()));
        return Ok(());
    }

    let mut config = StoreConfig::from_env().context("invalid TRIX_* configuration")?;
    if let Some(file) = cli.file {
        config.filename = file;
    }
    if cli.plain {
        config.encrypt = false;
    }
    if config.encrypt && config.key.is_none() {
        warn!("TRIX_KEY is not set; using a random key, the file will not be readable later");
    }

    let filename = config.filename.clone();
    let mut db = Database::open(config).context("failed to open store")?;
    // Any write below would replace the unreadable file with this empty store
    if let Some(err) = db.last_load_error() {
        bail!(
            "cannot read {} ({}); check TRIX_KEY, TRIX_IV and --plain",
            filename.display(),
            err
        );
    }

    match cli.command {
        Commands::Get { key } => match db.get(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
            None => bail!("key not found: {}", key),
        },
        Commands::Set { key, value } => db.set(key, parse_value(&value))?,
        Commands::Delete { key } => db.delete(&key)?,
        Commands::Push { key, value } => {
            if db.push(key.clone(), parse_value(&value))? == Outcome::Coerced {
                eprintln!("previous non-array value of {} was replaced", key);
            }
        }
        Commands::Math { key, op, operand } => {
            let op: MathOp = op.parse()?;
            if let Outcome::Skipped(reason) = db.math(&key, op, operand)? {
                bail!("{} not updated: {}", key, reason);
            }
            if let Some(value) = db.get(&key) {
                println!("{}", value);
            }
        }
        Commands::Dump => println!("{}", serde_json::to_string_pretty(db.document())?),
        Commands::Backup { path } => db
            .backup(&path)
            .with_context(|| format!("failed to write backup to {}", path.display()))?,
        Commands::Reset => db.reset()?,
        Commands::Keygen { .. } => {}
    }

    db.shutdown();
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
