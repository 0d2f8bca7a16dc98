//! urlcat CLI
//!
//! CLI tool for classifying URLs against a local category database and
//! serving classifications over TCP.

mod config;
mod serve;

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use uc_core::{bootstrap, EngineSession, Rating};
use uc_localdb::{Database, LocalEngine};

use config::FileConfig;

#[derive(Parser)]
#[command(name = "uc-cli")]
#[command(about = "urlcat URL classification tools")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Category database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// License serial
    #[arg(long, global = true)]
    serial: Option<String>,

    /// Increase verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify URLs
    Classify {
        /// URLs to classify
        urls: Vec<String>,

        /// Read URLs from a file, one per line ("-" for stdin)
        #[arg(short, long)]
        input: Option<String>,

        /// Print one JSON object per URL
        #[arg(long)]
        json: bool,
    },

    /// Dump database info
    Info,

    /// Validate a database file
    Validate,

    /// Serve domain-category queries as JSON lines over TCP
    Serve {
        /// Listening address
        #[arg(short, long)]
        listen: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = FileConfig::load_optional(cli.config.as_deref()).and_then(|file| {
        let db = cli.db.as_deref();
        let serial = cli.serial.as_deref();
        match &cli.command {
            Commands::Classify { urls, input, json } => {
                cmd_classify(&file, db, serial, urls, input.as_deref(), *json, cli.verbose)
            }
            Commands::Info => cmd_info(&file.database_path(db)),
            Commands::Validate => cmd_validate(&file.database_path(db)),
            Commands::Serve { listen } => {
                cmd_serve(&file, db, serial, &file.listen_addr(listen.as_deref()), cli.verbose)
            }
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn open_session(
    file: &FileConfig,
    db: Option<&Path>,
    serial: Option<&str>,
) -> Result<EngineSession<LocalEngine>, String> {
    let config = file.session_config(db, serial)?;
    bootstrap(LocalEngine::new(), config).map_err(|e| format!("Failed to start engine: {}", e))
}

/// One line of `classify --json` output.
#[derive(Serialize)]
struct ClassifyRecord<'a> {
    url: &'a str,
    status: &'static str,
    categories: &'a [String],
    codes: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    reputation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> ClassifyRecord<'a> {
    fn new(url: &'a str, rating: &'a Rating) -> Self {
        let (categories, codes, reputation) = match rating {
            Rating::Categorized(m) => (m.names.as_slice(), m.codes.as_slice(), m.reputation),
            _ => (&[][..], &[][..], None),
        };
        let error = match rating {
            Rating::ParseError(e) => Some(e.to_string()),
            Rating::EngineError(e) => Some(e.to_string()),
            _ => None,
        };
        Self {
            url,
            status: rating.status(),
            categories,
            codes,
            reputation,
            error,
        }
    }
}

fn read_urls(input: &str) -> Result<Vec<String>, String> {
    let reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = fs::File::open(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;
        Box::new(BufReader::new(file))
    };

    let mut urls = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| format!("Failed to read '{}': {}", input, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        urls.push(line.to_string());
    }
    Ok(urls)
}

fn cmd_classify(
    file: &FileConfig,
    db: Option<&Path>,
    serial: Option<&str>,
    urls: &[String],
    input: Option<&str>,
    json: bool,
    verbose: u8,
) -> Result<(), String> {
    let mut all_urls = urls.to_vec();
    if let Some(input) = input {
        all_urls.extend(read_urls(input)?);
    }
    if all_urls.is_empty() {
        return Err("No URLs specified".to_string());
    }

    let session = open_session(file, db, serial)?;

    for url in &all_urls {
        let rating = session.rate(url, verbose);
        if json {
            let line = serde_json::to_string(&ClassifyRecord::new(url, &rating))
                .map_err(|e| format!("Failed to encode result: {}", e))?;
            println!("{}", line);
        } else {
            println!("{}\t{}", url, rating.rendered());
        }
    }

    session.shutdown();
    Ok(())
}

fn load_database(path: &Path) -> Result<Database, String> {
    Database::from_file(path).map_err(|e| format!("Invalid database: {}", e))
}

fn cmd_validate(path: &Path) -> Result<(), String> {
    let db = load_database(path)?;

    println!("Database '{}' is valid", path.display());
    println!("  Version:     {}", db.version());
    println!("  Categories:  {}", db.category_count());
    println!("  Hosts:       {}", db.entry_count());

    Ok(())
}

fn cmd_info(path: &Path) -> Result<(), String> {
    let size = fs::metadata(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?
        .len();
    let db = load_database(path)?;

    println!("Database: {}", path.display());
    println!("  Version:       {}", db.version());
    println!("  Size:          {} bytes ({:.1} KB)", size, size as f64 / 1024.0);
    println!("  Hosts:         {}", db.entry_count());
    println!("  Suffix rules:  {}", db.suffix_count());
    println!();

    println!("Categories ({}):", db.category_count());
    for category in db.categories() {
        match &category.short_name {
            Some(short) => println!("  {:>5}  {} ({})", category.code, category.name, short),
            None => println!("  {:>5}  {}", category.code, category.name),
        }
    }

    Ok(())
}

fn cmd_serve(
    file: &FileConfig,
    db: Option<&Path>,
    serial: Option<&str>,
    listen: &str,
    verbose: u8,
) -> Result<(), String> {
    let session = open_session(file, db, serial)?;
    serve::run(session, listen, verbose)
}
