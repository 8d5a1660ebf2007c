//! stache CLI
//!
//! Usage:
//!   stache [OPTIONS] [TEMPLATE]
//!
//! Options:
//!   -d, --data <FILE>       Data to render with (JSON, or TOML for .toml files)
//!   -p, --partials <DIR>    Directory to load partials from
//!   -c, --config <FILE>     Engine configuration (TOML format)
//!   --cache <DIR>           Persist compiled templates in this directory
//!   --strict-callables      Only call object-like lambdas
//!   -v, --verbose           Log more (repeat for more detail)
//!   -h, --help              Print help

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::Level;

use stache::{Engine, EngineConfig, Error, Value};

#[derive(Parser)]
#[command(name = "stache")]
#[command(about = "Render logic-less double-brace templates")]
struct Cli {
    /// Template file (reads from stdin if not provided)
    template: Option<PathBuf>,

    /// Data file: JSON, or TOML when the extension is .toml
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Directory to load partials from
    #[arg(short, long)]
    partials: Option<PathBuf>,

    /// Engine configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for persisted compiled templates
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Only call object-like lambdas
    #[arg(long)]
    strict_callables: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.partials {
        config = config.with_partials_dir(dir);
    }
    if let Some(dir) = &cli.cache {
        config = config.with_cache_dir(dir);
    }
    if cli.strict_callables {
        config = config.with_strict_callables(true);
    }
    // The template is passed as source, never looked up by name
    config.templates_dir = None;

    let (source, filename) = match &cli.template {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, path.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, "<stdin>".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let data = match &cli.data {
        Some(path) => match load_data(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error loading data '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Value::Null,
    };

    let engine = match Engine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match engine.render(&source, data) {
        Ok(output) => print!("{}", output),
        Err(Error::Syntax(e)) => {
            match &e.template {
                Some(partial) => eprintln!("Error in partial '{}': {}", partial, e),
                None => eprint!("{}", e.format(&source, &filename)),
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_data(path: &Path) -> Result<Value, Error> {
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if path.extension().is_some_and(|ext| ext == "toml") {
        let table: toml::Table = toml::from_str(&content)?;
        Ok(Value::from(toml::Value::Table(table)))
    } else {
        let json: serde_json::Value = serde_json::from_str(&content)?;
        Ok(Value::from(json))
    }
}
