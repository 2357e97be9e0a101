//! winffi command line
//!
//! Inspect the bound functions and constant catalog, check a
//! configuration file, or call a function with literal arguments.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use winffi::config::{WinffiConfig, CONFIG_FILE};
use winffi::testutil::FakeKernel;
use winffi::{logging, Catalog, FunctionRegistry, Library, Value};

#[derive(Parser)]
#[command(name = "winffi")]
#[command(version)]
#[command(about = "Checked bindings to kernel32 file, handle and process functions", long_about = None)]
struct Cli {
    /// Configuration file (default: search upwards for winffi.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run against the in-memory simulated kernel instead of kernel32
    #[arg(long, global = true)]
    simulate: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a function with literal arguments
    ///
    /// Arguments are integers (decimal or 0x hex), null, true/false,
    /// catalog constants joined with '|', or strings.
    Call {
        /// Function name, e.g. CreateFile
        name: String,

        /// Positional arguments
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the effective configuration
    Config {
        /// Write a default configuration file here instead
        #[arg(long, value_name = "PATH")]
        init: Option<PathBuf>,
    },

    /// List constants in the catalog
    Constants {
        /// Only names containing this (case-insensitive)
        pattern: Option<String>,
    },

    /// List bound functions
    Functions {
        /// Rank functions by keywords and description
        #[arg(long)]
        search: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }
    logging::init(&config.logging);

    match cli.command {
        Commands::Call { name, args } => cmd_call(&config, cli.simulate, &name, &args),
        Commands::Config { init } => cmd_config(&config, init.as_ref()),
        Commands::Constants { pattern } => cmd_constants(&config, pattern.as_deref()),
        Commands::Functions { search } => cmd_functions(search.as_deref()),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<WinffiConfig> {
    match path {
        Some(path) => WinffiConfig::load(path)
            .with_context(|| format!("Failed to load config file {}", path.display())),
        None => WinffiConfig::load_from_cwd().context("Failed to load config"),
    }
}

fn open_library(config: &WinffiConfig, simulate: bool) -> Result<Library> {
    if simulate {
        let catalog = Catalog::from_config(config)?;
        return Ok(Library::with_catalog(
            Box::new(FakeKernel::new()),
            catalog,
        ));
    }
    Library::load_with_config(config).context("Failed to load native library")
}

/// Parse a literal, resolving `NAME|NAME` against the catalog.
fn resolve_arg(lib: &Library, literal: &str) -> Value {
    let value = Value::parse(literal);
    if let Value::String(text) = &value {
        let parts: Vec<&str> = text.split('|').map(str::trim).collect();
        if parts.iter().all(|p| lib.catalog().contains(p)) {
            let combined = parts
                .iter()
                .filter_map(|p| lib.constant(p).ok())
                .fold(0, |acc, v| acc | v);
            return Value::Integer(combined);
        }
    }
    value
}

fn cmd_call(config: &WinffiConfig, simulate: bool, name: &str, args: &[String]) -> Result<()> {
    let lib = open_library(config, simulate)?;
    let registry = FunctionRegistry::with_kernel32();
    let values: Vec<Value> = args.iter().map(|a| resolve_arg(&lib, a)).collect();
    debug!(function = name, args = ?values, "calling");

    let result = registry
        .call(&lib, name, &values)
        .with_context(|| format!("{} failed", name))?;
    println!("{}", result);
    Ok(())
}

fn cmd_config(config: &WinffiConfig, init: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = init {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        WinffiConfig::default()
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("# effective configuration ({} if found)", CONFIG_FILE);
    print!("{}", text);
    Ok(())
}

fn cmd_constants(config: &WinffiConfig, pattern: Option<&str>) -> Result<()> {
    let catalog = Catalog::from_config(config)?;
    let entries: Vec<(&str, i64)> = match pattern {
        Some(p) => catalog.matching(p).collect(),
        None => catalog.iter().collect(),
    };

    if entries.is_empty() {
        println!("No constants found.");
        return Ok(());
    }
    let width = entries.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, value) in entries {
        if value < 0 {
            println!("{:width$}  {}", name, value, width = width);
        } else {
            println!("{:width$}  {:#x}", name, value, width = width);
        }
    }
    Ok(())
}

fn cmd_functions(search: Option<&str>) -> Result<()> {
    let registry = FunctionRegistry::with_kernel32();
    let functions = match search {
        Some(query) => registry.search(query),
        None => registry.list().collect(),
    };

    for info in functions {
        println!("{}", info.signature());
        println!("    {}", info.description);
    }
    Ok(())
}
