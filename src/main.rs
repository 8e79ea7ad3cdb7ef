// rna-kit command-line tool
//
// Fetches course datasets into the local cache and prints quick summaries.
//
// Run with:
//   cargo run -- list
//   cargo run -- table iris --rows 5
//   cargo run -- images flores --resize 64x64
//
// Log verbosity follows `RUST_LOG` (default `rna_kit=info`).

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use rna_kit::{CacheConfig, DataCache, TableOptions};

#[derive(Parser, Debug)]
#[command(name = "rna-kit", version, about = "Download and inspect neural-network course datasets.")]
struct Cli {
    /// JSON file with cache settings; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local cache root (default: ./rna_descargas)
    #[arg(long, global = true, env = "RNA_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Contents API root of the dataset repository
    #[arg(long, global = true, env = "RNA_BASE_URL")]
    base_url: Option<String>,

    /// Only log downloads at debug level
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the datasets published in the remote repository
    List,

    /// Download a dataset into the cache (no-op if already cached)
    Fetch {
        name: String,
        /// Re-download every file even if the dataset is cached
        #[arg(long)]
        force: bool,
    },

    /// Print the local directory of a dataset
    Path { name: String },

    /// Print a dataset's info.json
    Info { name: String },

    /// Parse a dataset's data file and print the first rows
    Table {
        name: String,
        /// Text encoding label, e.g. utf-8 or latin1 (detected if omitted)
        #[arg(long)]
        encoding: Option<String>,
        /// Field separator: ',', ';' or 'tab' (detected if omitted)
        #[arg(long, value_parser = parse_separator)]
        separator: Option<u8>,
        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },

    /// Load an image dataset and print per-class counts
    Images {
        name: String,
        /// Resize every image, e.g. 64x64
        #[arg(long, value_parser = parse_size)]
        resize: Option<(u32, u32)>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rna_kit=info")),
        )
        .init();

    let cli = Cli::parse();
    let cache = DataCache::new(cache_config(&cli)?)?;

    match cli.command {
        Command::List => {
            for name in cache.list_datasets()? {
                println!("{}", name);
            }
        }
        Command::Fetch { name, force } => {
            let dir = if force { cache.refresh(&name)? } else { cache.resolve(&name)? };
            println!("{}", dir.display());
        }
        Command::Path { name } => {
            println!("{}", cache.path(&name)?.display());
        }
        Command::Info { name } => {
            let info = cache.info(&name)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Table { name, encoding, separator, rows } => {
            let options = TableOptions { encoding, separator };
            let table = cache.load_table(&name, &options)?;
            println!("{}", table.columns.join("\t"));
            for row in table.rows.iter().take(rows) {
                let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
                println!("{}", cells.join("\t"));
            }
            println!("[{} rows × {} columns]", table.len(), table.columns.len());
        }
        Command::Images { name, resize } => {
            let set = cache.load_images(&name, resize)?;
            for (label, count) in set.class_counts().iter().enumerate() {
                println!("{:>3}  {:<24} {}", label, set.classes[label], count);
            }
            println!("[{} images in {} classes]", set.len(), set.classes.len());
        }
    }
    Ok(())
}

/// Defaults, then the optional JSON file, then command-line flags.
fn cache_config(cli: &Cli) -> Result<CacheConfig> {
    let mut config = match &cli.config {
        Some(path) => CacheConfig::load_json(path)
            .with_context(|| format!("cannot read config {}", path.display()))?,
        None => CacheConfig::default(),
    };
    if let Some(dir) = &cli.cache_dir {
        config.base_dir = dir.clone();
    }
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if cli.quiet {
        config.verbose = false;
    }
    Ok(config)
}

fn parse_separator(s: &str) -> Result<u8> {
    match s {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => bail!("separator must be a single ASCII character or 'tab'"),
    }
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .context("size must look like WIDTHxHEIGHT")?;
    let w: u32 = w.trim().parse().context("invalid width")?;
    let h: u32 = h.trim().parse().context("invalid height")?;
    if w == 0 || h == 0 {
        bail!("size must be positive");
    }
    Ok((w, h))
}
