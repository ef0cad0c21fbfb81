//! slicedict CLI
//!
//! Command-line tool for inspecting and maintaining a local dictionary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use slicedict::fs::LocalFileStore;
use slicedict::store::MetaEnvironment;
use slicedict::{DictConfig, GlobalDictStore, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// slicedict CLI
#[derive(Parser, Debug)]
#[command(name = "slicedict-cli")]
#[command(about = "Inspect and maintain a versioned global dictionary")]
#[command(version)]
struct Args {
    /// Base directory of the dictionary
    #[arg(short, long, default_value = "./slicedict_data")]
    base_dir: PathBuf,

    /// Versions kept after a commit
    #[arg(long, default_value = "3")]
    max_versions: usize,

    /// Max age of a retained version, in seconds
    #[arg(long, default_value = "86400")]
    ttl_secs: u64,

    /// Values per slice before it splits
    #[arg(long, default_value = "100000")]
    max_slice_entries: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List published versions
    Versions,

    /// Show the metadata of a version (latest by default)
    Show {
        /// Version number
        #[arg(short, long)]
        version: Option<u64>,
    },

    /// Assign IDs to values and commit a new version
    Assign {
        /// Absolute path of the working area
        #[arg(short, long)]
        working_dir: PathBuf,

        /// Values to assign
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Look up a value's ID, or an ID's value
    Lookup {
        /// Version number (latest by default)
        #[arg(short, long)]
        version: Option<u64>,

        /// Value to resolve to an ID
        #[arg(long, conflicts_with = "id")]
        value: Option<String>,

        /// ID to resolve to a value
        #[arg(long)]
        id: Option<u32>,
    },

    /// Apply the retention policy now
    Prune,

    /// Remove a working area left behind by an abandoned session
    Clean {
        /// Absolute path of the working area
        #[arg(short, long)]
        working_dir: PathBuf,
    },

    /// Copy the latest version into another metadata root
    Copy {
        /// Metadata root the base directory lives under
        #[arg(long)]
        src_root: PathBuf,

        /// Destination metadata root
        #[arg(long)]
        dst_root: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,slicedict=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = DictConfig::builder()
        .base_dir(&args.base_dir)
        .max_versions(args.max_versions)
        .version_ttl(Duration::from_secs(args.ttl_secs))
        .max_slice_entries(args.max_slice_entries)
        .build();

    let store = GlobalDictStore::open_local(config)?;

    match args.command {
        Commands::Versions => {
            for version in store.list_all_versions()? {
                println!("{}", version);
            }
        }
        Commands::Show { version } => {
            let Some(version) = resolve_version(&store, version)? else {
                println!("(no versions)");
                return Ok(());
            };
            let metadata = store.get_metadata(version)?;
            println!("version:  {}", metadata.version);
            println!("previous: {:?}", metadata.previous_version);
            println!("next_id:  {}", metadata.next_id);
            println!("created:  {}", metadata.created_at_ms);
            println!("slices:   {}", metadata.slice_count());
            for (key, file) in &metadata.slices {
                println!("  {:<24} {}", key.to_string(), file);
            }
        }
        Commands::Assign { working_dir, values } => {
            let mut writer = store.begin_write(working_dir)?;
            let mut assigned = Vec::with_capacity(values.len());
            for value in &values {
                assigned.push((value, writer.lookup_or_assign(value.as_bytes())?));
            }
            let version = writer.commit()?;
            for (value, id) in assigned {
                println!("{}\t{}", value, id);
            }
            tracing::info!("Committed version {}", version);
        }
        Commands::Lookup { version, value, id } => {
            let Some(version) = resolve_version(&store, version)? else {
                println!("(no versions)");
                return Ok(());
            };
            match (value, id) {
                (Some(value), _) => match store.lookup_id(version, value.as_bytes())? {
                    Some(id) => println!("{}", id),
                    None => println!("(not found)"),
                },
                (None, Some(id)) => match store.lookup_value(version, id)? {
                    Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                    None => println!("(not found)"),
                },
                (None, None) => println!("pass --value or --id"),
            }
        }
        Commands::Prune => {
            let report = store.prune()?;
            println!("deleted:  {:?}", report.deleted);
            println!("retained: {:?}", report.retained);
            for (version, error) in report.failed {
                println!("failed:   {} ({})", version, error);
            }
        }
        Commands::Clean { working_dir } => {
            store.clean_working_area(&working_dir)?;
        }
        Commands::Copy { src_root, dst_root } => {
            let dst = MetaEnvironment::new(dst_root, Arc::new(LocalFileStore::new()));
            let dst_base = store.copy_to_another_meta(&src_root, &dst)?;
            println!("{}", dst_base.display());
        }
    }

    Ok(())
}

fn resolve_version(store: &GlobalDictStore, version: Option<u64>) -> Result<Option<u64>> {
    match version {
        Some(v) => Ok(Some(v)),
        None => store.latest_version(),
    }
}
