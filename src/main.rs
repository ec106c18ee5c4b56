//! datashelf - command-line interface to a datashelf store.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use datashelf::catalog::SourceRecord;
use datashelf::db::{create_empty_store, Store, StoreConfig, StoreResult};
use datashelf::inventory::FieldFilter;
use datashelf::table::{read_table, write_table};

/// Git-backed store for versioned region-by-year tables
#[derive(Parser)]
#[command(name = "datashelf", version, about)]
struct Cli {
    /// Store directory (default: $DATASHELF_PATH or ./datashelf)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// JSON settings file, read instead of the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Name stamped into commits (default: $DATASHELF_CRUNCHER or $USER)
    #[arg(long, global = true)]
    cruncher: Option<String>,

    /// Remote URL template; `{source}` is replaced by the source ID
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Reject every change to the store
    #[arg(long, global = true)]
    read_only: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty store
    Init {
        /// Wipe an existing store first
        #[arg(long)]
        force: bool,
    },

    /// Validate a table file and commit it to a source
    Commit {
        /// Table file (### META ### / ### DATA ### format)
        table_file: PathBuf,
        /// Source the table belongs to
        source: String,
        /// Commit message
        message: String,
        /// meta.csv describing the source, required if it is new
        #[arg(long)]
        source_meta: Option<PathBuf>,
    },

    /// Search the inventory with shell patterns (e.g. entity='CO2*')
    Find {
        /// Field filters
        #[arg(required = true)]
        filters: Vec<FieldFilter>,
        /// Treat values as regular expressions
        #[arg(long)]
        regex: bool,
        /// Match values exactly
        #[arg(long, conflicts_with = "regex")]
        exact: bool,
        /// Only variables with this many sub-levels
        #[arg(long)]
        level: Option<usize>,
        /// Compact listing
        #[arg(long)]
        short: bool,
        /// Graphviz output
        #[arg(long, conflicts_with = "short")]
        graph: bool,
    },

    /// Print a table, or write it to a file
    Get {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Remove a table
    Remove { id: String },

    /// Remove a source with all its tables
    RemoveSource { id: String },

    /// Clone a source from the remote
    ImportRemote { id: String },

    /// Push a source to the remote
    ExportRemote { id: String },

    /// Pull remote changes of a source
    UpdateRemote { id: String },

    /// List sources
    Sources,

    /// Show store summary
    Info,

    /// Show commits of the main repository or a source
    History {
        #[arg(default_value = "main")]
        repo: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn build_config(cli: &Cli) -> StoreResult<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::from_env(),
    };
    if let Some(path) = &cli.store {
        config.path = path.clone();
    }
    if let Some(cruncher) = &cli.cruncher {
        config.cruncher = cruncher.clone();
    }
    if let Some(remote) = &cli.remote {
        config.remote_url = Some(remote.clone());
    }
    if cli.read_only {
        config.read_only = true;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> StoreResult<()> {
    let config = build_config(&cli)?;

    match cli.command {
        Command::Init { force } => {
            create_empty_store(&config.path, force)?;
            println!("Initialized datashelf at {}", config.path.display());
        }
        Command::Commit {
            table_file,
            source,
            message,
            source_meta,
        } => {
            let mut table = read_table(&table_file)?;
            table.meta.remove("source_name");
            table.meta.remove("source_year");
            table.meta.set("source", source);
            let meta = source_meta
                .map(|path| SourceRecord::read_meta_file(&path))
                .transpose()?;

            let mut store = Store::open_with_config(config)?;
            let id = store.commit_table(table, &message, meta)?;
            println!("{}", id);
        }
        Command::Find {
            filters,
            regex,
            exact,
            level,
            short,
            graph,
        } => {
            let store = Store::open_with_config(config)?;
            let view = if exact {
                store.find_exact(&filters)?
            } else {
                store.find_pattern(&filters, regex, level)?
            };
            if short {
                print!("{}", view.short());
            } else if graph {
                print!("{}", view.graph());
            } else {
                println!("{}", view);
            }
        }
        Command::Get { id, out } => {
            let store = Store::open_with_config(config)?;
            let table = store.get_table(&id)?;
            match out {
                Some(path) => write_table(&table, &path)?,
                None => print!("{}", table),
            }
        }
        Command::Remove { id } => {
            Store::open_with_config(config)?.remove_table(&id)?;
            println!("Removed {}", id);
        }
        Command::RemoveSource { id } => {
            Store::open_with_config(config)?.remove_source(&id)?;
            println!("Removed source {}", id);
        }
        Command::ImportRemote { id } => {
            let record = Store::open_with_config(config)?.import_source_from_remote(&id)?;
            println!("Imported {} ({})", record.source_id, record.source_url);
        }
        Command::ExportRemote { id } => {
            Store::open_with_config(config)?.export_source_to_remote(&id)?;
            println!("Exported {}", id);
        }
        Command::UpdateRemote { id } => {
            if Store::open_with_config(config)?.update_source_from_remote(&id)? {
                println!("Updated {}", id);
            } else {
                println!("{} is up to date", id);
            }
        }
        Command::Sources => {
            let store = Store::open_with_config(config)?;
            for record in store.sources().iter() {
                let hash = record.git_commit_hash.as_deref().unwrap_or("-");
                println!(
                    "{:<24} {:<10} {:<12} {}",
                    record.source_id,
                    &hash[..hash.len().min(7)],
                    record.date,
                    record.licence
                );
            }
        }
        Command::Info => {
            println!("{}", Store::open_with_config(config)?.info()?);
        }
        Command::History { repo, limit } => {
            let store = Store::open_with_config(config)?;
            for commit in store.history(&repo, limit)? {
                println!(
                    "{}  {}  {}",
                    commit.id.short(),
                    commit.timestamp.format("%Y-%m-%d %H:%M"),
                    commit.summary()
                );
            }
        }
    }
    Ok(())
}
