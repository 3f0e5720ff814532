//! hdt-forge command-line interface.
//!
//! Usage:
//!   hdt-forge build data/categories.nt -o categories.hdt
//!   hdt-forge build --list dumps.txt -o categories.hdt --block-size 32
//!   hdt-forge info categories.hdt --json
//!   hdt-forge query categories.hdt -s http://example.org/a

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use hdt_forge::config::BuildConfig;
use hdt_forge::parsing::rdf_parser::{read_dump_list, RdfFileSource};
use hdt_forge::storage::builder::HdtBuilder;
use hdt_forge::storage::hdt_file::HdtStore;
use hdt_forge::Result;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hdt-forge")]
#[command(about = "Build and inspect HDT (Header-Dictionary-Triples) stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// No logging at all
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a store from one or more RDF dumps
    Build {
        /// RDF dumps (N-Triples, N-Quads, Turtle or TriG)
        inputs: Vec<PathBuf>,

        /// File listing one dump per line
        #[arg(long)]
        list: Option<PathBuf>,

        /// Output store path
        #[arg(short, long)]
        output: PathBuf,

        /// JSON build configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base URI recorded in the header
        #[arg(long)]
        base_uri: Option<String>,

        /// Front-coding block size
        #[arg(long)]
        block_size: Option<u32>,
    },
    /// Print the header of a store
    Info {
        store: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the triples of a store matching a subject and/or predicate
    Query {
        store: PathBuf,

        #[arg(short, long)]
        subject: Option<String>,

        #[arg(short, long)]
        predicate: Option<String>,

        #[arg(short, long)]
        object: Option<String>,
    },
}

fn build(
    inputs: Vec<PathBuf>,
    list: Option<&Path>,
    output: &Path,
    mut config: BuildConfig,
) -> Result<()> {
    let mut dumps = inputs;
    if let Some(list) = list {
        dumps.extend(read_dump_list(list)?);
    }
    if dumps.is_empty() {
        return Err(hdt_forge::Error::Config("no input dumps given".to_string()));
    }
    config.validate()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping...");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| hdt_forge::Error::Config(format!("cannot install Ctrl-C handler: {}", e)))?;

    let started = Instant::now();
    let mut listener = |level: f32, message: &str| info!(progress = level, "{}", message);
    let base_uri = config.base_uri.clone();
    let mut builder = HdtBuilder::new(config)?.with_cancel_flag(cancel);
    for dump in &dumps {
        info!(dump = %dump.display(), "loading");
        let mut source = RdfFileSource::open(dump, &base_uri)?;
        builder.ingest(&mut source, &mut listener)?;
    }
    let hdt = builder.finish(&mut listener)?;
    hdt.save_to_file(output)?;

    let header = hdt.header();
    println!(
        "{} triples, {} distinct terms -> {} ({:.2}s)",
        header.triples,
        header.distinct_terms(),
        output.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn info(store: &Path, json: bool) -> Result<()> {
    let header = HdtStore::read_header(store)?;
    if json {
        let text = serde_json::to_string_pretty(&header)
            .map_err(|e| hdt_forge::Error::Serialization(e.to_string()))?;
        println!("{}", text);
    } else {
        for (key, value) in header.properties() {
            println!("{:<32} {}", key, value);
        }
    }
    Ok(())
}

fn query(
    store: &Path,
    subject: Option<&str>,
    predicate: Option<&str>,
    object: Option<&str>,
) -> Result<()> {
    let store = HdtStore::open(store)?;
    let mut matched = 0u64;
    for triple in store.triples_with_pattern(subject, predicate, object) {
        println!("{}\t{}\t{}", triple.subject, triple.predicate, triple.object);
        matched += 1;
    }
    info!(matched, "query finished");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();
    } else if !cli.quiet {
        tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
    }

    let result = match cli.command {
        Commands::Build { inputs, list, output, config, base_uri, block_size } => {
            let loaded = match config {
                Some(path) => BuildConfig::from_json_file(&path),
                None => Ok(BuildConfig::default()),
            };
            loaded.and_then(|mut config| {
                if let Some(base_uri) = base_uri {
                    config.base_uri = base_uri;
                }
                if let Some(block_size) = block_size {
                    config.block_size = block_size;
                }
                build(inputs, list.as_deref(), &output, config)
            })
        }
        Commands::Info { store, json } => info(&store, json),
        Commands::Query { store, subject, predicate, object } => {
            query(&store, subject.as_deref(), predicate.as_deref(), object.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
