use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weaver_lib::{
    scan_vault, FileChange, Pipeline, RewriteRequest, StageOutput, VaultWatcher, WeaverConfig,
    WeaverError,
};

#[derive(Parser, Debug)]
#[command(name = "weaver", version, about = "Annotate markdown vaults with links and keywords")]
struct Cli {
    /// YAML file overriding the default vocabulary, stop words and windows
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the wiki-links found in a note
    Links { file: PathBuf },
    /// Print the recurring keyword groups of a note
    Keywords { file: PathBuf },
    /// Apply a rewrite request (JSON) to the file it names
    Apply { request: PathBuf },
    /// Parse every note of a vault in parallel
    Scan { vault: PathBuf },
    /// Watch a vault and print link/keyword records for each change
    Watch { vault: PathBuf },
}

fn main() -> ExitCode {
    // Logs go to stderr, records to stdout
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match WeaverConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => WeaverConfig::default(),
    };
    let pipeline = Pipeline::new(&config);

    let ok = match cli.command {
        Commands::Links { file } => {
            let out = match FileChange::from_path(&file) {
                Ok(change) => pipeline.parse_links(&change),
                Err(e) => StageOutput::from_result("link parsing", Err(e)),
            };
            emit(&out, true) && !out.is_error()
        }
        Commands::Keywords { file } => {
            let out = match FileChange::from_path(&file) {
                Ok(change) => pipeline.analyze(&change).1,
                Err(e) => StageOutput::from_result("keyword extraction", Err(e)),
            };
            emit(&out, true) && !out.is_error()
        }
        Commands::Apply { request } => {
            let out = match read_request(&request) {
                Ok(req) => pipeline.rewrite_file(&req),
                Err(e) => StageOutput::from_result("file rewrite", Err(e)),
            };
            emit(&out, true) && !out.is_error()
        }
        Commands::Scan { vault } => {
            let out = StageOutput::from_result("vault scan", scan_vault(&vault, &pipeline));
            emit(&out, true) && !out.is_error()
        }
        Commands::Watch { vault } => watch(&vault, &pipeline),
    };

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn read_request(path: &Path) -> Result<RewriteRequest, WeaverError> {
    if !path.exists() {
        return Err(WeaverError::NotFound(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|e| WeaverError::io(path, e))?;
    RewriteRequest::from_json(&raw)
}

fn watch(vault: &Path, pipeline: &Pipeline) -> bool {
    let (tx, rx) = mpsc::channel();
    let _watcher = match VaultWatcher::start(vault, tx) {
        Ok(watcher) => watcher,
        Err(e) => {
            let out: StageOutput<()> = StageOutput::from_result("file monitor", Err(e));
            emit(&out, false);
            return false;
        }
    };

    for change in rx {
        let (links, keywords) = pipeline.analyze(&change);
        emit(&links, false);
        emit(&keywords, false);
    }
    true
}

/// Print a record as JSON on stdout. Returns false if serialization failed.
fn emit<T: Serialize>(record: &T, pretty: bool) -> bool {
    let json = if pretty {
        serde_json::to_string_pretty(record)
    } else {
        serde_json::to_string(record)
    };
    match json {
        Ok(json) => {
            println!("{}", json);
            true
        }
        Err(e) => {
            log::error!("Failed to serialize record: {}", e);
            false
        }
    }
}
