/// vestige: operate the trust layer from the command line.
///
/// Four operations: full indexing, semantic search over elements or files,
/// freshness plus index status, and shadow validation of proposed content.
/// Every path- or query-bearing operation still goes through the security
/// gate; the CLI gets no shortcut around it.
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vestige::embeddings::HashEmbedder;
use vestige::gate::SecurityGate;
use vestige::index::EmbeddingIndex;
use vestige::session::SessionState;
use vestige::shadow::ShadowValidator;
use vestige::shadow::syntax::SyntaxDiagnostics;
use vestige::workspace::VestigeWorkspace;

#[derive(Parser)]
#[command(name = "vestige")]
#[command(about = "Trust layer for code assistants: index, search, validate", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root (default: $VESTIGE_WORKSPACE, then the current directory)
    #[arg(long, global = true)]
    root: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full index for the workspace
    Index,

    /// Semantic search over indexed code elements
    Search {
        /// The search query text
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long = "limit", default_value_t = 5)]
        limit: usize,

        /// Restrict element results to a file type ("python") or extension ("py")
        #[arg(long)]
        file_type: Option<String>,

        /// Search whole-file summaries instead of elements
        #[arg(long)]
        files: bool,
    },

    /// Report index freshness and status
    Status,

    /// Validate proposed file content in a shadow workspace
    Validate {
        /// Workspace-relative path the content is proposed for
        file: String,

        /// Read the proposed content from this file instead of stdin
        #[arg(long)]
        content_file: Option<String>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let root = resolve_root(cli.root.as_deref())?;
    let _log_guards = init_logging(&root)?;

    match cli.command {
        Commands::Index => run_index(root),
        Commands::Search {
            query,
            limit,
            file_type,
            files,
        } => run_search(root, &query, limit, file_type.as_deref(), files),
        Commands::Status => run_status(root),
        Commands::Validate { file, content_file } => {
            run_validate(root, &file, content_file.as_deref())
        }
    }
}

/// Project root priority: explicit flag, then VESTIGE_WORKSPACE, then the
/// current directory. Tilde expansion applies to the first two.
fn resolve_root(flag: Option<&str>) -> Result<PathBuf> {
    let candidate = match flag {
        Some(path) => PathBuf::from(shellexpand::tilde(path).to_string()),
        None => match std::env::var("VESTIGE_WORKSPACE") {
            Ok(path) => PathBuf::from(shellexpand::tilde(&path).to_string()),
            Err(_) => std::env::current_dir()?,
        },
    };

    if !candidate.is_dir() {
        bail!("Project root does not exist: {}", candidate.display());
    }
    Ok(candidate.canonicalize().unwrap_or(candidate))
}

type LogGuards = (
    non_blocking::WorkerGuard,
    Option<non_blocking::WorkerGuard>,
);

/// Console logging on stderr always, so stdout stays clean for results.
/// File logging attaches only when the workspace already has a logs
/// directory; read-only commands never create `.vestige/` as a side effect.
fn init_logging(root: &Path) -> Result<LogGuards> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("vestige=info"))?;

    let (console_writer, console_guard) = non_blocking(std::io::stderr());
    let console_layer = fmt::layer()
        .with_writer(console_writer)
        .with_target(false)
        .with_ansi(true);

    let logs_dir = root.join(".vestige").join("logs");
    let mut file_guard = None;
    let file_layer = if logs_dir.is_dir() {
        let appender = rolling::daily(&logs_dir, "vestige.log");
        let (file_writer, guard) = non_blocking(appender);
        file_guard = Some(guard);
        Some(
            fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok((console_guard, file_guard))
}

fn open_index(workspace: &VestigeWorkspace) -> Result<EmbeddingIndex> {
    let embedder = Arc::new(HashEmbedder::new(workspace.config.embedding_dimensions));
    Ok(EmbeddingIndex::open(workspace, embedder)?)
}

fn require_workspace(root: PathBuf) -> Result<VestigeWorkspace> {
    match VestigeWorkspace::detect_and_load(root)? {
        Some(workspace) => Ok(workspace),
        None => bail!("No Vestige workspace found. Run 'vestige index' first."),
    }
}

fn run_index(root: PathBuf) -> Result<ExitCode> {
    let workspace = VestigeWorkspace::load_or_initialize(root)?;
    let session = SessionState::new();
    let index = open_index(&workspace)?;

    let report = index.index_codebase(&session, None)?;
    println!("{}", report.message());
    for error in &report.errors {
        println!("  error: {}", error);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_search(
    root: PathBuf,
    query: &str,
    limit: usize,
    file_type: Option<&str>,
    files: bool,
) -> Result<ExitCode> {
    let workspace = require_workspace(root)?;
    let session = SessionState::new();
    let gate = SecurityGate::new(&workspace.root, &workspace.config)?;
    gate.validate_query(&session, query)?;

    let index = open_index(&workspace)?;

    if files {
        let hits = index.search_files(&session, query, limit)?;
        if hits.is_empty() {
            println!("No matching files.");
        }
        for hit in hits {
            println!(
                "{}. {} (score {:.3}, {}, {} elements)",
                hit.rank, hit.file_path, hit.similarity_score, hit.file_type, hit.element_count
            );
            println!("   {}", hit.summary);
        }
    } else {
        let hits = index.search_elements(&session, query, limit, file_type)?;
        if hits.is_empty() {
            println!("No matching elements.");
        }
        for hit in hits {
            println!(
                "{}. {} {} (score {:.3}) {}:{}-{}",
                hit.rank,
                hit.element_kind,
                hit.element_name,
                hit.similarity_score,
                hit.file_path,
                hit.start_line,
                hit.end_line
            );
            if !hit.docstring.is_empty() {
                println!("   {}", hit.docstring);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_status(root: PathBuf) -> Result<ExitCode> {
    let workspace = match VestigeWorkspace::detect_and_load(root)? {
        Some(workspace) => workspace,
        None => {
            println!("No index found");
            println!("Recommendation: Run full indexing");
            return Ok(ExitCode::SUCCESS);
        }
    };
    let session = SessionState::new();
    let index = open_index(&workspace)?;

    let freshness = index.freshness()?;
    println!("Freshness: {}", freshness.reason());
    if let Some(hint) = freshness.recommendation() {
        println!("Recommendation: {}", hint);
    }

    let status = index.status(&session)?;
    println!();
    println!("Index exists: {}", status.index_exists);
    println!("Last indexed: {}", status.last_indexed);
    println!(
        "Files: {}, elements: {}",
        status.files_count, status.elements_count
    );
    if status.has_errors {
        println!("The last indexing run recorded errors");
    }
    if !status.indexed_files_sample.is_empty() {
        println!(
            "Indexed files ({} total, showing {}):",
            status.total_indexed_files,
            status.indexed_files_sample.len()
        );
        for file in &status.indexed_files_sample {
            println!("  {}", file);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(root: PathBuf, file: &str, content_file: Option<&str>) -> Result<ExitCode> {
    let workspace = VestigeWorkspace::load_or_initialize(root)?;
    let session = SessionState::new();
    let gate = SecurityGate::new(&workspace.root, &workspace.config)?;

    let proposed = match content_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read proposed content from {}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read proposed content from stdin")?;
            buffer
        }
    };

    let validator = ShadowValidator::new(&workspace, Arc::new(SyntaxDiagnostics::new()));
    let result = validator.validate(&session, &gate, file, &proposed)?;

    if result.valid {
        println!("PASS: {} ({} warnings)", file, result.warning_count);
    } else {
        println!(
            "FAIL: {} ({} errors, {} warnings)",
            file, result.error_count, result.warning_count
        );
    }
    for finding in &result.diagnostics {
        println!(
            "  {}:{}:{} [{}] {}",
            file, finding.line, finding.column, finding.source, finding.message
        );
    }

    if result.valid {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
