//! Memory Store CLI - inspect and edit assistant memory storage
//!
//! Works against whichever backend the environment selects.

use anyhow::{anyhow, Context, Result};
use std::env;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use memory_store::context::{ContextSnapshot, COMPANY_RECORD};
use memory_store::{
    open_backend, DriveBackend, LocalBackend, Record, StorageBackend, StorageConfig,
};

/// CLI command
#[derive(Debug)]
enum Command {
    /// Verify the configured backend is reachable
    Check,
    /// Print the full-context overview
    Context,
    Load { name: String },
    Save { name: String, json: String },
    Read { path: String },
    Write { path: String, content: String },
    Append { path: String, content: String },
    List { directory: String, pattern: String },
    Exists { path: String },
    /// Show help
    Help,
}

impl Command {
    fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Save { .. } | Command::Write { .. } | Command::Append { .. }
        )
    }
}

fn print_help() {
    eprintln!(
        r#"Memory Store - storage for the assistant memory service

USAGE:
    memory-store check
    memory-store context
    memory-store load <name>
    memory-store save <name> <json>
    memory-store read <path>
    memory-store write <path> <content>
    memory-store append <path> <content>
    memory-store list <directory> [pattern]
    memory-store exists <path>
    memory-store help

COMMANDS:
    check   Show backend configuration and whether storage is reachable
    context Load all category records and print the overview
    load    Print a record from the data directory
    save    Replace a record with a JSON object
    read    Print a blob relative to the shared root
    write   Create or replace a blob
    append  Append to a blob, creating it if needed
    list    List blobs in a directory, newest first (pattern default: *.md)
    exists  Exit 0 if the blob exists, 1 otherwise
    help    Show this help message

EXAMPLES:
    memory-store save pending_tasks.json '{{"tasks":[]}}'
    memory-store append logs/2026-01-03.md "- shipped storage layer"
    memory-store list logs "2026-01-*.md"

ENVIRONMENT:
    MEMORY_STORE_BACKEND            local (default) or drive
    MEMORY_STORE_DATA_DIR           Local record directory
    MEMORY_STORE_SHARED_ROOT        Local blob root (default: parent of data dir)
    MEMORY_STORE_RECORDS_FOLDER     Drive folder for records (default: mcp-data)
    GOOGLE_SERVICE_ACCOUNT_JSON     Service-account key, inline
    GOOGLE_SERVICE_ACCOUNT_FILE     Service-account key, path
    GOOGLE_DRIVE_ACCESS_TOKEN       Pre-issued access token
    GOOGLE_SHARED_DRIVE_ID          Shared drive id
    GOOGLE_SHARED_DRIVE_NAME        Shared drive name (default: memory)
    RUST_LOG                        Log level (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    let arg = |index: usize, usage: &str| {
        args.get(index)
            .cloned()
            .ok_or_else(|| anyhow!("Usage: memory-store {}", usage))
    };

    match args[1].as_str() {
        "check" => Ok(Command::Check),
        "context" => Ok(Command::Context),
        "load" => Ok(Command::Load {
            name: arg(2, "load <name>")?,
        }),
        "save" => Ok(Command::Save {
            name: arg(2, "save <name> <json>")?,
            json: arg(3, "save <name> <json>")?,
        }),
        "read" => Ok(Command::Read {
            path: arg(2, "read <path>")?,
        }),
        "write" => Ok(Command::Write {
            path: arg(2, "write <path> <content>")?,
            content: arg(3, "write <path> <content>")?,
        }),
        "append" => Ok(Command::Append {
            path: arg(2, "append <path> <content>")?,
            content: arg(3, "append <path> <content>")?,
        }),
        "list" => Ok(Command::List {
            directory: arg(2, "list <directory> [pattern]")?,
            pattern: args.get(3).cloned().unwrap_or_else(|| "*.md".to_string()),
        }),
        "exists" => Ok(Command::Exists {
            path: arg(2, "exists <path>")?,
        }),
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            Ok(Command::Help)
        }
    }
}

/// Report configuration and reachability of the configured backend
async fn check(config: &StorageConfig) -> Result<()> {
    println!("Backend: {}", config.backend_type());

    match config {
        StorageConfig::Local(settings) => {
            let backend = LocalBackend::new(settings.data_dir.clone(), settings.shared_root.clone());
            let data_ok = backend.data_dir().is_dir();
            let shared_ok = backend.shared_root().is_dir();
            println!(
                "Data directory: {} ({})",
                backend.data_dir().display(),
                if data_ok { "ok" } else { "missing" }
            );
            println!(
                "Shared root: {} ({})",
                backend.shared_root().display(),
                if shared_ok { "ok" } else { "missing" }
            );
            report_company_record(&backend).await;
        }
        StorageConfig::Drive(settings) => {
            let backend = DriveBackend::connect(settings)
                .await
                .context("Failed to connect to Google Drive")?;
            println!("Shared drive: {}", backend.drive_id());
            println!("Records folder: {}", backend.records_folder());
            report_company_record(&backend).await;

            let client = backend.client();
            println!("Client health: {}", client.health_status());
            let errors = client.recent_errors();
            if !errors.is_empty() {
                println!("Recent errors:");
                for entry in errors {
                    println!(
                        "  [{}] {} {}: {}",
                        entry.timestamp, entry.operation, entry.target, entry.error
                    );
                }
            }
            backend.id_cache().log_metrics();
        }
    }

    Ok(())
}

async fn report_company_record(backend: &dyn StorageBackend) {
    let company = backend.load_record(COMPANY_RECORD).await;
    if company.is_empty() {
        println!("{}: not found or empty", COMPANY_RECORD);
    } else {
        println!("{}: readable ({} keys)", COMPANY_RECORD, company.len());
    }
}

async fn run(command: Command, config: &StorageConfig) -> Result<bool> {
    if let Command::Check = command {
        check(config).await?;
        return Ok(true);
    }

    let backend = open_backend(config)
        .await
        .context("Failed to initialize storage backend")?;

    match command {
        Command::Context => {
            let snapshot = ContextSnapshot::load(backend.as_ref()).await;
            let summary = snapshot.task_summary();
            println!(
                "{} pending tasks ({} high priority)",
                summary.total_pending, summary.high_priority
            );
            println!("{}", serde_json::to_string_pretty(&snapshot.overview())?);
        }
        Command::Load { name } => {
            let record = backend.load_record(&name).await;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Save { name, json } => {
            let record: Record =
                serde_json::from_str(&json).context("Record must be a JSON object")?;
            backend
                .save_record(&name, &record)
                .await
                .with_context(|| format!("Failed to save record {}", name))?;
            info!(record = %name, "Record saved");
        }
        Command::Read { path } => match backend.read_blob(&path).await {
            Some(content) => print!("{}", content),
            None => {
                eprintln!("Not found: {}", path);
                return Ok(false);
            }
        },
        Command::Write { path, content } => {
            backend
                .write_blob(&path, &content)
                .await
                .with_context(|| format!("Failed to write {}", path))?;
            info!(path = %path, "Blob written");
        }
        Command::Append { path, content } => {
            backend
                .append_blob(&path, &content)
                .await
                .with_context(|| format!("Failed to append to {}", path))?;
            info!(path = %path, "Blob appended");
        }
        Command::List { directory, pattern } => {
            for path in backend.list_blobs(&directory, &pattern).await {
                println!("{}", path);
            }
        }
        Command::Exists { path } => {
            let found = backend.exists(&path).await;
            println!("{}", found);
            return Ok(found);
        }
        Command::Check | Command::Help => {}
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let log_level = env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command
    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    if let Command::Help = command {
        print_help();
        return Ok(());
    }

    let config = StorageConfig::from_env().context("Invalid storage configuration")?;
    let is_write = command.is_write();

    match run(command, &config).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            if is_write {
                error!(error = %e, "Write failed");
            }
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
