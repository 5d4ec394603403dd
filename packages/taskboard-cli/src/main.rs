mod config;

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use taskboard_core::{
    AdapterKind, Board, BoardDocument, Card, Column, Credential, DirRecordStore, Effort, Priority,
    SyncReport,
};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Personal kanban board with optional remote sync
#[derive(Parser, Debug)]
#[command(name = "taskboard", version)]
struct Args {
    /// Config file (defaults to ~/.config/taskboard/config.json)
    #[arg(long, env = "TASKBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Board data directory, overrides the config file
    #[arg(long, env = "TASKBOARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show cards per column in render order
    List {
        #[arg(long)]
        column: Option<Column>,
        /// Print the raw document as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a card
    Add {
        title: String,
        #[arg(long, default_value = "inbox")]
        column: Column,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        #[arg(long, default_value = "1h")]
        effort: Effort,
    },
    /// Move a card to another column
    Move { id: String, column: Column },
    /// Delete a card
    Remove { id: String },
    /// Show sync status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Choose the remote tier: none, filesystem, gist or manual
    Configure {
        kind: AdapterKind,
        /// Gist token; an empty value clears the stored one
        #[arg(long, env = "TASKBOARD_GIST_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// File used by the filesystem tier
        #[arg(long)]
        file: Option<PathBuf>,
        /// Directory manual exports go to
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Write the board as JSON to a file or stdout
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the board with an exported JSON file
    Import { input: PathBuf },
    /// Pull the remote board if it is newer, then push local state
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER))
        .init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut cli_config = config::load_config(&config_path);
    if let Some(dir) = args.data_dir.clone() {
        cli_config.data_dir = Some(dir);
    }

    let data_dir = cli_config.data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    log::info!("Data directory: {}", data_dir.display());

    let mut sync_config = cli_config.sync.clone();
    sync_config.auto_discover = false;
    let board = Board::open(DirRecordStore::new(&data_dir), sync_config);

    run(&board, args.command).await
}

async fn run(board: &Board, command: Command) -> Result<()> {
    match command {
        Command::List { column, json } => {
            refresh(board).await;
            let doc = board.get_document();
            if json {
                println!("{}", board.export_blob()?);
            } else {
                print_board(&doc, column);
            }
        }
        Command::Add {
            title,
            column,
            priority,
            effort,
        } => {
            refresh(board).await;
            let id = board.add_card(Card::new(title, column, priority, effort))?;
            println!("{}", id);
            flush(board).await;
        }
        Command::Move { id, column } => {
            refresh(board).await;
            board.move_card(&id, column)?;
            flush(board).await;
        }
        Command::Remove { id } => {
            refresh(board).await;
            let card = board.remove_card(&id)?;
            println!("Removed \"{}\"", card.title);
            flush(board).await;
        }
        Command::Status { json } => {
            let report = board.get_sync_status();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&report);
            }
        }
        Command::Configure {
            kind,
            token,
            file,
            export_dir,
        } => {
            if let Some(file) = file {
                board.bind_file(file)?;
            }
            if let Some(dir) = export_dir {
                board.set_export_dir(dir)?;
            }
            let active = board
                .configure_adapter(kind, token.map(Credential::new))
                .await?;
            if active == kind {
                println!("Sync tier: {}", active);
            } else {
                println!("Sync tier: {} ({} is not usable with the current settings)", active, kind);
            }
            if let Err(e) = board.discover_remote().await {
                log::warn!("Remote check failed: {}", e);
            }
            print_status(&board.get_sync_status());
        }
        Command::Export { output } => {
            let blob = board.export_blob()?;
            match output {
                Some(path) => {
                    fs::write(&path, &blob)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => print!("{}", blob),
            }
        }
        Command::Import { input } => {
            let blob = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let count = board
                .import_blob(&blob)
                .with_context(|| format!("Failed to import {}", input.display()))?;
            println!("Imported {} cards", count);
            flush(board).await;
        }
        Command::Sync => {
            if board.get_sync_status().adapter_kind == AdapterKind::None {
                bail!("No sync tier configured; run `taskboard configure <kind>` first");
            }
            board.discover_remote().await?;
            board.sync_now().await?;
            print_status(&board.get_sync_status());
        }
    }

    if let Some(err) = board.get_sync_status().local_error {
        log::warn!("Board was not saved locally: {}", err);
    }
    Ok(())
}

/// Let a newer remote board replace ours before acting on it.
async fn refresh(board: &Board) {
    if background_sync(board) {
        if let Err(e) = board.discover_remote().await {
            log::warn!("Remote check failed, using local board: {}", e);
        }
    }
}

/// A short-lived process cannot wait out the debounce, so push right away.
async fn flush(board: &Board) {
    if background_sync(board) {
        if let Err(e) = board.sync_now().await {
            eprintln!("Saved locally, remote sync failed: {}", e);
        }
    }
}

fn background_sync(board: &Board) -> bool {
    let status = board.get_sync_status();
    status.blocked.is_none()
        && matches!(status.adapter_kind, AdapterKind::Filesystem | AdapterKind::Gist)
}

fn print_board(doc: &BoardDocument, only: Option<Column>) {
    for column in Column::ALL {
        if only.is_some_and(|c| c != column) {
            continue;
        }
        let cards = doc.render_order(column);
        println!("{} ({})", column.as_str().to_uppercase(), cards.len());
        for card in cards {
            println!(
                "  {}  [{}] {:>3}  {}",
                card.id,
                card.priority,
                card.effort.as_str(),
                card.title
            );
        }
    }
}

fn print_status(report: &SyncReport) {
    println!("Tier:       {}", report.adapter_kind);
    println!("Status:     {}", report.status);
    if let Some(id) = &report.remote_document_id {
        println!("Remote:     {}", id);
    }
    match report.last_synced_at {
        Some(at) => println!("Last sync:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync:  never"),
    }
    if report.adapter_kind == AdapterKind::Gist {
        println!("Token:      {}", if report.credential_present { "set" } else { "missing" });
    }
    if let Some(err) = &report.last_error {
        println!("Last error: {:?}: {}", err.class, err.message);
    }
    if let Some(reason) = &report.blocked {
        println!("Sync off:   {}", reason);
    }
    if let Some(err) = &report.local_error {
        println!("Local save: {}", err);
    }
}
