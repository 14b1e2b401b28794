use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use twodo_editor::{EditorConfig, FileStore, OperationLog};

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Document whose log to list
    pub document: String,

    /// Only entries with a sequence above this one
    #[arg(short, long, default_value_t = 0)]
    pub since: u64,

    /// Print entries as JSON lines
    #[arg(long)]
    pub json: bool,
}

pub(crate) fn open_log(cwd: &Path, config: &EditorConfig, document: &str) -> Result<OperationLog> {
    let store = FileStore::open(config.log_dir(cwd))?;
    Ok(OperationLog::open(document, Arc::new(store), config.log_retention)?)
}

pub fn log(args: LogArgs, cwd: &Path) -> Result<()> {
    let config = EditorConfig::load(cwd)?;
    let log = open_log(cwd, &config, &args.document)?;
    let entries = log.get_operations(args.since);

    if args.json {
        for entry in entries {
            println!("{}", serde_json::to_string(entry)?);
        }
        return Ok(());
    }

    println!(
        "{} {} ({} entries, last sequence {})",
        "📜".bright_blue(),
        args.document.bright_white(),
        log.len(),
        log.last_sequence()
    );
    for entry in entries {
        println!(
            "  #{:<5} {:<9} {:<16} {}",
            entry.sequence.unwrap_or_default(),
            entry.op_type().cyan(),
            entry.item_id,
            entry.client_id.dimmed()
        );
    }
    if entries.is_empty() {
        println!("  {}", "(no entries)".dimmed());
    }
    Ok(())
}
