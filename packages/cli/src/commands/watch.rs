use super::{load_model, resolve, save_model};
use crate::watcher::FileWatcher;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use twodo_editor::{Authority, EditSession, EditorConfig, EditorError, OutlineSyntax};

const VIEW_ID: &str = "markdown-file";

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Model file (JSON), rewritten after every accepted edit
    pub model: PathBuf,

    /// Document the Markdown file mirrors
    pub document: String,

    /// Markdown file; written from the model when missing
    pub markdown: PathBuf,
}

/// Push one edit of the Markdown file into the session
fn sync_once(session: &mut EditSession, document: &str, before: &str, after: &str) -> Result<usize> {
    match session.sync_text(document, VIEW_ID, before, after) {
        Ok(applied) => Ok(applied.len()),
        Err(EditorError::Bridge(e)) => {
            // Drift has been signalled; keep watching
            warn!(document, error = %e, "Markdown edit not applied");
            Ok(0)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn watch(args: WatchArgs, cwd: &Path) -> Result<()> {
    let config = EditorConfig::load(cwd)?;
    let model_path = resolve(cwd, &args.model);
    let markdown_path = resolve(cwd, &args.markdown);

    let mut session = EditSession::open(load_model(&model_path)?, config, cwd)?;
    session.set_authority(&args.document, VIEW_ID, Authority::Markdown);

    if !markdown_path.exists() {
        let rendered = session.render(&args.document, OutlineSyntax::Markdown)?;
        fs::write(&markdown_path, rendered)?;
    }
    let mut last = fs::read_to_string(&markdown_path)
        .with_context(|| format!("Cannot read {}", markdown_path.display()))?;

    let watcher = FileWatcher::new(&markdown_path)?;
    println!(
        "{} {} is authoritative for {} (Ctrl+C to stop)",
        "👀".bright_blue(),
        markdown_path.display(),
        args.document.bright_white()
    );

    while watcher.next_change().is_some() {
        let current = match fs::read_to_string(&markdown_path) {
            Ok(current) => current,
            Err(e) => {
                warn!(path = %markdown_path.display(), error = %e, "Markdown file unreadable");
                continue;
            }
        };
        if current == last {
            continue;
        }

        let applied = sync_once(&mut session, &args.document, &last, &current)?;
        if applied > 0 {
            save_model(&model_path, session.model())?;
            println!("  {} {} edits synced", "✓".green(), applied);
        } else {
            println!("  {} edit not applied, text and model differ", "✗".red());
        }
        last = current;
    }

    Ok(())
}
