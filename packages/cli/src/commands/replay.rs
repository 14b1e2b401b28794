use super::{load_model, resolve, save_model};
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use twodo_editor::{EditSession, EditorConfig};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Base snapshot the log was recorded against
    pub base: PathBuf,

    /// Document whose log to replay
    pub document: String,

    /// First sequence to replay
    #[arg(long, default_value_t = 0)]
    pub from: u64,

    /// Last sequence to replay (defaults to the end of the log)
    #[arg(long)]
    pub to: Option<u64>,

    /// Where to write the rebuilt model (stdout when omitted)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub fn replay(args: ReplayArgs, cwd: &Path) -> Result<()> {
    let config = EditorConfig::load(cwd)?;
    let base = load_model(&resolve(cwd, &args.base))?;
    let mut session = EditSession::open(base, config, cwd)?;
    session.open_log(&args.document)?;

    let outcomes = session.replay(&args.document, args.from, args.to);
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_ok()).collect();

    match &args.out {
        Some(out) => {
            let out = resolve(cwd, out);
            save_model(&out, session.model())?;
            eprintln!(
                "{} Replayed {} entries → {}",
                "✅".green(),
                outcomes.len() - failed.len(),
                out.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(session.model())?),
    }

    for outcome in &failed {
        if let Err(e) = &outcome.result {
            eprintln!("  {} #{} - {}", "✗".red(), outcome.sequence, e);
        }
    }
    if !failed.is_empty() {
        bail!("{} of {} entries failed to replay", failed.len(), outcomes.len());
    }
    Ok(())
}
