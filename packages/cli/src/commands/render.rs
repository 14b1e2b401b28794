use super::{load_model, resolve};
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use twodo_editor::{EditSession, OutlineSyntax};

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Model file (JSON)
    pub model: PathBuf,

    /// Document to render
    pub document: String,

    /// Output syntax (markdown, latex)
    #[arg(short, long, default_value = "markdown")]
    pub syntax: OutlineSyntax,
}

pub fn render(args: RenderArgs, cwd: &Path) -> Result<()> {
    let model = load_model(&resolve(cwd, &args.model))?;
    let session = EditSession::new("render", model);
    print!("{}", session.render(&args.document, args.syntax)?);
    Ok(())
}
