use super::{load_model, resolve, save_model};
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use twodo_editor::{ApplyOutcome, EditSession, EditorConfig, OperationDescriptor};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Model file (JSON)
    pub model: PathBuf,

    /// Operation descriptor file: one descriptor or an array of them
    pub operations: PathBuf,

    /// Apply on behalf of this view (checked against its authority)
    #[arg(long)]
    pub view: Option<String>,

    /// Write the result here instead of updating the model in place
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorFile {
    Many(Vec<OperationDescriptor>),
    One(OperationDescriptor),
}

pub(crate) fn read_descriptors(path: &Path) -> Result<Vec<OperationDescriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read operations {}", path.display()))?;
    let parsed: DescriptorFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid operation descriptor in {}", path.display()))?;
    Ok(match parsed {
        DescriptorFile::Many(descriptors) => descriptors,
        DescriptorFile::One(descriptor) => vec![descriptor],
    })
}

pub fn apply(args: ApplyArgs, cwd: &Path) -> Result<()> {
    let config = EditorConfig::load(cwd)?;
    let model_path = resolve(cwd, &args.model);
    let model = load_model(&model_path)?;
    let descriptors = read_descriptors(&resolve(cwd, &args.operations))?;

    let mut session = EditSession::open(model, config, cwd)?;

    let mut failures = 0;
    for descriptor in &descriptors {
        let outcome = match &args.view {
            Some(view) => match twodo_editor::Operation::from_descriptor(descriptor) {
                Ok(operation) => session.apply_from_view(operation, view),
                Err(e) => ApplyOutcome::Failed(e),
            },
            None => session.apply_descriptor(descriptor),
        };

        match outcome {
            ApplyOutcome::Applied(applied) => println!(
                "  {} #{} {} {}",
                "✓".green(),
                applied.sequence,
                applied.operation.op_type(),
                applied.operation.item_id
            ),
            ApplyOutcome::Rejected { reason, authority, .. } => {
                failures += 1;
                eprintln!(
                    "  {} {} {} - {} ({})",
                    "✗".red(),
                    descriptor.op,
                    descriptor.item_id,
                    reason,
                    authority
                );
            }
            ApplyOutcome::Failed(e) => {
                failures += 1;
                eprintln!("  {} {} {} - {}", "✗".red(), descriptor.op, descriptor.item_id, e);
            }
        }
    }

    let out = args.out.map(|out| resolve(cwd, &out)).unwrap_or(model_path);
    save_model(&out, session.model())?;

    println!();
    if failures > 0 {
        bail!("{} of {} operations failed", failures, descriptors.len());
    }
    println!(
        "{} Applied {} operations → {}",
        "✅".green(),
        descriptors.len(),
        out.display()
    );
    Ok(())
}
