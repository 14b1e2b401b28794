use super::save_model;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;
use twodo_editor::{EditorConfig, CONFIG_FILE_NAME};
use twodo_model::{CanonicalModel, Document, Group, Item};

const EXAMPLE_MODEL: &str = "outline.json";

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Client id stamped on local operations
    #[arg(short, long, default_value = "local")]
    pub client_id: String,

    /// Directory for persisted operation logs
    #[arg(short, long, default_value = ".twodo/log")]
    pub log_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

fn example_model() -> CanonicalModel {
    let mut groceries = Item::with_text("item-1", "Groceries");
    groceries.child_ids = vec!["item-2".into()];
    let mut milk = Item::with_text("item-2", "Milk");
    milk.parent_id = Some("item-1".into());

    CanonicalModel::with_documents(vec![Document::new("page-1").with_group(Group::with_items(
        "group-1",
        vec![groceries, milk, Item::with_text("item-3", "Laundry")],
    ))])
}

pub fn init(args: InitArgs, cwd: &Path) -> Result<()> {
    let config_path = cwd.join(CONFIG_FILE_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!("{} {} already exists", "⚠️".yellow(), CONFIG_FILE_NAME.bright_white());
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing twodo workspace...".bright_blue().bold());

    let config = EditorConfig {
        client_id: args.client_id,
        log_dir: args.log_dir,
        ..EditorConfig::default()
    };

    let log_dir = config.log_dir(cwd);
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)?;
        println!("  {} Created {}/", "✓".green(), config.log_dir);
    }

    let example = cwd.join(EXAMPLE_MODEL);
    if !example.exists() {
        save_model(&example, &example_model())?;
        println!("  {} Created {}", "✓".green(), EXAMPLE_MODEL);
    }

    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;

    println!("  {} Created {}", "✓".green(), CONFIG_FILE_NAME);
    println!();
    println!("{}", "✅ Workspace initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Run: twodo render {} page-1", EXAMPLE_MODEL);
    println!("  2. Run: twodo watch {} page-1 page-1.md", EXAMPLE_MODEL);

    Ok(())
}
