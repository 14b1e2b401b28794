mod commands;
mod watcher;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    apply, init, log, render, replay, watch, ApplyArgs, InitArgs, LogArgs, RenderArgs, ReplayArgs,
    WatchArgs,
};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// twodo - operation-sourced outline editing
#[derive(Parser, Debug)]
#[command(name = "twodo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a twodo.config.json and an example outline
    Init(InitArgs),

    /// Apply operation descriptors to a model file and log them
    Apply(ApplyArgs),

    /// List logged operations of a document
    Log(LogArgs),

    /// Rebuild a model from a base snapshot and the log
    Replay(ReplayArgs),

    /// Print a document as Markdown or LaTeX
    Render(RenderArgs),

    /// Keep a model in sync with an authoritative Markdown file
    Watch(WatchArgs),
}

fn run(command: Command, cwd: &Path) -> anyhow::Result<()> {
    match command {
        Command::Init(args) => init(args, cwd),
        Command::Apply(args) => apply(args, cwd),
        Command::Log(args) => log(args, cwd),
        Command::Replay(args) => replay(args, cwd),
        Command::Render(args) => render(args, cwd),
        Command::Watch(args) => watch(args, cwd),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| run(cli.command, &cwd));

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
