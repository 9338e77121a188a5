mod app;
mod book;
mod cli;
mod epub_reader;
mod image;
mod markdown;
mod paginate;
mod reader;
mod state;
mod store;
mod terminal;
mod width;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    app::run(&cli)
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}
