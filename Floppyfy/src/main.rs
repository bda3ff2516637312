mod app;
mod cli;
mod commands;
mod console;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use floppyconfig::Config;

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Command::Run) {
        Command::Init => commands::init(&cli.settings),
        Command::Run => app::run(Config::load(&cli.settings)?).await,
        Command::Devices => commands::devices(Config::load(&cli.settings)?).await,
        Command::Auth => commands::auth(Config::load(&cli.settings)?).await,
        Command::Tags(tags) => commands::tags(Config::load(&cli.settings)?, tags),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("floppyfy: {:#}", e);
            ExitCode::from(1)
        }
    }
}
