use anyhow::Context;
use clap::Parser as ClapParser;
use tracing_subscriber::EnvFilter;

mod association;
mod builder;
mod check;
mod cli;
mod config;
mod error;
mod reader;
mod table;
mod which;

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let config = config::Config::load().context("failed to load config")?;
    init_logging(config.log_filter());

    match args.command {
        cli::Commands::Check(a) => check::run(a, &config)?,
        cli::Commands::Trace(a) => commands::trace(a, &config)?,
        cli::Commands::Which(a) => which::run(a, &config).context("which failed")?,
    }
    Ok(())
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env("ASSOCXML_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

mod commands {
    use std::fs::File;
    use anyhow::Context;
    use crate::builder::EventLog;
    use crate::cli::TraceArgs;
    use crate::config::Config;
    use crate::reader;

    /// Prints the events even when the read fails, so the break point is visible.
    pub fn trace(args: TraceArgs, config: &Config) -> anyhow::Result<()> {
        let path = args.file.unwrap_or_else(|| config.associations_path());
        let mut file = File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut log = EventLog::default();
        let outcome = reader::read(&mut file, &mut log);

        for event in &log.events {
            if args.json {
                println!("{}", serde_json::to_string(event).context("failed to serialize event")?);
            } else {
                println!("{}", event);
            }
        }
        outcome.with_context(|| format!("failed to read {}", path.display()))
    }
}
