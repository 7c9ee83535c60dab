use anyhow::Context;
use crate::cli::CheckArgs;
use crate::config::Config;
use crate::table::AssociationTable;

pub fn run(args: CheckArgs, config: &Config) -> anyhow::Result<()> {
    let path = args.file.unwrap_or_else(|| config.associations_path());
    let table = AssociationTable::load(&path)
        .with_context(|| format!("failed to read associations from {}", path.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(table.associations())
            .context("failed to serialize associations")?;
        println!("{}", json);
        return Ok(());
    }

    if table.is_empty() {
        tracing::warn!("no associations declared in {}", path.display());
        return Ok(());
    }
    for (i, association) in table.associations().iter().enumerate() {
        println!("{:>3}. {}", i + 1, association.summary());
    }
    println!("{} association(s) in {}", table.len(), path.display());
    Ok(())
}
