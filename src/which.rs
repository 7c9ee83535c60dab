use std::path::{Path, PathBuf};
use anyhow::Context;
use walkdir::WalkDir;
use crate::association::FileFacts;
use crate::cli::WhichArgs;
use crate::config::Config;
use crate::table::AssociationTable;

pub fn run(args: WhichArgs, config: &Config) -> anyhow::Result<()> {
    let assoc_path = args.associations.unwrap_or_else(|| config.associations_path());
    let table = AssociationTable::load(&assoc_path)
        .with_context(|| format!("failed to read associations from {}", assoc_path.display()))?;

    for path in expand(&args.paths, args.recursive)? {
        let facts = FileFacts::probe(&path)
            .with_context(|| format!("cannot inspect {}", path.display()))?;
        println!("{}\t{}", path.display(), table.command_for(&facts).unwrap_or("-"));
    }
    Ok(())
}

/// Expands directories into the files below them when `recursive` is set.
fn expand(paths: &[PathBuf], recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = vec![];
    for path in paths {
        if recursive && path.is_dir() {
            out.extend(walk(path)?);
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}

fn walk(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
