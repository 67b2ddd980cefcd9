use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::{fs::OpenOptions, path::Path};

/// The terminal UI owns stdout and stderr, so records go to a file.
pub(crate) fn init_file(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("installing logger")?;
    Ok(())
}

pub(crate) fn init_stderr() {
    // a second init is harmless
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .target(Target::Stderr)
        .try_init();
}
