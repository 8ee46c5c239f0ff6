//! `kopi run`: load a JSON unit and run its entry class.

use anyhow::Context;
use kopi_core::{CompilationUnit, Runtime, RuntimeOptions};
use std::path::{Path, PathBuf};

pub struct RunArgs {
    pub file: PathBuf,
    pub main: Option<String>,
    pub config: Option<PathBuf>,
    pub max_call_depth: Option<usize>,
}

/// Options from the config file, then command-line overrides
pub fn resolve_options(config: Option<&Path>, max_call_depth: Option<usize>) -> anyhow::Result<RuntimeOptions> {
    let mut options = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            toml::from_str::<RuntimeOptions>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => RuntimeOptions::default(),
    };
    if let Some(depth) = max_call_depth {
        options.max_call_depth = depth;
    }
    Ok(options)
}

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let options = resolve_options(args.config.as_deref(), args.max_call_depth)?;
    let mut unit = CompilationUnit::load(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    if let Some(main) = args.main {
        unit.entry = Some(main);
    }

    tracing::debug!(unit = %unit.name, classes = unit.classes.len(), "running unit");
    let mut runtime = Runtime::new(options)?;
    let result = runtime.run_unit(unit);
    runtime.flush().context("failed to flush output")?;
    result?;
    Ok(())
}
