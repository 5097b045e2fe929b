use std::path::PathBuf;

use anyhow::{bail, Context};

fn main() -> anyhow::Result<()> {
    themesync::logging::init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: themesync <export.json>");
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let export = themesync::inspect(&json)
        .with_context(|| format!("{} is not a valid export", path.display()))?;

    tracing::info!(path = %path.display(), "inspected export");
    println!("{export}");
    Ok(())
}
