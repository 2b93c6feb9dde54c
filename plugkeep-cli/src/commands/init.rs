//! `plugkeep init`

use anyhow::{Context, Result};

use plugkeep_core::{config, Paths};

pub fn run(paths: &Paths) -> Result<()> {
    let (path, created) = config::ensure_default_at(&paths.config_dir)
        .with_context(|| format!("failed to initialize {}", paths.config_dir.display()))?;

    if created {
        println!("✓ Wrote default config");
    } else {
        println!("Config already exists");
    }
    println!("  Config:  {}", path.display());
    println!("  Plugins: {}", paths.plugins_dir.display());
    Ok(())
}
