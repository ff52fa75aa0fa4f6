//! config command - Show the effective configuration

use crate::cli::Context;
use anyhow::{Context as _, Result};

/// Print the effective configuration as TOML, defaults applied.
pub fn config(ctx: &Context) -> Result<()> {
    match ctx.config.path() {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# no config file found, showing defaults"),
    }
    let rendered = ctx
        .config
        .to_toml()
        .context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
