//! mint command - Print the identifier minted from a seed

use super::resolve_prefix;
use crate::cli::Context;
use crate::core::minter;
use anyhow::Result;

/// Mint and print the identifier for `seed`.
pub fn mint(ctx: &Context, prefix: Option<&str>, seed: &str) -> Result<()> {
    let prefix = resolve_prefix(ctx, prefix);
    let id = minter::mint(prefix, seed)?;
    println!("{}", id);
    Ok(())
}
