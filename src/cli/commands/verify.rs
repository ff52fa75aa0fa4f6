//! verify command - Check an identifier against its seed

use super::resolve_prefix;
use crate::cli::Context;
use crate::core::minter::verify_identifier;
use crate::core::types::Identifier;
use anyhow::{Context as _, Result};

/// Exit successfully only if `id` is the identifier minted from `seed`.
pub fn verify(ctx: &Context, prefix: Option<&str>, seed: &str, id: &str) -> Result<()> {
    let prefix = resolve_prefix(ctx, prefix);
    let id = Identifier::new(id).context("Invalid identifier")?;
    verify_identifier(prefix, seed, &id)?;
    println!("{} matches seed '{}'", id, seed);
    Ok(())
}
