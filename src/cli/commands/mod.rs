//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each handler validates its arguments, calls into the core, and prints
//! the result to stdout. Errors are returned to `main` for display.

mod config_cmd;
mod mint;
mod relations;
mod verify;

pub use config_cmd::config;
pub use mint::mint;
pub use relations::relations;
pub use verify::verify;

use super::args::Command;
use super::Context;
use anyhow::Result;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Mint { prefix, seed } => mint(ctx, prefix.as_deref(), &seed),
        Command::Verify { prefix, seed, id } => verify(ctx, prefix.as_deref(), &seed, &id),
        Command::Relations { json } => relations(json),
        Command::Config => config(ctx),
    }
}

/// The explicit prefix, else the configured default, else empty.
///
/// An empty prefix is passed through so minting reports the error.
fn resolve_prefix<'a>(ctx: &'a Context, prefix: Option<&'a str>) -> &'a str {
    prefix.or(ctx.config.default_prefix()).unwrap_or_default()
}
