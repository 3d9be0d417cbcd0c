//! `mkfs-gnordofs`: creates and formats a new GnordoFS image.
//!
//! Grounded on `original_source/mkfs.gnordofs.c`'s command-line shape (an
//! image path and an optional size), adapted to `clap` derive parsing per
//! the `other_examples/` reference repos' CLI binaries.

use clap::Parser;
use gnordofs::format::format_new_image;
use log::info;
use std::path::PathBuf;

/// Default image size: 10 MiB, matching the original tool's fixed size.
const DEFAULT_SIZE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path of the image file to create. Overwritten if it already exists.
    image: PathBuf,
    /// Image size in bytes.
    #[arg(long, default_value_t = DEFAULT_SIZE_BYTES)]
    size: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    format_new_image(&cli.image, cli.size)
        .map_err(|e| anyhow::anyhow!("failed to format {}: {e}", cli.image.display()))?;

    info!(
        "formatted {} ({} bytes)",
        cli.image.display(),
        cli.size
    );
    Ok(())
}
