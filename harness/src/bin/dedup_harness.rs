use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ttl_dedup_harness::{logging, run, HarnessConfig};

fn main() -> anyhow::Result<()> {
    let config = HarnessConfig::parse();
    logging::init(&config.log_level)?;

    // Ctrl-C stops starting new callers; running ones are still waited for.
    let cancelled = Arc::new(AtomicBool::new(false));
    let ctrlc_handle = cancelled.clone();
    ctrlc::set_handler(move || ctrlc_handle.store(true, Ordering::Release))
        .context("failed to set the Ctrl-C handler")?;

    let summary = run(&config, &cancelled)?;
    println!("{summary}");

    Ok(())
}
