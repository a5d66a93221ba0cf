use anyhow::Result;
use relier::cli;
use std::time::Duration;

// Main function
fn main() -> Result<()> {
    let action = cli::start()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(action.execute());

    // The stdin reader blocks on a read that cannot be cancelled.
    runtime.shutdown_timeout(Duration::from_millis(100));

    result
}
