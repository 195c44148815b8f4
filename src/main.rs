use anyhow::Result;
use deckclock::{cli::run_cli, utils::runtime::single_thread_runtime};
use tracing::error;

fn main() -> Result<()> {
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(async {
        run_cli().await.inspect_err(|e| {
            error!("Error running cli {e:?}");
        })
    });
    // Stdin is read on a blocking thread that would otherwise keep the process alive.
    runtime.shutdown_background();
    result
}
