use anyhow::Result;

/// Every command runs on one thread. Remote calls are awaited in place, so state transitions never
/// race each other.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
