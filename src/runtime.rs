use std::future::Future;
use std::time::Duration;

use tokio::runtime::Builder;

/// How long shutdown waits for blocking tasks before the process exits anyway.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Runs `future` on a fresh multi-thread runtime, then shuts the runtime down
/// waiting at most `grace` for outstanding blocking tasks.
///
/// A solve abandoned by its timeout keeps its blocking thread busy until the
/// solver returns; that thread is left behind once `grace` elapses.
pub fn block_on_with_grace<F: Future>(future: F, grace: Duration) -> std::io::Result<F::Output> {
    let rt = Builder::new_multi_thread().enable_all().build()?;
    let output = rt.block_on(future);
    rt.shutdown_timeout(grace);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_abandoned_blocking_task_does_not_hold_exit() {
        let started = Instant::now();
        let timed_out = block_on_with_grace(
            async {
                let slow = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(5)));
                tokio::time::timeout(Duration::from_millis(50), slow).await.is_err()
            },
            Duration::from_millis(100),
        )
        .unwrap();

        assert!(timed_out);
        assert!(started.elapsed() < Duration::from_secs(2), "shutdown took {:?}", started.elapsed());
    }

    #[test]
    fn test_output_is_returned() {
        let value = block_on_with_grace(async { 6 * 7 }, SHUTDOWN_GRACE).unwrap();
        assert_eq!(value, 42);
    }
}
