// Bounded wait module
// Runs a piece of work off the caller's path and gives up after a deadline

use crate::error::{QrFrameError, Result};
use log::warn;
use std::thread;
use std::time::Duration;

/// Run `work` on a worker thread and wait at most `timeout` for its result.
///
/// The worker is detached: when the deadline passes the caller gets
/// `QrFrameError::Timeout` and whatever the worker produces later is
/// dropped on the floor.
pub fn run_with_timeout<T, F>(what: &'static str, timeout: Duration, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = flume::bounded::<Result<T>>(1);

    thread::Builder::new()
        .name(format!("qrframe-{what}"))
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(work());
        })
        .map_err(|e| QrFrameError::Resource(format!("failed to spawn {what} worker: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(flume::RecvTimeoutError::Timeout) => {
            warn!("{} timed out after {:?}", what, timeout);
            Err(QrFrameError::Timeout { what, after: timeout })
        }
        Err(flume::RecvTimeoutError::Disconnected) => Err(QrFrameError::Resource(format!(
            "{what} worker stopped without a result"
        ))),
    }
}
