//! Waiting for services started by targets.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{Error, Result, Session};

/// Poll a TCP address until it accepts connections.
///
/// Tries to connect every `wait` until `max_wait` has elapsed. A single
/// connection attempt that hangs is cut off at the same deadline.
///
/// # Errors
///
/// Returns [`Error::Timeout`] when `max_wait` elapses and
/// [`Error::Cancelled`] when the session is cancelled.
pub async fn await_reachable(
    session: &Session,
    addr: &str,
    wait: Duration,
    max_wait: Duration,
) -> Result<()> {
    let deadline = Instant::now() + max_wait;
    loop {
        let attempt = tokio::select! {
            biased;
            () = session.cancellation_token().cancelled() => return Err(Error::Cancelled),
            attempt = tokio::time::timeout_at(deadline, TcpStream::connect(addr)) => attempt,
        };
        let Ok(connected) = attempt else {
            return Err(Error::timeout(addr, max_wait.as_secs()));
        };
        match connected {
            Ok(_) => {
                debug!(addr = %addr, "Address reachable");
                return Ok(());
            }
            Err(e) => {
                if Instant::now() + wait > deadline {
                    return Err(Error::timeout(addr, max_wait.as_secs()));
                }
                info!(task = %session.task_name(), addr = %addr, error = %e, "Waiting for address to become reachable");
            }
        }
        tokio::select! {
            biased;
            () = session.cancellation_token().cancelled() => return Err(Error::Cancelled),
            () = tokio::time::sleep(wait) => {}
        }
    }
}
