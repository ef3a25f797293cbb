//! Process signals: Ctrl-C interrupts a running operation, Ctrl-C or
//! SIGTERM stops the process after the upstream session is released.

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use caichat_chat::SessionManager;

/// Exit status reported after a SIGTERM
const TERMINATED_EXIT_CODE: i32 = 143;

/// Resolves on the next Ctrl-C
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Resolves on the next SIGTERM; never on platforms without it
#[cfg(unix)]
pub async fn terminated() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
pub async fn terminated() {
    std::future::pending::<()>().await;
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_requested() {
    tokio::select! {
        _ = interrupted() => {},
        _ = terminated() => {},
    }
    info!("shutdown requested");
}

/// Runs `operation` unless `interrupt` resolves first. The losing future is
/// dropped, which releases any upstream stream it was reading.
pub async fn interruptible<T>(
    operation: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        result = operation => Some(result),
        _ = interrupt => None,
    }
}

/// Closes the session and exits on SIGTERM.
///
/// The terminal client blocks its task while editing a line, so the handler
/// runs on a task of its own.
pub fn spawn_close_on_terminate(session: Arc<SessionManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        terminated().await;
        info!("terminated, closing upstream session");
        session.close().await;
        std::process::exit(TERMINATED_EXIT_CODE);
    })
}
