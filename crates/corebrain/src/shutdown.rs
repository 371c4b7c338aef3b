// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stop signals and the bounded close that follows them.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long open stores get to flush after the listener has stopped.
pub const CLOSE_GRACE: Duration = Duration::from_secs(10);

/// Spawn a watcher that cancels the returned token on SIGINT or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        let name = next_signal().await;
        info!(signal = name, "stop requested, draining in-flight requests");
        cancel.cancel();
    });
    token
}

#[cfg(unix)]
async fn next_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = term.recv() => "SIGTERM",
        },
        Err(e) => {
            warn!(error = %e, "SIGTERM cannot be watched, only Ctrl+C stops the server");
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn next_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl+C"
}

/// Await `close`, giving up after `grace`. Returns whether it finished.
pub async fn close_within<F, E>(close: F, grace: Duration) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(grace, close).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "service shutdown reported an error");
            true
        }
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "services did not close in time");
            false
        }
    }
}
