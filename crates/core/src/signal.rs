//! Signal interception and translation.
//!
//! Incoming process signals pass through a per-signal transform table
//! before the shutdown policy check: an effective interrupt- or
//! terminate-class signal cancels the session token, anything else is
//! suppressed. The monitor consumes a plain channel rather than hooking the
//! OS directly, so tests can feed synthetic signals through the exact same
//! pipeline; [`os_signals`] provides the real feed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Asynchronous process signals understood by the monitor.
///
/// The documented relevant subset: `Interrupt` (ctrl-c / SIGINT),
/// `Terminate` (SIGTERM), and `Hangup` (SIGHUP, suppressed unless a
/// transform remaps it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Signal {
    /// Interactive interrupt (ctrl-c).
    Interrupt,
    /// Termination request.
    Terminate,
    /// Controlling terminal closed.
    Hangup,
}

impl Signal {
    /// Whether this signal shuts the session down when it reaches the
    /// policy check.
    pub fn is_shutdown(self) -> bool {
        matches!(self, Signal::Interrupt | Signal::Terminate)
    }
}

/// Transform applied to an intercepted signal before the policy check.
///
/// Returning a shutdown-class signal triggers cancellation; returning
/// anything else suppresses the signal entirely.
pub type SignalHandler = Arc<dyn Fn(Signal) -> Signal + Send + Sync>;

pub(crate) type SignalHandlers = BTreeMap<Signal, SignalHandler>;

/// Monitor loop: translate intercepted signals and cancel on effective
/// shutdown signals. Exits when the session token is done or the intake
/// closes.
pub(crate) async fn monitor(
    token: CancellationToken,
    mut intake: mpsc::Receiver<Signal>,
    handlers: SignalHandlers,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            sig = intake.recv() => {
                let Some(sig) = sig else { break };
                let effective = match handlers.get(&sig) {
                    Some(handler) => handler(sig),
                    None => sig,
                };
                if effective.is_shutdown() {
                    tracing::debug!("signal {sig:?} (effective {effective:?}) cancels the session");
                    token.cancel();
                } else {
                    tracing::debug!("signal {sig:?} suppressed as {effective:?}");
                }
            }
        }
    }
}

/// Spawn the OS signal feed for a session, returning its intake channel.
///
/// The feed subscribes to ctrl-c on every platform, plus SIGTERM and SIGHUP
/// on unix, and stops once `token` is done. Sessions use this by default;
/// tests substitute their own sender via `Session::signal_source`.
pub fn os_signals(token: &CancellationToken) -> mpsc::Receiver<Signal> {
    let (tx, rx) = mpsc::channel(1);
    let token = token.clone();
    tokio::spawn(feed(token, tx));
    rx
}

#[cfg(unix)]
async fn feed(token: CancellationToken, tx: mpsc::Sender<Signal>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("failed to install SIGTERM handler: {e}");
            return;
        }
    };
    let mut hup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("failed to install SIGHUP handler: {e}");
            return;
        }
    };

    loop {
        let sig = tokio::select! {
            _ = token.cancelled() => break,
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => Signal::Interrupt,
                Err(e) => {
                    tracing::warn!("ctrl-c listener failed: {e}");
                    break;
                }
            },
            _ = term.recv() => Signal::Terminate,
            _ = hup.recv() => Signal::Hangup,
        };
        if tx.send(sig).await.is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn feed(token: CancellationToken, tx: mpsc::Sender<Signal>) {
    loop {
        let sig = tokio::select! {
            _ = token.cancelled() => break,
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => Signal::Interrupt,
                Err(e) => {
                    tracing::warn!("ctrl-c listener failed: {e}");
                    break;
                }
            },
        };
        if tx.send(sig).await.is_err() {
            break;
        }
    }
}
