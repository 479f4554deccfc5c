//! Dispatch protocol between sessions and engine runners.
//!
//! A session submits one [`ExecRequest`] per line and blocks for exactly one
//! status in return. The response slot is a oneshot: written at most once,
//! closed on drop, never reused. A slot closed without a value reads as
//! status 0, exactly like submitting against an already-cancelled token.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::io::SessionIo;

/// Capacity of a session's request queue. Kept at one so the hand-off stays
/// rendezvous-like: a sender parks until the forwarding task drains the
/// previous request.
pub(crate) const QUEUE_CAPACITY: usize = 1;

/// One line submission from a session to its engine runner.
pub(crate) struct ExecRequest {
    /// The submitting session's cancellation token, passed through to the
    /// engine call.
    pub(crate) token: CancellationToken,
    /// The line to execute.
    pub(crate) line: String,
    /// Stream handle the engine uses for mid-command I/O.
    pub(crate) io: SessionIo,
    /// Single-use response slot. Ownership transfers to the forwarding task,
    /// which either sends the status or drops the slot on cancellation.
    pub(crate) resp: oneshot::Sender<i32>,
}

pub(crate) type RequestTx = mpsc::Sender<ExecRequest>;
pub(crate) type RequestRx = mpsc::Receiver<ExecRequest>;

/// Submit one line and await its status.
///
/// Returns 0 without sending when `token` is already done, when the runner
/// side of `queue` is gone, or when the response slot is closed without a
/// value (the runner was cancelled after accepting the request).
pub(crate) async fn exec(
    token: &CancellationToken,
    queue: &RequestTx,
    line: String,
    io: SessionIo,
) -> i32 {
    let (resp_tx, resp_rx) = oneshot::channel();
    let req = ExecRequest {
        token: token.clone(),
        line,
        io,
        resp: resp_tx,
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => return 0,
        sent = queue.send(req) => {
            if sent.is_err() {
                return 0;
            }
        }
    }
    resp_rx.await.unwrap_or(0)
}
