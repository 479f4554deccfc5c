//! Per-engine runner: demultiplexes session queues into engine calls.
//!
//! One runner task exists per live engine identity. It accepts session
//! queues for the lifetime of its root token and gives each queue its own
//! forwarding task, so calls are serialized within a session but concurrent
//! across sessions sharing the engine.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{ExecRequest, RequestRx};
use crate::engine::{Engine, EngineId};
use crate::registry::Registry;

/// Sender half of a runner's attach channel; held in the registry map.
pub(crate) type AttachTx = mpsc::Sender<RequestRx>;
pub(crate) type AttachRx = mpsc::Receiver<RequestRx>;

/// Capacity of the attach channel: the closest tokio analog of an
/// unbuffered hand-off.
pub(crate) const ATTACH_CAPACITY: usize = 1;

/// Runner main loop.
///
/// Accepts new session queues until the root token is cancelled, then
/// removes its registry entry and returns. In-flight forwarding tasks are
/// not killed; they discard their results on completion instead (an engine
/// call cannot be preempted mid-flight).
pub(crate) async fn run_engine(
    token: CancellationToken,
    id: EngineId,
    engine: Arc<dyn Engine>,
    registry: Arc<Registry>,
    mut attach_rx: AttachRx,
) {
    tracing::debug!("runner for {id:?} started");
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            queue = attach_rx.recv() => {
                let Some(queue) = queue else { break };
                tracing::debug!("runner for {id:?} accepted a session");
                tokio::spawn(forward(token.clone(), Arc::clone(&engine), queue));
            }
        }
    }
    registry.remove(id);
    tracing::debug!("runner for {id:?} stopped");
}

/// Forwarding loop for one session queue.
///
/// Consumes requests sequentially, which is what guarantees per-session
/// submission order. Ends when the session drops its queue sender, or when
/// the runner's root token is observed cancelled after an engine call; in
/// the latter case the response slot is dropped unwritten and the caller
/// reads that as status 0.
async fn forward(token: CancellationToken, engine: Arc<dyn Engine>, mut queue: RequestRx) {
    while let Some(req) = queue.recv().await {
        let ExecRequest {
            token: req_token,
            line,
            io,
            resp,
        } = req;
        let status = engine.exec(req_token, &line, io).await;
        if token.is_cancelled() {
            drop(resp);
            return;
        }
        let _ = resp.send(status);
    }
}
