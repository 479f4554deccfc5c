//! Cancellation and signal handling end to end: stuck streams, synthetic
//! signals, transform suppression.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use shoal_core::{CancellationToken, Registry, Session, Signal};
use tokio::sync::mpsc;
use tokio::time::timeout;

use common::{Sink, counting_engine, feed_reader, stuck_reader};

#[tokio::test]
async fn cancelling_the_parent_unblocks_a_stuck_reader() {
    let registry = Arc::new(Registry::new());
    let (_, handle) = counting_engine();
    let parent = CancellationToken::new();
    let (_hold, stuck) = stuck_reader();
    let sink = Sink::default();
    let mut session = Session::new(registry)
        .engine(handle)
        .parent_token(parent.clone())
        .io(stuck, sink.clone());

    let running = tokio::spawn(async move { session.run().await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    parent.cancel();

    timeout(Duration::from_secs(1), running)
        .await
        .expect("cancellation must unblock the session")
        .unwrap()
        .unwrap();
    assert!(sink.string().ends_with('\n'));
}

#[tokio::test]
async fn already_cancelled_parent_returns_promptly() {
    let registry = Arc::new(Registry::new());
    let (count, handle) = counting_engine();
    let parent = CancellationToken::new();
    parent.cancel();
    let (_hold, stuck) = stuck_reader();
    let mut session = Session::new(registry)
        .engine(handle)
        .parent_token(parent)
        .io(stuck, std::io::sink());

    timeout(Duration::from_millis(200), session.run())
        .await
        .expect("run must not touch the stuck stream")
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn synthetic_interrupt_ends_the_run() {
    let registry = Arc::new(Registry::new());
    let (_, handle) = counting_engine();
    let (_hold, stuck) = stuck_reader();
    let (sig_tx, sig_rx) = mpsc::channel(1);
    let mut session = Session::new(registry)
        .engine(handle)
        .signal_source(sig_rx)
        .io(stuck, std::io::sink());

    sig_tx.send(Signal::Interrupt).await.unwrap();
    timeout(Duration::from_secs(1), session.run())
        .await
        .expect("interrupt must end the run")
        .unwrap();
}

#[tokio::test]
async fn remapped_interrupt_is_suppressed() {
    let registry = Arc::new(Registry::new());
    let (count, handle) = counting_engine();
    let (feed_tx, feed) = feed_reader();
    let (sig_tx, sig_rx) = mpsc::channel(1);
    let mut session = Session::new(registry)
        .engine(handle)
        .signal_handler(Signal::Interrupt, |_| Signal::Hangup)
        .signal_source(sig_rx)
        .io(feed, std::io::sink());
    let running = tokio::spawn(async move { session.run().await });

    feed_tx.send(b"first\n".to_vec()).unwrap();
    sig_tx.send(Signal::Interrupt).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The session survived the interrupt and keeps dispatching.
    feed_tx.send(b"second\n".to_vec()).unwrap();
    drop(feed_tx);

    timeout(Duration::from_secs(1), running)
        .await
        .expect("run must end at end-of-input")
        .unwrap()
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn hangup_is_suppressed_by_default() {
    let registry = Arc::new(Registry::new());
    let (count, handle) = counting_engine();
    let (feed_tx, feed) = feed_reader();
    let (sig_tx, sig_rx) = mpsc::channel(1);
    let mut session = Session::new(registry)
        .engine(handle)
        .signal_source(sig_rx)
        .io(feed, std::io::sink());
    let running = tokio::spawn(async move { session.run().await });

    sig_tx.send(Signal::Hangup).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    feed_tx.send(b"still here\n".to_vec()).unwrap();
    drop(feed_tx);

    timeout(Duration::from_secs(1), running)
        .await
        .expect("run must end at end-of-input")
        .unwrap()
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hangup_remapped_to_terminate_ends_the_run() {
    let registry = Arc::new(Registry::new());
    let (_, handle) = counting_engine();
    let (_hold, stuck) = stuck_reader();
    let (sig_tx, sig_rx) = mpsc::channel(1);
    let mut session = Session::new(registry)
        .engine(handle)
        .signal_handler(Signal::Hangup, |_| Signal::Terminate)
        .signal_source(sig_rx)
        .io(stuck, std::io::sink());

    sig_tx.send(Signal::Hangup).await.unwrap();
    timeout(Duration::from_secs(1), session.run())
        .await
        .expect("remapped hangup must end the run")
        .unwrap();
}
