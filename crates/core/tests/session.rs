//! Run-loop behavior: dispatch counts, prefix and newline framing, stream
//! isolation between sessions.

mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use shoal_core::{EngineHandle, Error, Registry, Session, engine_fn};
use tokio::time::timeout;

use common::{Sink, bracket_engine, counting_engine};

async fn wait_empty(registry: &Registry) {
    timeout(Duration::from_secs(1), async {
        while !registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry must drain after sessions end");
}

#[tokio::test]
async fn run_without_engine_fails_fast() {
    let registry = Arc::new(Registry::new());
    let mut session = Session::new(registry).io(Cursor::new(Vec::new()), std::io::sink());
    assert!(matches!(session.run().await, Err(Error::NoEngine)));
}

#[tokio::test]
async fn non_zero_status_stops_the_loop() {
    let registry = Arc::new(Registry::new());
    let (count, handle) = counting_engine();
    let mut session = Session::new(Arc::clone(&registry))
        .engine(handle)
        .io(Cursor::new(b"list\nhelp\nquit\nnever\n".to_vec()), std::io::sink());

    session.run().await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);
    wait_empty(&registry).await;
}

#[tokio::test]
async fn end_of_input_dispatches_nothing() {
    let registry = Arc::new(Registry::new());
    let (count, handle) = counting_engine();
    let sink = Sink::default();
    let mut session = Session::new(registry)
        .engine(handle)
        .prefix("> ")
        .io(Cursor::new(Vec::new()), sink.clone());

    session.run().await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(sink.string(), "> \n");
}

#[tokio::test]
async fn unterminated_final_line_is_dispatched() {
    let registry = Arc::new(Registry::new());
    let (count, handle) = counting_engine();
    let mut session = Session::new(registry)
        .engine(handle)
        .io(Cursor::new(b"one\ntwo".to_vec()), std::io::sink());

    session.run().await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn prefix_precedes_every_read_and_run_ends_with_newline() {
    let registry = Arc::new(Registry::new());
    let handle = EngineHandle::new(engine_fn(|_, _, _| async { 0 }));
    let sink = Sink::default();
    let mut session = Session::new(registry)
        .engine(handle)
        .prefix("> ")
        .io(Cursor::new(b"a\nb\n".to_vec()), sink.clone());

    session.run().await.unwrap();
    // Two prompted lines, one prompt that hit end-of-input, the closing
    // newline.
    assert_eq!(sink.string(), "> > > \n");
}

#[tokio::test]
async fn setting_the_same_prefix_twice_changes_nothing() {
    let registry = Arc::new(Registry::new());
    let handle = EngineHandle::new(engine_fn(|_, _, _| async { 0 }));
    let sink = Sink::default();
    let mut session = Session::new(registry)
        .engine(handle)
        .io(Cursor::new(b"x\n".to_vec()), sink.clone());
    session.set_prefix("> ");
    session.set_prefix("> ");

    session.run().await.unwrap();
    assert_eq!(sink.string(), "> > \n");
}

#[tokio::test]
async fn sessions_sharing_an_engine_do_not_cross_talk() {
    let registry = Arc::new(Registry::new());
    let handle = bracket_engine();

    let sink_a = Sink::default();
    let sink_b = Sink::default();
    let mut a = Session::new(Arc::clone(&registry))
        .engine(handle.clone())
        .io(Cursor::new(b"alpha\n".to_vec()), sink_a.clone());
    let mut b = Session::new(Arc::clone(&registry))
        .engine(handle)
        .io(Cursor::new(b"beta\n".to_vec()), sink_b.clone());

    let (ra, rb) = tokio::join!(a.run(), b.run());
    ra.unwrap();
    rb.unwrap();

    let out_a = sink_a.string();
    let out_b = sink_b.string();
    assert!(out_a.contains("[alpha]") && !out_a.contains("[beta]"), "got {out_a:?}");
    assert!(out_b.contains("[beta]") && !out_b.contains("[alpha]"), "got {out_b:?}");
    wait_empty(&registry).await;
}
