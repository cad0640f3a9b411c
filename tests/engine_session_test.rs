//! Integration tests: EngineSession against a scripted UCI engine over an
//! in-memory pipe.

mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use common::*;
use game_review::{EvalSource, SessionError, SessionState};

#[tokio::test]
async fn test_handshake_reports_ready_and_name() {
    let (session, log) = start_fake(FakeScript::new(), quick_options());
    session.wait_ready().await.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.engine_name().as_deref(), Some("FakeFish 1.0"));

    let sent = commands(&log);
    assert_eq!(sent[0], "uci");
    assert_eq!(sent[1], "setoption name Threads value 1");
    assert_eq!(sent[2], "isready");
}

#[tokio::test]
async fn test_request_before_ready_is_queued_not_dropped() {
    let script = FakeScript {
        handshake_delay: Duration::from_millis(150),
        ..FakeScript::new()
    };
    let (session, log) = start_fake(script, quick_options());
    assert_ne!(session.state(), SessionState::Ready);

    let result = session.evaluate(START_FEN, 6).await.unwrap();
    assert_eq!(result.depth, 6);

    let ready_at = position_of(&log, "isready").unwrap();
    let position_at = position_of(&log, "position fen").unwrap();
    assert!(position_at > ready_at, "search sent before the engine was ready");
}

#[tokio::test]
async fn test_awaited_result_is_final_depth() {
    let (session, _log) = start_fake(FakeScript::new(), quick_options());

    let result = session.evaluate(START_FEN, 8).await.unwrap();
    assert_eq!(result.depth, 8);
    assert!((result.score - 0.35).abs() < 1e-9);
    assert!(!result.is_mate);
    assert_eq!(result.pv, vec!["e2e4", "e7e5"]);
    assert_eq!(result.best_move.as_deref(), Some("e2e4"));
    assert_eq!(result.source, EvalSource::Engine);

    // Black to move: score stays side-to-move relative
    let result = session.evaluate(AFTER_E4_FEN, 5).await.unwrap();
    assert!((result.score + 0.30).abs() < 1e-9);
    assert_eq!(result.best_move.as_deref(), Some("e7e5"));
}

#[tokio::test]
async fn test_no_move_available() {
    let (session, _log) = start_fake(FakeScript::new(), quick_options());
    // Unscripted position: cp 0 with an empty pv and `bestmove (none)`
    let result = session
        .evaluate("7k/8/8/8/8/8/8/K7 w - - 0 1", 4)
        .await
        .unwrap();
    assert_eq!(result.score, 0.0);
    assert!(result.best_move.is_none());
}

#[tokio::test]
async fn test_timeout_returns_partial_result() {
    let (session, log) = start_fake(FakeScript::new(), quick_options());

    let result = timeout(Duration::from_secs(5), session.evaluate(STALL_FEN, 20))
        .await
        .expect("evaluation must not hang")
        .unwrap();
    assert_eq!(result.source, EvalSource::TimedOut);
    assert_eq!(result.depth, 3);
    assert!((result.score - 0.30).abs() < 1e-9);
    assert_eq!(result.best_move.as_deref(), Some("h1h8"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(commands(&log).contains(&"stop".to_string()));
}

#[tokio::test]
async fn test_stale_bestmove_does_not_resolve_newer_request() {
    let script = FakeScript {
        stop_delay: Duration::from_millis(100),
        ..FakeScript::new()
    };
    let (session, _log) = start_fake(script, quick_options());

    let stalled = session.evaluate(STALL_FEN, 20).await.unwrap();
    assert_eq!(stalled.source, EvalSource::TimedOut);

    // The stalled search's `bestmove h1h8` arrives only after this request
    // has been sent; it must be discarded.
    let result = session.evaluate(START_FEN, 7).await.unwrap();
    assert_eq!(result.source, EvalSource::Engine);
    assert_eq!(result.depth, 7);
    assert_eq!(result.best_move.as_deref(), Some("e2e4"));
}

#[tokio::test]
async fn test_session_recovers_when_stop_is_never_answered() {
    let script = FakeScript {
        ignore_stop: true,
        ..FakeScript::new()
    };
    let (session, log) = start_fake(script, quick_options());

    let stalled = session.evaluate(STALL_FEN, 20).await.unwrap();
    assert_eq!(stalled.source, EvalSource::TimedOut);

    for _ in 0..3 {
        let result = session.evaluate(START_FEN, 5).await.unwrap();
        assert_eq!(result.source, EvalSource::Engine);
        assert_eq!(result.depth, 5);
        assert!((result.score - 0.35).abs() < 1e-9);
        assert_eq!(result.best_move.as_deref(), Some("e2e4"));
    }

    // The first healthy search waited for the stale one before `go`
    let sent = commands(&log);
    let stop_at = sent.iter().position(|c| c == "stop").unwrap();
    let go_after = sent[stop_at..].iter().filter(|c| c.starts_with("go depth")).count();
    assert_eq!(go_after, 3);
}

#[tokio::test]
async fn test_new_request_supersedes_awaited_one() {
    let (session, log) = start_fake(FakeScript::new(), quick_options());
    session.wait_ready().await.unwrap();

    let (first, second) = tokio::join!(session.evaluate(STALL_FEN, 20), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.evaluate(START_FEN, 4).await
    });

    assert!(matches!(first, Err(SessionError::Superseded)));
    let second = second.unwrap();
    assert_eq!(second.source, EvalSource::Engine);
    assert_eq!(second.best_move.as_deref(), Some("e2e4"));

    let sent = commands(&log);
    let stop_at = sent.iter().position(|c| c == "stop").unwrap();
    let last_go = sent.iter().rposition(|c| c.starts_with("go depth")).unwrap();
    assert!(stop_at < last_go);
}

#[tokio::test]
async fn test_streaming_updates_in_depth_order() {
    let (session, _log) = start_fake(FakeScript::new(), quick_options());
    let (tx, mut rx) = mpsc::unbounded_channel();
    session
        .set_observer(move |update| {
            let _ = tx.send(update);
        })
        .unwrap();
    session.evaluate_streaming(START_FEN, 5).unwrap();

    let mut depths = Vec::new();
    let last = loop {
        let update = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("streaming updates stopped early")
            .unwrap();
        depths.push(update.depth);
        if update.depth == 5 {
            break update;
        }
    };

    assert_eq!(depths, vec![1, 2, 3, 4, 5]);
    assert_eq!(last.best_move.as_deref(), Some("e2e4"));
    assert!((last.score - 0.35).abs() < 1e-9);

    // Nothing shallower after the final depth
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    // Without an observer a streaming search reports to no one
    session.clear_observer().unwrap();
    session.evaluate_streaming(AFTER_E4_FEN, 4).unwrap();
    session.evaluate(START_FEN, 2).await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (session, log) = start_fake(FakeScript::new(), quick_options());
    session.wait_ready().await.unwrap();

    // Idle: nothing to interrupt
    session.stop().unwrap();
    session.stop().unwrap();
    let result = session.evaluate(START_FEN, 3).await.unwrap();
    assert_eq!(result.depth, 3);
    assert!(!commands(&log).contains(&"stop".to_string()));

    // Streaming a stalled search: one stop however often it is requested
    session.evaluate_streaming(STALL_FEN, 20).unwrap();
    session.stop().unwrap();
    session.stop().unwrap();
    session.stop().unwrap();

    let after = session.evaluate(START_FEN, 2).await.unwrap();
    assert_eq!(after.depth, 2);
    let stops = commands(&log).iter().filter(|c| *c == "stop").count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn test_stop_cancels_awaited_request() {
    let (session, _log) = start_fake(FakeScript::new(), quick_options());
    session.wait_ready().await.unwrap();

    let (result, _) = tokio::join!(session.evaluate(STALL_FEN, 20), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.stop().unwrap();
    });
    assert!(matches!(result, Err(SessionError::Cancelled)));
}

#[tokio::test]
async fn test_set_option_reaches_engine() {
    let (session, log) = start_fake(FakeScript::new(), quick_options());
    session.set_option("Skill Level", "3").unwrap();
    session.evaluate(START_FEN, 2).await.unwrap();

    let option_at = position_of(&log, "setoption name Skill Level value 3").unwrap();
    let go_at = position_of(&log, "go depth").unwrap();
    assert!(option_at < go_at);
}

#[tokio::test]
async fn test_engine_exit_during_handshake_is_reported() {
    let (client, engine) = tokio::io::duplex(1024);
    drop(engine);
    let (reader, writer) = tokio::io::split(client);
    let session = game_review::EngineSession::from_io(reader, writer, quick_options());

    let err = session.wait_ready().await.unwrap_err();
    assert!(matches!(err, SessionError::Handshake(_)));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_spawn_failure_is_surfaced() {
    let result = game_review::EngineSession::spawn("/definitely/not/an/engine", quick_options());
    assert!(matches!(result, Err(SessionError::Spawn { .. })));
}

#[tokio::test]
async fn test_quit_ends_session() {
    let (session, log) = start_fake(FakeScript::new(), quick_options());
    session.wait_ready().await.unwrap();
    timeout(Duration::from_secs(2), session.quit())
        .await
        .expect("quit must finish");
    // The fake engine logs quit before exiting
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(commands(&log).last().map(String::as_str), Some("quit"));
}
