//! Session lifecycle: GC after idle, revival on the next event.

use crate::prelude::*;

#[tokio::test]
async fn idle_session_is_collected_and_revived_on_next_event() {
    let engine = engine();
    let bus = engine.runtime.bus();

    bus.publish_nowait(user_msg(&engine, "bob", "hello"));
    wait_until("first answer", || engine.agent.call_count() == 1).await;
    assert!(engine.runtime.router().contains_session("dm:bob"));

    // silent for longer than the 600s idle TTL
    engine.clock.advance_secs(601);
    wait_until("session collected", || {
        !engine.runtime.router().contains_session("dm:bob")
    })
    .await;
    assert!(engine
        .runtime
        .state_snapshot()
        .sessions
        .iter()
        .all(|s| s.session_key != "dm:bob"));

    // the next message is routed into a fresh inbox and answered normally
    bus.publish_nowait(user_msg(&engine, "bob", "anyone home?"));
    wait_until("revived answer", || engine.agent.call_count() == 2).await;
    assert!(engine.runtime.router().contains_session("dm:bob"));
    let snapshot = engine.runtime.state_snapshot();
    let session = snapshot
        .sessions
        .iter()
        .find(|s| s.session_key == "dm:bob")
        .unwrap();
    // fresh state, not the pre-GC counters
    assert!(session.processed_total <= 2);

    engine.runtime.shutdown().await;
}

#[tokio::test]
async fn active_sessions_are_left_alone() {
    let engine = engine();
    let bus = engine.runtime.bus();

    bus.publish_nowait(user_msg(&engine, "bob", "hello"));
    wait_until("answered", || engine.agent.call_count() == 1).await;

    // stays idle but under the TTL
    engine.clock.advance_secs(599);
    settle().await;
    assert!(engine.runtime.router().contains_session("dm:bob"));

    engine.runtime.shutdown().await;
}
