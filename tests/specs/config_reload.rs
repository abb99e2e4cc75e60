//! Hot reload of `gate.yaml` while the engine runs.

use crate::prelude::*;
use axon_gate::GateConfigProvider;
use std::io::Write;
use std::sync::Arc;

fn write_config(path: &std::path::Path, content: &str) {
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.sync_all().unwrap();
}

#[tokio::test]
async fn running_engine_picks_up_config_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gate.yaml");
    write_config(&path, "{}\n");
    let provider = Arc::new(GateConfigProvider::from_file(&path).unwrap());
    let engine = engine_with_provider(provider);
    let bus = engine.runtime.bus();

    bus.publish_nowait(user_msg(&engine, "alice", "hi"));
    wait_until("first answer", || engine.agent.call_count() == 1).await;

    // flip an override on disk; the worker reloads before the next gate run
    write_config(&path, "overrides:\n  drop_actors: [\"alice\"]\n");
    engine.clock.advance_secs(1);
    bus.publish_nowait(user_msg(&engine, "alice", "hi again"));
    wait_until("dropped by new policy", || {
        engine.runtime.inspect_gate(|gate| gate.pools().drop.len() == 1)
    })
    .await;
    settle().await;
    assert_eq!(engine.agent.call_count(), 1);

    engine.runtime.shutdown().await;
}

#[tokio::test]
async fn invalid_config_replacement_keeps_the_old_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gate.yaml");
    write_config(&path, "{}\n");
    let provider = Arc::new(GateConfigProvider::from_file(&path).unwrap());
    let engine = engine_with_provider(provider);
    let bus = engine.runtime.bus();

    write_config(&path, "scene_policies: [broken");
    bus.publish_nowait(user_msg(&engine, "alice", "hi"));
    wait_until("still answered", || engine.agent.call_count() == 1).await;

    engine.runtime.shutdown().await;
}
