//! End-to-end chat scenarios on the simulated broker.
//!
//! # Test Strategy
//!
//! Each test scripts what users do in the room view:
//! 1. Type and submit drafts through the driver
//! 2. Run runtime cycles (App -> Bridge -> Session -> broker)
//! 3. Take the broker down, bring it back, move virtual time
//! 4. Check what the view shows and what the broker persisted

use std::time::Duration;

use agora_app::{Runtime, UserInput};
use agora_harness::{SimBroker, SimWorld};
use agora_proto::RoomId;

fn room() -> RoomId {
    RoomId::new(7, 3).unwrap()
}

#[tokio::test]
async fn live_send_then_fallback_send_each_shown_once() {
    let world = SimWorld::new(SimBroker::starting_at(101));
    let mut alice = world.join("alice", 7, 3).unwrap();
    alice.mount().await.unwrap();
    assert!(alice.runtime.app().is_connected());
    assert!(alice.message_ids().is_empty());

    alice.driver.type_and_submit("hello");
    alice.settle().await.unwrap();

    assert_eq!(alice.message_ids(), vec![101]);
    assert_eq!(alice.api.create_calls(), 0);
    assert_eq!(alice.runtime.app().draft(), "");

    world.broker.set_online(false);
    alice.step().await.unwrap();
    assert!(!alice.runtime.app().is_connected());

    let lists_before = alice.api.list_calls();
    alice.driver.type_and_submit("again");
    alice.settle().await.unwrap();

    assert_eq!(alice.api.create_calls(), 1);
    assert_eq!(alice.api.list_calls() - lists_before, 1);
    assert_eq!(alice.message_ids(), vec![101, 102]);
    assert_eq!(world.broker.message_count(room()), 2);
    assert_eq!(alice.runtime.app().store().get(102).map(|m| m.message.as_str()), Some("again"));
}

#[tokio::test]
async fn other_user_receives_and_marks_read() {
    let world = SimWorld::new(SimBroker::starting_at(101));
    let mut alice = world.join("alice", 7, 3).unwrap();
    let mut bob = world.join("bob", 7, 3).unwrap();
    alice.mount().await.unwrap();
    bob.mount().await.unwrap();

    alice.driver.type_and_submit("hello");
    alice.settle().await.unwrap();

    bob.step().await.unwrap();
    assert_eq!(bob.message_ids(), vec![101]);

    alice.step().await.unwrap();
    let read_count = alice.runtime.app().store().get(101).and_then(|m| m.read_count);
    assert_eq!(read_count, Some(1));
}

#[tokio::test]
async fn typing_indicator_expires_without_stop() {
    let world = SimWorld::new(SimBroker::new());
    let mut alice = world.join("alice", 7, 3).unwrap();
    let mut bob = world.join("bob", 7, 3).unwrap();
    alice.mount().await.unwrap();
    bob.mount().await.unwrap();

    alice.driver.push_input(UserInput::Edit("hel".to_string()));
    alice.step().await.unwrap();

    bob.step().await.unwrap();
    assert_eq!(bob.runtime.app().typing_users(), ["alice".to_string()]);

    // Alice goes quiet without ever stepping again, so no stop is published.
    world.advance(Duration::from_millis(2999));
    bob.step().await.unwrap();
    assert_eq!(bob.runtime.app().typing_users(), ["alice".to_string()]);

    world.advance(Duration::from_millis(1));
    bob.step().await.unwrap();
    assert!(bob.runtime.app().typing_users().is_empty());
}

#[tokio::test]
async fn idle_draft_publishes_typing_stop() {
    let world = SimWorld::new(SimBroker::new());
    let mut alice = world.join("alice", 7, 3).unwrap();
    let mut bob = world.join("bob", 7, 3).unwrap();
    alice.mount().await.unwrap();
    bob.mount().await.unwrap();

    alice.driver.push_input(UserInput::Edit("hel".to_string()));
    alice.step().await.unwrap();
    bob.step().await.unwrap();
    assert_eq!(bob.runtime.app().typing_users().len(), 1);

    world.advance(Duration::from_secs(2));
    alice.step().await.unwrap();
    bob.step().await.unwrap();

    assert!(bob.runtime.app().typing_users().is_empty());
}

#[tokio::test]
async fn disconnected_view_polls_and_reconnect_catches_up() {
    let world = SimWorld::new(SimBroker::starting_at(101));
    let mut alice = world.join("alice", 7, 3).unwrap();
    let mut bob = world.join("bob", 7, 3).unwrap();
    alice.mount().await.unwrap();
    bob.mount().await.unwrap();

    world.broker.set_online(false);
    alice.step().await.unwrap();
    bob.step().await.unwrap();

    // Bob persists over REST while both are offline; alice only sees it by
    // polling.
    bob.driver.type_and_submit("offline hello");
    bob.settle().await.unwrap();
    assert!(alice.message_ids().is_empty());

    world.advance(Duration::from_secs(5));
    alice.step().await.unwrap();
    assert_eq!(alice.message_ids(), vec![101]);

    world.broker.set_online(true);
    world.advance(Duration::from_secs(5));
    // One cycle reopens the socket, the next sees CONNECTED.
    alice.step().await.unwrap();
    alice.step().await.unwrap();
    assert!(alice.runtime.app().is_connected());

    let lists = alice.api.list_calls();
    world.advance(Duration::from_secs(30));
    alice.step().await.unwrap();
    assert_eq!(alice.api.list_calls(), lists);
}

#[tokio::test]
async fn failed_fallback_alerts_and_keeps_draft() {
    let world = SimWorld::new(SimBroker::new());
    let mut alice = world.join("alice", 7, 3).unwrap();
    alice.mount().await.unwrap();

    world.broker.set_online(false);
    alice.api.set_available(false);
    alice.step().await.unwrap();

    alice.driver.type_and_submit("again");
    alice.settle().await.unwrap();

    assert_eq!(alice.driver.alerts().len(), 1);
    assert_eq!(alice.runtime.app().draft(), "again");
    assert!(alice.runtime.app().status().is_some());
    assert_eq!(world.broker.message_count(room()), 0);
}

#[tokio::test]
async fn blank_submit_sends_nothing() {
    let world = SimWorld::new(SimBroker::new());
    let mut alice = world.join("alice", 7, 3).unwrap();
    alice.mount().await.unwrap();

    alice.driver.type_and_submit("   ");
    alice.settle().await.unwrap();

    assert_eq!(world.broker.message_count(room()), 0);
    assert_eq!(alice.api.create_calls(), 0);
}

#[tokio::test]
async fn quit_tears_down_and_stops_driver() {
    let world = SimWorld::new(SimBroker::new());
    let alice = world.join("alice", 7, 3).unwrap();
    let driver = alice.driver.clone();

    driver.push_input(UserInput::Quit);
    alice.runtime.run().await.unwrap();

    assert!(driver.is_stopped());
    assert_eq!(world.broker.subscriptions_for(room()), 0);
    assert_eq!(world.broker.connection_count(), 0);
}

#[tokio::test]
async fn missing_room_is_rejected() {
    let world = SimWorld::new(SimBroker::new());

    assert!(world.join("alice", 7, 0).is_err());
}

#[tokio::test]
async fn driver_failure_still_tears_down() {
    let world = SimWorld::new(SimBroker::new());
    let alice = world.join("alice", 7, 3).unwrap();
    alice.driver.fail_renders();
    let driver = alice.driver.clone();

    let runtime: agora_harness::SimRuntime = alice.runtime;
    assert!(Runtime::run(runtime).await.is_err());

    assert!(driver.is_stopped());
    assert_eq!(world.broker.connection_count(), 0);
}
