//! Property-based tests for chat sessions on the simulated broker.
//!
//! # Properties
//!
//! - Every submitted message is persisted exactly once, whichever path it
//!   took, and a fallback send triggers exactly one re-fetch.
//! - Once back online, the view converges to the server's message list with
//!   each id shown once.
//! - A typing entry disappears exactly when its last start is three seconds
//!   old, however often it was restarted.
//! - Teardown leaves no subscriptions, timers or connections, however often
//!   it runs.
//! - A session for one room never surfaces another room's messages.

use std::time::Duration;

use agora_app::LiveChannel;
use agora_client::{Credential, MessagePage, Notice, SessionOptions};
use agora_harness::{SimBroker, SimEnv, SimLive, SimWorld};
use agora_proto::{Feed, RoomId};
use proptest::prelude::*;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

fn live(broker: &SimBroker, env: &SimEnv, user: &str, group: u64, room: u64) -> SimLive {
    SimLive::start(broker, env.clone(), SessionOptions::for_room(group, room), &Credential::new(user))
}

fn typing_users(notices: &[Notice]) -> Option<Vec<String>> {
    notices.iter().rev().find_map(|notice| match notice {
        Notice::TypingUsers(users) => Some(users.clone()),
        _ => None,
    })
}

#[derive(Debug, Clone)]
enum Op {
    Send(String),
    Offline,
    Online,
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => "[a-z]{1,8}".prop_map(Op::Send),
        1 => Just(Op::Offline),
        1 => Just(Op::Online),
        2 => (0u64..8000).prop_map(Op::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sends_persist_once_and_view_converges(
        ops in prop::collection::vec(op_strategy(), 1..30),
        echo in any::<bool>(),
    ) {
        let broker = if echo { SimBroker::starting_at(1).with_fallback_echo() } else { SimBroker::new() };
        let world = SimWorld::new(broker);
        let room = RoomId::new(7, 3).unwrap();

        block_on(async {
            let mut alice = world.join("alice", 7, 3).unwrap();
            alice.mount().await.unwrap();

            for op in ops {
                match op {
                    Op::Send(text) => {
                        // Let a pending drop or reconnect settle first.
                        alice.step().await.unwrap();
                        alice.step().await.unwrap();
                        let persisted = world.broker.message_count(room);
                        let creates = alice.api.create_calls();
                        let lists = alice.api.list_calls();

                        alice.driver.type_and_submit(&text);
                        alice.settle().await.unwrap();

                        let fallbacks = alice.api.create_calls() - creates;
                        prop_assert_eq!(world.broker.message_count(room), persisted + 1);
                        prop_assert!(fallbacks <= 1);
                        prop_assert_eq!(alice.api.list_calls() - lists, fallbacks);
                    },
                    Op::Offline => world.broker.set_online(false),
                    Op::Online => world.broker.set_online(true),
                    Op::Advance(ms) => {
                        world.advance(Duration::from_millis(ms));
                        alice.step().await.unwrap();
                    },
                }
            }

            world.broker.set_online(true);
            alice.step().await.unwrap();
            world.advance(Duration::from_secs(10));
            for _ in 0..3 {
                alice.step().await.unwrap();
            }

            let mut expected: Vec<u64> =
                world.broker.list_messages(room, MessagePage::RECENT).iter().map(|m| m.id).collect();
            expected.reverse();
            prop_assert!(alice.runtime.app().is_connected());
            prop_assert_eq!(alice.message_ids(), expected);
            Ok(())
        })?;
    }

    #[test]
    fn prop_typing_expires_three_seconds_after_last_start(
        restarts in prop::collection::vec(1u64..2999, 0..4),
    ) {
        let broker = SimBroker::new();
        let env = SimEnv::new();
        let mut alice = live(&broker, &env, "alice", 7, 3);
        let mut bob = live(&broker, &env, "bob", 7, 3);
        alice.pump();
        bob.drain_notices();

        alice.start_typing();
        let seen = bob.drain_notices();
        prop_assert_eq!(typing_users(&seen), Some(vec!["alice".to_string()]));

        for gap in restarts {
            env.clock().advance(Duration::from_millis(gap));
            alice.start_typing();
            let seen = bob.drain_notices();
            prop_assert_eq!(typing_users(&seen), None);
        }

        env.clock().advance(Duration::from_millis(2999));
        let seen = bob.drain_notices();
        prop_assert_eq!(typing_users(&seen), None);
        prop_assert_eq!(bob.typing_users(), vec!["alice".to_string()]);

        env.clock().advance(Duration::from_millis(1));
        let seen = bob.drain_notices();
        prop_assert_eq!(typing_users(&seen), Some(vec![]));

        env.clock().advance(Duration::from_secs(10));
        let seen = bob.drain_notices();
        prop_assert_eq!(typing_users(&seen), None);
    }

    #[test]
    fn prop_teardown_leaves_nothing_behind(
        typing in any::<bool>(),
        connected in any::<bool>(),
        repeats in 1usize..4,
    ) {
        let broker = SimBroker::new();
        let env = SimEnv::new();
        let room = RoomId::new(7, 3).unwrap();
        let mut alice = live(&broker, &env, "alice", 7, 3);
        let mut bob = live(&broker, &env, "bob", 7, 3);
        bob.pump();
        if connected {
            alice.pump();
        }
        if typing {
            bob.start_typing();
            alice.pump();
        }

        block_on(async {
            for _ in 0..repeats {
                alice.teardown().await;
            }
        });
        block_on(bob.teardown());

        let session = alice.session().unwrap();
        prop_assert_eq!(session.active_subscriptions(), 0);
        prop_assert_eq!(session.pending_timers(), 0);
        prop_assert!(session.is_torn_down());
        prop_assert_eq!(broker.subscriptions_for(room), 0);
        prop_assert_eq!(broker.connection_count(), 0);
    }

    #[test]
    fn prop_other_room_messages_never_delivered(
        switch_to in 4u64..8,
        texts in prop::collection::vec("[a-z]{1,6}", 1..6),
    ) {
        let broker = SimBroker::new();
        let env = SimEnv::new();
        let room_a = RoomId::new(7, 3).unwrap();

        let mut bob = live(&broker, &env, "bob", 7, 3);
        bob.drain_notices();
        block_on(bob.teardown());

        let mut bob = live(&broker, &env, "bob", 7, switch_to);
        let mut alice = live(&broker, &env, "alice", 7, 3);
        bob.drain_notices();
        alice.pump();

        for text in &texts {
            prop_assert!(block_on(alice.try_send(text)));
            broker.inject(room_a, Feed::Messages, r#"{"id":999,"message":"x","username":"eve","createdTime":"2024-05-01T12:00:00"}"#);
        }

        let seen = bob.drain_notices();
        prop_assert!(!seen.iter().any(|n| matches!(n, Notice::Message(_))));
        prop_assert_eq!(broker.message_count(room_a), texts.len());
    }
}
