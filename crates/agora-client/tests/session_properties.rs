//! Property-based tests for the session manager.
//!
//! Covers teardown idempotence and room isolation under arbitrary
//! interleavings of feed traffic, socket drops and typing events.

use std::time::{Duration, Instant};

use agora_client::{
    Activation, Credential, Notice, Session, SessionAction, SessionEvent, SessionOptions,
};
use agora_proto::{Command, Feed, Frame, RoomId};
use proptest::prelude::*;

fn start(group: u64, room: u64, t0: Instant) -> Session<Instant> {
    let Activation::Started { mut session, .. } =
        Session::activate(SessionOptions::for_room(group, room), &Credential::new("tok"), t0)
    else {
        panic!("session should start");
    };

    session.handle(SessionEvent::SocketOpened { now: t0 }).unwrap();
    session
        .handle(SessionEvent::FrameReceived { frame: Frame::new(Command::Connected), now: t0 })
        .unwrap();
    session
}

fn message(subscription: u64, destination: String, id: u64) -> Frame {
    Frame::new(Command::Message)
        .with_header("subscription", format!("sub-{subscription}"))
        .with_header("destination", destination)
        .with_body(format!(
            r#"{{"id":{id},"message":"m{id}","username":"u","createdTime":"2024-05-01T12:00:00"}}"#
        ))
}

fn typing(subscription: u64, room: RoomId, user: u8) -> Frame {
    Frame::new(Command::Message)
        .with_header("subscription", format!("sub-{subscription}"))
        .with_header("destination", Feed::Typing.topic(room))
        .with_body(format!(r#"{{"username":"user{user}","isTyping":true}}"#))
}

#[derive(Debug, Clone)]
enum Step {
    Typing(u8),
    Advance(u64),
    Drop,
    Reconnect,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0u8..5).prop_map(Step::Typing),
        3 => (0u64..4000).prop_map(Step::Advance),
        1 => Just(Step::Drop),
        1 => Just(Step::Reconnect),
    ]
}

proptest! {
    #[test]
    fn prop_teardown_twice_leaves_nothing_behind(
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let t0 = Instant::now();
        let mut session = start(7, 3, t0);
        let room = session.room();
        let mut now = t0;

        for step in steps {
            match step {
                Step::Typing(user) => {
                    // Typing subscription of the current socket is sub-(4k + 1).
                    for k in 0..8u64 {
                        let _ = session.handle(SessionEvent::FrameReceived {
                            frame: typing(4 * k + 1, room, user),
                            now,
                        });
                    }
                },
                Step::Advance(ms) => {
                    now += Duration::from_millis(ms);
                    let _ = session.handle(SessionEvent::HeartbeatReceived { now });
                    let _ = session.handle(SessionEvent::Tick { now });
                },
                Step::Drop => {
                    let _ = session.handle(SessionEvent::SocketClosed { now, reason: "drop".into() });
                },
                Step::Reconnect => {
                    now += Duration::from_secs(5);
                    let _ = session.handle(SessionEvent::Tick { now });
                    let _ = session.handle(SessionEvent::SocketOpened { now });
                    let _ = session.handle(SessionEvent::FrameReceived {
                        frame: Frame::new(Command::Connected),
                        now,
                    });
                },
            }
        }

        session.teardown();
        prop_assert!(session.teardown().is_empty());
        prop_assert_eq!(session.active_subscriptions(), 0);
        prop_assert_eq!(session.pending_timers(), 0);
        prop_assert!(!session.is_connected());
    }

    #[test]
    fn prop_messages_for_other_rooms_never_delivered(
        traffic in prop::collection::vec((any::<bool>(), 0u64..8, 1u64..1000), 0..60),
    ) {
        let t0 = Instant::now();
        let room_a = RoomId::new(7, 3).unwrap();

        // Room A's session is gone; room B now owns the view.
        let mut old = start(7, 3, t0);
        old.teardown();
        let mut session = start(7, 4, t0);
        let room_b = session.room();

        for (for_b, subscription, id) in traffic {
            let (destination, id) = if for_b {
                (Feed::Messages.topic(room_b), id + 1000)
            } else {
                (Feed::Messages.topic(room_a), id)
            };

            let actions = session
                .handle(SessionEvent::FrameReceived { frame: message(subscription, destination, id), now: t0 })
                .unwrap();

            for action in actions {
                if let SessionAction::Notify(Notice::Message(delivered)) = action {
                    prop_assert!(delivered.id > 1000, "room A message {} leaked into room B", delivered.id);
                }
            }
        }
    }
}
