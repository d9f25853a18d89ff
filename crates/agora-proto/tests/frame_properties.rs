//! Property-based tests for STOMP frame decoding.
//!
//! The decoder faces whatever the socket hands it, so it must reject garbage
//! with an error rather than panic, and must preserve header values that
//! need escaping.

use agora_proto::{Command, Frame, Wire, decode_stream};
use proptest::prelude::*;

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Send),
        Just(Command::Subscribe),
        Just(Command::Unsubscribe),
        Just(Command::Message),
        Just(Command::Receipt),
        Just(Command::Error),
        Just(Command::Disconnect),
    ]
}

proptest! {
    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_stream(&bytes);
    }

    #[test]
    fn prop_escaped_headers_survive(
        command in command_strategy(),
        name in "[a-z][a-z\\-]{0,12}",
        value in "[ -~\\n\\r]{0,40}",
        body in "[ -~]{0,200}",
    ) {
        prop_assume!(name != "content-length");

        let frame = Frame::new(command)
            .with_header(name.clone(), value.clone())
            .with_body(body.clone().into_bytes());

        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();

        let units = decode_stream(&wire).unwrap();
        prop_assert_eq!(units.len(), 1);

        let Wire::Frame(parsed) = &units[0] else {
            return Err(TestCaseError::fail("expected a frame"));
        };
        prop_assert_eq!(parsed.command, command);
        prop_assert_eq!(parsed.header(&name), Some(value.as_str()));
        prop_assert_eq!(&parsed.body[..], body.as_bytes());
    }

    #[test]
    fn prop_heartbeats_between_frames_are_counted(beats in 0usize..8) {
        let mut wire = Vec::new();
        Frame::new(Command::Receipt).with_header("receipt-id", "1").encode(&mut wire).unwrap();
        for _ in 0..beats {
            wire.extend_from_slice(b"\n");
        }
        Frame::new(Command::Receipt).with_header("receipt-id", "2").encode(&mut wire).unwrap();

        let units = decode_stream(&wire).unwrap();
        let heartbeats = units.iter().filter(|u| matches!(u, Wire::Heartbeat)).count();
        prop_assert_eq!(heartbeats, beats);
        prop_assert_eq!(units.len(), beats + 2);
    }
}
