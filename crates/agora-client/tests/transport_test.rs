//! Transport shell against an in-process STOMP endpoint.
//!
//! A minimal broker accepts one WebSocket, completes the handshake, waits
//! for the four subscriptions and pushes a chat message. The client must
//! report the connection, deliver the message, publish to the send
//! destination and leave with UNSUBSCRIBE/DISCONNECT.
//!
//! A second broker never lets the socket go quiet; timers must still fire.

#![cfg(feature = "transport")]

use std::time::{Duration, Instant};

use agora_client::{
    ChatSession, Credential, Notice, SessionOptions, system_env::SystemEnv,
};
use agora_core::TYPING_EXPIRY;
use agora_proto::{Command, Frame, Wire, decode_stream};
use futures::{SinkExt, Stream, StreamExt};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn next_frame<S>(socket: &mut S) -> Frame
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = socket.next().await.unwrap().unwrap();
        let text = match message {
            Message::Text(text) => text.as_str().to_string(),
            _ => continue,
        };
        for wire in decode_stream(text.as_bytes()).unwrap() {
            if let Wire::Frame(frame) = wire {
                return frame;
            }
        }
    }
}

async fn next_notice(session: &mut ChatSession) -> Notice {
    tokio::time::timeout(TIMEOUT, session.next_notice()).await.unwrap().unwrap()
}

#[tokio::test]
async fn session_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, mut seen) = mpsc::unbounded_channel::<Frame>();

    let broker = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();

        let connect = next_frame(&mut socket).await;
        seen_tx.send(connect).unwrap();

        let connected = Frame::new(Command::Connected)
            .with_header("version", "1.2")
            .with_header("heart-beat", "0,0");
        socket.send(Message::Text(connected.to_text().unwrap().into())).await.unwrap();

        let mut message_sub = None;
        for _ in 0..4 {
            let subscribe = next_frame(&mut socket).await;
            if subscribe.header("destination") == Some("/topic/chat/7/3") {
                message_sub = subscribe.header("id").map(str::to_string);
            }
        }

        let push = Frame::new(Command::Message)
            .with_header("subscription", message_sub.unwrap())
            .with_header("destination", "/topic/chat/7/3")
            .with_header("message-id", "m-1")
            .with_body(
                r#"{"id":101,"message":"hello","username":"alice","createdTime":"2024-05-01T12:00:00"}"#,
            );
        socket.send(Message::Text(push.to_text().unwrap().into())).await.unwrap();

        // SEND, then 4x UNSUBSCRIBE and DISCONNECT on teardown.
        for _ in 0..6 {
            let frame = next_frame(&mut socket).await;
            seen_tx.send(frame).unwrap();
        }
    });

    let mut session = ChatSession::spawn(
        format!("ws://{addr}"),
        SessionOptions::for_room(7, 3),
        &Credential::new("tok"),
        SystemEnv::new(),
    );

    assert_eq!(next_notice(&mut session).await, Notice::ConnectionChanged(true));
    assert!(session.is_connected());

    let Notice::Message(message) = next_notice(&mut session).await else {
        panic!("expected chat message");
    };
    assert_eq!(message.id, 101);

    assert!(session.send("hi there").await);

    session.teardown().await;
    session.teardown().await;
    assert!(!session.is_connected());

    tokio::time::timeout(TIMEOUT, broker).await.unwrap().unwrap();

    let connect = seen.recv().await.unwrap();
    assert_eq!(connect.command, Command::Connect);
    assert_eq!(connect.header("Authorization"), Some("Bearer tok"));

    let send = seen.recv().await.unwrap();
    assert_eq!(send.command, Command::Send);
    assert_eq!(send.header("destination"), Some("/app/chat/7/3/send"));
    assert_eq!(send.body_str(), r#"{"message":"hi there"}"#);

    let mut tail = Vec::new();
    while let Ok(frame) = seen.try_recv() {
        tail.push(frame.command);
    }
    assert_eq!(tail, vec![
        Command::Unsubscribe,
        Command::Unsubscribe,
        Command::Unsubscribe,
        Command::Unsubscribe,
        Command::Disconnect,
    ]);
}

#[tokio::test]
async fn missing_credential_leaves_session_inert() {
    let mut session = ChatSession::spawn(
        "ws://127.0.0.1:9",
        SessionOptions::for_room(7, 3),
        &None::<Credential>,
        SystemEnv::new(),
    );

    assert!(session.room().is_none());
    assert!(!session.is_connected());
    assert!(!session.send("hello").await);
    session.start_typing();
    session.mark_read(1);

    session.teardown().await;
    session.teardown().await;
    assert!(session.next_notice().await.is_none());
}

#[tokio::test]
async fn typing_expires_while_broker_keeps_socket_busy() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let broker = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();

        next_frame(&mut socket).await;
        let connected = Frame::new(Command::Connected)
            .with_header("version", "1.2")
            .with_header("heart-beat", "0,0");
        socket.send(Message::Text(connected.to_text().unwrap().into())).await.unwrap();

        let mut typing_sub = None;
        for _ in 0..4 {
            let subscribe = next_frame(&mut socket).await;
            if subscribe.header("destination") == Some("/topic/chat/7/3/typing") {
                typing_sub = subscribe.header("id").map(str::to_string);
            }
        }

        let start = Frame::new(Command::Message)
            .with_header("subscription", typing_sub.unwrap())
            .with_header("destination", "/topic/chat/7/3/typing")
            .with_header("message-id", "t-1")
            .with_body(r#"{"username":"bob","isTyping":true}"#);
        socket.send(Message::Text(start.to_text().unwrap().into())).await.unwrap();

        // Bare heart-beats, far more often than the client's tick.
        while socket.send(Message::Text("\n".into())).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let mut session = ChatSession::spawn(
        format!("ws://{addr}"),
        SessionOptions::for_room(7, 3),
        &Credential::new("tok"),
        SystemEnv::new(),
    );

    let mut shown_at = None;
    let expired_at = loop {
        match next_notice(&mut session).await {
            Notice::TypingUsers(users) if users == ["bob"] => shown_at = Some(Instant::now()),
            Notice::TypingUsers(users) if users.is_empty() => break Instant::now(),
            _ => {},
        }
    };

    let shown_at = shown_at.unwrap();
    assert!(expired_at - shown_at >= TYPING_EXPIRY - Duration::from_millis(100));
    assert!(session.typing_users().is_empty());
    assert!(session.is_connected());

    session.teardown().await;
    broker.abort();
}
