// ABOUTME: Integration tests for the session actor over the mock bus.
// ABOUTME: Covers connect/disconnect lifecycle, send guards, ordering and relay scenarios.

use parley_bus::backends::mock::{MockBus, MockController};
use parley_bus::testing::FakeRelay;
use parley_bus::{
    BusEvent, ChatEntry, EntryKind, OutboundEvent, RosterEntry, TransportError, TransportHandle,
    UserIdentity,
};
use parley_core::{
    spawn_session, ClientError, ConnectionStatus, Delivery, RefreshReceiver, SessionConfig,
    SessionHandle, SessionState,
};
use std::time::Duration;

const ENDPOINT: &str = "http://relay.test";

fn session(bus: MockBus) -> (SessionHandle, RefreshReceiver, MockController) {
    let controller = bus.controller();
    let (handle, refresh) = spawn_session(TransportHandle::spawn(bus), SessionConfig::default());
    (handle, refresh, controller)
}

/// Wait until the published state satisfies `pred`
async fn wait_for(handle: &SessionHandle, pred: impl FnMut(&SessionState) -> bool) -> SessionState {
    let mut watch = handle.watch();
    let state = tokio::time::timeout(Duration::from_secs(5), watch.wait_for(pred))
        .await
        .expect("timed out waiting for session state")
        .expect("session actor stopped")
        .clone();
    state
}

fn chat_entry(id: &str, username: &str, content: &str, kind: EntryKind) -> ChatEntry {
    ChatEntry {
        id: id.to_string(),
        username: username.to_string(),
        content: content.to_string(),
        timestamp: "2024-05-01T10:00:00.000Z".to_string(),
        kind,
    }
}

#[tokio::test]
async fn test_connect_records_username_and_goes_connected() {
    let (handle, _refresh, controller) = session(MockBus::new());

    handle.request_connect("  alice ", ENDPOINT).await.unwrap();
    let state = wait_for(&handle, |s| s.is_connected()).await;

    assert_eq!(state.username.as_deref(), Some("alice"));
    assert!(state.identity.is_none());
    assert_eq!(controller.connect_attempts(), vec![ENDPOINT.to_string()]);
}

#[tokio::test]
async fn test_empty_username_is_rejected_before_transport() {
    let (handle, _refresh, controller) = session(MockBus::new());

    let err = handle.request_connect("   ", ENDPOINT).await.unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(controller.connect_attempts().is_empty());
}

#[tokio::test]
async fn test_connect_failure_leaves_state_disconnected() {
    let bus = MockBus::new();
    bus.controller()
        .refuse_connections(TransportError::Unreachable("connection refused".to_string()));
    let (handle, _refresh, _controller) = session(bus);

    let err = handle.request_connect("alice", ENDPOINT).await.unwrap_err();

    assert_eq!(
        err,
        ClientError::Connection(TransportError::Unreachable(
            "connection refused".to_string()
        ))
    );
    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert!(state.username.is_none());
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();

    let err = handle.request_connect("bob", ENDPOINT).await.unwrap_err();

    assert_eq!(err, ClientError::AlreadyConnected);
    assert_eq!(controller.connect_attempts().len(), 1);
}

#[tokio::test]
async fn test_blank_sends_never_emit() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();

    for content in ["", "   "] {
        assert!(matches!(
            handle.send_chat_message(content).await,
            Err(ClientError::Validation(_))
        ));
        assert!(matches!(
            handle.send_model_query(content, "mistral").await,
            Err(ClientError::Validation(_))
        ));
    }
    handle.request_disconnect().await.unwrap();

    assert_eq!(
        controller.emitted(),
        vec![OutboundEvent::Join {
            username: "alice".to_string()
        }]
    );
}

#[tokio::test]
async fn test_send_while_disconnected_is_silent() {
    let (handle, _refresh, controller) = session(MockBus::new());

    assert_eq!(
        handle.send_chat_message("hello?").await.unwrap(),
        Delivery::Dropped
    );
    assert_eq!(
        handle.send_model_query("anyone?", "llama3.2").await.unwrap(),
        Delivery::Dropped
    );
    handle.request_disconnect().await.unwrap();

    assert!(controller.emitted().is_empty());
    assert!(controller.connect_attempts().is_empty());
}

#[tokio::test]
async fn test_alice_scenario_log_only_holds_server_echo() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();

    controller.push(BusEvent::Identity(UserIdentity {
        id: "u1".to_string(),
        username: "alice".to_string(),
    }));
    controller.push(BusEvent::RosterUpdate(vec![RosterEntry {
        username: "alice".to_string(),
    }]));
    let state = wait_for(&handle, |s| !s.roster.is_empty()).await;
    assert_eq!(state.identity.as_ref().map(|i| i.id.as_str()), Some("u1"));

    assert_eq!(
        handle.send_chat_message("hi").await.unwrap(),
        Delivery::Emitted
    );
    let state = handle.snapshot().await.unwrap();
    assert!(state.messages.is_empty());

    let echo = chat_entry("m1", "alice", "hi", EntryKind::User);
    controller.push(BusEvent::ChatEntry(echo.clone()));
    let state = wait_for(&handle, |s| !s.messages.is_empty()).await;

    assert_eq!(state.messages, vec![echo]);
}

#[tokio::test]
async fn test_typing_indicator_scenario() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();

    controller.push(BusEvent::AssistantTyping(true));
    wait_for(&handle, |s| s.assistant_typing).await;

    controller.push(BusEvent::ChatEntry(chat_entry(
        "m2",
        "🤖 mistral",
        "Because.",
        EntryKind::Llm,
    )));
    let state = wait_for(&handle, |s| s.messages.len() == 1).await;
    assert!(state.assistant_typing);

    controller.push(BusEvent::AssistantTyping(false));
    let state = wait_for(&handle, |s| !s.assistant_typing).await;
    assert_eq!(state.messages.len(), 1);
}

#[tokio::test]
async fn test_intent_observes_events_delivered_before_it() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();

    for i in 0..20 {
        controller.push(BusEvent::ChatEntry(chat_entry(
            &format!("m{}", i),
            "bob",
            "spam",
            EntryKind::User,
        )));
    }
    let state = handle.snapshot().await.unwrap();

    assert_eq!(state.messages.len(), 20);
    assert_eq!(state.messages[19].id, "m19");
}

#[tokio::test]
async fn test_disconnect_resets_state_but_keeps_model() {
    let relay = FakeRelay::new().with_user("bob").reply_with("Hello!");
    let (handle, _refresh, controller) = session(MockBus::new().with_responder(relay));
    handle.select_model("codellama").unwrap();
    handle.request_connect("alice", ENDPOINT).await.unwrap();
    handle.send_model_query("hi model", "codellama").await.unwrap();
    wait_for(&handle, |s| s.messages.len() == 2).await;

    handle.request_disconnect().await.unwrap();
    let state = handle.snapshot().await.unwrap();

    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert!(state.messages.is_empty());
    assert!(state.roster.is_empty());
    assert!(state.identity.is_none());
    assert!(!state.assistant_typing);
    assert!(state.username.is_none());
    assert_eq!(state.selected_model, "codellama");
    assert!(!controller.is_connected());
}

#[tokio::test]
async fn test_disconnect_drops_late_events() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();
    wait_for(&handle, |s| s.is_connected()).await;

    handle.request_disconnect().await.unwrap();

    assert!(!controller.push(BusEvent::AssistantTyping(true)));
    let state = handle.snapshot().await.unwrap();
    assert_eq!(state, SessionState::default());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_connect_cancels_it() {
    let bus = MockBus::new().with_connect_delay(Duration::from_secs(3));
    let (handle, _refresh, controller) = session(bus);

    let connecting = handle.request_connect("alice", ENDPOINT);
    let disconnecting = handle.request_disconnect();

    disconnecting.await.unwrap();
    assert_eq!(connecting.await, Err(ClientError::Cancelled));

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert!(state.username.is_none());
    assert!(!controller.is_connected());
    assert!(!controller.push(BusEvent::Connected));
}

#[tokio::test]
async fn test_remote_drop_requires_explicit_reconnect() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();
    wait_for(&handle, |s| s.is_connected()).await;

    controller.drop_connection("relay restarted");
    let state = wait_for(&handle, |s| !s.is_connected()).await;
    assert_eq!(state.username.as_deref(), Some("alice"));

    assert_eq!(
        handle.send_chat_message("still there?").await.unwrap(),
        Delivery::Dropped
    );
    assert_eq!(controller.connect_attempts().len(), 1);

    handle.request_connect("alice", ENDPOINT).await.unwrap();
    wait_for(&handle, |s| s.is_connected()).await;
    assert_eq!(controller.connect_attempts().len(), 2);
}

#[tokio::test]
async fn test_fake_relay_conversation() {
    let older = vec![chat_entry("h1", "bob", "earlier", EntryKind::User)];
    let relay = FakeRelay::new()
        .with_user("bob")
        .with_history(older)
        .reply_with("Rust is a systems language.");
    let (handle, _refresh, _controller) = session(MockBus::new().with_responder(relay));

    handle.request_connect("alice", ENDPOINT).await.unwrap();
    let state = wait_for(&handle, |s| s.roster.len() == 2 && s.messages.len() == 1).await;
    assert_eq!(state.identity.as_ref().map(|i| i.username.as_str()), Some("alice"));
    assert_eq!(state.messages[0].id, "h1");

    handle.send_chat_message("hello bob").await.unwrap();
    handle
        .send_model_query("what is rust?", "mistral")
        .await
        .unwrap();
    let state = wait_for(&handle, |s| s.messages.len() == 4).await;

    let kinds: Vec<EntryKind> = state.messages.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EntryKind::User, EntryKind::User, EntryKind::User, EntryKind::Llm]
    );
    assert_eq!(state.messages[3].username, "🤖 mistral");
    assert!(!state.assistant_typing);
}

#[tokio::test]
async fn test_presence_entries_from_relay() {
    let (handle, _refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();

    controller.push(BusEvent::UserJoined(parley_bus::Presence {
        username: "carol".to_string(),
        timestamp: "2024-05-01T10:00:00.000Z".to_string(),
    }));
    let state = wait_for(&handle, |s| s.messages.len() == 1).await;

    assert_eq!(state.messages[0].content, "carol joined the chat");
    assert_eq!(state.messages[0].kind, EntryKind::System);
}

#[tokio::test]
async fn test_dropping_last_handle_closes_connection() {
    let (handle, refresh, controller) = session(MockBus::new());
    handle.request_connect("alice", ENDPOINT).await.unwrap();
    let extra = handle.clone();
    drop(handle);

    // A live clone keeps the actor running
    assert!(extra.snapshot().await.unwrap().username.is_some());
    drop(extra);
    drop(refresh);

    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection still open after session shut down");
}
