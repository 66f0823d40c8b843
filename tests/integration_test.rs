use chatroom::broadcast::RoomEvent;
use chatroom::config::ChatConfig;
use chatroom::protocol::{ClientMessage, ServerMessage};
use chatroom::state::AppState;
use chatroom::types::{Message, MessageKind};
use chatroom::ws::handlers::{handle_message, resync_after_lag, Connection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

async fn login(state: &Arc<AppState>, username: &str) -> Connection {
    let mut conn = Connection::new();
    let result = handle_message(
        ClientMessage::Login {
            username: username.to_string(),
        },
        &mut conn,
        state,
    )
    .await;
    assert!(
        matches!(result, Some(ServerMessage::LoggedIn { .. })),
        "login as {} failed: {:?}",
        username,
        result
    );
    conn
}

/// Drain everything this connection would be sent right now
fn drain(conn: &mut Connection) -> Vec<ServerMessage> {
    let session_id = conn.session_id().map(str::to_string);
    let Some(rx) = conn.events.as_mut() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(RoomEvent { skip, message }) => {
                if skip.is_none() || skip != session_id {
                    out.push(message);
                }
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}

fn chat_messages(frames: &[ServerMessage]) -> Vec<Message> {
    frames
        .iter()
        .filter_map(|f| match f {
            ServerMessage::MessageReceived { message } if message.kind == MessageKind::Chat => {
                Some(message.clone())
            }
            _ => None,
        })
        .collect()
}

/// End-to-end flow: two users join, chat, type, and one leaves
#[tokio::test]
async fn test_full_chat_flow() {
    let state = Arc::new(AppState::default());

    let mut alice = login(&state, "alice").await;
    let mut bob = login(&state, "bob").await;

    // Alice hears about bob; bob hears nothing about his own join
    let alice_frames = drain(&mut alice);
    assert!(alice_frames.iter().any(|f| matches!(
        f,
        ServerMessage::MessageReceived { message } if message.body == "bob joined the chat"
    )));
    assert!(alice_frames
        .iter()
        .any(|f| matches!(f, ServerMessage::UserListChanged { users } if users.len() == 2)));
    assert!(drain(&mut bob).is_empty());

    // Alice says hi; nobody gets a direct reply, both get the broadcast
    let reply = handle_message(
        ClientMessage::SendMessage {
            body: "hi".to_string(),
        },
        &mut alice,
        &state,
    )
    .await;
    assert!(reply.is_none());

    let alice_chat = chat_messages(&drain(&mut alice));
    let bob_chat = chat_messages(&drain(&mut bob));
    assert_eq!(alice_chat.len(), 1);
    assert_eq!(alice_chat, bob_chat);
    assert_eq!(alice_chat[0].sender, "alice");
    assert_eq!(alice_chat[0].body, "hi");

    // Bob starts typing: alice sees it, bob does not
    handle_message(ClientMessage::SetTyping { is_typing: true }, &mut bob, &state).await;
    assert_eq!(
        drain(&mut alice),
        vec![ServerMessage::TypingUsersChanged {
            usernames: vec!["bob".to_string()]
        }]
    );
    assert!(drain(&mut bob).is_empty());

    // Bob disconnects mid-typing: alice gets the departure and an empty typing set
    let bob_session = bob.end().unwrap();
    state.remove(&bob_session.id).await;

    let frames = drain(&mut alice);
    assert!(frames.iter().any(|f| matches!(
        f,
        ServerMessage::MessageReceived { message } if message.body == "bob left the chat"
    )));
    assert!(frames
        .iter()
        .any(|f| matches!(f, ServerMessage::UserListChanged { users } if users.len() == 1)));
    assert!(frames
        .iter()
        .any(|f| matches!(f, ServerMessage::TypingUsersChanged { usernames } if usernames.is_empty())));
}

#[tokio::test]
async fn test_both_sessions_receive_same_message_at_position_zero() {
    let state = Arc::new(AppState::default());
    let mut alice = login(&state, "alice").await;
    let mut bob = login(&state, "bob").await;

    handle_message(
        ClientMessage::SendMessage {
            body: "hi".to_string(),
        },
        &mut alice,
        &state,
    )
    .await;

    let a = chat_messages(&drain(&mut alice));
    let b = chat_messages(&drain(&mut bob));
    assert_eq!(a[0].id, b[0].id);
    assert_eq!(a[0].sender, "alice");
    assert_eq!(b[0].body, "hi");
}

#[tokio::test]
async fn test_removed_session_cannot_publish() {
    let state = Arc::new(AppState::default());
    let alice = login(&state, "alice").await;
    let session_id = alice.session_id().unwrap().to_string();

    state.remove(&session_id).await;
    let log_before = state.recent_messages().await;

    // The socket still believes it is logged in: the room rejects the race
    let mut stale = alice;
    let reply = handle_message(
        ClientMessage::SendMessage {
            body: "hi".to_string(),
        },
        &mut stale,
        &state,
    )
    .await;

    match reply {
        Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "NOT_CONNECTED"),
        other => panic!("Expected NOT_CONNECTED error, got {:?}", other),
    }
    assert_eq!(state.recent_messages().await, log_before);
}

#[tokio::test]
async fn test_validation_errors_are_not_broadcast() {
    let state = Arc::new(AppState::default());
    let mut alice = login(&state, "alice").await;
    let mut bob = login(&state, "bob").await;
    drain(&mut alice);

    let reply = handle_message(
        ClientMessage::SendMessage {
            body: "   ".to_string(),
        },
        &mut bob,
        &state,
    )
    .await;
    match reply {
        Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "EMPTY_MESSAGE"),
        other => panic!("Expected EMPTY_MESSAGE error, got {:?}", other),
    }

    let mut anonymous = Connection::new();
    let reply = handle_message(
        ClientMessage::Login {
            username: "  ".to_string(),
        },
        &mut anonymous,
        &state,
    )
    .await;
    match reply {
        Some(ServerMessage::Error { code, .. }) => assert_eq!(code, "INVALID_USERNAME"),
        other => panic!("Expected INVALID_USERNAME error, got {:?}", other),
    }

    assert!(drain(&mut alice).is_empty());
    assert_eq!(state.online_count().await, 2);
}

#[tokio::test]
async fn test_relogin_gets_new_session_and_fresh_snapshot() {
    let state = Arc::new(AppState::default());
    let _carol = login(&state, "carol").await;
    let mut alice = login(&state, "alice").await;
    let old_id = alice.session_id().unwrap().to_string();

    handle_message(ClientMessage::Logout, &mut alice, &state).await;

    let reply = handle_message(
        ClientMessage::Login {
            username: "alice".to_string(),
        },
        &mut alice,
        &state,
    )
    .await;

    match reply {
        Some(ServerMessage::LoggedIn {
            session,
            users,
            history,
            ..
        }) => {
            assert_ne!(session.id, old_id);
            let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
            assert_eq!(names, vec!["carol", "alice"]);
            assert!(users.iter().all(|u| u.id != old_id));
            assert!(history.iter().any(|m| m.body == "alice left the chat"));
        }
        other => panic!("Expected LoggedIn, got {:?}", other),
    }
}

#[tokio::test]
async fn test_join_precedes_messages_from_joiner() {
    let state = Arc::new(AppState::default());
    let mut alice = login(&state, "alice").await;
    let mut bob = login(&state, "bob").await;

    handle_message(
        ClientMessage::SendMessage {
            body: "hello all".to_string(),
        },
        &mut bob,
        &state,
    )
    .await;

    let frames = drain(&mut alice);
    let join_pos = frames
        .iter()
        .position(|f| matches!(f, ServerMessage::UserListChanged { .. }))
        .expect("alice should see bob join");
    let msg_pos = frames
        .iter()
        .position(|f| matches!(f, ServerMessage::MessageReceived { message } if message.sender == "bob"))
        .expect("alice should see bob's message");
    assert!(join_pos < msg_pos);
}

#[tokio::test(start_paused = true)]
async fn test_typing_indicator_clears_automatically() {
    let state = Arc::new(AppState::default());
    let mut alice = login(&state, "alice").await;
    let mut bob = login(&state, "bob").await;
    drain(&mut alice);

    handle_message(ClientMessage::SetTyping { is_typing: true }, &mut alice, &state).await;
    handle_message(ClientMessage::SetTyping { is_typing: true }, &mut alice, &state).await;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(
        drain(&mut bob),
        vec![
            ServerMessage::TypingUsersChanged {
                usernames: vec!["alice".to_string()]
            },
            ServerMessage::TypingUsersChanged { usernames: vec![] },
        ]
    );
    assert!(drain(&mut alice).is_empty());
}

#[tokio::test]
async fn test_lagged_connection_is_resynced() {
    let state = Arc::new(AppState::new(ChatConfig {
        broadcast_capacity: 2,
        ..ChatConfig::default()
    }));
    let mut alice = login(&state, "alice").await;
    let mut bob = login(&state, "bob").await;
    let mut carol = login(&state, "carol").await;
    handle_message(ClientMessage::SetTyping { is_typing: true }, &mut bob, &state).await;
    handle_message(ClientMessage::SetTyping { is_typing: true }, &mut carol, &state).await;

    let rx = alice.events.as_mut().unwrap();
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(_))));

    let frames = resync_after_lag(&state).await;
    match &frames[..] {
        [ServerMessage::UserListChanged { users }, ServerMessage::TypingUsersChanged { usernames }] => {
            let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
            assert_eq!(names, vec!["alice", "bob", "carol"]);
            assert_eq!(usernames, &vec!["bob".to_string(), "carol".to_string()]);
        }
        other => panic!("Expected user list and typing set, got {:?}", other),
    }
}
