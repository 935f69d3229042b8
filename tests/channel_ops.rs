//! Integration tests for channel mode enforcement: keys, moderation, invites.

mod common;

use common::TestServer;
use std::time::Duration;

async fn drain(client: &mut common::TestClient) {
    while client.recv_timeout(Duration::from_millis(20)).await.is_ok() {}
}

#[tokio::test]
async fn key_protected_channel_rejects_wrong_key() {
    let server = TestServer::spawn(16711).await.expect("failed to spawn server");

    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    alice.register().await.unwrap();
    bob.register().await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.join("#secret").await.unwrap();
    drain(&mut alice).await;
    alice.send_raw("MODE #secret +k hunter2").await.unwrap();
    drain(&mut alice).await;

    bob.send_raw("JOIN #secret wrongkey").await.unwrap();
    let messages = bob.recv_until(|msg| msg.command == "475").await.expect("bob should be rejected for bad key");
    assert!(messages.iter().any(|m| m.command == "475"));

    bob.send_raw("JOIN #secret hunter2").await.unwrap();
    let messages = bob
        .recv_until(|msg| msg.command == "JOIN" && msg.trailing.as_deref() == Some("#secret") || msg.params.get(0).map(String::as_str) == Some("#secret"))
        .await
        .expect("bob should join with the right key");
    assert!(messages.iter().any(|m| m.command == "JOIN"));

    alice.quit("done").await.unwrap();
    bob.quit("done").await.unwrap();
}

#[tokio::test]
async fn moderated_channel_silences_non_voiced_members() {
    let server = TestServer::spawn(16712).await.expect("failed to spawn server");

    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    alice.register().await.unwrap();
    bob.register().await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.join("#quiet").await.unwrap();
    drain(&mut alice).await;
    bob.join("#quiet").await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.send_raw("MODE #quiet +m").await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    bob.privmsg("#quiet", "can anyone hear me").await.unwrap();
    let messages = bob.recv_until(|msg| msg.command == "404").await.expect("bob should be rejected as non-voiced");
    assert!(messages.iter().any(|m| m.command == "404"));

    alice.send_raw("MODE #quiet +v bob").await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    bob.privmsg("#quiet", "now I can talk").await.unwrap();
    let messages = alice
        .recv_until(|msg| msg.command == "PRIVMSG" && msg.trailing.as_deref() == Some("now I can talk"))
        .await
        .expect("alice should receive the voiced message");
    assert!(messages.iter().any(|m| m.command == "PRIVMSG"));

    alice.quit("done").await.unwrap();
    bob.quit("done").await.unwrap();
}

#[tokio::test]
async fn invite_only_channel_requires_invite() {
    let server = TestServer::spawn(16713).await.expect("failed to spawn server");

    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    alice.register().await.unwrap();
    bob.register().await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.join("#exclusive").await.unwrap();
    drain(&mut alice).await;
    alice.send_raw("MODE #exclusive +i").await.unwrap();
    drain(&mut alice).await;

    bob.join("#exclusive").await.unwrap();
    let messages = bob.recv_until(|msg| msg.command == "473").await.expect("bob should be rejected, channel is invite-only");
    assert!(messages.iter().any(|m| m.command == "473"));

    alice.send_raw("INVITE bob #exclusive").await.unwrap();
    drain(&mut alice).await;

    bob.join("#exclusive").await.unwrap();
    let messages = bob.recv_until(|msg| msg.command == "JOIN").await.expect("bob should join after being invited");
    assert!(messages.iter().any(|m| m.command == "JOIN"));

    alice.quit("done").await.unwrap();
    bob.quit("done").await.unwrap();
}
