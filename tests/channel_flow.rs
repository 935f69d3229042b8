//! Integration tests for basic channel flows: registration, JOIN, PRIVMSG.

mod common;

use common::{TestClient, TestServer};
use std::time::Duration;

async fn drain(client: &mut TestClient) {
    while client.recv_timeout(Duration::from_millis(20)).await.is_ok() {}
}

#[tokio::test]
async fn two_users_exchange_a_channel_message() {
    let server = TestServer::spawn(16701).await.expect("failed to spawn server");

    let mut alice = server.connect("alice").await.expect("alice connect failed");
    let mut bob = server.connect("bob").await.expect("bob connect failed");

    alice.register().await.expect("alice registration failed");
    bob.register().await.expect("bob registration failed");
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.join("#test").await.unwrap();
    bob.join("#test").await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.privmsg("#test", "hello from alice").await.unwrap();

    let messages = bob
        .recv_until(|msg| msg.command == "PRIVMSG" && msg.trailing.as_deref() == Some("hello from alice"))
        .await
        .expect("bob never saw the PRIVMSG");
    assert!(messages.iter().any(|m| m.command == "PRIVMSG"));

    alice.quit("done").await.unwrap();
    bob.quit("done").await.unwrap();
}

#[tokio::test]
async fn quitting_removes_member_and_notifies_channel() {
    let server = TestServer::spawn(16702).await.expect("failed to spawn server");

    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();
    alice.register().await.unwrap();
    bob.register().await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.join("#test").await.unwrap();
    bob.join("#test").await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.quit("goodbye").await.unwrap();

    let messages = bob.recv_until(|msg| msg.command == "QUIT").await.expect("bob never saw the QUIT");
    assert!(messages.iter().any(|m| m.command == "QUIT"));

    bob.quit("done").await.unwrap();
}
