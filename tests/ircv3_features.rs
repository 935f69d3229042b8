//! Integration tests for IRCv3 extensions: CAP negotiation and message tags.

mod common;

use common::TestServer;
use std::time::Duration;

async fn drain(client: &mut common::TestClient) {
    while client.recv_timeout(Duration::from_millis(20)).await.is_ok() {}
}

#[tokio::test]
async fn cap_ls_advertises_expected_capabilities() {
    let server = TestServer::spawn(16721).await.expect("failed to spawn server");
    let mut client = server.connect("alice").await.unwrap();

    client.send_raw("CAP LS 302").await.unwrap();
    let reply = client.recv().await.expect("expected a CAP LS reply");
    assert_eq!(reply.command, "CAP");
    let body = reply.trailing.unwrap_or_default();
    assert!(body.contains("sasl"));
    assert!(body.contains("message-tags"));
    assert!(body.contains("msgid"));

    client.send_raw("CAP REQ :message-tags msgid").await.unwrap();
    let ack = client.recv().await.expect("expected a CAP ACK");
    assert_eq!(ack.command, "CAP");
    assert_eq!(ack.params.get(1).map(String::as_str), Some("ACK"));

    client.send_raw("CAP END").await.unwrap();
    client.register().await.unwrap();
}

#[tokio::test]
async fn cap_req_for_unknown_capability_is_nakked() {
    let server = TestServer::spawn(16722).await.expect("failed to spawn server");
    let mut client = server.connect("alice").await.unwrap();

    client.send_raw("CAP REQ :bogus-capability").await.unwrap();
    let nak = client.recv().await.expect("expected a CAP NAK");
    assert_eq!(nak.command, "CAP");
    assert_eq!(nak.params.get(1).map(String::as_str), Some("NAK"));
}

#[tokio::test]
async fn reply_tag_round_trips_to_clients_that_negotiated_message_tags() {
    let server = TestServer::spawn(16723).await.expect("failed to spawn server");

    let mut alice = server.connect("alice").await.unwrap();
    let mut bob = server.connect("bob").await.unwrap();

    alice.send_raw("CAP REQ :message-tags msgid").await.unwrap();
    alice.recv().await.unwrap();
    alice.send_raw("CAP END").await.unwrap();
    alice.register().await.unwrap();

    bob.send_raw("CAP REQ :message-tags msgid").await.unwrap();
    bob.recv().await.unwrap();
    bob.send_raw("CAP END").await.unwrap();
    bob.register().await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    alice.join("#thread").await.unwrap();
    bob.join("#thread").await.unwrap();
    drain(&mut alice).await;
    drain(&mut bob).await;

    bob.privmsg("#thread", "original message").await.unwrap();
    drain(&mut alice).await;

    alice.send_raw("@+reply=1 PRIVMSG #thread :a reply").await.unwrap();

    let messages = bob
        .recv_until(|msg| msg.command == "PRIVMSG" && msg.trailing.as_deref() == Some("a reply"))
        .await
        .expect("bob should see the reply");
    let reply = messages.iter().find(|m| m.command == "PRIVMSG").unwrap();
    assert_eq!(reply.tag("+reply"), Some("1"));
    assert!(reply.tag("msgid").is_some());

    alice.quit("done").await.unwrap();
    bob.quit("done").await.unwrap();
}
