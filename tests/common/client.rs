//! Test IRC client.
//!
//! A thin wire-level client for integration tests: sends raw lines, parses
//! replies with `malefirc_proto::Message`, and offers a few convenience verbs.

#![allow(dead_code)]

use std::str::FromStr;
use std::time::Duration;

use malefirc_proto::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    nick: String,
}

impl TestClient {
    pub async fn connect(address: &str, nick: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            nick: nick.to_string(),
        })
    }

    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with("\r\n") {
            self.writer.write_all(b"\r\n").await?;
        }
        Ok(())
    }

    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut line = String::new();
        timeout(dur, self.reader.read_line(&mut line)).await??;
        Message::from_str(line.trim_end()).map_err(|e| anyhow::anyhow!("parse error: {e}"))
    }

    /// Read messages until `predicate` matches one, returning everything seen.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = predicate(&msg);
            messages.push(msg);
            if done {
                break;
            }
        }
        Ok(messages)
    }

    pub async fn register(&mut self) -> anyhow::Result<()> {
        self.send_raw(&format!("NICK {}", self.nick)).await?;
        self.send_raw(&format!("USER {} 0 * :Test User", self.nick)).await?;
        self.recv_until(|msg| msg.command == "001").await?;
        Ok(())
    }

    pub async fn join(&mut self, channel: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("JOIN {channel}")).await
    }

    pub async fn privmsg(&mut self, target: &str, text: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("PRIVMSG {target} :{text}")).await
    }

    pub async fn quit(&mut self, reason: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("QUIT :{reason}")).await
    }

    pub async fn part(&mut self, channel: &str) -> anyhow::Result<()> {
        self.send_raw(&format!("PART {channel}")).await
    }
}
