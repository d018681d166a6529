use std::sync::Arc;

use chrono::Local;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::coordinator::CoordinatorHandle;
use crate::error::{BroadcasterError, Result};
use crate::events::{ChatMessage, Participant, ParticipantId};
use crate::AUDIT_TARGET;

/// Per-connection settings shared by every bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Prompt written before the display name is read
    pub greeting: String,
    /// Mailbox size; messages beyond it are dropped for this participant
    pub outbound_capacity: usize,
    /// Longest accepted input line in bytes
    pub max_line_length: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            greeting: "Welcome to Torbit Chat!  Please, enter your username: ".to_string(),
            outbound_capacity: 10,
            max_line_length: 64 * 1024,
        }
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    Handshaking,
    Active,
    Closing,
    Closed,
}

/// Adapts one byte stream into chat events and back
pub struct Bridge {
    peer: String,
    coordinator: CoordinatorHandle,
    config: Arc<BridgeConfig>,
    shutdown: CancellationToken,
    state: BridgeState,
}

impl Bridge {
    pub fn new(
        peer: impl Into<String>,
        coordinator: CoordinatorHandle,
        config: Arc<BridgeConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            peer: peer.into(),
            coordinator,
            config,
            shutdown,
            state: BridgeState::Connecting,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    fn transition(&mut self, next: BridgeState) {
        tracing::debug!("{}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }

    /// Drive the connection until the peer goes away, a write fails or
    /// shutdown is signalled. Leave is submitted exactly once if the
    /// handshake completed. A bridge serves a single connection; running it
    /// again fails with [`BroadcasterError::AlreadyRun`].
    pub async fn run<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
    {
        if self.state != BridgeState::Connecting {
            return Err(BroadcasterError::AlreadyRun);
        }

        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = FramedRead::new(
            reader,
            LinesCodec::new_with_max_length(self.config.max_line_length),
        );

        self.transition(BridgeState::Handshaking);
        let (id, outbox) = match self.handshake(&mut lines, &mut writer).await {
            Ok(joined) => joined,
            Err(e) => {
                let _ = writer.shutdown().await;
                self.transition(BridgeState::Closed);
                return Err(e);
            }
        };

        self.transition(BridgeState::Active);
        tracing::info!("{} connected as {}", self.peer, id.name);

        let result = tokio::select! {
            result = read_duty(&mut lines, &self.coordinator, &id.name) => result,
            result = write_duty(outbox, &mut writer, &id.name) => result,
            _ = self.shutdown.cancelled() => Ok(()),
        };

        self.transition(BridgeState::Closing);
        if let Err(e) = &result {
            tracing::warn!("{} ({}) connection error: {}", self.peer, id.name, e);
        }
        let name = id.name.clone();
        if self.coordinator.leave(id).is_err() {
            tracing::debug!("Coordinator gone before {} could leave", name);
        }
        let _ = writer.shutdown().await;
        self.transition(BridgeState::Closed);
        tracing::info!("{} ({}) disconnected", self.peer, name);

        result
    }

    async fn handshake<R, W>(
        &self,
        lines: &mut FramedRead<R, LinesCodec>,
        writer: &mut W,
    ) -> Result<(ParticipantId, mpsc::Receiver<ChatMessage>)>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer.write_all(self.config.greeting.as_bytes()).await?;
        writer.flush().await?;

        let name = tokio::select! {
            line = lines.next() => match line {
                Some(line) => line?,
                None => return Err(BroadcasterError::HandshakeAborted),
            },
            _ = self.shutdown.cancelled() => return Err(BroadcasterError::HandshakeAborted),
        };

        let (participant, outbox) = Participant::new(name, self.config.outbound_capacity);
        let id = participant.id().clone();

        match self.coordinator.join(participant).await {
            Ok(()) => Ok((id, outbox)),
            Err(BroadcasterError::NameTaken(name)) => {
                let notice = format!("Name {} is already taken\n", name);
                writer.write_all(notice.as_bytes()).await?;
                writer.flush().await?;
                Err(BroadcasterError::NameTaken(name))
            }
            Err(e) => Err(e),
        }
    }
}

async fn read_duty<R>(
    lines: &mut FramedRead<R, LinesCodec>,
    coordinator: &CoordinatorHandle,
    name: &str,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = lines.next().await {
        let text = line?;
        coordinator.submit(ChatMessage::new(name, text)).await?;
    }
    tracing::debug!("{} reached end of stream", name);
    Ok(())
}

async fn write_duty<W>(
    mut outbox: mpsc::Receiver<ChatMessage>,
    writer: &mut W,
    name: &str,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbox.recv().await {
        let line = message.to_line(&Local::now());
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        tracing::info!(
            target: AUDIT_TARGET,
            sender = %message.sender,
            text = %message.text,
            recipient = name,
            "message delivered"
        );
    }
    tracing::debug!("Mailbox for {} closed", name);
    Ok(())
}
