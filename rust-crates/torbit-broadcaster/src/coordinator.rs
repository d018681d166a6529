use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{BroadcasterError, Result};
use crate::events::{ChatMessage, Delivery, Participant, ParticipantId};

/// What happens when a name is claimed while already registered
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamePolicy {
    /// Newest session replaces the registered one, whose mailbox closes
    #[default]
    LastWriterWins,
    /// Join is refused and the registry is left untouched
    Reject,
}

/// Coordinator settings, fixed for the life of the loop
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Sender name used for join/leave announcements
    pub bot_name: String,
    pub room_label: String,
    /// Pending inbound messages before submitters wait
    pub inbound_capacity: usize,
    pub name_policy: NamePolicy,
    /// Deliver a participant's own lines back to them
    pub echo_to_sender: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bot_name: "TorbitBot".to_string(),
            room_label: "Torbit Chat".to_string(),
            inbound_capacity: 64,
            name_policy: NamePolicy::LastWriterWins,
            echo_to_sender: true,
        }
    }
}

struct JoinRequest {
    participant: Participant,
    reply: oneshot::Sender<Result<()>>,
}

/// Cloneable submission side of the coordinator.
///
/// Every bridge holds one; the registry itself never leaves the loop.
#[derive(Clone)]
pub struct CoordinatorHandle {
    join_tx: mpsc::UnboundedSender<JoinRequest>,
    leave_tx: mpsc::UnboundedSender<ParticipantId>,
    input_tx: mpsc::Sender<ChatMessage>,
    roster_tx: mpsc::UnboundedSender<oneshot::Sender<Vec<String>>>,
}

impl CoordinatorHandle {
    /// Register a participant and wait for the coordinator's verdict
    pub async fn join(&self, participant: Participant) -> Result<()> {
        let (reply, verdict) = oneshot::channel();
        self.join_tx
            .send(JoinRequest { participant, reply })
            .map_err(|_| BroadcasterError::CoordinatorClosed)?;
        verdict
            .await
            .map_err(|_| BroadcasterError::CoordinatorClosed)?
    }

    /// Deregister a session. Unknown or displaced sessions are ignored.
    pub fn leave(&self, id: ParticipantId) -> Result<()> {
        self.leave_tx
            .send(id)
            .map_err(|_| BroadcasterError::CoordinatorClosed)
    }

    /// Queue a message for fan-out, waiting while the inbound queue is full
    pub async fn submit(&self, message: ChatMessage) -> Result<()> {
        self.input_tx
            .send(message)
            .await
            .map_err(|_| BroadcasterError::CoordinatorClosed)
    }

    /// Names currently registered, sorted
    pub async fn roster(&self) -> Result<Vec<String>> {
        let (reply, names) = oneshot::channel();
        self.roster_tx
            .send(reply)
            .map_err(|_| BroadcasterError::CoordinatorClosed)?;
        names.await.map_err(|_| BroadcasterError::CoordinatorClosed)
    }
}

/// Single owner of the participant registry.
///
/// Join, leave and inbound messages are serialized through [`Coordinator::run`];
/// exactly one event is handled per iteration.
pub struct Coordinator {
    config: CoordinatorConfig,
    participants: HashMap<String, Participant>,
    join_rx: mpsc::UnboundedReceiver<JoinRequest>,
    leave_rx: mpsc::UnboundedReceiver<ParticipantId>,
    input_rx: mpsc::Receiver<ChatMessage>,
    roster_rx: mpsc::UnboundedReceiver<oneshot::Sender<Vec<String>>>,
    announce_tx: mpsc::UnboundedSender<ChatMessage>,
    announce_rx: mpsc::UnboundedReceiver<ChatMessage>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> (Self, CoordinatorHandle) {
        let (join_tx, join_rx) = mpsc::unbounded_channel();
        let (leave_tx, leave_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (roster_tx, roster_rx) = mpsc::unbounded_channel();
        let (announce_tx, announce_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            config,
            participants: HashMap::new(),
            join_rx,
            leave_rx,
            input_rx,
            roster_rx,
            announce_tx,
            announce_rx,
        };
        let handle = CoordinatorHandle {
            join_tx,
            leave_tx,
            input_tx,
            roster_tx,
        };

        (coordinator, handle)
    }

    /// Build a coordinator and run it on its own task
    pub fn spawn(
        config: CoordinatorConfig,
        shutdown: CancellationToken,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (coordinator, handle) = Self::new(config);
        let task = tokio::spawn(coordinator.run(shutdown));
        (handle, task)
    }

    /// Control loop. Returns on shutdown or once every handle is dropped;
    /// dropping the registry closes all mailboxes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Coordinator started for {}", self.config.room_label);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Coordinator shutting down");
                    break;
                }
                Some(request) = self.join_rx.recv() => self.handle_join(request),
                Some(id) = self.leave_rx.recv() => self.handle_leave(id),
                Some(announcement) = self.announce_rx.recv() => {
                    self.fan_out(&announcement);
                }
                Some(reply) = self.roster_rx.recv() => {
                    let _ = reply.send(self.roster());
                }
                message = self.input_rx.recv() => match message {
                    Some(message) => {
                        self.fan_out(&message);
                    }
                    None => {
                        tracing::info!("All coordinator handles dropped");
                        break;
                    }
                },
            }
        }

        tracing::info!(
            "Coordinator stopped, closing {} mailboxes",
            self.participants.len()
        );
    }

    fn handle_join(&mut self, request: JoinRequest) {
        let JoinRequest { participant, reply } = request;
        let name = participant.name().to_string();

        if let Some(existing) = self.participants.get(&name) {
            match self.config.name_policy {
                NamePolicy::Reject => {
                    tracing::info!("Rejected duplicate name {}", name);
                    let _ = reply.send(Err(BroadcasterError::NameTaken(name)));
                    return;
                }
                NamePolicy::LastWriterWins => {
                    tracing::warn!(
                        "Session {} replaces session {} for {}",
                        participant.id().session,
                        existing.id().session,
                        name
                    );
                }
            }
        }

        self.participants.insert(name.clone(), participant);
        tracing::info!("{} joined. Total: {}", name, self.participants.len());
        let _ = reply.send(Ok(()));

        self.announce(format!("{} joined {}", name, self.config.room_label));
    }

    fn handle_leave(&mut self, id: ParticipantId) {
        let current = self.participants.get(&id.name).map(|p| p.id().session);

        match current {
            Some(session) if session == id.session => {
                self.participants.remove(&id.name);
                tracing::info!("{} left. Remaining: {}", id.name, self.participants.len());
                self.announce(format!("{} left {}", id.name, self.config.room_label));
            }
            Some(_) => {
                tracing::debug!("Ignoring leave from displaced session {} of {}", id.session, id.name);
            }
            None => {
                tracing::debug!("Ignoring leave for unregistered {}", id.name);
            }
        }
    }

    /// Offer one message to every registered mailbox without waiting.
    /// Returns the number of successful deliveries.
    fn fan_out(&self, message: &ChatMessage) -> usize {
        let mut delivered = 0;

        for participant in self.participants.values() {
            if !self.config.echo_to_sender && participant.name() == message.sender {
                continue;
            }

            match participant.offer(message) {
                Delivery::Delivered => delivered += 1,
                Delivery::Dropped => {
                    tracing::debug!("Mailbox full, dropped message for {}", participant.name());
                }
                Delivery::Closed => {
                    tracing::debug!("Mailbox closed for {}", participant.name());
                }
            }
        }

        delivered
    }

    /// Post an announcement onto the self-queue; never blocks the loop
    fn announce(&self, text: String) {
        let _ = self
            .announce_tx
            .send(ChatMessage::new(self.config.bot_name.clone(), text));
    }

    fn roster(&self) -> Vec<String> {
        let mut names: Vec<String> = self.participants.keys().cloned().collect();
        names.sort();
        names
    }
}
