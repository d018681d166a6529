use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Timestamp layout used on every outbound chat line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// A chat line, either typed by a participant or announced by the bot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Render the wire line `<sender> <timestamp>: <text>\n`
    pub fn to_line<Tz>(&self, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!("{} {}: {}\n", self.sender, at.format(TIMESTAMP_FORMAT), self.text)
    }
}

/// Registry identity of one connected session.
///
/// Two sessions may share a display name over time; `session` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId {
    pub name: String,
    pub session: u64,
}

/// Outcome of offering a message to one participant's mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Mailbox full, message lost for this participant only
    Dropped,
    /// Receiving bridge already gone
    Closed,
}

/// A registered chat identity and the sending half of its mailbox.
///
/// The receiving half is handed back from [`Participant::new`] and belongs to
/// the connection that created it.
#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    outbox: mpsc::Sender<ChatMessage>,
}

impl Participant {
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<ChatMessage>) {
        let (outbox, inbox) = mpsc::channel(capacity.max(1));
        let id = ParticipantId {
            name: name.into(),
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
        };
        (Self { id, outbox }, inbox)
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Non-blocking offer; never waits for the receiver
    pub(crate) fn offer(&self, message: &ChatMessage) -> Delivery {
        match self.outbox.try_send(message.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_line_format() {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .unwrap();
        let message = ChatMessage::new("alice", "hello");
        assert_eq!(message.to_line(&at), "alice 2024-03-09 07:05:01: hello\n");
    }

    #[test]
    fn test_sessions_are_unique() {
        let (a, _rx_a) = Participant::new("carol", 1);
        let (b, _rx_b) = Participant::new("carol", 1);
        assert_eq!(a.name(), b.name());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_offer_drops_when_full() {
        let (participant, mut inbox) = Participant::new("bob", 1);
        let message = ChatMessage::new("alice", "hi");

        assert_eq!(participant.offer(&message), Delivery::Delivered);
        assert_eq!(participant.offer(&message), Delivery::Dropped);

        assert_eq!(inbox.try_recv().unwrap(), message);
        drop(inbox);
        assert_eq!(participant.offer(&message), Delivery::Closed);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (participant, _inbox) = Participant::new("dave", 0);
        assert_eq!(participant.offer(&ChatMessage::new("x", "y")), Delivery::Delivered);
    }
}
