//! Outbound messages with repeat suppression
//!
//! A stable board keeps producing the same reconciliation result frame after
//! frame. Move notifications and illegal-move reports are therefore
//! suppressed when identical to the immediately preceding one.

use crate::error::TransportResult;
use crate::transport::MessageSink;
use shared::{MoveNotification, Notice, Outbound};
use tracing::debug;

pub struct Outbox {
    sink: Box<dyn MessageSink>,
    last: Option<Outbound>,
}

impl Outbox {
    pub fn new(sink: Box<dyn MessageSink>) -> Self {
        Outbox { sink, last: None }
    }

    /// Send unconditionally
    pub async fn publish(&mut self, message: impl Into<Outbound>) -> TransportResult<()> {
        self.sink.send(&message.into()).await
    }

    /// Send unless identical to the previous frame-driven payload.
    /// Returns whether it was sent.
    pub async fn publish_frame_result(&mut self, message: impl Into<Outbound>) -> TransportResult<bool> {
        let message = message.into();
        if self.last.as_ref() == Some(&message) {
            debug!("[LIFECYCLE] Suppressed repeated {}", kind(&message));
            return Ok(false);
        }
        self.sink.send(&message).await?;
        self.last = Some(message);
        Ok(true)
    }

    pub async fn publish_move(&mut self, notification: MoveNotification) -> TransportResult<bool> {
        self.publish_frame_result(notification).await
    }

    /// Forget the previous payload (session start)
    pub fn reset(&mut self) {
        self.last = None;
    }
}

fn kind(message: &Outbound) -> &'static str {
    match message {
        Outbound::Move(_) => "move notification",
        Outbound::Notice(Notice::IllegalMove { .. }) => "illegal move report",
        Outbound::Notice(_) => "notice",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelSink;
    use tokio::sync::mpsc;

    fn notification(fen: &str) -> MoveNotification {
        MoveNotification {
            fen_str: fen.to_string(),
            played: None,
        }
    }

    #[tokio::test]
    async fn test_repeated_move_is_suppressed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut outbox = Outbox::new(Box::new(ChannelSink::new(tx)));

        assert!(outbox.publish_move(notification("a")).await.unwrap());
        assert!(!outbox.publish_move(notification("a")).await.unwrap());
        assert!(outbox.publish_move(notification("b")).await.unwrap());
        outbox.reset();
        assert!(outbox.publish_move(notification("b")).await.unwrap());

        let mut sent = Vec::new();
        while let Ok(message) = rx.try_recv() {
            sent.push(message);
        }
        assert_eq!(sent.len(), 3);
    }

    #[tokio::test]
    async fn test_plain_publish_is_never_suppressed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut outbox = Outbox::new(Box::new(ChannelSink::new(tx)));
        let identify = || Notice::AiIdentify {
            ai_id: "x".to_string(),
        };
        outbox.publish(identify()).await.unwrap();
        outbox.publish(identify()).await.unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }
}
