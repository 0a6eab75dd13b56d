//! Inbound out-of-band feedback injected while a task runs

use tokio::sync::mpsc::{self, error::TryRecvError};

/// A drainable queue of operator feedback. Draining never waits.
pub trait FeedbackChannel: Send {
    fn drain_pending(&mut self) -> Vec<String>;
}

/// Channel used when nobody can send feedback
pub struct NoFeedback;

impl FeedbackChannel for NoFeedback {
    fn drain_pending(&mut self) -> Vec<String> {
        Vec::new()
    }
}

impl FeedbackChannel for mpsc::UnboundedReceiver<String> {
    fn drain_pending(&mut self) -> Vec<String> {
        let mut pending = Vec::new();
        loop {
            match self.try_recv() {
                Ok(message) => pending.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        pending
    }
}

/// Create a sender/receiver pair for injecting feedback into a run
pub fn feedback_channel() -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<String>) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_is_non_blocking() {
        let (tx, mut rx) = feedback_channel();
        assert!(rx.drain_pending().is_empty());

        tx.send("use metric units".to_string()).unwrap();
        tx.send("keep it short".to_string()).unwrap();
        assert_eq!(rx.drain_pending(), vec!["use metric units", "keep it short"]);
        assert!(rx.drain_pending().is_empty());

        drop(tx);
        assert!(rx.drain_pending().is_empty());
        assert!(NoFeedback.drain_pending().is_empty());
    }
}
