//! Stream of serialized channel events

use futures::Stream;
use rtcbridge_channel::ChannelEvent;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Events emitted on every channel, in emission order per connection
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl EventStream {
    /// Create a stream over `receiver`
    pub fn new(receiver: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.receiver.recv().await
    }

    /// Get the next event without waiting.
    ///
    /// `Ok(None)` when no event is queued.
    pub fn try_next(&mut self) -> Result<Option<ChannelEvent>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stop accepting events. Queued events can still be read.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Stream for EventStream {
    type Item = ChannelEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn event(channel: &str) -> ChannelEvent {
        ChannelEvent {
            channel: channel.to_string(),
            payload: json!({"event": "onNegotiationNeeded"}),
        }
    }

    #[tokio::test]
    async fn test_stream_yields_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = EventStream::new(rx);
        tx.send(event("PeerConnectionEvent/0")).unwrap();
        tx.send(event("PeerConnectionEvent/1")).unwrap();
        drop(tx);

        let channels: Vec<_> = stream.map(|e| e.channel).collect().await;
        assert_eq!(channels, vec!["PeerConnectionEvent/0", "PeerConnectionEvent/1"]);
    }

    #[test]
    fn test_try_next() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = EventStream::new(rx);
        assert_eq!(stream.try_next().unwrap(), None);

        tx.send(event("PeerConnectionEvent/0")).unwrap();
        stream.close();
        drop(tx);
        assert!(stream.try_next().unwrap().is_some());
        assert!(stream.try_next().is_err());
    }
}
