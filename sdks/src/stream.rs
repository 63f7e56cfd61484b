// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Server-streaming adapter handed to plugin handlers.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Error returned when the client side of a stream has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stream closed by client")]
pub struct StreamClosed;

/// Sending half of a server-streaming RPC.
///
/// `send` fails once the client disconnects. `cancelled` resolves on client
/// disconnect or when the plugin is stopped.
#[derive(Debug)]
pub struct StreamSender<T> {
    tx: mpsc::Sender<Result<T, Status>>,
    stop: CancellationToken,
}

impl<T> Clone for StreamSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<T> StreamSender<T> {
    pub(crate) fn new(tx: mpsc::Sender<Result<T, Status>>, stop: CancellationToken) -> Self {
        Self { tx, stop }
    }

    /// Create a sender/receiver pair outside of a gRPC server, mostly useful in tests.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Result<T, Status>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx, CancellationToken::new()), rx)
    }

    pub async fn send(&self, item: T) -> Result<(), StreamClosed> {
        self.tx.send(Ok(item)).await.map_err(|_| StreamClosed)
    }

    pub(crate) async fn fail(&self, status: Status) {
        // Nobody left to tell if the client already went away
        let _ = self.tx.send(Err(status)).await;
    }

    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.tx.closed() => {}
            _ = self.stop.cancelled() => {}
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed() || self.stop.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_fails_after_receiver_dropped() {
        let (sender, rx) = StreamSender::<u32>::channel(4);
        sender.send(1).await.unwrap();
        drop(rx);

        assert_eq!(sender.send(2).await, Err(StreamClosed));
        assert!(sender.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_disconnect() {
        let (sender, rx) = StreamSender::<u32>::channel(4);
        let waiter = {
            let sender = sender.clone();
            tokio::spawn(async move { sender.cancelled().await })
        };
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_stop() {
        let (tx, _rx) = mpsc::channel::<Result<u32, Status>>(4);
        let stop = CancellationToken::new();
        let sender = StreamSender::new(tx, stop.clone());

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(1), sender.cancelled())
            .await
            .expect("cancelled() did not resolve");
    }
}
