//! In-memory transport for tests and in-process brokers
//!
//! Bridges the session to a peer over tokio channels instead of a
//! network socket.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use veles_protocol::Transport;

/// In-memory transport that exchanges frames over channels
pub struct MemoryTransport {
    /// Channel to send frames to the peer
    to_peer: mpsc::Sender<Bytes>,
    /// Channel to receive frames from the peer
    from_peer: mpsc::Receiver<Bytes>,
}

impl MemoryTransport {
    pub fn new(to_peer: mpsc::Sender<Bytes>, from_peer: mpsc::Receiver<Bytes>) -> Self {
        MemoryTransport { to_peer, from_peer }
    }

    /// Creates a connected pair of transports, one per side
    pub fn create_pair(buffer_size: usize) -> (Self, Self) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::channel(buffer_size);
        let (b_to_a_tx, b_to_a_rx) = mpsc::channel(buffer_size);
        (
            Self::new(a_to_b_tx, b_to_a_rx),
            Self::new(b_to_a_tx, a_to_b_rx),
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Error = MemoryTransportError;

    async fn run(
        mut self,
        incoming_tx: mpsc::Sender<Bytes>,
        mut outgoing_rx: mpsc::Receiver<Bytes>,
    ) -> Result<(), Self::Error> {
        loop {
            tokio::select! {
                frame = self.from_peer.recv() => {
                    match frame {
                        Some(frame) => {
                            if incoming_tx.send(frame).await.is_err() {
                                return Ok(());
                            }
                        }
                        None => return Ok(()),
                    }
                }

                frame = outgoing_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if self.to_peer.send(frame).await.is_err() {
                                return Err(MemoryTransportError::ChannelClosed);
                            }
                        }
                        // session closed
                        None => return Ok(()),
                    }
                }
            }
        }
    }
}

/// Memory transport errors
#[derive(Debug, thiserror::Error)]
pub enum MemoryTransportError {
    #[error("transport channel closed")]
    ChannelClosed,
}
