//! Transport layer abstraction
//!
//! A transport carries opaque byte frames between a session and its
//! broker. Implementations bridge the actual medium (WebSocket,
//! in-process channels, ...) to a pair of tokio channels, keeping the
//! session's framing and routing logic transport-agnostic.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// A bidirectional frame pipe to the broker
///
/// `run` consumes the transport and pumps frames until either side
/// shuts down: frames read from the medium are pushed into
/// `incoming_tx`, and frames received on `outgoing_rx` are written to
/// the medium. Closing the outgoing channel is the signal to shut the
/// transport down; dropping `incoming_tx` tells the session the
/// transport has died.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Error type for this transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs the frame pump until shutdown
    async fn run(
        self,
        incoming_tx: mpsc::Sender<Bytes>,
        outgoing_rx: mpsc::Receiver<Bytes>,
    ) -> Result<(), Self::Error>;
}
