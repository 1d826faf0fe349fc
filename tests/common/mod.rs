//! Shared test harness: a scripted broker on the other end of an
//! in-memory transport.

#![allow(dead_code)]

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;
use veles::client::transport::MemoryTransport;
use veles::client::{Session, SessionConfig};
use veles::protocol::{codec, BrokerMessage, ClientMessage};

/// The broker side of an in-memory transport: decodes what the client
/// sends and replies per each test's script.
pub struct MockBroker {
    rx: mpsc::Receiver<Bytes>,
    tx: mpsc::Sender<Bytes>,
}

/// Creates a broker and the client-side transport wired to it.
pub fn broker_and_transport() -> (MockBroker, MemoryTransport) {
    let (client_to_broker_tx, client_to_broker_rx) = mpsc::channel(64);
    let (broker_to_client_tx, broker_to_client_rx) = mpsc::channel(64);
    (
        MockBroker {
            rx: client_to_broker_rx,
            tx: broker_to_client_tx,
        },
        MemoryTransport::new(client_to_broker_tx, broker_to_client_rx),
    )
}

impl MockBroker {
    /// Receives and decodes the next frame from the client.
    pub async fn recv(&mut self) -> (Option<u32>, ClientMessage) {
        let mut frame = tokio::time::timeout(std::time::Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client closed the transport");
        let header = codec::decode_header(&mut frame).expect("malformed header from client");
        let msg = codec::decode_client(header.tag, &mut frame).expect("malformed body from client");
        (header.sequence_id, msg)
    }

    /// Encodes and sends a frame to the client.
    pub async fn send(&self, msg: &BrokerMessage, seq: Option<u32>) {
        self.tx
            .send(codec::encode_broker(msg, seq))
            .await
            .expect("client side of the transport is gone");
    }

    /// Sends raw bytes, bypassing the encoder.
    pub async fn send_raw(&self, frame: Bytes) {
        self.tx.send(frame).await.expect("client side of the transport is gone");
    }

    /// Answers the session-open ping with the given session id.
    pub async fn accept_ping(&mut self, session_id: Uuid) {
        let (seq, msg) = self.recv().await;
        assert!(matches!(msg, ClientMessage::Ping), "expected Ping, got {msg:?}");
        assert!(seq.is_some(), "Ping must carry a sequence id");
        self.send(&BrokerMessage::ResponsePing { session_id }, seq).await;
    }

    /// Acknowledges the next correlated request with `ResponseOk` and
    /// returns the request for inspection.
    pub async fn ack_next(&mut self) -> ClientMessage {
        let (seq, msg) = self.recv().await;
        assert!(seq.is_some(), "expected a correlated request, got {msg:?}");
        self.send(&BrokerMessage::ResponseOk, seq).await;
        msg
    }

    /// Rejects the next correlated request with `ResponseError` and
    /// returns the request for inspection.
    pub async fn reject_next(&mut self, message: &str) -> ClientMessage {
        let (seq, msg) = self.recv().await;
        assert!(seq.is_some(), "expected a correlated request, got {msg:?}");
        self.send(
            &BrokerMessage::ResponseError {
                message: message.to_string(),
            },
            seq,
        )
        .await;
        msg
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        locator: "mem://test".to_string(),
        request_timeout_ms: 500,
        channel_capacity: 16,
    }
}

/// Opens a session against a fresh mock broker, answering the initial
/// ping with `session_id`.
pub async fn open_session(config: SessionConfig, session_id: Uuid) -> (Session, MockBroker) {
    let (mut broker, transport) = broker_and_transport();
    let (session, ()) = tokio::join!(
        Session::open_with_transport(config, transport),
        broker.accept_ping(session_id),
    );
    (session.expect("session open failed"), broker)
}
