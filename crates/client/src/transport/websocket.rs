//! WebSocket transport

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use veles_protocol::Transport;

/// WebSocket transport carrying one binary message per protocol frame
///
/// The connection is established eagerly by [`connect`], so a broker
/// that is unreachable fails the session open rather than a later
/// request.
///
/// [`connect`]: WebSocketTransport::connect
pub struct WebSocketTransport {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    /// Connects to a `ws://` or `wss://` locator
    pub async fn connect(url: &str) -> Result<Self, WebSocketError> {
        tracing::info!(url, "connecting to broker");
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| WebSocketError::Connection(e.to_string()))?;
        tracing::info!(url, "websocket connection established");
        Ok(WebSocketTransport {
            url: url.to_string(),
            stream,
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Error = WebSocketError;

    async fn run(
        self,
        incoming_tx: mpsc::Sender<Bytes>,
        mut outgoing_rx: mpsc::Receiver<Bytes>,
    ) -> Result<(), Self::Error> {
        let (mut ws_sender, mut ws_receiver) = self.stream.split();

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => {
                            if incoming_tx.send(Bytes::from(data)).await.is_err() {
                                tracing::debug!("session dropped its inbound channel");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!(url = %self.url, "broker closed the connection");
                            break;
                        }
                        Some(Ok(_)) => {
                            // text, ping and pong frames are not part of
                            // the protocol
                        }
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "websocket error");
                            return Err(WebSocketError::WebSocket(e.to_string()));
                        }
                        None => {
                            tracing::info!(url = %self.url, "connection closed");
                            break;
                        }
                    }
                }

                frame = outgoing_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Err(e) = ws_sender.send(Message::Binary(frame.to_vec())).await {
                                tracing::error!(error = %e, "failed to send frame");
                                return Err(WebSocketError::WebSocket(e.to_string()));
                            }
                        }
                        None => {
                            // session closed; shut the stream down
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// WebSocket transport errors
#[derive(Debug, thiserror::Error)]
pub enum WebSocketError {
    #[error("failed to connect: {0}")]
    Connection(String),

    #[error("websocket error: {0}")]
    WebSocket(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn start_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let ws_stream = accept_async(stream).await.unwrap();
                    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
                    while let Some(Ok(msg)) = ws_receiver.next().await {
                        if let Message::Binary(data) = msg {
                            let _ = ws_sender.send(Message::Binary(data)).await;
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_connect_and_echo() {
        let addr = start_echo_server().await;
        let transport = WebSocketTransport::connect(&format!("ws://{addr}"))
            .await
            .unwrap();

        let (incoming_tx, mut incoming_rx) = mpsc::channel(10);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(10);

        tokio::spawn(async move {
            let _ = transport.run(incoming_tx, outgoing_rx).await;
        });

        outgoing_tx
            .send(Bytes::from_static(b"\x1a"))
            .await
            .unwrap();

        let received = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            incoming_rx.recv(),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(received, Bytes::from_static(b"\x1a"));
    }

    #[tokio::test]
    async fn test_frames_preserve_order() {
        let addr = start_echo_server().await;
        let transport = WebSocketTransport::connect(&format!("ws://{addr}"))
            .await
            .unwrap();

        let (incoming_tx, mut incoming_rx) = mpsc::channel(10);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(10);

        tokio::spawn(async move {
            let _ = transport.run(incoming_tx, outgoing_rx).await;
        });

        for i in 0u8..5 {
            outgoing_tx.send(Bytes::from(vec![i])).await.unwrap();
        }
        for i in 0u8..5 {
            let received = tokio::time::timeout(
                std::time::Duration::from_secs(1),
                incoming_rx.recv(),
            )
            .await
            .unwrap()
            .unwrap();
            assert_eq!(received, Bytes::from(vec![i]));
        }
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let result = WebSocketTransport::connect("ws://127.0.0.1:1").await;
        assert!(matches!(result, Err(WebSocketError::Connection(_))));
    }

    #[tokio::test]
    async fn test_closing_outgoing_shuts_down() {
        let addr = start_echo_server().await;
        let transport = WebSocketTransport::connect(&format!("ws://{addr}"))
            .await
            .unwrap();

        let (incoming_tx, _incoming_rx) = mpsc::channel(10);
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Bytes>(10);

        let handle = tokio::spawn(async move {
            transport.run(incoming_tx, outgoing_rx).await
        });

        drop(outgoing_tx);

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
