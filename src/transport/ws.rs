//! WebSocket transport - tokio-tungstenite

use super::{SocketEvent, SocketHandle, Transport, INBOUND_BUFFER, OUTBOUND_BUFFER};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self { Self }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> anyhow::Result<SocketHandle> {
        let (ws, _) = connect_async(url).await?;
        let (mut write, mut read) = ws.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let (in_tx, in_rx) = mpsc::channel::<SocketEvent>(INBOUND_BUFFER);

        // Writer: runs until the client drops its sender, then closes the socket.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(frame)).await {
                    tracing::debug!(error = %e, "websocket write failed");
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Reader
        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(SocketEvent::Frame(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            if in_tx.send(SocketEvent::Frame(text)).await.is_err() {
                                return;
                            }
                        }
                        Err(_) => {
                            let _ = in_tx.send(SocketEvent::Error("non-utf8 binary frame".into())).await;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => break frame.map(|f| f.reason.to_string()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = in_tx.send(SocketEvent::Error(e.to_string())).await;
                        break Some(e.to_string());
                    }
                    None => break None,
                }
            };
            let _ = in_tx.send(SocketEvent::Closed(reason)).await;
        });

        Ok(SocketHandle { outbound: out_tx, inbound: in_rx })
    }
}
