use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use peer_call_protocol::one_to_one::SignalMessage;

use crate::error::TransportError;
use crate::one_to_one::ControllerEvent;

/// Outbound half of the signaling connection.
pub trait SignalingTransport {
    fn send(&mut self, message: SignalMessage) -> Result<(), TransportError>;
}

/// Websocket connection to the relay.
///
/// Incoming messages are posted to the controller queue as
/// [ControllerEvent::Signal], followed by one [ControllerEvent::Disconnected]
/// when the connection goes away.
pub struct WebSocketTransport {
    tx: mpsc::UnboundedSender<SignalMessage>,
}

impl WebSocketTransport {
    pub async fn connect(
        url: &str,
        events: mpsc::UnboundedSender<ControllerEvent>,
    ) -> Result<Self, TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        info!("connected to signaling server at {url}");
        let (mut ws_tx, mut ws_rx) = ws.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<SignalMessage>();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let bytes = match rmp_serde::to_vec(&message) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!("failed to encode {message:?}: {e}");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::binary(bytes)).await {
                    error!("websocket send error: {e}");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("websocket error: {e}");
                        break;
                    }
                };
                if frame.is_close() {
                    break;
                }
                if !frame.is_binary() {
                    continue;
                }
                match rmp_serde::from_slice::<SignalMessage>(&frame.into_data()) {
                    Ok(message) => {
                        debug!("signal received: {message:?}");
                        if events.send(ControllerEvent::Signal(message)).is_err() {
                            return;
                        }
                    }
                    Err(e) => error!("undecodable signal: {e}"),
                }
            }
            info!("signaling connection closed");
            let _ = events.send(ControllerEvent::Disconnected);
        });

        Ok(WebSocketTransport { tx })
    }
}

impl SignalingTransport for WebSocketTransport {
    fn send(&mut self, message: SignalMessage) -> Result<(), TransportError> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}
