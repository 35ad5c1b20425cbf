use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::ws::{Message, WebSocket};

use peer_call_protocol::one_to_one::{Envelope, EnvelopeKind, SignalMessage};
use peer_call_protocol::ClientId;

/// Registry entry of one connected client.
pub struct Connection {
    tx: mpsc::UnboundedSender<SignalMessage>,
    /// Clients this one has an offered or accepted call with, so that
    /// a disconnect can be reported to them and nobody else.
    peers: HashSet<ClientId>,
}

pub type Connections = Arc<RwLock<HashMap<ClientId, Connection>>>;

/// Relay router shared by every connection handler.
///
/// It owns the identifier counter and the identifier to channel registry,
/// and forwards [Envelope]s between two clients without looking at their payload.
#[derive(Clone)]
pub struct Relay {
    connections: Connections,
    next_client_id: Arc<AtomicU64>,
}

impl Default for Relay {
    fn default() -> Self {
        Relay {
            connections: Connections::default(),
            next_client_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Relay {
    /// Register a freshly connected channel and greet it with its identifier.
    pub async fn connect(&self, tx: mpsc::UnboundedSender<SignalMessage>) -> ClientId {
        let client_id = ClientId::new(self.next_client_id.fetch_add(1, Ordering::Relaxed));
        // greeting and registration happen under one lock: the greeting is always
        // the first message, and the client is routable once it has read it
        let mut connections = self.connections.write().await;
        if tx.send(SignalMessage::YourIdentifier(client_id)).is_err() {
            warn!("client {client_id} went away before it was registered");
            return client_id;
        }
        connections.insert(
            client_id,
            Connection {
                tx,
                peers: HashSet::new(),
            },
        );
        info!("new client connected: {client_id}");
        client_id
    }

    /// Forward `envelope` to the connection registered under `envelope.to`.
    ///
    /// When the recipient is not connected the envelope is dropped and the sender
    /// gets a [SignalMessage::RoutingMiss] notice instead.
    pub async fn route(&self, sender: ClientId, envelope: Envelope) {
        let mut connections = self.connections.write().await;
        if envelope.from != sender {
            warn!(
                "client {sender} sent an envelope claiming to be from {}, dropping it",
                envelope.from
            );
            let reason = format!("envelope sender {} does not match connection", envelope.from);
            notify(&mut connections, sender, SignalMessage::Error(reason));
            return;
        }

        let Envelope { kind, from, to, .. } = envelope;
        let sent = connections
            .get(&to)
            .map(|recipient| recipient.tx.send(SignalMessage::Envelope(envelope)).is_ok());
        let delivered = match sent {
            Some(true) => true,
            Some(false) => {
                error!("send to {to} failed, evicting it");
                evict(&mut connections, to);
                false
            }
            None => false,
        };

        if !delivered {
            info!("{kind} from {from} to {to} dropped: recipient is not connected");
            notify(&mut connections, from, SignalMessage::RoutingMiss { to, kind });
            return;
        }
        debug!("{kind} routed from {from} to {to}");

        match kind {
            EnvelopeKind::CallOffer | EnvelopeKind::CallAccepted => {
                link(&mut connections, from, to)
            }
            EnvelopeKind::CallEnded => unlink(&mut connections, from, to),
        }
    }

    /// Remove `client_id` from the registry, telling its call peers the call ended.
    pub async fn disconnect(&self, client_id: ClientId) {
        evict(&mut *self.connections.write().await, client_id);
        info!("client disconnected: {client_id}");
    }

    /// Number of currently registered clients.
    pub async fn connected(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn link(connections: &mut HashMap<ClientId, Connection>, first: ClientId, second: ClientId) {
    if let Some(connection) = connections.get_mut(&first) {
        connection.peers.insert(second);
    }
    if let Some(connection) = connections.get_mut(&second) {
        connection.peers.insert(first);
    }
}

fn unlink(connections: &mut HashMap<ClientId, Connection>, first: ClientId, second: ClientId) {
    if let Some(connection) = connections.get_mut(&first) {
        connection.peers.remove(&second);
    }
    if let Some(connection) = connections.get_mut(&second) {
        connection.peers.remove(&first);
    }
}

fn notify(
    connections: &mut HashMap<ClientId, Connection>,
    client_id: ClientId,
    message: SignalMessage,
) {
    let failed = match connections.get(&client_id) {
        Some(connection) => connection.tx.send(message).is_err(),
        None => false,
    };
    if failed {
        error!("send to {client_id} failed, evicting it");
        evict(connections, client_id);
    }
}

fn evict(connections: &mut HashMap<ClientId, Connection>, client_id: ClientId) {
    let mut gone = vec![client_id];
    while let Some(client_id) = gone.pop() {
        let Some(connection) = connections.remove(&client_id) else {
            continue;
        };
        for peer_id in connection.peers {
            let Some(peer) = connections.get_mut(&peer_id) else {
                continue;
            };
            peer.peers.remove(&client_id);
            let ended = SignalMessage::Envelope(Envelope::call_ended(client_id, peer_id));
            if peer.tx.send(ended).is_err() {
                error!("send to {peer_id} failed, evicting it");
                gone.push(peer_id);
            } else {
                debug!("told {peer_id} that {client_id} is gone");
            }
        }
    }
}

pub async fn user_connected(ws: WebSocket, relay: Relay) {
    let (user_ws_tx, mut user_ws_rx) = ws.split();

    let (tx, rx) = mpsc::unbounded_channel();
    let rx = UnboundedReceiverStream::new(rx);

    tokio::task::spawn(write_frames(rx, user_ws_tx));
    let client_id = relay.connect(tx).await;

    while let Some(result) = user_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                error!("websocket error (id={client_id}): {}", e);
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        if !msg.is_binary() {
            continue;
        }
        user_message(client_id, msg, &relay).await;
    }
    relay.disconnect(client_id).await;
}

/// Encode queued messages into binary frames until the queue or the socket closes.
///
/// Returns on the first failed send, dropping `rx`, so the relay's next send
/// to this client fails and evicts it.
async fn write_frames<S>(mut rx: UnboundedReceiverStream<SignalMessage>, mut socket: S)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(message) = rx.next().await {
        let bytes = match rmp_serde::to_vec(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("failed to encode {message:?}: {e}");
                continue;
            }
        };
        if let Err(e) = socket.send(Message::binary(bytes)).await {
            error!("websocket send error: {}", e);
            break;
        }
    }
}

async fn user_message(client_id: ClientId, msg: Message, relay: &Relay) {
    let request = match rmp_serde::from_slice::<SignalMessage>(msg.as_bytes()) {
        Ok(request) => {
            debug!("message received from client {client_id}: {:?}", request);
            request
        }
        Err(error) => {
            error!("undecodable message from {client_id}: {:?}", error);
            return;
        }
    };
    match request {
        SignalMessage::Envelope(envelope) => relay.route(client_id, envelope).await,
        other @ (SignalMessage::YourIdentifier(_)
        | SignalMessage::RoutingMiss { .. }
        | SignalMessage::Error(_)) => {
            warn!("client {client_id} sent a relay-only message, ignoring: {other:?}");
        }
    }
}
