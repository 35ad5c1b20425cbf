use std::fmt::{Display, Formatter};

use thiserror::Error;

use peer_call_protocol::ClientId;

/// The negotiation engine could not produce or consume a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("negotiation failed: {0}")]
pub struct NegotiationError(pub String);

/// Camera, microphone or display capture is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("media source unavailable: {0}")]
pub struct MediaError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("signaling connection is closed")]
    Closed,
    #[error("websocket error: {0}")]
    WebSocket(String),
}

/// Everything that can go wrong inside a call transition.
/// Never escapes the controller, it is turned into an [EndReason] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    MediaSource(#[from] MediaError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CallError {
    pub fn end_reason(&self) -> EndReason {
        match self {
            CallError::Negotiation(_) => EndReason::NegotiationFailure,
            CallError::MediaSource(_) => EndReason::MediaSourceFailure,
            CallError::Transport(_) => EndReason::ChannelLoss,
        }
    }
}

/// Why a dial request did not start a call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum DialRefusal {
    #[error("not connected to the signaling server")]
    NotConnected,
    #[error("already in a call with {0}")]
    Busy(ClientId),
    #[error("cannot call ourselves")]
    SelfCall,
}

/// Reason code reported to the presentation layer when a call returns to idle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EndReason {
    LocalHangUp,
    RemoteHangUp,
    Declined,
    Timeout,
    NegotiationFailure,
    MediaSourceFailure,
    PeerUnreachable,
    ChannelLoss,
}

impl EndReason {
    /// Whether the other side should hear about it through a `CallEnded` envelope.
    pub fn tells_peer(self) -> bool {
        !matches!(
            self,
            EndReason::RemoteHangUp | EndReason::PeerUnreachable | EndReason::ChannelLoss
        )
    }
}

impl Display for EndReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            EndReason::LocalHangUp => "call ended",
            EndReason::RemoteHangUp => "peer ended the call",
            EndReason::Declined => "call declined",
            EndReason::Timeout => "no answer",
            EndReason::NegotiationFailure => "connection negotiation failed",
            EndReason::MediaSourceFailure => "camera or microphone unavailable",
            EndReason::PeerUnreachable => "peer is not connected",
            EndReason::ChannelLoss => "lost connection to the signaling server",
        };
        f.write_str(text)
    }
}
