/*!
Signaling messages exchanged between two call controllers and the relay
to set up, accept and end a one-to-one call.
 */

use crate::{ClientId, Payload};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// What a routed [Envelope] asks the recipient to do.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub enum EnvelopeKind {
    /// Caller proposes a call, payload holds the negotiation offer
    CallOffer,
    /// Callee accepted, payload holds the negotiation answer
    CallAccepted,
    /// Either side terminates or rejects the call, no payload
    CallEnded,
}

impl Display for EnvelopeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnvelopeKind::CallOffer => "call-offer",
            EnvelopeKind::CallAccepted => "call-accepted",
            EnvelopeKind::CallEnded => "call-ended",
        };
        f.write_str(name)
    }
}

/// A single routed signaling message. The relay only ever reads `to` (and
/// checks `from` against the sending connection); `payload` is passed along
/// without modifications.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: EnvelopeKind,
    pub from: ClientId,
    pub to: ClientId,
    pub payload: Option<Payload>,
}

impl Envelope {
    pub fn call_offer(from: ClientId, to: ClientId, offer: Payload) -> Self {
        Envelope {
            kind: EnvelopeKind::CallOffer,
            from,
            to,
            payload: Some(offer),
        }
    }

    pub fn call_accepted(from: ClientId, to: ClientId, answer: Payload) -> Self {
        Envelope {
            kind: EnvelopeKind::CallAccepted,
            from,
            to,
            payload: Some(answer),
        }
    }

    pub fn call_ended(from: ClientId, to: ClientId) -> Self {
        Envelope {
            kind: EnvelopeKind::CallEnded,
            from,
            to,
            payload: None,
        }
    }
}

/// Everything that travels over a signaling connection, in both directions.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum SignalMessage {
    /// Sent by the relay once, right after the connection is established
    YourIdentifier(ClientId),
    /// Routed call envelope
    Envelope(Envelope),
    /// Sent back to the sender when the recipient of an envelope is not connected
    RoutingMiss { to: ClientId, kind: EnvelopeKind },
    /// Generic error containing detailed information about the cause
    Error(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn call_ended_carries_no_payload() {
        let envelope = Envelope::call_ended(ClientId::new(1), ClientId::new(2));
        assert_eq!(envelope.kind, EnvelopeKind::CallEnded);
        assert!(envelope.payload.is_none());
    }

    #[test]
    fn payload_survives_message_pack_unchanged() {
        let sdp = "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n";
        let message = SignalMessage::Envelope(Envelope::call_offer(
            ClientId::new(7),
            ClientId::new(9),
            Payload::new(sdp),
        ));
        let bytes = rmp_serde::to_vec(&message).unwrap();
        let decoded: SignalMessage = rmp_serde::from_slice(&bytes).unwrap();
        match decoded {
            SignalMessage::Envelope(envelope) => {
                assert_eq!(envelope.payload.unwrap().as_str(), sdp);
                assert_eq!(envelope.to, ClientId::new(9));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
