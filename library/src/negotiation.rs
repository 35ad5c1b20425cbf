#[cfg(test)]
use mockall::automock;

use peer_call_protocol::Payload;

use crate::error::NegotiationError;
use crate::media::{MediaTrack, TrackId, TrackSet};
use crate::one_to_one::CallSessionId;

/// Things the negotiation engine reports back once asynchronous work completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// Offer or answer requested through [NegotiationEngine] is ready to be sent
    LocalPayloadReady {
        session: CallSessionId,
        payload: Payload,
    },
    /// Peer started sending a track
    RemoteTrack {
        session: CallSessionId,
        track: MediaTrack,
    },
    Failed {
        session: CallSessionId,
        reason: String,
    },
}

/// Peer connection machinery (offer/answer, ICE, media path).
///
/// Payloads are passed through untouched. Every operation is tagged with the
/// [CallSessionId] it belongs to, and so is every [NegotiationEvent] it emits.
#[cfg_attr(test, automock)]
pub trait NegotiationEngine {
    /// Allocate a peer connection sending `local_tracks`.
    fn open(&mut self, session: CallSessionId, local_tracks: TrackSet)
        -> Result<(), NegotiationError>;

    fn create_offer(&mut self, session: CallSessionId) -> Result<(), NegotiationError>;

    fn create_answer(
        &mut self,
        session: CallSessionId,
        offer: Payload,
    ) -> Result<(), NegotiationError>;

    fn apply_answer(
        &mut self,
        session: CallSessionId,
        answer: Payload,
    ) -> Result<(), NegotiationError>;

    /// Swap the outgoing track `old` for `new` without renegotiating.
    fn replace_track(
        &mut self,
        session: CallSessionId,
        old: TrackId,
        new: MediaTrack,
    ) -> Result<(), NegotiationError>;

    /// Release everything held for `session`, aborting work still in flight.
    fn close(&mut self, session: CallSessionId);
}
