//! Recording collaborators for controller tests.

use peer_call_protocol::one_to_one::{Envelope, SignalMessage};
use peer_call_protocol::Payload;

use super::CallSessionId;
use crate::error::{MediaError, NegotiationError, TransportError};
use crate::media::{MediaSource, MediaTrack, TrackId, TrackSet};
use crate::negotiation::NegotiationEngine;
use crate::transport::SignalingTransport;

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    pub calls: Vec<String>,
    pub closed: Vec<CallSessionId>,
    pub fail_replace: bool,
}

impl NegotiationEngine for FakeEngine {
    fn open(
        &mut self,
        session: CallSessionId,
        local_tracks: TrackSet,
    ) -> Result<(), NegotiationError> {
        self.calls.push(format!("open {session} with {} tracks", local_tracks.len()));
        Ok(())
    }

    fn create_offer(&mut self, session: CallSessionId) -> Result<(), NegotiationError> {
        self.calls.push(format!("offer {session}"));
        Ok(())
    }

    fn create_answer(
        &mut self,
        session: CallSessionId,
        offer: Payload,
    ) -> Result<(), NegotiationError> {
        self.calls.push(format!("answer {session} to {}", offer.as_str()));
        Ok(())
    }

    fn apply_answer(
        &mut self,
        session: CallSessionId,
        answer: Payload,
    ) -> Result<(), NegotiationError> {
        self.calls.push(format!("apply {session} {}", answer.as_str()));
        Ok(())
    }

    fn replace_track(
        &mut self,
        session: CallSessionId,
        old: TrackId,
        new: MediaTrack,
    ) -> Result<(), NegotiationError> {
        if self.fail_replace {
            return Err(NegotiationError("sender is gone".into()));
        }
        self.calls.push(format!("replace {session} {old} -> {}", new.id));
        Ok(())
    }

    fn close(&mut self, session: CallSessionId) {
        self.closed.push(session);
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeMedia {
    pub user_media_requests: Vec<CallSessionId>,
    pub display_requests: Vec<CallSessionId>,
    pub enabled: Vec<(TrackId, bool)>,
    pub released: Vec<TrackId>,
    pub fail_user_media: bool,
    pub fail_display: bool,
}

impl MediaSource for FakeMedia {
    fn request_user_media(&mut self, session: CallSessionId) -> Result<(), MediaError> {
        if self.fail_user_media {
            return Err(MediaError("no camera".into()));
        }
        self.user_media_requests.push(session);
        Ok(())
    }

    fn request_display(&mut self, session: CallSessionId) -> Result<(), MediaError> {
        if self.fail_display {
            return Err(MediaError("display capture not permitted".into()));
        }
        self.display_requests.push(session);
        Ok(())
    }

    fn set_enabled(&mut self, track: TrackId, enabled: bool) {
        self.enabled.push((track, enabled));
    }

    fn release(&mut self, track: TrackId) {
        self.released.push(track);
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    pub sent: Vec<SignalMessage>,
    pub broken: bool,
}

impl FakeTransport {
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.sent
            .iter()
            .filter_map(|message| match message {
                SignalMessage::Envelope(envelope) => Some(envelope.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SignalingTransport for FakeTransport {
    fn send(&mut self, message: SignalMessage) -> Result<(), TransportError> {
        if self.broken {
            return Err(TransportError::Closed);
        }
        self.sent.push(message);
        Ok(())
    }
}

pub(crate) fn camera_and_mic() -> TrackSet {
    TrackSet::new(vec![
        MediaTrack::audio("mic-1", "microphone"),
        MediaTrack::video("cam-1", "camera"),
    ])
}

pub(crate) fn screen() -> MediaTrack {
    MediaTrack::video("screen-1", "screen")
}
