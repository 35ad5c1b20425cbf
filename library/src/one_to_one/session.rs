use std::fmt::{Display, Formatter};
use std::time::Instant;

use peer_call_protocol::{ClientId, Payload};

use crate::media::{MediaTrack, TrackSet};

/// Controller-local tag of one call attempt. Late results of asynchronous work
/// carry it, so anything addressed to a finished call can be recognised and dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSessionId(u64);

impl CallSessionId {
    pub fn new(inner: u64) -> Self {
        CallSessionId(inner)
    }
}

impl Display for CallSessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Call-{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CallState {
    Idle,
    /// Caller is capturing media and producing the offer
    Dialing,
    /// Offer sent, waiting for `CallAccepted`
    AwaitingAnswer,
    /// Callee holds an offer the user has not answered yet
    Ringing,
    Active {
        screen_sharing: bool,
    },
    /// Tearing down, always followed by `Idle`
    Ending,
}

/// Asynchronous step the session is waiting on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Pending {
    UserMedia,
    LocalOffer,
    LocalAnswer,
}

#[derive(Debug)]
pub struct CallSession {
    pub(crate) id: CallSessionId,
    pub(crate) peer: ClientId,
    pub(crate) state: CallState,
    pub(crate) local_tracks: TrackSet,
    pub(crate) remote_tracks: TrackSet,
    /// Offer received while ringing, consumed when producing the answer.
    pub(crate) pending_offer: Option<Payload>,
    pub(crate) pending: Option<Pending>,
    /// Whether the peer has heard of this call.
    pub(crate) peer_aware: bool,
    /// Camera track set aside while the display occupies its slot.
    pub(crate) retained_camera: Option<MediaTrack>,
    pub(crate) display_requested: bool,
    pub(crate) deadline: Option<Instant>,
}

impl CallSession {
    pub(crate) fn new(id: CallSessionId, peer: ClientId, state: CallState) -> Self {
        CallSession {
            id,
            peer,
            state,
            local_tracks: TrackSet::default(),
            remote_tracks: TrackSet::default(),
            pending_offer: None,
            pending: None,
            peer_aware: false,
            retained_camera: None,
            display_requested: false,
            deadline: None,
        }
    }

    pub fn id(&self) -> CallSessionId {
        self.id
    }

    pub fn peer(&self) -> ClientId {
        self.peer
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn local_tracks(&self) -> &TrackSet {
        &self.local_tracks
    }

    pub fn remote_tracks(&self) -> &TrackSet {
        &self.remote_tracks
    }

    pub fn retained_camera(&self) -> Option<&MediaTrack> {
        self.retained_camera.as_ref()
    }

    pub fn is_screen_sharing(&self) -> bool {
        matches!(
            self.state,
            CallState::Active {
                screen_sharing: true
            }
        )
    }
}
