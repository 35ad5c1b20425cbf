/*!
Media tracks and the capture source contract.

Capturing is asynchronous: [MediaSource] requests return right away and the
result comes back later as a [MediaEvent] posted to the controller's queue.
 */

use std::fmt::{Display, Formatter};

use crate::error::MediaError;
use crate::one_to_one::CallSessionId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(inner: impl Into<String>) -> Self {
        TrackId(inner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Handle to one media track. `enabled == false` keeps the track in place but
/// makes it emit silence or blank frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: TrackId,
    pub kind: TrackKind,
    pub label: String,
    pub enabled: bool,
}

impl MediaTrack {
    pub fn audio(id: impl Into<String>, label: impl Into<String>) -> Self {
        MediaTrack {
            id: TrackId::new(id),
            kind: TrackKind::Audio,
            label: label.into(),
            enabled: true,
        }
    }

    pub fn video(id: impl Into<String>, label: impl Into<String>) -> Self {
        MediaTrack {
            id: TrackId::new(id),
            kind: TrackKind::Video,
            label: label.into(),
            enabled: true,
        }
    }
}

/// Ordered set of tracks currently flowing in one direction of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSet {
    tracks: Vec<MediaTrack>,
}

impl TrackSet {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        TrackSet { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn push(&mut self, track: MediaTrack) {
        self.tracks.push(track);
    }

    pub fn get(&self, id: &TrackId) -> Option<&MediaTrack> {
        self.tracks.iter().find(|track| &track.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &TrackId) -> Option<&mut MediaTrack> {
        self.tracks.iter_mut().find(|track| &track.id == id)
    }

    /// First audio track.
    pub fn audio(&self) -> Option<&MediaTrack> {
        self.first_of(TrackKind::Audio)
    }

    /// First video track.
    pub fn video(&self) -> Option<&MediaTrack> {
        self.first_of(TrackKind::Video)
    }

    fn first_of(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|track| track.kind == kind)
    }

    pub(crate) fn first_mut(&mut self, kind: TrackKind) -> Option<&mut MediaTrack> {
        self.tracks.iter_mut().find(|track| track.kind == kind)
    }

    /// Put `track` into the slot held by `id`, returning the previous occupant.
    /// Slot order and every other track stay as they are.
    pub fn replace(&mut self, id: &TrackId, track: MediaTrack) -> Option<MediaTrack> {
        let slot = self.tracks.iter_mut().find(|slot| &slot.id == id)?;
        Some(std::mem::replace(slot, track))
    }

    /// Returns false when no track has that id.
    pub fn set_enabled(&mut self, id: &TrackId, enabled: bool) -> bool {
        match self.get_mut(id) {
            Some(track) => {
                track.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

/// Results of capture requests and track lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    UserMediaReady {
        session: CallSessionId,
        tracks: TrackSet,
    },
    UserMediaFailed {
        session: CallSessionId,
        reason: String,
    },
    /// Video-only track of the captured display
    DisplayReady {
        session: CallSessionId,
        track: MediaTrack,
    },
    DisplayFailed {
        session: CallSessionId,
        reason: String,
    },
    /// The track stopped producing media on its own, e.g. the user revoked
    /// screen capture through the OS.
    TrackEnded(TrackId),
}

/// Camera, microphone and display capture.
pub trait MediaSource {
    /// Start capturing camera and microphone, answered by
    /// [MediaEvent::UserMediaReady] or [MediaEvent::UserMediaFailed].
    fn request_user_media(&mut self, session: CallSessionId) -> Result<(), MediaError>;

    /// Start capturing a display, answered by [MediaEvent::DisplayReady]
    /// or [MediaEvent::DisplayFailed].
    fn request_display(&mut self, session: CallSessionId) -> Result<(), MediaError>;

    fn set_enabled(&mut self, track: TrackId, enabled: bool);

    /// Stop the track and free the device behind it.
    fn release(&mut self, track: TrackId);
}
