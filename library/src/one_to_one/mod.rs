/*!
One-to-one call controller.

[CallController] is a synchronous state machine. Every input (user actions,
relay messages, negotiation engine and media source results, timeouts) is a
[ControllerEvent] fed to [CallController::handle] from a single queue, see
[run_event_loop]. Asynchronous collaborators never block a transition: they
are asked to start work and report back by posting another event tagged with
the [CallSessionId] it belongs to.

Caller: `Idle -> Dialing -> AwaitingAnswer -> Active -> Ending -> Idle`.
Callee: `Idle -> Ringing -> Active -> Ending -> Idle`.
 */

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc;

use peer_call_protocol::one_to_one::{Envelope, EnvelopeKind, SignalMessage};
use peer_call_protocol::{ClientId, Payload};

use crate::error::{CallError, DialRefusal, EndReason, MediaError, NegotiationError};
use crate::media::{MediaEvent, MediaSource, MediaTrack, TrackId, TrackKind, TrackSet};
use crate::negotiation::{NegotiationEngine, NegotiationEvent};
use crate::transport::SignalingTransport;

mod event_loop;
mod session;
#[cfg(test)]
mod test_support;

pub use event_loop::run_event_loop;
use session::Pending;
pub use session::{CallSession, CallSessionId, CallState};

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RING_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallConfig {
    /// How long a caller waits for the offer to be produced and answered.
    pub dial_timeout: Duration,
    /// How long an incoming call rings, and how long an accepted call may
    /// take to produce its answer.
    pub ring_timeout: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        CallConfig {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            ring_timeout: DEFAULT_RING_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Dial(ClientId),
    Accept,
    Decline,
    HangUp,
    ToggleMute,
    ToggleVideo,
    StartScreenShare,
    StopScreenShare,
    /// Message received from the relay
    Signal(SignalMessage),
    Negotiation(NegotiationEvent),
    Media(MediaEvent),
    Timeout(CallSessionId),
    /// Signaling connection is gone
    Disconnected,
}

/// What the presentation layer gets to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallUpdate {
    LocalId(ClientId),
    StateChanged(CallState),
    IncomingCall(ClientId),
    RemoteTrack(MediaTrack),
    MediaUnavailable(String),
    /// `Dial` was refused, any call in progress is unaffected
    DialRefused { peer: ClientId, reason: DialRefusal },
    Ended { peer: ClientId, reason: EndReason },
}

pub struct CallController<N, M, T> {
    config: CallConfig,
    engine: N,
    media: M,
    transport: T,
    updates: mpsc::UnboundedSender<CallUpdate>,
    local_id: Option<ClientId>,
    session: Option<CallSession>,
    last_session_id: u64,
}

impl<N, M, T> CallController<N, M, T>
where
    N: NegotiationEngine,
    M: MediaSource,
    T: SignalingTransport,
{
    pub fn new(
        config: CallConfig,
        engine: N,
        media: M,
        transport: T,
        updates: mpsc::UnboundedSender<CallUpdate>,
    ) -> Self {
        CallController {
            config,
            engine,
            media,
            transport,
            updates,
            local_id: None,
            session: None,
            last_session_id: 0,
        }
    }

    /// Identifier assigned by the relay, if connected.
    pub fn local_id(&self) -> Option<ClientId> {
        self.local_id
    }

    pub fn state(&self) -> CallState {
        self.session
            .as_ref()
            .map_or(CallState::Idle, |session| session.state)
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    /// When the current session gives up waiting.
    pub fn deadline(&self) -> Option<(CallSessionId, Instant)> {
        let session = self.session.as_ref()?;
        Some((session.id, session.deadline?))
    }

    pub fn engine(&self) -> &N {
        &self.engine
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply one event. Failures end the current call and never escape.
    pub fn handle(&mut self, event: ControllerEvent) {
        let result = match event {
            ControllerEvent::Dial(peer) => self.dial(peer),
            ControllerEvent::Accept => self.accept(),
            ControllerEvent::Decline => {
                self.decline();
                Ok(())
            }
            ControllerEvent::HangUp => {
                self.hang_up();
                Ok(())
            }
            ControllerEvent::ToggleMute => {
                self.toggle(TrackKind::Audio);
                Ok(())
            }
            ControllerEvent::ToggleVideo => {
                self.toggle(TrackKind::Video);
                Ok(())
            }
            ControllerEvent::StartScreenShare => {
                self.start_screen_share();
                Ok(())
            }
            ControllerEvent::StopScreenShare => self.stop_screen_share(),
            ControllerEvent::Signal(message) => self.on_signal(message),
            ControllerEvent::Negotiation(event) => self.on_negotiation(event),
            ControllerEvent::Media(event) => self.on_media(event),
            ControllerEvent::Timeout(session) => {
                self.on_timeout(session);
                Ok(())
            }
            ControllerEvent::Disconnected => {
                info!("signaling connection lost");
                self.local_id = None;
                self.finish(EndReason::ChannelLoss);
                Ok(())
            }
        };
        if let Err(error) = result {
            warn!("call failed: {error}");
            self.finish(error.end_reason());
        }
    }

    fn dial(&mut self, peer: ClientId) -> Result<(), CallError> {
        let refusal = match (self.local_id, &self.session) {
            (None, _) => Some(DialRefusal::NotConnected),
            (Some(_), Some(session)) => Some(DialRefusal::Busy(session.peer)),
            (Some(local_id), None) if local_id == peer => Some(DialRefusal::SelfCall),
            (Some(_), None) => None,
        };
        if let Some(reason) = refusal {
            warn!("not calling {peer}: {reason}");
            self.notify(CallUpdate::DialRefused { peer, reason });
            return Ok(());
        }

        let id = self.next_session_id();
        let mut session = CallSession::new(id, peer, CallState::Dialing);
        session.pending = Some(Pending::UserMedia);
        session.deadline = Some(Instant::now() + self.config.dial_timeout);
        self.session = Some(session);
        info!("{id}: calling {peer}");
        self.notify(CallUpdate::StateChanged(CallState::Dialing));

        self.media.request_user_media(id)?;
        Ok(())
    }

    fn accept(&mut self) -> Result<(), CallError> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.state == CallState::Ringing)
        else {
            warn!("no incoming call to accept");
            return Ok(());
        };
        session.pending = Some(Pending::UserMedia);
        session.deadline = Some(Instant::now() + self.config.ring_timeout);
        let id = session.id;
        self.set_state(CallState::Active {
            screen_sharing: false,
        });

        self.media.request_user_media(id)?;
        Ok(())
    }

    fn decline(&mut self) {
        if self.state() == CallState::Ringing {
            self.finish(EndReason::Declined);
        } else {
            warn!("no incoming call to decline");
        }
    }

    fn hang_up(&mut self) {
        match self.state() {
            CallState::Idle => debug!("nothing to hang up"),
            CallState::Ringing => self.finish(EndReason::Declined),
            _ => self.finish(EndReason::LocalHangUp),
        }
    }

    fn toggle(&mut self, kind: TrackKind) {
        let Some(session) = self.session.as_mut() else {
            warn!("no call to toggle {kind:?} on");
            return;
        };
        let track = match (kind, session.retained_camera.as_mut()) {
            (TrackKind::Video, Some(camera)) => Some(camera),
            _ => session.local_tracks.first_mut(kind),
        };
        let Some(track) = track else {
            warn!("no local {kind:?} track to toggle");
            return;
        };
        track.enabled = !track.enabled;
        let (id, enabled) = (track.id.clone(), track.enabled);
        info!("{kind:?} track {id} enabled: {enabled}");
        self.media.set_enabled(id, enabled);
    }

    fn start_screen_share(&mut self) {
        let Some(session) = self.session.as_mut().filter(|session| {
            session.state
                == CallState::Active {
                    screen_sharing: false,
                }
                && !session.display_requested
        }) else {
            warn!("screen share can only start during a call without one");
            return;
        };
        session.display_requested = true;
        let id = session.id;

        if let Err(error) = self.media.request_display(id) {
            if let Some(session) = self.session.as_mut() {
                session.display_requested = false;
            }
            warn!("{id}: {error}");
            self.notify(CallUpdate::MediaUnavailable(error.to_string()));
        }
    }

    fn stop_screen_share(&mut self) -> Result<(), CallError> {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.is_screen_sharing())
        else {
            warn!("not sharing the screen");
            return Ok(());
        };
        let (Some(camera), Some(display)) = (
            session.retained_camera.clone(),
            session.local_tracks.video().cloned(),
        ) else {
            warn!("{}: screen share lost track of its video slot", session.id);
            return Ok(());
        };
        let id = session.id;

        self.engine
            .replace_track(id, display.id.clone(), camera.clone())?;
        session.local_tracks.replace(&display.id, camera);
        session.retained_camera = None;
        self.media.release(display.id);
        info!("{id}: screen share stopped");
        self.set_state(CallState::Active {
            screen_sharing: false,
        });
        Ok(())
    }

    fn on_signal(&mut self, message: SignalMessage) -> Result<(), CallError> {
        match message {
            SignalMessage::YourIdentifier(id) => {
                info!("relay assigned identifier {id}");
                self.local_id = Some(id);
                self.notify(CallUpdate::LocalId(id));
            }
            SignalMessage::Envelope(envelope) => return self.on_envelope(envelope),
            SignalMessage::RoutingMiss { to, kind } => {
                if self.session.as_ref().map(|session| session.peer) == Some(to) {
                    info!("{kind} to {to} was not delivered");
                    self.finish(EndReason::PeerUnreachable);
                } else {
                    debug!("{kind} to {to} was not delivered");
                }
            }
            SignalMessage::Error(reason) => warn!("relay rejected a message: {reason}"),
        }
        Ok(())
    }

    fn on_envelope(&mut self, envelope: Envelope) -> Result<(), CallError> {
        let Some(local_id) = self.local_id else {
            warn!("{} received before an identifier was assigned", envelope.kind);
            return Ok(());
        };
        if envelope.to != local_id {
            warn!("{} addressed to {} ignored", envelope.kind, envelope.to);
            return Ok(());
        }

        let current = self
            .session
            .as_ref()
            .map(|session| (session.peer, session.state));
        match (envelope.kind, current) {
            (EnvelopeKind::CallOffer, None) => self.on_offer(envelope.from, envelope.payload),
            (EnvelopeKind::CallOffer, Some((peer, _))) if peer != envelope.from => {
                info!("busy with {peer}, rejecting call from {}", envelope.from);
                let rejection = Envelope::call_ended(local_id, envelope.from);
                self.transport.send(SignalMessage::Envelope(rejection))?;
                Ok(())
            }
            (EnvelopeKind::CallOffer, Some((peer, CallState::Dialing | CallState::AwaitingAnswer)))
                if envelope.payload.is_some() =>
            {
                if local_id < peer {
                    info!("call with {peer} crossed ours, answering theirs instead");
                    self.abandon_dial();
                    self.on_offer(envelope.from, envelope.payload)
                } else {
                    info!("call with {peer} crossed ours, keeping ours");
                    Ok(())
                }
            }
            (EnvelopeKind::CallAccepted, Some((peer, CallState::AwaitingAnswer)))
                if peer == envelope.from =>
            {
                self.on_accepted(envelope.payload)
            }
            (EnvelopeKind::CallEnded, Some((peer, _))) if peer == envelope.from => {
                self.finish(EndReason::RemoteHangUp);
                Ok(())
            }
            (kind, _) => {
                warn!(
                    "unexpected {kind} from {} in state {:?}",
                    envelope.from,
                    self.state()
                );
                Ok(())
            }
        }
    }

    fn on_offer(&mut self, from: ClientId, payload: Option<Payload>) -> Result<(), CallError> {
        let Some(offer) = payload else {
            warn!("call offer from {from} carries no payload");
            return Ok(());
        };
        let id = self.next_session_id();
        let mut session = CallSession::new(id, from, CallState::Ringing);
        session.pending_offer = Some(offer);
        session.peer_aware = true;
        session.deadline = Some(Instant::now() + self.config.ring_timeout);
        self.session = Some(session);
        info!("{id}: incoming call from {from}");
        self.notify(CallUpdate::StateChanged(CallState::Ringing));
        self.notify(CallUpdate::IncomingCall(from));
        Ok(())
    }

    /// Drop our own outgoing attempt without telling the peer.
    fn abandon_dial(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.engine.close(session.id);
        for track in session.local_tracks.iter() {
            self.media.release(track.id.clone());
        }
        debug!("{}: outgoing call to {} abandoned", session.id, session.peer);
    }

    fn on_accepted(&mut self, payload: Option<Payload>) -> Result<(), CallError> {
        let answer =
            payload.ok_or_else(|| NegotiationError("call accepted without an answer".into()))?;
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.deadline = None;
        let id = session.id;

        self.engine.apply_answer(id, answer)?;
        self.set_state(CallState::Active {
            screen_sharing: false,
        });
        Ok(())
    }

    fn on_negotiation(&mut self, event: NegotiationEvent) -> Result<(), CallError> {
        match event {
            NegotiationEvent::LocalPayloadReady { session, payload } => {
                self.on_local_payload(session, payload)
            }
            NegotiationEvent::RemoteTrack { session, track } => {
                let Some(current) = matching(&mut self.session, session) else {
                    debug!("remote track for finished {session} ignored");
                    return Ok(());
                };
                info!("{session}: remote {:?} track {} arrived", track.kind, track.id);
                current.remote_tracks.push(track.clone());
                self.notify(CallUpdate::RemoteTrack(track));
                Ok(())
            }
            NegotiationEvent::Failed { session, reason } => {
                if matching(&mut self.session, session).is_some() {
                    Err(NegotiationError(reason).into())
                } else {
                    debug!("failure of finished {session} ignored: {reason}");
                    Ok(())
                }
            }
        }
    }

    fn on_local_payload(&mut self, id: CallSessionId, payload: Payload) -> Result<(), CallError> {
        let Some(local_id) = self.local_id else {
            warn!("{id}: payload ready but no identifier assigned");
            return Ok(());
        };
        let Some(session) = matching(&mut self.session, id) else {
            debug!("payload of finished {id} dropped");
            return Ok(());
        };
        let peer = session.peer;
        match (session.pending, session.state) {
            (Some(Pending::LocalOffer), CallState::Dialing) => {
                session.pending = None;
                session.peer_aware = true;
                let offer = Envelope::call_offer(local_id, peer, payload);
                self.transport.send(SignalMessage::Envelope(offer))?;
                self.set_state(CallState::AwaitingAnswer);
            }
            (Some(Pending::LocalAnswer), CallState::Active { .. }) => {
                session.pending = None;
                session.deadline = None;
                let answer = Envelope::call_accepted(local_id, peer, payload);
                self.transport.send(SignalMessage::Envelope(answer))?;
                info!("{id}: answer sent to {peer}");
            }
            (pending, state) => {
                warn!("{id}: unexpected local payload, waiting on {pending:?} in {state:?}")
            }
        }
        Ok(())
    }

    fn on_media(&mut self, event: MediaEvent) -> Result<(), CallError> {
        match event {
            MediaEvent::UserMediaReady { session, tracks } => self.on_user_media(session, tracks),
            MediaEvent::UserMediaFailed { session, reason } => {
                if matching(&mut self.session, session).is_some() {
                    Err(MediaError(reason).into())
                } else {
                    Ok(())
                }
            }
            MediaEvent::DisplayReady { session, track } => self.on_display(session, track),
            MediaEvent::DisplayFailed { session, reason } => {
                let Some(current) = matching(&mut self.session, session) else {
                    return Ok(());
                };
                current.display_requested = false;
                warn!("{session}: display capture failed: {reason}");
                self.notify(CallUpdate::MediaUnavailable(reason));
                Ok(())
            }
            MediaEvent::TrackEnded(track) => self.on_track_ended(track),
        }
    }

    fn on_user_media(&mut self, id: CallSessionId, tracks: TrackSet) -> Result<(), CallError> {
        let Some(session) = matching(&mut self.session, id)
            .filter(|session| session.pending == Some(Pending::UserMedia))
        else {
            debug!("releasing media captured for finished {id}");
            for track in tracks.iter() {
                self.media.release(track.id.clone());
            }
            return Ok(());
        };
        session.local_tracks = tracks.clone();
        let state = session.state;
        let offer = session.pending_offer.take();
        session.pending = Some(match state {
            CallState::Dialing => Pending::LocalOffer,
            _ => Pending::LocalAnswer,
        });

        self.engine.open(id, tracks)?;
        match (state, offer) {
            (CallState::Dialing, _) => self.engine.create_offer(id)?,
            (_, Some(offer)) => self.engine.create_answer(id, offer)?,
            (_, None) => return Err(NegotiationError("no stored offer to answer".into()).into()),
        }
        Ok(())
    }

    fn on_display(&mut self, id: CallSessionId, track: MediaTrack) -> Result<(), CallError> {
        let Some(session) = matching(&mut self.session, id).filter(|session| {
            session.display_requested
                && session.state
                    == CallState::Active {
                        screen_sharing: false,
                    }
        }) else {
            debug!("releasing display captured for finished {id}");
            self.media.release(track.id);
            return Ok(());
        };
        session.display_requested = false;
        let Some(camera) = session.local_tracks.video().cloned() else {
            warn!("{id}: no outgoing video track to replace");
            self.media.release(track.id);
            self.notify(CallUpdate::MediaUnavailable("no video track to share into".into()));
            return Ok(());
        };

        if let Err(error) = self
            .engine
            .replace_track(id, camera.id.clone(), track.clone())
        {
            self.media.release(track.id);
            return Err(error.into());
        }
        session.local_tracks.replace(&camera.id, track);
        session.retained_camera = Some(camera);
        info!("{id}: screen share started");
        self.set_state(CallState::Active {
            screen_sharing: true,
        });
        Ok(())
    }

    fn on_track_ended(&mut self, track: TrackId) -> Result<(), CallError> {
        let Some(session) = self.session.as_ref() else {
            debug!("track {track} ended outside of a call");
            return Ok(());
        };
        let is_display = session.is_screen_sharing()
            && session.local_tracks.video().map(|t| &t.id) == Some(&track);
        if is_display {
            info!("{}: display capture ended by the user", session.id);
            return self.stop_screen_share();
        }
        if session.local_tracks.get(&track).is_some() {
            warn!("{}: local track {track} ended", session.id);
        }
        Ok(())
    }

    fn on_timeout(&mut self, id: CallSessionId) {
        let expired =
            matching(&mut self.session, id).is_some_and(|session| session.deadline.is_some());
        if expired {
            info!("{id}: timed out in state {:?}", self.state());
            self.finish(EndReason::Timeout);
        } else {
            debug!("stale timeout for {id}");
        }
    }

    /// Tear the current session down and return to idle.
    fn finish(&mut self, reason: EndReason) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.state = CallState::Ending;
        self.notify(CallUpdate::StateChanged(CallState::Ending));

        if session.peer_aware && reason.tells_peer() {
            if let Some(local_id) = self.local_id {
                let ended = Envelope::call_ended(local_id, session.peer);
                if let Err(error) = self.transport.send(SignalMessage::Envelope(ended)) {
                    warn!("could not tell {} the call ended: {error}", session.peer);
                }
            }
        }
        self.engine.close(session.id);
        for track in session.local_tracks.iter() {
            self.media.release(track.id.clone());
        }
        if let Some(camera) = session.retained_camera.take() {
            self.media.release(camera.id);
        }

        info!("{}: call with {} ended: {reason}", session.id, session.peer);
        self.notify(CallUpdate::Ended {
            peer: session.peer,
            reason,
        });
        self.notify(CallUpdate::StateChanged(CallState::Idle));
    }

    fn set_state(&mut self, state: CallState) {
        if let Some(session) = self.session.as_mut() {
            debug!("{}: {:?} -> {state:?}", session.id, session.state);
            session.state = state;
        }
        self.notify(CallUpdate::StateChanged(state));
    }

    fn next_session_id(&mut self) -> CallSessionId {
        self.last_session_id += 1;
        CallSessionId::new(self.last_session_id)
    }

    fn notify(&self, update: CallUpdate) {
        // consumer may have gone away, the call goes on regardless
        let _ = self.updates.send(update);
    }
}

fn matching(session: &mut Option<CallSession>, id: CallSessionId) -> Option<&mut CallSession> {
    session.as_mut().filter(|session| session.id == id)
}
