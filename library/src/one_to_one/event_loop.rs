use log::debug;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::{CallController, ControllerEvent};
use crate::media::MediaSource;
use crate::negotiation::NegotiationEngine;
use crate::transport::SignalingTransport;

/// Feed `controller` from `events` until every sender is gone, posting
/// [ControllerEvent::Timeout] whenever the current session's deadline passes.
///
/// Returns the controller so that its final state can be inspected.
pub async fn run_event_loop<N, M, T>(
    mut controller: CallController<N, M, T>,
    mut events: mpsc::UnboundedReceiver<ControllerEvent>,
) -> CallController<N, M, T>
where
    N: NegotiationEngine,
    M: MediaSource,
    T: SignalingTransport,
{
    loop {
        let event = match controller.deadline() {
            Some((session, deadline)) => tokio::select! {
                event = events.recv() => event,
                _ = sleep_until(Instant::from_std(deadline)) => {
                    Some(ControllerEvent::Timeout(session))
                }
            },
            None => events.recv().await,
        };
        let Some(event) = event else {
            debug!("event queue closed, stopping call controller");
            break;
        };
        controller.handle(event);
    }
    controller
}
