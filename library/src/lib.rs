/*!
Call controller for one-to-one audio/video calls negotiated through the
peer-call relay.

The relay hands this client a [ClientId] and forwards [Envelope]s to and from
the peer. [CallController](one_to_one::CallController) decides what to send
and drives the collaborators behind three traits:

- [NegotiationEngine] produces and consumes the opaque offer/answer payloads,
- [MediaSource] captures camera, microphone and display tracks,
- [SignalingTransport] carries [SignalMessage]s to the relay, with
  [WebSocketTransport] as the websocket implementation.

```no_run
use peer_call::one_to_one::{run_event_loop, CallConfig, CallController};
use peer_call::WebSocketTransport;
# use peer_call::{MediaSource, NegotiationEngine};
# async fn example(
#     engine: impl NegotiationEngine,
#     media: impl MediaSource,
# ) -> Result<(), peer_call::TransportError> {
let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
let (updates_tx, mut updates) = tokio::sync::mpsc::unbounded_channel();
let url = "ws://127.0.0.1:9000/one-to-one";
let transport = WebSocketTransport::connect(url, events_tx.clone()).await?;
let controller = CallController::new(CallConfig::default(), engine, media, transport, updates_tx);
tokio::spawn(async move {
    while let Some(update) = updates.recv().await {
        println!("{update:?}");
    }
});
run_event_loop(controller, events_rx).await;
# Ok(())
# }
```
*/

pub mod error;
pub mod media;
pub mod negotiation;
pub mod one_to_one;
pub mod transport;

pub use error::{CallError, DialRefusal, EndReason, MediaError, NegotiationError, TransportError};
pub use media::{MediaEvent, MediaSource, MediaTrack, TrackId, TrackKind, TrackSet};
pub use negotiation::{NegotiationEngine, NegotiationEvent};
pub use peer_call_protocol::one_to_one::{Envelope, EnvelopeKind, SignalMessage};
pub use peer_call_protocol::{ClientId, Payload};
pub use transport::{SignalingTransport, WebSocketTransport};
