/*!
Relay half of peer-call: hands every websocket client a [ClientId](peer_call_protocol::ClientId)
and forwards call envelopes between two of them.

Clients connect to the `/one-to-one` path and exchange MessagePack encoded
[SignalMessage](peer_call_protocol::one_to_one::SignalMessage)s in binary frames.
*/

use warp::Filter;

pub mod config;
pub mod one_to_one;

/// Websocket route serving the relay, shared by the binary and the tests.
pub fn signaling_routes(
    relay: one_to_one::Relay,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let relay = warp::any().map(move || relay.clone());
    warp::path("one-to-one")
        .and(warp::ws())
        .and(relay)
        .map(|ws: warp::ws::Ws, relay: one_to_one::Relay| {
            ws.on_upgrade(move |socket| one_to_one::user_connected(socket, relay))
        })
}
