/*!
Helper crate that declares common types and structures shared between the
[peer-call](../peer_call/index.html) call controller and the
[peer-call-signaling-server](../peer_call_signaling_server/index.html) relay.
*/

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    num::ParseIntError,
    str::FromStr,
};

pub mod one_to_one;

/// Unique identifier the relay assigns to each connected client.
///
/// Valid for the lifetime of one transport connection and never handed out
/// again after that connection goes away.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Wrap u64 into a ClientId struct
    pub const fn new(inner: u64) -> Self {
        ClientId(inner)
    }

    /// Acquire the underlying type
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for ClientId {
    fn from(val: u64) -> Self {
        ClientId(val)
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Client-{}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("Client-").unwrap_or(s);
        Ok(ClientId(digits.parse()?))
    }
}

/// Opaque negotiation blob produced and consumed by the negotiation engine.
/// Neither the relay nor the call controller look inside it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    pub fn new(inner: impl Into<String>) -> Self {
        Payload(inner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
