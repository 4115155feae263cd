//! TCP listener and pre-framing stream inspection.
//!
//! The listener accepts connections on a background thread and hands each
//! one to a [`ConnectionHandler`] on its own thread. Before a connection is
//! framed as JSON, [`strip_proxy_preamble`] and [`sniff_payload`] look at its
//! first bytes without losing them.

mod errors;
mod handler;
mod listener;
mod sniff;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub(crate) use self::handler::ConnectionHandler;
pub(crate) use self::listener::{ListenerHandle, SocketListener};
pub(crate) use self::sniff::{Payload, PeekReader, sniff_payload, strip_proxy_preamble};
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
