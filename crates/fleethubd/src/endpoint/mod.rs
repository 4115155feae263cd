//! Method table and request serve loop.
//!
//! An [`Endpoint`] maps method names to exactly one bound [`Handler`]. The
//! serve loop decodes a stream of JSON values from a connection that has
//! already been sniffed as structured, authenticates the agent through
//! `handshake.hello`, and then dispatches each request to its handler in
//! wire order.
//!
//! ## Protocol
//!
//! Requests are JSON objects sent back to back:
//!
//! ```json
//! {"id":1,"method":"handshake.hello","params":{"agent_name":"edge","agent_id":"e-1","token":"t"}}
//! {"id":2,"method":"heartbeat.post","params":{"load":0.2}}
//! ```
//!
//! Each request receives exactly one newline-terminated response carrying
//! either a `result` or an `error` object.

mod builtin;
mod errors;
mod request;
mod response;
mod serve;
#[cfg(test)]
pub(crate) mod test_utils;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::chain::HandleCode;
use crate::context::ConnContext;
use crate::handler::Handler;

pub(crate) use self::builtin::{HandshakeHandler, HeartbeatHandler};
pub use self::errors::{BindError, DispatchError};
pub use self::request::Request;
pub use self::response::{EncodeError, ErrorCode, ResponseEncoder};
pub(crate) use self::serve::ServeLoop;
pub use self::serve::ServeOutcome;

/// Method name of the built-in handshake.
pub const HANDSHAKE_METHOD: &str = "handshake.hello";

/// Method name of the built-in heartbeat.
pub const HEARTBEAT_METHOD: &str = "heartbeat.post";

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Mapping from method name to its bound handler.
#[derive(Clone, Default)]
pub struct Endpoint {
    methods: HashMap<String, Arc<dyn Handler>>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Endpoint")
            .field("methods", &self.methods())
            .finish()
    }
}

impl Endpoint {
    /// Creates an empty method table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `method`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::DuplicateMethod`] if the name is already bound.
    pub fn bind<H>(&mut self, method: impl Into<String>, handler: H) -> Result<(), BindError>
    where
        H: Handler + 'static,
    {
        let method = method.into();
        if self.methods.contains_key(&method) {
            return Err(BindError::duplicate_method(method));
        }
        self.methods.insert(method, Arc::new(handler));
        Ok(())
    }

    /// Sorted list of bound method names.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Routes a request to the handler bound to `method` (exact match).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownMethod`] when nothing is bound.
    pub fn dispatch(
        &self,
        method: &str,
        request: &Request,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> Result<HandleCode, DispatchError> {
        let handler = self
            .methods
            .get(method)
            .ok_or_else(|| DispatchError::unknown_method(method))?;
        Ok(handler.handle(request, encoder, ctx))
    }
}
