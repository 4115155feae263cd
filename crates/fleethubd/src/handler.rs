//! Request handlers and handler composition.
//!
//! A [`Handler`] processes one decoded request for the method it is bound
//! to. Several candidate handlers can share one method slot through a
//! [`HandlerChain`], which tries them in descending priority order (higher
//! numbers first) until one succeeds.

use std::fmt;
use std::sync::Arc;

use crate::chain::{ChainOrder, HandleCode, PriorityChain};
use crate::context::ConnContext;
use crate::endpoint::{Request, ResponseEncoder};

/// Processes one decoded request.
///
/// A handler returning [`HandleCode::Ok`] must have written exactly one
/// response value through the encoder. Any other result must leave the
/// encoder untouched; the serve loop reports the failure to the peer.
pub trait Handler: Send + Sync {
    /// Handles the request.
    fn handle(
        &self,
        request: &Request,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> HandleCode;
}

impl<T> Handler for Arc<T>
where
    T: Handler + ?Sized,
{
    fn handle(
        &self,
        request: &Request,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> HandleCode {
        (**self).handle(request, encoder, ctx)
    }
}

/// Handlers tried in descending priority order until one returns `Ok`.
#[derive(Clone)]
pub struct HandlerChain {
    chain: PriorityChain<Arc<dyn Handler>>,
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let priorities: Vec<i32> = self.chain.iter().map(|entry| entry.priority()).collect();
        formatter
            .debug_struct("HandlerChain")
            .field("priorities", &priorities)
            .finish()
    }
}

impl HandlerChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: PriorityChain::new(ChainOrder::Descending),
        }
    }

    /// Adds a handler; higher priorities run earlier.
    pub fn push<H>(&mut self, handler: H, priority: i32)
    where
        H: Handler + 'static,
    {
        self.chain.push(Arc::new(handler), priority);
    }

    /// Number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` when no handler is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl Handler for HandlerChain {
    fn handle(
        &self,
        request: &Request,
        encoder: &mut ResponseEncoder,
        ctx: &mut ConnContext,
    ) -> HandleCode {
        let code = self
            .chain
            .iterate(HandleCode::Fail, HandleCode::is_ok, |handler| {
                handler.handle(request, encoder, ctx)
            });
        if code.is_ok() {
            HandleCode::Ok
        } else {
            HandleCode::Fail
        }
    }
}
