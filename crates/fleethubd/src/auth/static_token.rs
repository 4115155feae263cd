//! Shared-token authenticator used by the daemon binary.

use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::{AUTH_TARGET, Authenticator, Credentials, Responder};
use crate::chain::HandleCode;
use crate::context::ConnContext;

/// Accepts agents presenting a fixed shared token; declines everyone else.
#[derive(Clone)]
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    /// Creates an authenticator for the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StaticTokenAuthenticator")
            .finish_non_exhaustive()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(
        &self,
        credentials: &Credentials,
        responder: &mut Responder<'_>,
        ctx: &ConnContext,
    ) -> HandleCode {
        let matches: bool = credentials
            .token
            .as_bytes()
            .ct_eq(self.token.as_bytes())
            .into();
        if !matches {
            return HandleCode::Declined;
        }
        let result = json!({
            "authenticated": true,
            "agent_name": credentials.agent_name,
            "agent_id": credentials.agent_id,
        });
        match responder.respond(&result) {
            Ok(()) => HandleCode::Ok,
            Err(error) => {
                warn!(
                    target: AUTH_TARGET,
                    connection = ctx.id(),
                    %error,
                    "failed to answer handshake"
                );
                HandleCode::Fail
            }
        }
    }
}
