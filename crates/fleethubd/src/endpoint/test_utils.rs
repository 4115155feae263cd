//! Test helpers for the endpoint module.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::auth::{Authenticator, Credentials, Responder};
use crate::chain::HandleCode;
use crate::context::ConnContext;
use crate::handler::Handler;

use super::{Request, ResponseEncoder};

/// In-memory sink that can be inspected after being moved into an encoder.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub(crate) fn text(&self) -> String {
        let bytes = self.bytes.lock().expect("buffer lock").clone();
        String::from_utf8(bytes).expect("utf8 output")
    }

    /// Parses every newline-terminated value written so far.
    pub(crate) fn values(&self) -> Vec<Value> {
        self.text()
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.lock().expect("buffer lock").is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handler that writes the decoded request back verbatim.
pub(crate) struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(
        &self,
        request: &Request,
        encoder: &mut ResponseEncoder,
        _ctx: &mut ConnContext,
    ) -> HandleCode {
        match encoder.encode(request.raw()) {
            Ok(()) => HandleCode::Ok,
            Err(_) => HandleCode::Fail,
        }
    }
}

/// Handler that always fails without responding.
pub(crate) struct FailingHandler;

impl Handler for FailingHandler {
    fn handle(
        &self,
        _request: &Request,
        _encoder: &mut ResponseEncoder,
        _ctx: &mut ConnContext,
    ) -> HandleCode {
        HandleCode::Fail
    }
}

/// Authenticator returning a fixed code; answers with a welcome on `Ok`.
pub(crate) struct FixedAuthenticator(pub(crate) HandleCode);

impl Authenticator for FixedAuthenticator {
    fn authenticate(
        &self,
        credentials: &Credentials,
        responder: &mut Responder<'_>,
        _ctx: &ConnContext,
    ) -> HandleCode {
        if self.0 == HandleCode::Ok
            && responder
                .respond(&json!({"welcome": credentials.agent_name}))
                .is_err()
        {
            return HandleCode::Fail;
        }
        self.0
    }
}

/// Handshake request line for the given agent id.
pub(crate) fn hello(id: u64, agent_id: &str) -> String {
    json!({
        "id": id,
        "method": "handshake.hello",
        "params": {"agent_name": "scout", "agent_id": agent_id, "token": "t"},
    })
    .to_string()
}
