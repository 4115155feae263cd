//! Per-connection pipeline: preamble, sniff, then the serve loop.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::ConnContext;
use crate::endpoint::{Endpoint, ResponseEncoder, ServeLoop, ServeOutcome};
use crate::registry::AgentRegistry;
use crate::reporter::HubReporter;
use crate::transport::{
    ConnectionHandler, Payload, PeekReader, sniff_payload, strip_proxy_preamble,
};

use super::SERVER_TARGET;

/// Socket timeouts applied to every accepted connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ConnectionTimeouts {
    pub(crate) read: Option<Duration>,
    pub(crate) write: Option<Duration>,
}

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConnectionOutcome {
    /// The stream failed or ended before a payload was seen.
    Aborted,
    /// The payload did not open a JSON object.
    Unrecognised,
    /// The stream went through the serve loop.
    Served(ServeOutcome),
}

pub(crate) struct HubConnectionHandler {
    endpoint: Arc<Endpoint>,
    registry: AgentRegistry,
    reporter: Arc<dyn HubReporter>,
    timeouts: ConnectionTimeouts,
    next_id: AtomicU64,
}

impl HubConnectionHandler {
    pub(crate) fn new(
        endpoint: Arc<Endpoint>,
        registry: AgentRegistry,
        reporter: Arc<dyn HubReporter>,
        timeouts: ConnectionTimeouts,
    ) -> Self {
        Self {
            endpoint,
            registry,
            reporter,
            timeouts,
            next_id: AtomicU64::new(1),
        }
    }

    fn next_connection_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn apply_timeouts(&self, connection: u64, stream: &TcpStream) {
        let applied = stream
            .set_read_timeout(self.timeouts.read)
            .and_then(|()| stream.set_write_timeout(self.timeouts.write));
        if let Err(error) = applied {
            warn!(
                target: SERVER_TARGET,
                connection,
                %error,
                "failed to apply socket timeouts"
            );
        }
    }

    /// Runs the connection pipeline over an arbitrary byte stream.
    pub(crate) fn serve_stream<R, W>(
        &self,
        connection: u64,
        peer: Option<SocketAddr>,
        reader: R,
        writer: W,
    ) -> ConnectionOutcome
    where
        R: Read,
        W: Write + Send + 'static,
    {
        let mut reader = PeekReader::new(reader);
        let mut ctx = ConnContext::new(connection, peer);

        match strip_proxy_preamble(&mut reader) {
            Ok(Some(line)) => {
                self.reporter.proxy_preamble_stripped(connection, &line);
                ctx.set_proxy_preamble(line);
            }
            Ok(None) => {}
            Err(error) => {
                debug!(target: SERVER_TARGET, connection, %error, "proxy preamble read failed");
                return ConnectionOutcome::Aborted;
            }
        }

        match sniff_payload(&mut reader) {
            Ok(Some(Payload::Structured)) => {}
            Ok(Some(Payload::Unrecognised(prefix))) => {
                self.reporter.unrecognised_payload(connection, &prefix);
                return ConnectionOutcome::Unrecognised;
            }
            Ok(None) => return ConnectionOutcome::Aborted,
            Err(error) => {
                debug!(target: SERVER_TARGET, connection, %error, "payload sniff failed");
                return ConnectionOutcome::Aborted;
            }
        }

        let mut encoder = ResponseEncoder::new(writer);
        let outcome = ServeLoop::new(&self.endpoint, &self.registry).run(
            reader,
            &mut encoder,
            &mut ctx,
        );
        ConnectionOutcome::Served(outcome)
    }
}

impl ConnectionHandler for HubConnectionHandler {
    fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let connection = self.next_connection_id();
        self.reporter.connection_accepted(connection, peer);
        self.apply_timeouts(connection, &stream);
        match stream.try_clone() {
            Ok(writer) => {
                let outcome = self.serve_stream(connection, Some(peer), &stream, writer);
                debug!(
                    target: SERVER_TARGET,
                    connection,
                    outcome = ?outcome,
                    "connection finished"
                );
            }
            Err(error) => {
                debug!(target: SERVER_TARGET, connection, %error, "failed to clone stream");
            }
        }
        self.reporter.connection_closed(connection);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::RwLock;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::auth::AuthenticatorChain;
    use crate::chain::HandleCode;
    use crate::endpoint::test_utils::{EchoHandler, FixedAuthenticator, SharedBuffer, hello};
    use crate::endpoint::{HANDSHAKE_METHOD, HEARTBEAT_METHOD, HandshakeHandler, HeartbeatHandler};
    use crate::reporter::StructuredHubReporter;

    #[fixture]
    fn handler() -> HubConnectionHandler {
        let registry = AgentRegistry::new();
        let reporter: Arc<dyn HubReporter> = Arc::new(StructuredHubReporter::new());
        let mut chain = AuthenticatorChain::new();
        chain.push(FixedAuthenticator(HandleCode::Ok), 0);
        let mut endpoint = Endpoint::new();
        endpoint
            .bind(
                HANDSHAKE_METHOD,
                HandshakeHandler::new(
                    Arc::new(RwLock::new(chain)),
                    registry.clone(),
                    Arc::clone(&reporter),
                ),
            )
            .expect("bind handshake");
        endpoint
            .bind(HEARTBEAT_METHOD, HeartbeatHandler::new(registry.clone()))
            .expect("bind heartbeat");
        endpoint.bind("echo", EchoHandler).expect("bind echo");
        HubConnectionHandler::new(
            Arc::new(endpoint),
            registry,
            reporter,
            ConnectionTimeouts::default(),
        )
    }

    fn serve(handler: &HubConnectionHandler, input: &[u8]) -> (ConnectionOutcome, SharedBuffer) {
        let output = SharedBuffer::default();
        let outcome = handler.serve_stream(1, None, Cursor::new(input.to_vec()), output.clone());
        (outcome, output)
    }

    #[rstest]
    fn proxy_preamble_is_stripped_before_serving(handler: HubConnectionHandler) {
        let input = format!(
            "PROXY TCP4 1.1.1.1 2.2.2.2 1 2\n{}{}",
            hello(1, "edge-1"),
            json!({"id": 2, "method": "echo", "payload": "hi"})
        );

        let (outcome, output) = serve(&handler, input.as_bytes());

        assert_eq!(outcome, ConnectionOutcome::Served(ServeOutcome::EndOfStream));
        let responses = output.values();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["payload"], json!("hi"));
    }

    #[rstest]
    fn leading_whitespace_is_skipped(handler: HubConnectionHandler) {
        let input = format!(
            " \r\n\t{}{}",
            hello(1, "edge-1"),
            json!({"method": "heartbeat.post"})
        );

        let (outcome, output) = serve(&handler, input.as_bytes());

        assert_eq!(outcome, ConnectionOutcome::Served(ServeOutcome::EndOfStream));
        assert_eq!(output.values()[1], json!({"result": {"acknowledged": true}}));
    }

    /// Counts reads that reach the socket side of the pipeline.
    struct CountingReader {
        inner: Cursor<Vec<u8>>,
        reads: Arc<AtomicU64>,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read(buf)
        }
    }

    #[rstest]
    fn request_stream_is_read_in_chunks(handler: HubConnectionHandler) {
        let heartbeat = json!({"method": "heartbeat.post"}).to_string();
        let input = format!("{}{}", hello(1, "edge-1"), heartbeat.repeat(200));
        let reads = Arc::new(AtomicU64::new(0));
        let reader = CountingReader {
            inner: Cursor::new(input.into_bytes()),
            reads: Arc::clone(&reads),
        };
        let output = SharedBuffer::default();

        let outcome = handler.serve_stream(1, None, reader, output.clone());

        assert_eq!(outcome, ConnectionOutcome::Served(ServeOutcome::EndOfStream));
        assert_eq!(output.values().len(), 201);
        assert!(reads.load(Ordering::SeqCst) <= 4, "reads: {reads:?}");
    }

    #[rstest]
    #[case::http(b"GET / HTTP/1.1\r\n\r\n".as_slice())]
    #[case::array(b"[1,2,3]".as_slice())]
    #[case::after_preamble(b"PROXY TCP4 a b 1 2\r\nhello".as_slice())]
    fn unrecognised_payload_closes_without_writing(
        handler: HubConnectionHandler,
        #[case] input: &[u8],
    ) {
        let (outcome, output) = serve(&handler, input);

        assert_eq!(outcome, ConnectionOutcome::Unrecognised);
        assert!(output.is_empty());
    }

    #[rstest]
    #[case::empty(b"".as_slice())]
    #[case::whitespace(b"   \n".as_slice())]
    #[case::unterminated_preamble(b"PROXY TCP4 1.1.1.1".as_slice())]
    fn early_end_of_stream_aborts_silently(handler: HubConnectionHandler, #[case] input: &[u8]) {
        let (outcome, output) = serve(&handler, input);

        assert_eq!(outcome, ConnectionOutcome::Aborted);
        assert!(output.is_empty());
    }
}
