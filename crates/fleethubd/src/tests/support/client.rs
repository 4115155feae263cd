//! Minimal TCP agent used to drive a running server.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::{Value, json};

/// Line-oriented client speaking the hub's JSON protocol.
pub struct AgentClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl AgentClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to hub");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("set read timeout");
        let reader = BufReader::new(stream.try_clone().expect("clone stream"));
        Self { stream, reader }
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("write to hub");
        self.stream.flush().expect("flush");
    }

    pub fn send(&mut self, request: &Value) {
        self.send_raw(request.to_string().as_bytes());
    }

    pub fn hello(&mut self, agent_id: &str, token: &str) {
        self.send(&json!({
            "id": "hello",
            "method": "handshake.hello",
            "params": {"agent_name": "scout", "agent_id": agent_id, "token": token},
        }));
    }

    /// Signals end of requests; the hub finishes the connection afterwards.
    pub fn finish_writing(&self) {
        self.stream
            .shutdown(Shutdown::Write)
            .expect("shutdown write half");
    }

    /// Reads the next response, or `None` once the hub closed the stream.
    pub fn read_response(&mut self) -> Option<Value> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(serde_json::from_str(&line).expect("json response")),
            Err(error) if is_reset(&error) => None,
            Err(error) => panic!("failed to read response: {error}"),
        }
    }

    /// Returns `true` when the hub has closed the connection.
    pub fn is_closed(&mut self) -> bool {
        self.read_response().is_none()
    }
}

fn is_reset(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}
