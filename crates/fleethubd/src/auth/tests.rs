//! Tests for authenticator chain ordering and short-circuit rules.

use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::endpoint::ResponseEncoder;
use crate::endpoint::test_utils::SharedBuffer;

/// Authenticator that records its invocation and returns a fixed code,
/// answering the responder when the code is `Ok`.
struct Scripted {
    name: &'static str,
    code: HandleCode,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl Authenticator for Scripted {
    fn authenticate(
        &self,
        _credentials: &Credentials,
        responder: &mut Responder<'_>,
        _ctx: &ConnContext,
    ) -> HandleCode {
        self.calls.lock().expect("calls lock").push(self.name);
        if self.code == HandleCode::Ok {
            responder
                .respond(&json!({"by": self.name}))
                .expect("respond once");
        }
        self.code
    }
}

struct Harness {
    calls: Arc<Mutex<Vec<&'static str>>>,
    chain: AuthenticatorChain,
    buffer: SharedBuffer,
}

impl Harness {
    fn push(&mut self, name: &'static str, code: HandleCode, priority: i32) {
        self.chain.push(
            Scripted {
                name,
                code,
                calls: Arc::clone(&self.calls),
            },
            priority,
        );
    }

    fn run(&self) -> Result<(), AuthError> {
        let mut encoder = ResponseEncoder::new(self.buffer.clone());
        let mut responder = Responder::new(&mut encoder, Some(json!("hello-1")));
        let ctx = ConnContext::new(1, None);
        self.chain
            .authenticate(&Credentials::new("scout", "s-1", "t"), &mut responder, &ctx)
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        calls: Arc::new(Mutex::new(Vec::new())),
        chain: AuthenticatorChain::new(),
        buffer: SharedBuffer::default(),
    }
}

#[rstest]
fn empty_chain_fails_authentication_without_writing(harness: Harness) {
    assert_eq!(harness.run(), Err(AuthError::AuthenticationFailed));
    assert!(harness.buffer.is_empty());
}

#[rstest]
fn all_declined_runs_every_authenticator_in_ascending_order(mut harness: Harness) {
    harness.push("third", HandleCode::Declined, 30);
    harness.push("first", HandleCode::Declined, -5);
    harness.push("second-a", HandleCode::Declined, 10);
    harness.push("second-b", HandleCode::Declined, 10);

    assert_eq!(harness.run(), Err(AuthError::AuthenticationFailed));
    assert_eq!(harness.calls(), vec!["first", "second-a", "second-b", "third"]);
    assert!(harness.buffer.is_empty());
}

#[rstest]
fn first_ok_stops_the_chain(mut harness: Harness) {
    harness.push("later", HandleCode::Ok, 20);
    harness.push("declines", HandleCode::Declined, 1);
    harness.push("accepts", HandleCode::Ok, 5);

    assert_eq!(harness.run(), Ok(()));
    assert_eq!(harness.calls(), vec!["declines", "accepts"]);
    assert_eq!(
        harness.buffer.values(),
        vec![json!({"id": "hello-1", "result": {"by": "accepts"}})]
    );
}

#[rstest]
fn first_fail_stops_the_chain_without_response(mut harness: Harness) {
    harness.push("accepts", HandleCode::Ok, 9);
    harness.push("fails", HandleCode::Fail, 3);

    assert_eq!(harness.run(), Err(AuthError::Rejected));
    assert_eq!(harness.calls(), vec!["fails"]);
    assert!(harness.buffer.is_empty());
}

#[rstest]
#[case::matching("shared", HandleCode::Ok)]
#[case::wrong("other", HandleCode::Declined)]
#[case::prefix("share", HandleCode::Declined)]
#[case::extended("shared-extra", HandleCode::Declined)]
#[case::empty("", HandleCode::Declined)]
fn static_token_authenticator_matches_exact_token(
    #[case] token: &str,
    #[case] expected: HandleCode,
) {
    let buffer = SharedBuffer::default();
    let mut encoder = ResponseEncoder::new(buffer.clone());
    let mut responder = Responder::new(&mut encoder, None);
    let ctx = ConnContext::new(4, None);
    let authenticator = StaticTokenAuthenticator::new("shared");

    let code = authenticator.authenticate(
        &Credentials::new("edge", "e-1", token),
        &mut responder,
        &ctx,
    );

    assert_eq!(code, expected);
    assert_eq!(responder.has_responded(), expected == HandleCode::Ok);
}

#[test]
fn credentials_debug_redacts_token() {
    let rendered = format!("{:?}", Credentials::new("edge", "e-1", "top-secret"));
    assert!(!rendered.contains("top-secret"));
}
