//! Test doubles for unit tests, and for downstream crates that enable the
//! `testing` feature.
//!
//! `ScriptedTransport` answers requests from a FIFO script and records every
//! request it sees. A deferred answer parks the request until its `Gate` is
//! released, which lets a test decide the order in which concurrent requests
//! resolve.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};

enum Step {
    Respond(Result<HttpResponse, ApiError>),
    Deferred(oneshot::Receiver<()>, Result<HttpResponse, ApiError>),
}

/// Releases one deferred response.
pub struct Gate(oneshot::Sender<()>);

impl Gate {
    pub fn release(self) {
        let _ = self.0.send(());
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<HttpRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, status: u16, body: &str) {
        lock(&self.script).push_back(Step::Respond(Ok(response(status, body))));
    }

    pub fn push_value<T: Serialize>(&self, status: u16, body: &T) {
        let body = serde_json::to_string(body).unwrap_or_default();
        self.push_json(status, &body);
    }

    pub fn push_network_error(&self, msg: &str) {
        lock(&self.script).push_back(Step::Respond(Err(ApiError::Network(msg.to_string()))));
    }

    /// Queue a response that is held back until the returned gate is released.
    pub fn push_deferred(&self, status: u16, body: &str) -> Gate {
        let (tx, rx) = oneshot::channel();
        lock(&self.script).push_back(Step::Deferred(rx, Ok(response(status, body))));
        Gate(tx)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.seen).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        lock(&self.seen).push(request.clone());
        let step = lock(&self.script).pop_front();
        match step {
            Some(Step::Respond(result)) => result,
            Some(Step::Deferred(gate, result)) => {
                let _ = gate.await;
                result
            }
            None => Err(ApiError::Network(format!(
                "no scripted response for {} {}",
                request.method.as_str(),
                request.path
            ))),
        }
    }
}

/// Sign an HS256 token whose `sub` claim is `subject`.
pub fn fake_jwt(subject: &str) -> String {
    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: u64,
    }

    encode(
        &Header::default(),
        &Claims {
            sub: subject,
            exp: 4_102_444_800,
        },
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap_or_default()
}
