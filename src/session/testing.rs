// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Scripted transport and manual clock for exercising the session client
//! without network I/O.

use super::clock::{CancelToken, Clock};
use super::transport::{Request, Response, Transport, TransportError};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct MockState {
    script: VecDeque<Result<Response, TransportError>>,
    requests: Vec<Request>,
}

/// Replies to requests in order with the scripted responses.  Clones share
/// the script and the request log.
#[derive(Clone, Default)]
pub(crate) struct MockTransport(Arc<Mutex<MockState>>);

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, status: StatusCode, location: Option<&str>, body: &Value) -> &Self {
        self.0.lock().unwrap().script.push_back(Ok(Response {
            status,
            location: location.map(str::to_string),
            body: body.to_string().into_bytes(),
        }));
        self
    }

    pub fn reply_empty(&self, status: StatusCode) -> &Self {
        self.0.lock().unwrap().script.push_back(Ok(Response {
            status,
            location: None,
            body: Vec::new(),
        }));
        self
    }

    pub fn fail(&self, msg: &str) -> &Self {
        self.0
            .lock()
            .unwrap()
            .script
            .push_back(Err(TransportError(msg.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.0.lock().unwrap().requests.clone()
    }

    pub fn remaining(&self) -> usize {
        self.0.lock().unwrap().script.len()
    }
}

impl Transport for MockTransport {
    fn send(&self, req: &Request) -> Result<Response, TransportError> {
        let mut s = self.0.lock().unwrap();

        s.requests.push(req.clone());

        s.script
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted response".to_string())))
    }
}

/// Time only moves when somebody sleeps
#[derive(Clone)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<Instant>>,
    slept: Arc<Mutex<Vec<Duration>>>,
    cancel_on_sleep: Option<CancelToken>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            slept: Default::default(),
            cancel_on_sleep: None,
        }
    }

    /// Cancel `token` the first time anybody sleeps
    pub fn cancelling(token: CancelToken) -> Self {
        Self {
            cancel_on_sleep: Some(token),
            ..Self::new()
        }
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, d: Duration) {
        *self.now.lock().unwrap() += d;
        self.slept.lock().unwrap().push(d);

        if let Some(t) = &self.cancel_on_sleep {
            t.cancel();
        }
    }
}
